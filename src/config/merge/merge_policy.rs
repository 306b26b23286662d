//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources replace earlier ones field by field; tables merge, scalars and
//! arrays are replaced whole.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("client.enabled", true)?
        .set_default("client.stale_time_ms", 0_i64)?
        .set_default("transport.connect_timeout_ms", 10_000_i64)?
        .set_default("transport.request_timeout_ms", 120_000_i64)?
        .set_default("binding.default_property", crate::binding::DEFAULT_PROPERTY)
}

//! Environment source: QUERYBIND_<SECTION>__<FIELD>, e.g. QUERYBIND_CLIENT__STALE_TIME_MS

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("QUERYBIND")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    )
}

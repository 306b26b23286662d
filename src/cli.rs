//! CLI domain: parse, route, and output only.

mod output;
mod parse;
mod route;

pub use output::{format_config, format_results, map_error};
pub use parse::{Cli, Commands, ConfigCommands, RequestArgs};
pub use route::{CommandOutput, RunContext};

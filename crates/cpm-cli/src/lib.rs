pub mod cli;
pub mod config;

pub use cli::{Cli, Commands, ConfigCommands, OutputFormat, RunArgs};
pub use config::CpmConfig;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cpm", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level (overrides `[logging] level` in the config)
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    /// Configuration file (defaults to ./cpm.toml when present)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clear one or more market periods from CSV bid tables
    Clear {
        /// Generator bids: name,capacity,bid_price
        #[arg(long, value_hint = ValueHint::FilePath)]
        generators: PathBuf,
        /// Demand bids: name,load,offer_price[,period]
        #[arg(long, value_hint = ValueHint::FilePath)]
        demands: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Clear the built-in eight-generator sample market
    Demo {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Options shared by every command that clears a market.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Write supply/demand step curves as JSON to this file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub curves: Option<PathBuf>,
    /// Cross-check each dispatch against bounds, balance and merit order
    #[arg(long)]
    pub validate: bool,
    /// LP backend (clarabel, good_lp, highs)
    #[arg(long)]
    pub solver: Option<String>,
    /// Tie-break for equal-priced units (merit-order, solver)
    #[arg(long)]
    pub tie_break: Option<String>,
    /// Point of an interval price used for settlement (low, midpoint, high)
    #[arg(long)]
    pub interval_rule: Option<String>,
    /// Worker threads for multi-period clearing ("auto" or a number)
    #[arg(long, default_value = "auto")]
    pub threads: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Write a default configuration file
    Init {
        /// Destination
        #[arg(long, default_value = "cpm.toml", value_hint = ValueHint::FilePath)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text tables
    Table,
    /// One JSON document on stdout
    Json,
}

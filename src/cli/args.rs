//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Real Estate Intelligence Portal - property lookups, orders and saved
/// portfolios from the command line.
#[derive(Parser, Debug)]
#[command(name = "reip")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Path to config.toml
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Path to secrets.toml
    #[arg(long, value_name = "PATH", global = true)]
    pub secrets: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with the configured identity credentials and show the session
    Whoami,

    /// Look up a property by address and analyze it
    Lookup(LookupArgs),

    /// Manage saved properties
    #[command(subcommand)]
    Portfolio(PortfolioCommand),

    /// List recent orders
    Orders(OrdersArgs),

    /// Show this month's API usage
    Usage,

    /// Validate configuration and secrets
    Check(CheckArgs),

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the `lookup` command.
#[derive(Parser, Debug)]
pub struct LookupArgs {
    /// Street address and city, e.g. "123 Main St, Springfield, IL"
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// Save the property to your portfolio
    #[arg(long)]
    pub save: bool,
}

/// Portfolio subcommands.
#[derive(Subcommand, Debug)]
pub enum PortfolioCommand {
    /// List saved properties, most recent first
    List,

    /// Delete a saved property
    Delete {
        /// Property id as shown by `portfolio list`
        id: i64,
    },
}

/// Arguments for the `orders` command.
#[derive(Parser, Debug)]
pub struct OrdersArgs {
    /// Customer id (defaults to the signed-in user)
    #[arg(long, value_name = "ID")]
    pub customer: Option<u64>,
}

/// Arguments for the `check` command.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Also query the property API with a sample address
    #[arg(long)]
    pub online: bool,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}

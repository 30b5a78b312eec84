pub mod ops;

use clap::{Parser, Subcommand};

pub const DEFAULT_CONFIG: &str = "mailgate.toml";

#[derive(Parser)]
#[command(name = "mailgate")]
#[command(about = "Mail account service", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (the default)
    Serve,
    /// Insert a token for an account and print its id
    IssueToken {
        #[arg(long)]
        owner: String,
        /// `auth` or `activate`
        #[arg(long, default_value = "auth")]
        kind: String,
        /// Comma separated scopes, e.g. `account:read,emails`
        #[arg(long, default_value = "")]
        scope: String,
        /// Lifetime in hours. Activation tokens default to the configured TTL.
        #[arg(long)]
        ttl_hours: Option<i64>,
    },
    /// Create any system labels an active account is missing
    RepairLabels {
        #[arg(long)]
        account: String,
    },
}

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mailgate::cli::{ops, Cli, Commands};
use mailgate::config::MailgateConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (config, origin) = MailgateConfig::load_or_default(&cli.config);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    origin.report(&cli.config);

    info!("mailgate {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => ops::serve(&config).await?,
        Commands::IssueToken {
            owner,
            kind,
            scope,
            ttl_hours,
        } => {
            let service = ops::build_service(&config)?;
            let token = ops::issue_token(&service, &owner, &kind, &scope, ttl_hours).await?;
            println!("{}", token.id);
        }
        Commands::RepairLabels { account } => {
            let service = ops::build_service(&config)?;
            let created = ops::repair_labels(&service, &account).await?;
            println!("Created {} system labels for {}", created, account);
        }
    }

    Ok(())
}

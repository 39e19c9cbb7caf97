use clap::{Parser, Subcommand};
use std::env;
use std::error::Error;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use process_importer::{commands, Dependencies, ImporterError, Settings};
use process_importer_shared::ImportPair;

#[derive(Parser)]
#[command(name = "process-importer")]
#[command(about = "Imports engine records into process search indices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every partition until interrupted
    Run,
    /// Create missing indices and run pending upgrade plans
    Upgrade,
    /// Restart a pair's import from the first record
    ResetCursor {
        /// Partition of the pair
        #[arg(long)]
        partition: u32,
        /// Record type of the pair (process-definition, process-instance, incident, variable)
        #[arg(long)]
        record_type: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn execute(cli: Cli) -> Result<(), ImporterError> {
    let deps = Dependencies::new(cli.settings).await?;

    match cli.command {
        Commands::Run => {
            let pairs = ImportPair::all(deps.settings.partition_count);
            info!(pairs = pairs.len(), "Starting import");
            commands::import(
                &deps.upgrade_executor(),
                &deps.import_registry(),
                pairs,
                shutdown_signal(),
                deps.settings.shutdown_timeout(),
            )
            .await?;
        }
        Commands::Upgrade => {
            info!("Starting upgrade");
            commands::upgrade(&deps.upgrade_executor()).await?;
        }
        Commands::ResetCursor {
            partition,
            record_type,
        } => {
            let pair = commands::parse_pair(partition, &record_type)?;
            commands::reset_cursor(deps.client.as_ref(), pair).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Process importer failed");

            let mut source = e.source();
            while let Some(err) = source {
                error!(cause = %err, "Caused by");
                source = err.source();
            }
            ExitCode::FAILURE
        }
    }
}

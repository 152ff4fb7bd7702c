use clap::{Parser, Subcommand};
use configuration::{LogFormat, load_config};
use std::path::PathBuf;

/// Recipe catalogue service: HTTP API over a Postgres schema.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides the log output format from the configuration.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations and serve the HTTP API.
    Serve,
    /// Apply pending migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; settings may come from the config file instead.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    let _guard = configuration::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Serve => web_server::run_server(&config).await?,
        Commands::Migrate => {
            let pool = database::connect(&config.database).await?;
            database::run_migrations(&pool).await?;
            tracing::info!("migrations applied");
        }
    }

    Ok(())
}

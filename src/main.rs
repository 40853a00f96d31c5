use clap::Parser;
use tracing_subscriber::EnvFilter;

use brandhub::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, JWT_SECRET, etc. are picked up before CONFIG is read.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brandhub=info,tower_http=info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = brandhub::cli::run(cli).await {
        match std::env::var("BRANDHUB_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }

    Ok(())
}

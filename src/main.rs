//! sheet-loader - download a workbook and load every sheet into PostgreSQL

use anyhow::{Context, Result};
use sheet_loader::ingestion::{Config, Loader, Prompt, TableMapping};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: sheet-loader [--insecure] [URL]

Downloads the workbook at URL (asked for when omitted) and loads each sheet
into a PostgreSQL table, replacing any existing table of the same name.

Options:
  --insecure   Skip TLS certificate validation for the download
  -h, --help   Show this message

Database settings come from DATABASE_URL or DB_HOST, DB_PORT, DB_NAME,
DB_USER and DB_PASSWORD. SHEET_TABLES=\"Jan=jan_sales,Feb=feb_sales\" names
tables up front; unmapped sheets are asked for interactively.";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    let mut insecure = false;
    let mut url = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--insecure" => insecure = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ => url = Some(arg),
        }
    }

    // Load configuration from environment
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if insecure {
        config.http.accept_invalid_certs = true;
    }
    info!("Configuration loaded");

    let url = match url {
        Some(url) => url,
        None => Prompt::stdio()
            .ask("Enter the URL of the Excel file: ")
            .context("No URL given")?,
    };

    let mut names = TableMapping::new(config.sheet_tables.clone(), Some(Prompt::stdio()));
    let loader = Loader::new(config).context("Invalid database configuration")?;

    let report = loader
        .run(&url, &mut names)
        .await
        .with_context(|| format!("Failed to load workbook from {}", url))?;

    match &report.aborted {
        Some(_) => error!("✗ Load ended early: {}", report),
        None => info!("✓ Load complete: {}", report),
    }

    Ok(())
}

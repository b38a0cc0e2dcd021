//! Loader - runs the fetch, parse, clean, write pipeline for one workbook

use crate::ingestion::clean;
use crate::ingestion::config::Config;
use crate::ingestion::error::{LoadError, Result};
use crate::ingestion::fetch;
use crate::ingestion::parse;
use crate::ingestion::prompt::TableNames;
use crate::ingestion::types::{LoadedTable, RunReport, SheetCollection};
use crate::ingestion::write;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{error, info, warn};

pub struct Loader {
    config: Config,
    connect_options: PgConnectOptions,
}

impl Loader {
    /// Validates the database settings up front so a bad config fails before any download
    pub fn new(config: Config) -> Result<Self> {
        let connect_options = config.database.connect_options()?;
        Ok(Loader {
            config,
            connect_options,
        })
    }

    /// Load every sheet of the workbook at `url`.
    ///
    /// Fetch and parse failures are returned as errors. Database and input failures end the
    /// run early and are recorded in the report instead.
    pub async fn run<N: TableNames>(&self, url: &str, names: &mut N) -> Result<RunReport> {
        // Step 1: Download the workbook to memory
        info!("Step 1/3: Fetching workbook...");
        let raw = fetch::fetch_workbook(url, &self.config.http).await?;
        info!("✓ Downloaded the file to memory");

        // Step 2: Extract every sheet
        info!("Step 2/3: Parsing workbook...");
        let sheets = parse::parse_workbook(raw, self.config.header_rows)?;
        info!("✓ Extracted {} sheets: {:?}", sheets.len(), sheets.names());

        // Step 3: Clean and load each sheet
        info!("Step 3/3: Loading sheets into database...");
        let mut report = RunReport::default();

        let db = match self.connect().await {
            Ok(db) => db,
            Err(e) => {
                error!("✗ {}", e);
                report.aborted = Some(e.to_string());
                return Ok(report);
            }
        };
        info!("✓ Database connected successfully");

        if let Err(e) = load_sheets(&db, sheets, names, &mut report).await {
            error!("✗ {}", e);
            report.aborted = Some(e.to_string());
        }

        db.close().await;
        info!("Database connection closed.");

        Ok(report)
    }

    async fn connect(&self) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.config.database.connect_timeout)
            .connect_with(self.connect_options.clone())
            .await
            .map_err(LoadError::Connection)
    }
}

/// Name, clean, write and read back each sheet in workbook order.
/// Stops at the first database or input error; sheets whose cleaning fails are skipped.
pub async fn load_sheets<N: TableNames>(
    db: &PgPool,
    sheets: SheetCollection,
    names: &mut N,
    report: &mut RunReport,
) -> Result<()> {
    for (sheet_name, dataset) in sheets {
        let table = names.table_name(&sheet_name)?;

        let cleaned = match clean::clean(Some(dataset)) {
            Some(cleaned) => cleaned,
            None => {
                warn!(
                    "Skipping sheet '{}': cleaning produced no data, table '{}' left untouched",
                    sheet_name, table
                );
                report.skipped.push(sheet_name);
                continue;
            }
        };
        info!("Cleaned data for sheet '{}'", sheet_name);
        println!("{}\n", cleaned);

        let stats = write::replace_table(db, &table, &cleaned).await?;
        info!(
            "Sheet '{}' written to table '{}' ({})",
            sheet_name, table, stats
        );

        let data = write::read_table(db, &table).await?;
        println!("{}\n", data);

        report.tables.push(LoadedTable {
            sheet: sheet_name,
            table,
            stats,
        });
    }

    Ok(())
}

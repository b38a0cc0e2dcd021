//! Fetch functions - retrieve the remote workbook into memory

use crate::ingestion::config::HttpConfig;
use crate::ingestion::error::Result;
use crate::ingestion::types::RawData;
use crate::ingestion::utils::http_get;
use tracing::info;

/// Fetch a spreadsheet workbook (any format calamine reads)
pub async fn fetch_workbook(url: &str, http: &HttpConfig) -> Result<RawData> {
    info!("Fetching workbook from {}", url);

    let bytes = http_get(url, http).await?;

    Ok(RawData::new(url, bytes))
}

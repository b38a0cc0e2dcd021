//! Configuration loaded from environment variables

use crate::ingestion::error::{LoadError, Result};
use crate::ingestion::utils::parse_flag;
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Rows above the header row on every sheet
pub const DEFAULT_HEADER_ROWS: usize = 7;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub header_rows: usize,
    /// Pre-supplied sheet -> table names; empty means prompt for every sheet
    pub sheet_tables: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout: Duration::from_secs(300), // 5 min timeout
            accept_invalid_certs: false,
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    /// Full connection URL; wins over the individual fields when set
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub connect_timeout: Duration,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| LoadError::Config(format!("DATABASE_URL is invalid: {}", e)));
        }

        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user);

        Ok(match &self.password {
            Some(password) => options.password(password),
            None => options,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup (environment, test fixtures)
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = DatabaseConfig {
            url: var("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_number(&var, "DB_PORT", 5432)?,
            name: var("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
            user: var("DB_USER").unwrap_or_else(|| "postgres".to_string()),
            password: var("DB_PASSWORD"),
            connect_timeout: Duration::from_secs(parse_number(&var, "DB_CONNECT_TIMEOUT_SECS", 30)?),
        };

        let accept_invalid_certs = match var("SHEET_LOADER_INSECURE_TLS") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                LoadError::Config(format!("SHEET_LOADER_INSECURE_TLS must be a boolean, got '{}'", raw))
            })?,
            None => false,
        };

        let http = HttpConfig {
            timeout: Duration::from_secs(parse_number(&var, "HTTP_TIMEOUT_SECS", 300)?),
            accept_invalid_certs,
        };

        let sheet_tables = match var("SHEET_TABLES") {
            Some(raw) => parse_sheet_tables(&raw)?,
            None => Vec::new(),
        };

        Ok(Config {
            database,
            http,
            header_rows: parse_number(&var, "HEADER_ROWS", DEFAULT_HEADER_ROWS)?,
            sheet_tables,
        })
    }
}

fn parse_number<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LoadError::Config(format!("{} must be a valid number, got '{}'", key, raw))),
        None => Ok(default),
    }
}

/// Parse `Jan=jan_sales,Feb=feb_sales`
pub fn parse_sheet_tables(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (sheet, table) = pair
                .split_once('=')
                .ok_or_else(|| LoadError::Config(format!("expected sheet=table, got '{}'", pair)))?;
            let (sheet, table) = (sheet.trim(), table.trim());
            if sheet.is_empty() || table.is_empty() {
                return Err(LoadError::Config(format!("expected sheet=table, got '{}'", pair)));
            }
            Ok((sheet.to_string(), table.to_string()))
        })
        .collect()
}

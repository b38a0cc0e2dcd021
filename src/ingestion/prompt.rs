//! Destination table names - asked interactively or supplied up front

use crate::ingestion::error::{LoadError, Result};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Source of one destination table name per sheet
pub trait TableNames {
    fn table_name(&mut self, sheet_name: &str) -> Result<String>;
}

/// Ask the operator on a line-oriented terminal
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompt { input, output }
    }

    /// Print `message` and read one trimmed line; blank answers are asked again
    pub fn ask(&mut self, message: &str) -> Result<String> {
        loop {
            write!(self.output, "{}", message)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(LoadError::Input(format!(
                    "input closed while waiting for: {}",
                    message.trim()
                )));
            }

            let answer = line.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
        }
    }
}

impl Prompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Prompt::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TableNames for Prompt<R, W> {
    fn table_name(&mut self, sheet_name: &str) -> Result<String> {
        self.ask(&format!("Enter table name for sheet '{}': ", sheet_name))
    }
}

/// Pre-supplied sheet -> table mapping, with an optional fallback for unmapped sheets
pub struct TableMapping<F> {
    names: HashMap<String, String>,
    fallback: Option<F>,
}

impl<F: TableNames> TableMapping<F> {
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>, fallback: Option<F>) -> Self {
        TableMapping {
            names: pairs.into_iter().collect(),
            fallback,
        }
    }
}

impl<F: TableNames> TableNames for TableMapping<F> {
    fn table_name(&mut self, sheet_name: &str) -> Result<String> {
        if let Some(table) = self.names.get(sheet_name) {
            debug!("Sheet '{}' mapped to table '{}'", sheet_name, table);
            return Ok(table.clone());
        }

        match self.fallback.as_mut() {
            Some(fallback) => fallback.table_name(sheet_name),
            None => Err(LoadError::Input(format!(
                "no table name configured for sheet '{}'",
                sheet_name
            ))),
        }
    }
}

//! Data ingestion module - fetch, parse, clean and load spreadsheet workbooks

pub mod clean;
pub mod config;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod types;
pub mod utils;
pub mod write;

pub use config::Config;
pub use error::LoadError;
pub use pipeline::Loader;
pub use prompt::{Prompt, TableMapping, TableNames};
pub use types::*;

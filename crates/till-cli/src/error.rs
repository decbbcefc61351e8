use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] till_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid item {0:?}: expected BARCODE or BARCODE:QTY with QTY >= 1")]
    InvalidItem(String),
    #[error("No product with barcode {0}")]
    ProductNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

//! Error handling for caff_core.
//!
//! One enum spans transport failures (filesystem, serde) and domain
//! rejections raised at validation boundaries. Expected degenerate
//! states (empty history, spent budget) are modeled as results, not
//! errors.

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A profile or config value the caller must fix
    #[error("Configuration error: {0}")]
    Config(String),

    /// The beverage catalog is internally inconsistent
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A persisted record or user-supplied value that would not parse
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

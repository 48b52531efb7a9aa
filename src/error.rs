use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrainerError>;

#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("column '{0}' not found in dataset")]
    MissingColumn(String),

    #[error("invalid value in column '{column}' at row {row}: null or not a number")]
    InvalidValue { column: String, row: usize },

    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("model fitting failed: {0}")]
    Fit(#[from] linfa_elasticnet::ElasticNetError),

    #[error("metric computation failed: {0}")]
    Metrics(#[from] linfa::Error),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

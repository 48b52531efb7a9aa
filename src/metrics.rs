//! Regression evaluation metrics

use linfa::prelude::SingleTargetRegression;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// r² is `1 - SS_res / SS_tot`; a constant label set makes it degenerate.
    pub fn from_predictions(predictions: &Array1<f64>, labels: &Array1<f64>) -> Result<Self> {
        if predictions.len() != labels.len() {
            return Err(TrainerError::DimensionMismatch(format!(
                "{} predictions for {} labels",
                predictions.len(),
                labels.len()
            )));
        }
        if labels.is_empty() {
            return Err(TrainerError::EmptyDataset(
                "cannot evaluate on an empty test set".to_string(),
            ));
        }

        Ok(Self {
            rmse: predictions.mean_squared_error(labels)?.sqrt(),
            mae: predictions.mean_absolute_error(labels)?,
            r2: predictions.r2(labels)?,
        })
    }
}

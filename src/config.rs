//! Training job configuration.
//!
//! Every field has a default matching the production trip dataset, so a TOML
//! file only needs to name what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Suffix appended to a categorical column name for its indexed counterpart.
pub const INDEX_SUFFIX: &str = "_index";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub label_column: String,
    /// Columns turned into numeric indices before assembly.
    pub categorical_columns: Vec<String>,
    /// Numeric columns placed first in the feature vector.
    pub feature_columns: Vec<String>,
    /// Literal read as null from the CSV.
    pub null_value: String,
    pub infer_schema_length: usize,
    pub handle_invalid: HandleInvalid,
    /// First line of each block appended to the train info file.
    pub report_title: String,
    pub split: SplitConfig,
    pub regression: RegressionParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub seed: u64,
}

/// Elastic-net hyperparameters. `elastic_net_param` is the L1 share of the
/// penalty: 1.0 is lasso, 0.0 is ridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionParams {
    pub max_iter: u32,
    pub reg_param: f64,
    pub elastic_net_param: f64,
    pub tolerance: f64,
    pub fit_intercept: bool,
    pub standardization: bool,
}

/// What to do with rows holding a null or NaN in a feature or the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleInvalid {
    #[default]
    Error,
    Skip,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            label_column: "DURATION".to_string(),
            categorical_columns: to_strings(&["BUS_CODE", "PERIOD_ORIG", "PERIOD_DEST", "WEEK_DAY"]),
            feature_columns: to_strings(&[
                "TRIP_NUM_ORIG",
                "ROUTE",
                "SHAPE_ID",
                "SHAPE_SEQ",
                "LAT_SHAPE_ORIG",
                "LON_SHAPE_ORIG",
                "STOP_ID_ORIG",
                "STOP_ID_DEST",
                "TRIP_NUM_DEST",
                "LAT_SHAPE_DEST",
                "LON_SHAPE_DEST",
                "HOUR_ORIG",
                "HOUR_DEST",
                "IS_RUSH_ORIG",
                "IS_RUSH_DEST",
                "WEEK_OF_YEAR",
                "DAY_OF_MONTH",
                "MONTH",
                "IS_HOLIDAY",
                "IS_WEEKEND",
                "IS_REGULAR_DAY",
                "TOTAL_DISTANCE",
            ]),
            null_value: "-".to_string(),
            infer_schema_length: 100,
            handle_invalid: HandleInvalid::Error,
            report_title: "Duration model".to_string(),
            split: SplitConfig::default(),
            regression: RegressionParams::default(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            seed: 24,
        }
    }
}

impl Default for RegressionParams {
    fn default() -> Self {
        Self {
            max_iter: 10,
            reg_param: 0.01,
            elastic_net_param: 1.0,
            tolerance: 1e-6,
            fit_intercept: true,
            standardization: true,
        }
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl TrainConfig {
    /// Reads a TOML file on top of the defaults and validates the result.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: TrainConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Feature vector layout: numeric columns, then the indexed categorical
    /// columns that are not already listed.
    pub fn assembled_feature_columns(&self) -> Vec<String> {
        let mut columns = self.feature_columns.clone();
        for categorical in &self.categorical_columns {
            let indexed = format!("{categorical}{INDEX_SUFFIX}");
            if !columns.contains(&indexed) {
                columns.push(indexed);
            }
        }
        columns
    }

    pub fn validate(&self) -> Result<()> {
        if self.label_column.trim().is_empty() {
            return Err(TrainerError::Config("label_column must not be empty".into()));
        }
        if self.assembled_feature_columns().is_empty() {
            return Err(TrainerError::Config(
                "at least one feature or categorical column is required".into(),
            ));
        }
        if self.assembled_feature_columns().contains(&self.label_column) {
            return Err(TrainerError::Config(format!(
                "label column '{}' is also listed as a feature",
                self.label_column
            )));
        }

        let fraction = self.split.train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(TrainerError::Config(format!(
                "split.train_fraction must be in (0, 1), got {fraction}"
            )));
        }

        let params = &self.regression;
        if params.max_iter == 0 {
            return Err(TrainerError::Config("regression.max_iter must be positive".into()));
        }
        if !(params.reg_param >= 0.0) {
            return Err(TrainerError::Config(format!(
                "regression.reg_param must be non-negative, got {}",
                params.reg_param
            )));
        }
        if !(0.0..=1.0).contains(&params.elastic_net_param) {
            return Err(TrainerError::Config(format!(
                "regression.elastic_net_param must be in [0, 1], got {}",
                params.elastic_net_param
            )));
        }
        if !(params.tolerance > 0.0) {
            return Err(TrainerError::Config(format!(
                "regression.tolerance must be positive, got {}",
                params.tolerance
            )));
        }
        Ok(())
    }
}

//! Duration regression model: fitting, prediction and the on-disk model
//! directory.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa_elasticnet::ElasticNet;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RegressionParams;
use crate::error::{Result, TrainerError};
use crate::features::{AssembledData, StringIndexer};
use crate::metrics::RegressionMetrics;

pub const MODEL_CLASS: &str = "LinearRegressionModel";
pub const METADATA_FILE: &str = "metadata.json";
pub const DATA_FILE: &str = "data.json";

/// Fitted linear model with coefficients in the original feature space.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationModel {
    pub label_column: String,
    pub feature_columns: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub params: RegressionParams,
    pub indexers: Vec<StringIndexer>,
    pub summary: TrainingSummary,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub train_rows: usize,
    pub solver_steps: u32,
    pub duality_gap: Option<f64>,
    #[serde(default)]
    pub train_rmse: Option<f64>,
    #[serde(default)]
    pub train_r2: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct ModelMetadata {
    class: String,
    version: String,
    trained_at: DateTime<Utc>,
    label_column: String,
    feature_columns: Vec<String>,
    params: RegressionParams,
    indexers: Vec<StringIndexer>,
    summary: TrainingSummary,
}

#[derive(Serialize, Deserialize)]
struct ModelData {
    coefficients: Vec<f64>,
    intercept: f64,
}

/// Per-column mean and sample standard deviation.
fn column_stats(x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let n = x.nrows() as f64;
    let mean = x.sum_axis(Axis(0)) / n;
    let std = Array1::from_iter(x.axis_iter(Axis(1)).zip(mean.iter()).map(|(col, m)| {
        if n < 2.0 {
            return 0.0;
        }
        let ss: f64 = col.iter().map(|v| (v - m).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    }));
    (mean, std)
}

/// Fits an elastic-net linear regression on the assembled training rows.
///
/// With `standardization` the features are scaled to unit variance before the
/// solver runs so the penalty treats them alike; the coefficients are scaled
/// back afterwards. Columns that carry no information (zero variance with an
/// intercept, all zeros without one) are left out of the fit and get a zero
/// coefficient.
pub fn train_duration_model(
    data: &AssembledData,
    label_column: &str,
    params: &RegressionParams,
    indexers: &[StringIndexer],
) -> Result<DurationModel> {
    if data.n_rows() == 0 {
        return Err(TrainerError::EmptyDataset(
            "no training rows left after assembly".to_string(),
        ));
    }

    let x = &data.features;
    let y = &data.labels;
    let (mean, std) = column_stats(x);

    let active: Vec<usize> = (0..x.ncols())
        .filter(|&j| {
            if params.fit_intercept {
                std[j] > 0.0
            } else {
                x.column(j).iter().any(|v| *v != 0.0)
            }
        })
        .collect();
    let scale: Vec<f64> = active
        .iter()
        .map(|&j| {
            if params.standardization && std[j] > 0.0 {
                std[j]
            } else {
                1.0
            }
        })
        .collect();

    if active.len() < x.ncols() {
        let dropped: Vec<&str> = (0..x.ncols())
            .filter(|j| !active.contains(j))
            .map(|j| data.feature_columns[j].as_str())
            .collect();
        warn!(?dropped, "constant feature columns get a zero coefficient");
    }

    let y_mean = if params.fit_intercept {
        y.mean().unwrap_or(0.0)
    } else {
        0.0
    };

    let mut coefficients = vec![0.0; x.ncols()];
    let (solver_steps, duality_gap) = if active.is_empty() {
        (0, None)
    } else {
        // linfa only centers the label; center features here and recover
        // the intercept from the means below.
        let mut x_fit = x.select(Axis(1), &active);
        for ((mut col, s), &j) in x_fit.axis_iter_mut(Axis(1)).zip(&scale).zip(&active) {
            if params.fit_intercept {
                col -= mean[j];
            }
            col /= *s;
        }
        let y_fit = y - y_mean;

        let dataset = Dataset::new(x_fit, y_fit);
        let fitted = ElasticNet::<f64>::params()
            .penalty(params.reg_param)
            .l1_ratio(params.elastic_net_param)
            .with_intercept(false)
            .max_iterations(params.max_iter)
            .tolerance(params.tolerance)
            .fit(&dataset)?;

        for ((&j, s), w) in active.iter().zip(&scale).zip(fitted.hyperplane()) {
            coefficients[j] = w / s;
        }

        let gap = fitted.duality_gap();
        (fitted.n_steps(), gap.is_finite().then_some(gap))
    };

    let intercept = if params.fit_intercept {
        y_mean
            - active
                .iter()
                .map(|&j| mean[j] * coefficients[j])
                .sum::<f64>()
    } else {
        0.0
    };

    let weights = ArrayView1::from(&coefficients[..]);
    let train_metrics = RegressionMetrics::from_predictions(&(x.dot(&weights) + intercept), y)?;
    let summary = TrainingSummary {
        train_rows: data.n_rows(),
        solver_steps,
        duality_gap,
        train_rmse: train_metrics.rmse.is_finite().then_some(train_metrics.rmse),
        train_r2: train_metrics.r2.is_finite().then_some(train_metrics.r2),
    };

    info!(
        rows = summary.train_rows,
        features = coefficients.len(),
        solver_steps = summary.solver_steps,
        duality_gap = ?summary.duality_gap,
        train_rmse = ?summary.train_rmse,
        train_r2 = ?summary.train_r2,
        intercept,
        "fitted duration model"
    );

    Ok(DurationModel {
        label_column: label_column.to_string(),
        feature_columns: data.feature_columns.clone(),
        coefficients,
        intercept,
        params: params.clone(),
        indexers: indexers.to_vec(),
        summary,
        trained_at: Utc::now(),
    })
}

impl DurationModel {
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        if features.ncols() != self.coefficients.len() {
            return Err(TrainerError::DimensionMismatch(format!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                features.ncols()
            )));
        }
        let weights = ArrayView1::from(&self.coefficients[..]);
        Ok(features.dot(&weights) + self.intercept)
    }

    /// Writes the model directory, replacing whatever is at `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        if dir.is_dir() {
            fs::remove_dir_all(dir)?;
        } else if dir.exists() {
            fs::remove_file(dir)?;
        }
        fs::create_dir_all(dir)?;

        let metadata = ModelMetadata {
            class: MODEL_CLASS.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: self.trained_at,
            label_column: self.label_column.clone(),
            feature_columns: self.feature_columns.clone(),
            params: self.params.clone(),
            indexers: self.indexers.clone(),
            summary: self.summary.clone(),
        };
        let data = ModelData {
            coefficients: self.coefficients.clone(),
            intercept: self.intercept,
        };

        serde_json::to_writer_pretty(BufWriter::new(File::create(dir.join(METADATA_FILE))?), &metadata)?;
        serde_json::to_writer_pretty(BufWriter::new(File::create(dir.join(DATA_FILE))?), &data)?;

        info!(path = %dir.display(), "saved duration model");
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TrainerError::PathNotFound(dir.to_path_buf()));
        }

        let metadata: ModelMetadata =
            serde_json::from_reader(BufReader::new(File::open(dir.join(METADATA_FILE))?))?;
        let data: ModelData =
            serde_json::from_reader(BufReader::new(File::open(dir.join(DATA_FILE))?))?;

        if metadata.class != MODEL_CLASS {
            return Err(TrainerError::Config(format!(
                "unexpected model class '{}' in {}",
                metadata.class,
                dir.display()
            )));
        }
        if data.coefficients.len() != metadata.feature_columns.len() {
            return Err(TrainerError::DimensionMismatch(format!(
                "{} coefficients for {} feature columns",
                data.coefficients.len(),
                metadata.feature_columns.len()
            )));
        }

        Ok(Self {
            label_column: metadata.label_column,
            feature_columns: metadata.feature_columns,
            coefficients: data.coefficients,
            intercept: data.intercept,
            params: metadata.params,
            indexers: metadata.indexers,
            summary: metadata.summary,
            trained_at: metadata.trained_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assembled(features: Array2<f64>, labels: Array1<f64>, columns: &[&str]) -> AssembledData {
        AssembledData {
            feature_columns: columns.iter().map(|c| c.to_string()).collect(),
            features,
            labels,
            skipped_rows: 0,
        }
    }

    fn exact_params() -> RegressionParams {
        RegressionParams {
            max_iter: 1000,
            reg_param: 1e-6,
            ..RegressionParams::default()
        }
    }

    #[test]
    fn recovers_single_feature_line() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64 * 10.0);
        let y = x.column(0).mapv(|v| 2.0 * v + 30.0);
        let data = assembled(x, y, &["TOTAL_DISTANCE"]);

        let model = train_duration_model(&data, "DURATION", &exact_params(), &[]).unwrap();
        assert!((model.coefficients[0] - 2.0).abs() < 1e-3, "{:?}", model.coefficients);
        assert!((model.intercept - 30.0).abs() < 1e-2, "{}", model.intercept);
    }

    #[test]
    fn offset_feature_recovers_intercept() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| 100.0 + i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 30.0);
        let data = assembled(x, y, &["STOP_ID_ORIG"]);

        let model = train_duration_model(&data, "DURATION", &exact_params(), &[]).unwrap();
        assert!((model.coefficients[0] - 2.0).abs() < 1e-3, "{:?}", model.coefficients);
        assert!((model.intercept - 30.0).abs() < 0.2, "{}", model.intercept);
        assert!(model.summary.train_r2.unwrap() > 0.999);
        assert!(model.summary.train_rmse.unwrap() < 0.1);
    }

    #[test]
    fn recovers_two_features_with_default_penalty() {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| {
            if j == 0 {
                (i % 12) as f64
            } else {
                (i / 12) as f64 * 100.0
            }
        });
        let y = x.map_axis(Axis(1), |row| 3.0 * row[0] - 0.5 * row[1] + 7.0);
        let data = assembled(x.clone(), y.clone(), &["HOUR_ORIG", "TOTAL_DISTANCE"]);

        let params = RegressionParams {
            max_iter: 500,
            ..RegressionParams::default()
        };
        let model = train_duration_model(&data, "DURATION", &params, &[]).unwrap();
        assert!((model.coefficients[0] - 3.0).abs() < 0.1, "{:?}", model.coefficients);
        assert!((model.coefficients[1] + 0.5).abs() < 0.01, "{:?}", model.coefficients);

        let predictions = model.predict(&x).unwrap();
        let worst = (&predictions - &y).mapv(f64::abs).fold(0.0_f64, |a, b| a.max(*b));
        assert!(worst < 1.0, "max abs error {worst}");
    }

    #[test]
    fn constant_column_gets_zero_coefficient() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let data = assembled(x, y, &["HOUR_ORIG", "IS_HOLIDAY"]);

        let model = train_duration_model(&data, "DURATION", &exact_params(), &[]).unwrap();
        assert_eq!(model.coefficients[1], 0.0);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn all_constant_features_fall_back_to_mean() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![10.0, 20.0, 30.0];
        let data = assembled(x, y, &["IS_WEEKEND"]);

        let model =
            train_duration_model(&data, "DURATION", &RegressionParams::default(), &[]).unwrap();
        assert_eq!(model.coefficients, vec![0.0]);
        assert_eq!(model.intercept, 20.0);
        assert_eq!(model.summary.solver_steps, 0);
    }

    #[test]
    fn empty_training_set_is_an_error() {
        let data = assembled(Array2::zeros((0, 2)), Array1::zeros(0), &["a", "b"]);
        let err = train_duration_model(&data, "DURATION", &RegressionParams::default(), &[])
            .unwrap_err();
        assert!(matches!(err, TrainerError::EmptyDataset(_)));
    }

    #[test]
    fn predict_checks_width() {
        let x = array![[1.0], [2.0], [3.0]];
        let data = assembled(x, array![1.0, 2.0, 3.0], &["ROUTE"]);
        let model = train_duration_model(&data, "DURATION", &exact_params(), &[]).unwrap();
        assert!(model.predict(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn save_replaces_existing_directory_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("duration_model");
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(model_dir.join("stale.txt"), "old").unwrap();

        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]];
        let data = assembled(x, array![12.0, 19.0, 22.0, 29.0], &["HOUR_ORIG", "WEEK_DAY_index"]);
        let indexer = StringIndexer {
            input_column: "WEEK_DAY".into(),
            output_column: "WEEK_DAY_index".into(),
            labels: vec!["MONDAY".into(), "SUNDAY".into()],
        };
        let model =
            train_duration_model(&data, "DURATION", &RegressionParams::default(), &[indexer])
                .unwrap();

        model.save(&model_dir).unwrap();
        assert!(!model_dir.join("stale.txt").exists());
        assert!(model_dir.join(METADATA_FILE).is_file());
        assert!(model_dir.join(DATA_FILE).is_file());

        let loaded = DurationModel::load(&model_dir).unwrap();
        assert_eq!(loaded.feature_columns, model.feature_columns);
        assert_eq!(loaded.indexers, model.indexers);
        assert_eq!(loaded.params, model.params);
        assert_eq!(loaded.trained_at, model.trained_at);
        assert!((loaded.intercept - model.intercept).abs() < 1e-12);
        for (a, b) in loaded.coefficients.iter().zip(&model.coefficients) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn load_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DurationModel::load(&dir.path().join("absent")),
            Err(TrainerError::PathNotFound(_))
        ));
    }
}

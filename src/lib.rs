pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod metrics;
pub mod model;
pub mod report;

use std::path::Path;

use tracing::info;

pub use config::{HandleInvalid, RegressionParams, SplitConfig, TrainConfig};
pub use data::{load_csv_file, train_test_split, validate_input_path};
pub use error::{Result, TrainerError};
pub use features::{assemble, index_categorical_columns, AssembledData, StringIndexer};
pub use metrics::RegressionMetrics;
pub use model::{train_duration_model, DurationModel};
pub use report::append_train_info;

/// Output of a full training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: DurationModel,
    pub metrics: RegressionMetrics,
}

// Steps
// 1. Load the CSV file
// 2. Index categorical columns over the whole dataset
// 3. Split into train and test sets
// 4. Assemble feature matrices
// 5. Fit the duration model
// 6. Evaluate on the test set and append the train info report
// 7. Save the model and read it back
pub fn run_training(
    training_data_path: &Path,
    train_info_path: &Path,
    model_dir: &Path,
    config: &TrainConfig,
) -> Result<TrainingOutcome> {
    config.validate()?;
    validate_input_path(training_data_path)?;

    // 1. load file
    let mut df = load_csv_file(training_data_path, config)?;

    // 2. index categorical columns
    let indexers = index_categorical_columns(&mut df, &config.categorical_columns)?;

    // 3. split data into train and test set
    let (train_df, test_df) =
        train_test_split(&df, config.split.train_fraction, config.split.seed)?;

    // 4. assemble features and label
    let feature_columns = config.assembled_feature_columns();
    let train = assemble(
        &train_df,
        &feature_columns,
        &config.label_column,
        config.handle_invalid,
    )?;
    let test = assemble(
        &test_df,
        &feature_columns,
        &config.label_column,
        config.handle_invalid,
    )?;

    // 5. train the model
    let model = train_duration_model(&train, &config.label_column, &config.regression, &indexers)?;

    // 6. evaluate on test data
    let predictions = model.predict(&test.features)?;
    let metrics = RegressionMetrics::from_predictions(&predictions, &test.labels)?;
    append_train_info(train_info_path, &config.report_title, &model, &metrics)?;

    // 7. persist and check the saved copy
    model.save(model_dir)?;
    let reloaded = DurationModel::load(model_dir)?;
    if let Some(first) = reloaded.coefficients.first() {
        info!(first_coefficient = *first, "reloaded saved model");
    }

    Ok(TrainingOutcome { model, metrics })
}

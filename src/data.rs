use std::path::Path;

use polars::prelude::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, info};

use crate::config::TrainConfig;
use crate::error::{Result, TrainerError};

pub fn validate_input_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(TrainerError::PathNotFound(path.to_path_buf()));
    }
    Ok(())
}

pub fn load_csv_file(path: &Path, config: &TrainConfig) -> Result<DataFrame> {
    let df = CsvReader::from_path(path)?
        .has_header(true)
        .infer_schema(Some(config.infer_schema_length))
        .with_null_values(Some(NullValues::AllColumnsSingle(config.null_value.clone())))
        .finish()?;

    info!(path = %path.display(), rows = df.height(), columns = df.width(), "loaded training data");
    debug!("schema: {:?}", df.schema());
    debug!("{:?}", df.head(Some(5)));

    Ok(df)
}

/// Shuffles rows with a seeded RNG and cuts the shuffled order at
/// `train_fraction`. Both halves keep the original row order.
pub fn train_test_split(
    df: &DataFrame,
    train_fraction: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    let mut indices: Vec<u32> = (0..df.height() as u32).collect();

    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let split_idx = (df.height() as f64 * train_fraction).round() as usize;
    let (train_indices, test_indices) = indices.split_at(split_idx.min(indices.len()));

    if train_indices.is_empty() {
        return Err(TrainerError::EmptyDataset(format!(
            "training split is empty ({} rows, train fraction {train_fraction})",
            df.height()
        )));
    }
    if test_indices.is_empty() {
        return Err(TrainerError::EmptyDataset(format!(
            "test split is empty ({} rows, train fraction {train_fraction})",
            df.height()
        )));
    }

    let train_df = df.take(&sorted_index(train_indices))?;
    let test_df = df.take(&sorted_index(test_indices))?;

    info!(
        train_rows = train_df.height(),
        test_rows = test_df.height(),
        seed,
        "split dataset"
    );

    Ok((train_df, test_df))
}

fn sorted_index(indices: &[u32]) -> UInt32Chunked {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    UInt32Chunked::from_vec("", sorted)
}

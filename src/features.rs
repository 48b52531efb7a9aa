//! Categorical indexing and feature assembly.
//!
//! Categorical columns are mapped to numeric indices ordered by label
//! frequency, then every feature column is packed into a dense row-major
//! matrix alongside the label vector.

use std::collections::HashMap;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{HandleInvalid, INDEX_SUFFIX};
use crate::error::{Result, TrainerError};

/// Maps the labels of one column to `f64` indices, most frequent label first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringIndexer {
    pub input_column: String,
    pub output_column: String,
    pub labels: Vec<String>,
}

impl StringIndexer {
    pub fn fit(df: &DataFrame, column: &str) -> Result<Self> {
        let values = column_as_str(df, column)?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in values.into_iter().flatten() {
            *counts.entry(value).or_default() += 1;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        debug!(column, distinct = ranked.len(), "fitted string indexer");

        Ok(Self {
            input_column: column.to_string(),
            output_column: format!("{column}{INDEX_SUFFIX}"),
            labels: ranked.into_iter().map(|(label, _)| label.to_string()).collect(),
        })
    }

    /// Adds the index column. Nulls and labels unseen at fit time become null.
    pub fn transform(&self, df: &mut DataFrame) -> Result<()> {
        let lookup: HashMap<&str, f64> = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i as f64))
            .collect();

        let values = column_as_str(df, &self.input_column)?;
        let indexed: Vec<Option<f64>> = values
            .into_iter()
            .map(|value| value.and_then(|v| lookup.get(v).copied()))
            .collect();

        df.with_column(Series::new(&self.output_column, indexed))?;
        Ok(())
    }
}

fn column_as_str(df: &DataFrame, column: &str) -> Result<StringChunked> {
    let series = df
        .column(column)
        .map_err(|_| TrainerError::MissingColumn(column.to_string()))?;
    Ok(series.cast(&DataType::String)?.str()?.clone())
}

/// Fits one indexer per column on the whole dataset and applies them all.
pub fn index_categorical_columns(
    df: &mut DataFrame,
    columns: &[String],
) -> Result<Vec<StringIndexer>> {
    let indexers = columns
        .iter()
        .map(|column| StringIndexer::fit(df, column))
        .collect::<Result<Vec<_>>>()?;

    for indexer in &indexers {
        indexer.transform(df)?;
    }

    info!(columns = indexers.len(), "indexed categorical columns");
    Ok(indexers)
}

/// Dense feature matrix and label vector ready for fitting.
#[derive(Debug, Clone)]
pub struct AssembledData {
    pub feature_columns: Vec<String>,
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
    pub skipped_rows: usize,
}

impl AssembledData {
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }
}

fn column_as_f64(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(column)
        .map_err(|_| TrainerError::MissingColumn(column.to_string()))?;
    let values = series.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

pub fn assemble(
    df: &DataFrame,
    feature_columns: &[String],
    label_column: &str,
    handle_invalid: HandleInvalid,
) -> Result<AssembledData> {
    let columns = feature_columns
        .iter()
        .map(|name| column_as_f64(df, name))
        .collect::<Result<Vec<_>>>()?;
    let label = column_as_f64(df, label_column)?;

    let mut features = Vec::with_capacity(df.height() * columns.len());
    let mut labels = Vec::with_capacity(df.height());
    let mut skipped_rows = 0;

    'rows: for (row, y) in label.iter().enumerate() {
        let start = features.len();
        for (column, values) in feature_columns.iter().zip(&columns) {
            match values[row] {
                Some(x) => features.push(x),
                None => match handle_invalid {
                    HandleInvalid::Error => {
                        return Err(TrainerError::InvalidValue {
                            column: column.clone(),
                            row,
                        })
                    }
                    HandleInvalid::Skip => {
                        features.truncate(start);
                        skipped_rows += 1;
                        continue 'rows;
                    }
                },
            }
        }

        match (y, handle_invalid) {
            (Some(y), _) => labels.push(*y),
            (None, HandleInvalid::Error) => {
                return Err(TrainerError::InvalidValue {
                    column: label_column.to_string(),
                    row,
                })
            }
            (None, HandleInvalid::Skip) => {
                features.truncate(start);
                skipped_rows += 1;
            }
        }
    }

    if skipped_rows > 0 {
        warn!(skipped_rows, "dropped rows with null or NaN values");
    }

    let features = Array2::from_shape_vec((labels.len(), feature_columns.len()), features)
        .map_err(|e| TrainerError::DimensionMismatch(e.to_string()))?;

    Ok(AssembledData {
        feature_columns: feature_columns.to_vec(),
        features,
        labels: Array1::from_vec(labels),
        skipped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trips() -> DataFrame {
        df!(
            "WEEK_DAY" => [Some("MON"), Some("TUE"), Some("MON"), None, Some("WED"), Some("TUE"), Some("MON")],
            "ROUTE" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0), None, Some(6.0), Some(7.0)],
            "DURATION" => [Some(10i64), Some(20), Some(30), Some(40), Some(50), None, Some(70)]
        )
        .unwrap()
    }

    #[test]
    fn indexer_orders_by_frequency_then_label() {
        let df = df!("c" => ["b", "a", "c", "b", "a", "b", "d"]).unwrap();
        let indexer = StringIndexer::fit(&df, "c").unwrap();
        assert_eq!(indexer.labels, vec!["b", "a", "c", "d"]);
        assert_eq!(indexer.output_column, "c_index");

        let mut other = df!("c" => ["d", "b", "zzz"]).unwrap();
        indexer.transform(&mut other).unwrap();
        let indexed: Vec<Option<f64>> =
            other.column("c_index").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(indexed, vec![Some(3.0), Some(0.0), None]);
    }

    #[test]
    fn indexer_casts_numeric_columns() {
        let df = df!("BUS_CODE" => [300i64, 300, 21]).unwrap();
        let indexer = StringIndexer::fit(&df, "BUS_CODE").unwrap();
        assert_eq!(indexer.labels, vec!["300", "21"]);
    }

    #[test]
    fn transform_adds_index_column_with_nulls() {
        let mut df = trips();
        let indexers = index_categorical_columns(&mut df, &["WEEK_DAY".to_string()]).unwrap();
        assert_eq!(indexers[0].labels, vec!["MON", "TUE", "WED"]);

        let indexed: Vec<Option<f64>> = df
            .column("WEEK_DAY_index")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            indexed,
            vec![Some(0.0), Some(1.0), Some(0.0), None, Some(2.0), Some(1.0), Some(0.0)]
        );
    }

    #[test]
    fn unknown_categorical_column_is_an_error() {
        let mut df = trips();
        let err = index_categorical_columns(&mut df, &["NOPE".to_string()]).unwrap_err();
        assert!(matches!(err, TrainerError::MissingColumn(c) if c == "NOPE"));
    }

    #[test]
    fn assemble_errors_on_first_invalid_value() {
        let mut df = trips();
        index_categorical_columns(&mut df, &["WEEK_DAY".to_string()]).unwrap();
        let columns = vec!["ROUTE".to_string(), "WEEK_DAY_index".to_string()];

        let err = assemble(&df, &columns, "DURATION", HandleInvalid::Error).unwrap_err();
        assert!(matches!(
            err,
            TrainerError::InvalidValue { ref column, row: 3 } if column == "WEEK_DAY_index"
        ));
    }

    #[test]
    fn assemble_skips_invalid_rows() {
        let mut df = trips();
        index_categorical_columns(&mut df, &["WEEK_DAY".to_string()]).unwrap();
        let columns = vec!["ROUTE".to_string(), "WEEK_DAY_index".to_string()];

        let data = assemble(&df, &columns, "DURATION", HandleInvalid::Skip).unwrap();
        assert_eq!(data.skipped_rows, 3);
        assert_eq!(data.n_rows(), 4);
        assert_eq!(data.features.shape(), &[4, 2]);
        assert_eq!(data.labels.to_vec(), vec![10.0, 20.0, 30.0, 70.0]);
        assert_eq!(data.features.row(3).to_vec(), vec![7.0, 0.0]);
    }

    #[test]
    fn assemble_reports_missing_label() {
        let df = trips();
        let err = assemble(&df, &["ROUTE".to_string()], "TIME", HandleInvalid::Skip).unwrap_err();
        assert!(matches!(err, TrainerError::MissingColumn(c) if c == "TIME"));
    }
}

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::metrics::RegressionMetrics;
use crate::model::DurationModel;

/// `-0.0` prints as `0.0`.
fn format_value(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{value:?}")
}

/// Renders one train info block. Coefficients print as a bracketed,
/// comma-separated vector; metrics with six decimals.
pub fn format_train_info(title: &str, model: &DurationModel, metrics: &RegressionMetrics) -> String {
    let coefficients = model
        .coefficients
        .iter()
        .map(|c| format_value(*c))
        .collect::<Vec<_>>()
        .join(",");

    let mut output = format!("{title}\n");
    output += "Model:\n";
    output += &format!("Coefficients: [{coefficients}]\n");
    output += &format!("Intercept: {}\n", format_value(model.intercept));
    output += "Model info\n";
    output += &format!("RMSE: {:.6}\n", metrics.rmse);
    output += &format!("MAE: {:.6}\n", metrics.mae);
    output += &format!("r2: {:.6}\n", metrics.r2);
    output
}

/// Appends the block to `path`, creating the file if needed.
pub fn append_train_info(
    path: &Path,
    title: &str,
    model: &DurationModel,
    metrics: &RegressionMetrics,
) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format_train_info(title, model, metrics).as_bytes())?;

    info!(path = %path.display(), rmse = metrics.rmse, mae = metrics.mae, r2 = metrics.r2, "wrote train info");
    Ok(())
}

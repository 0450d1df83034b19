use std::path::Path;

use chrono::Utc;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{HoldoutMetrics, Record, TrainedModel, TrainingOutcome};
use crate::store;

const N_FEATURES: usize = 4;

/// Singular values below this fraction of the largest are treated as zero.
const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

/// Shuffles with a seeded RNG and returns `(train, holdout)`.
pub fn split_holdout(
    records: &[Record],
    config: SplitConfig,
) -> PipelineResult<(Vec<Record>, Vec<Record>)> {
    if !(config.test_ratio > 0.0 && config.test_ratio < 1.0) {
        return Err(PipelineError::Training(format!(
            "test ratio must be between 0 and 1 (got {})",
            config.test_ratio
        )));
    }

    let n_test = (records.len() as f64 * config.test_ratio).ceil() as usize;
    let n_train = records.len().saturating_sub(n_test);

    let mut indices: Vec<usize> = (0..records.len()).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    indices.shuffle(&mut rng);

    let train = indices[..n_train].iter().map(|&i| records[i]).collect();
    let holdout = indices[n_train..].iter().map(|&i| records[i]).collect();
    Ok((train, holdout))
}

/// Ordinary least squares with intercept.
///
/// Features and target are centered, the centered system is solved through
/// an SVD, and the intercept is recovered from the means. Singular values
/// under the rank tolerance are dropped, so constant or collinear columns
/// get the minimum-norm solution instead of an error.
///
/// Returns `(intercept, coefficients)`.
pub fn fit_least_squares(records: &[Record]) -> PipelineResult<(f64, [f64; N_FEATURES])> {
    if records.is_empty() {
        return Err(PipelineError::Training("no training rows".to_string()));
    }
    if records.len() < N_FEATURES + 1 {
        return Err(PipelineError::Training(format!(
            "need at least {} training rows to fit {N_FEATURES} features, got {}",
            N_FEATURES + 1,
            records.len()
        )));
    }

    let n = records.len();
    let x = DMatrix::from_fn(n, N_FEATURES, |i, j| records[i].features.to_array()[j]);
    let y = DVector::from_iterator(n, records.iter().map(|record| record.final_grade));

    let x_mean = x.row_mean();
    let y_mean = y.mean();
    let centered = DMatrix::from_fn(n, N_FEATURES, |i, j| x[(i, j)] - x_mean[j]);
    let y_centered = y.add_scalar(-y_mean);

    let svd = centered.svd(true, true);
    let tolerance = (svd.singular_values.max() * RANK_TOLERANCE).max(f64::MIN_POSITIVE);
    let beta = svd
        .solve(&y_centered, tolerance)
        .map_err(|err| PipelineError::Training(err.to_string()))?;

    let mut coefficients = [0.0; N_FEATURES];
    for (slot, value) in coefficients.iter_mut().zip(beta.iter()) {
        *slot = *value;
    }
    let intercept = y_mean - (0..N_FEATURES).map(|j| x_mean[j] * coefficients[j]).sum::<f64>();

    if !intercept.is_finite() || !coefficients.iter().all(|value| value.is_finite()) {
        return Err(PipelineError::Training(
            "fit produced non-finite parameters".to_string(),
        ));
    }
    Ok((intercept, coefficients))
}

/// Splits, then fits on the training rows only.
pub fn train(records: &[Record], config: SplitConfig) -> PipelineResult<TrainingOutcome> {
    if records.is_empty() {
        return Err(PipelineError::Training("record set is empty".to_string()));
    }

    let (train_rows, holdout) = split_holdout(records, config)?;
    info!(
        train = train_rows.len(),
        holdout = holdout.len(),
        seed = config.seed,
        "split training data"
    );

    let (intercept, coefficients) = fit_least_squares(&train_rows)?;
    debug!(?coefficients, intercept, "fitted linear model");

    Ok(TrainingOutcome {
        model: TrainedModel {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            coefficients,
            intercept,
            training_rows: train_rows.len(),
        },
        train_rows: train_rows.len(),
        holdout,
    })
}

/// Trains and immediately persists, so a freshly fitted model is never lost.
pub fn train_and_save(
    records: &[Record],
    config: SplitConfig,
    model_path: &Path,
) -> PipelineResult<TrainingOutcome> {
    let outcome = train(records, config)?;
    store::save(&outcome.model, model_path)?;
    Ok(outcome)
}

/// Error metrics of the model on rows it was not fitted on.
pub fn evaluate(model: &TrainedModel, holdout: &[Record]) -> HoldoutMetrics {
    if holdout.is_empty() {
        warn!("holdout set is empty, skipping evaluation");
        return HoldoutMetrics {
            samples: 0,
            mae: 0.0,
            rmse: 0.0,
            r2: 0.0,
        };
    }

    let n = holdout.len() as f64;
    let mean = holdout.iter().map(|r| r.final_grade).sum::<f64>() / n;
    let mut abs_err = 0.0;
    let mut sq_err = 0.0;
    let mut total = 0.0;
    for record in holdout {
        let residual = record.final_grade - model.predict_raw(&record.features);
        abs_err += residual.abs();
        sq_err += residual * residual;
        total += (record.final_grade - mean).powi(2);
    }

    HoldoutMetrics {
        samples: holdout.len(),
        mae: abs_err / n,
        rmse: (sq_err / n).sqrt(),
        r2: if total > 0.0 { 1.0 - sq_err / total } else { 0.0 },
    }
}

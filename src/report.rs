use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::{
    ColumnSummary, HoldoutMetrics, Record, TrainingOutcome, FEATURE_COLUMNS, TARGET_COLUMN,
};
use crate::service::{clamp_and_round, clamp_grade};
use crate::tier::{classify, PerformanceTier};

fn column_values(records: &[Record], column: usize) -> impl Iterator<Item = f64> + '_ {
    records.iter().map(move |record| match column {
        0..=3 => record.features.to_array()[column],
        _ => record.final_grade,
    })
}

/// Linearly interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

/// Count, mean, sample standard deviation, min, quartiles and max of every column.
pub fn summarize_columns(records: &[Record]) -> Vec<ColumnSummary> {
    let names = FEATURE_COLUMNS.iter().copied().chain([TARGET_COLUMN]);

    names
        .enumerate()
        .map(|(index, column)| {
            let count = records.len();
            if count == 0 {
                return ColumnSummary {
                    column,
                    count,
                    mean: 0.0,
                    std_dev: 0.0,
                    min: 0.0,
                    q25: 0.0,
                    median: 0.0,
                    q75: 0.0,
                    max: 0.0,
                };
            }

            let mean = column_values(records, index).sum::<f64>() / count as f64;
            let variance = if count > 1 {
                column_values(records, index)
                    .map(|value| (value - mean).powi(2))
                    .sum::<f64>()
                    / (count - 1) as f64
            } else {
                0.0
            };
            let mut sorted: Vec<f64> = column_values(records, index).collect();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            ColumnSummary {
                column,
                count,
                mean,
                std_dev: variance.sqrt(),
                min: sorted[0],
                q25: quantile(&sorted, 0.25),
                median: quantile(&sorted, 0.5),
                q75: quantile(&sorted, 0.75),
                max: sorted[count - 1],
            }
        })
        .collect()
}

/// How many holdout predictions land in each tier, empty tiers included.
pub fn tier_mix(outcome: &TrainingOutcome) -> BTreeMap<PerformanceTier, usize> {
    let mut mix: BTreeMap<PerformanceTier, usize> =
        PerformanceTier::ALL.iter().map(|tier| (*tier, 0)).collect();
    for record in &outcome.holdout {
        let grade = clamp_grade(outcome.model.predict_raw(&record.features));
        *mix.entry(classify(grade)).or_insert(0) += 1;
    }
    mix
}

pub fn build_report(
    source: &str,
    records: &[Record],
    outcome: &TrainingOutcome,
    metrics: &HoldoutMetrics,
) -> String {
    let summaries = summarize_columns(records);
    let mut output = String::new();

    let _ = writeln!(output, "# Grade Prediction Training Report");
    let _ = writeln!(
        output,
        "Generated from {} ({} rows, {} columns)",
        source,
        records.len(),
        FEATURE_COLUMNS.len() + 1
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Column Summary");

    if records.is_empty() {
        let _ = writeln!(output, "No records loaded.");
    } else {
        let _ = writeln!(
            output,
            "| column | count | mean | std | min | 25% | 50% | 75% | max |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |",
                summary.column,
                summary.count,
                summary.mean,
                summary.std_dev,
                summary.min,
                summary.q25,
                summary.median,
                summary.q75,
                summary.max
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## First Rows");
    for record in records.iter().take(5) {
        let f = record.features;
        let _ = writeln!(
            output,
            "- hours {} / attendance {} / completed {} / partial {} -> final {}",
            f.hours, f.attendance, f.completed, f.partial, record.final_grade
        );
    }

    let model = &outcome.model;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Model");
    let _ = writeln!(
        output,
        "Fitted on {} rows, {} held out (model {})",
        outcome.train_rows,
        outcome.holdout.len(),
        model.model_id
    );
    let _ = writeln!(output, "- intercept: {:.4}", model.intercept);
    for (column, coefficient) in FEATURE_COLUMNS.iter().zip(model.coefficients) {
        let _ = writeln!(output, "- {column}: {coefficient:.4}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Holdout Evaluation");
    if metrics.samples == 0 {
        let _ = writeln!(output, "No holdout rows to evaluate.");
        return output;
    }

    let _ = writeln!(
        output,
        "MAE {:.3}, RMSE {:.3}, R² {:.3} over {} rows",
        metrics.mae, metrics.rmse, metrics.r2, metrics.samples
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "### Actual vs Predicted");
    for record in outcome.holdout.iter().take(10) {
        let _ = writeln!(
            output,
            "- actual {:.1}, predicted {:.1}",
            record.final_grade,
            clamp_and_round(model.predict_raw(&record.features))
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Predicted Tier Mix");
    for (tier, count) in tier_mix(outcome) {
        let _ = writeln!(output, "- {}: {}", tier.label(), count);
    }

    output
}

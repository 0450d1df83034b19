use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{FeatureVector, Record, FEATURE_COLUMNS, TARGET_COLUMN};

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    horas_estudio: f64,
    asistencia: f64,
    trabajos_completados: f64,
    nota_parcial: f64,
    nota_final: f64,
}

impl From<CsvRow> for Record {
    fn from(row: CsvRow) -> Self {
        Record {
            features: FeatureVector::new(
                row.horas_estudio,
                row.asistencia,
                row.trabajos_completados,
                row.nota_parcial,
            ),
            final_grade: row.nota_final,
        }
    }
}

impl From<&Record> for CsvRow {
    fn from(record: &Record) -> Self {
        CsvRow {
            horas_estudio: record.features.hours,
            asistencia: record.features.attendance,
            trabajos_completados: record.features.completed,
            nota_parcial: record.features.partial,
            nota_final: record.final_grade,
        }
    }
}

/// Reads historical records from a CSV file with a header row.
///
/// Columns are matched by name, so extra columns and any column order are
/// accepted. Values are not range-checked.
pub fn load_records(csv_path: &Path) -> PipelineResult<Vec<Record>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .map_err(|err| PipelineError::DataSource(format!("{}: {err}", csv_path.display())))?;

    let headers = reader
        .headers()
        .map_err(|err| PipelineError::DataSource(format!("{}: {err}", csv_path.display())))?;
    let missing: Vec<&str> = FEATURE_COLUMNS
        .iter()
        .chain([&TARGET_COLUMN])
        .copied()
        .filter(|column| !headers.iter().any(|header| header == *column))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::DataSource(format!(
            "{}: missing column(s) {}",
            csv_path.display(),
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        let row = result
            .map_err(|err| PipelineError::DataSource(format!("{}: {err}", csv_path.display())))?;
        records.push(Record::from(row));
    }

    info!(path = %csv_path.display(), rows = records.len(), "loaded training data");
    Ok(records)
}

/// Writes records in the training CSV layout.
pub fn write_csv(records: &[Record], csv_path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(csv_path)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    debug!(path = %csv_path.display(), rows = records.len(), "wrote csv");
    Ok(())
}

/// Generates records whose final grade follows
/// `0.2*hours + 0.1*attendance + 0.5*completed + 0.3*partial` with noise in
/// `[-noise, noise]`. The same seed always yields the same rows.
pub fn synthetic_records(rows: usize, noise: f64, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows)
        .map(|_| {
            let features = FeatureVector::new(
                rng.gen_range(0.0..=40.0_f64).round(),
                rng.gen_range(30.0..=100.0_f64).round(),
                rng.gen_range(0..=10) as f64,
                (rng.gen_range(0.0..=20.0_f64) * 10.0).round() / 10.0,
            );
            let jitter = if noise > 0.0 {
                rng.gen_range(-noise..=noise)
            } else {
                0.0
            };
            let grade = 0.2 * features.hours
                + 0.1 * features.attendance
                + 0.5 * features.completed
                + 0.3 * features.partial
                + jitter;
            Record {
                features,
                final_grade: (grade * 100.0).round() / 100.0,
            }
        })
        .collect()
}

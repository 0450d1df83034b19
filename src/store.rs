use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{TrainedModel, FEATURE_COLUMNS};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    format_version: u32,
    model_id: Uuid,
    trained_at: DateTime<Utc>,
    feature_order: Vec<String>,
    coefficients: [f64; 4],
    intercept: f64,
    training_rows: usize,
}

/// Writes the model next to `path` and renames it into place, so readers
/// never see a partially written artifact.
pub fn save(model: &TrainedModel, path: &Path) -> PipelineResult<()> {
    let artifact = ModelArtifact {
        format_version: FORMAT_VERSION,
        model_id: model.model_id,
        trained_at: model.trained_at,
        feature_order: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        coefficients: model.coefficients,
        intercept: model.intercept,
        training_rows: model.training_rows,
    };
    let bytes = serde_json::to_vec_pretty(&artifact)
        .map_err(|err| PipelineError::Persist(err.to_string()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let persist_err =
        |err: std::io::Error| PipelineError::Persist(format!("{}: {err}", path.display()));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(persist_err)?;
    tmp.write_all(&bytes).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|err| persist_err(err.error))?;

    info!(path = %path.display(), model_id = %model.model_id, "saved model artifact");
    Ok(())
}

pub fn load(path: &Path) -> PipelineResult<TrainedModel> {
    let bytes = fs::read(path)
        .map_err(|err| PipelineError::CorruptArtifact(format!("{}: {err}", path.display())))?;
    let artifact: ModelArtifact = serde_json::from_slice(&bytes)
        .map_err(|err| PipelineError::CorruptArtifact(format!("{}: {err}", path.display())))?;

    if artifact.format_version != FORMAT_VERSION {
        return Err(PipelineError::CorruptArtifact(format!(
            "unsupported format version {}",
            artifact.format_version
        )));
    }
    if artifact.feature_order.iter().map(String::as_str).ne(FEATURE_COLUMNS) {
        return Err(PipelineError::CorruptArtifact(format!(
            "feature order {:?} does not match {:?}",
            artifact.feature_order, FEATURE_COLUMNS
        )));
    }
    if !artifact.intercept.is_finite() || !artifact.coefficients.iter().all(|c| c.is_finite()) {
        return Err(PipelineError::CorruptArtifact(
            "non-finite model parameters".to_string(),
        ));
    }

    info!(path = %path.display(), model_id = %artifact.model_id, "loaded model artifact");
    Ok(TrainedModel {
        model_id: artifact.model_id,
        trained_at: artifact.trained_at,
        coefficients: artifact.coefficients,
        intercept: artifact.intercept,
        training_rows: artifact.training_rows,
    })
}

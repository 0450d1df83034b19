use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column names of the four predictors, in the order the model consumes them.
pub const FEATURE_COLUMNS: [&str; 4] = [
    "horas_estudio",
    "asistencia",
    "trabajos_completados",
    "nota_parcial",
];

pub const TARGET_COLUMN: &str = "nota_final";

pub const MAX_GRADE: f64 = 20.0;

/// The four observed predictors for one student.
///
/// Field order is the model's input order; `to_array` is the only place a
/// vector is flattened, so training and inference cannot disagree on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub hours: f64,
    pub attendance: f64,
    pub completed: f64,
    pub partial: f64,
}

impl FeatureVector {
    pub fn new(hours: f64, attendance: f64, completed: f64, partial: f64) -> Self {
        Self {
            hours,
            attendance,
            completed,
            partial,
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.hours, self.attendance, self.completed, self.partial]
    }
}

/// One historical observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub features: FeatureVector,
    pub final_grade: f64,
}

/// A fitted linear model: `grade = intercept + Σ coefficients[i] * x[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub coefficients: [f64; 4],
    pub intercept: f64,
    pub training_rows: usize,
}

impl TrainedModel {
    /// Raw model output, before clamping.
    pub fn predict_raw(&self, features: &FeatureVector) -> f64 {
        self.coefficients
            .iter()
            .zip(features.to_array())
            .fold(self.intercept, |acc, (coef, value)| acc + coef * value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldoutMetrics {
    pub samples: usize,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: &'static str,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Outcome of the train step: the model plus the rows it never saw.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub train_rows: usize,
    pub holdout: Vec<Record>,
}

use thiserror::Error;

/// Rejection of one raw inference input. The first failing field wins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("study hours must be between 0 and 40 (got {0})")]
    Hours(f64),
    #[error("attendance must be between 0% and 100% (got {0})")]
    Attendance(f64),
    #[error("completed assignments must be between 0 and 10 (got {0})")]
    Completed(f64),
    #[error("partial exam score must be between 0 and 20 (got {0})")]
    Partial(f64),
    #[error("{field} must be a number")]
    NotANumber { field: &'static str },
}

impl ValidationError {
    /// Column name of the field that was rejected.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Hours(_) => "horas_estudio",
            ValidationError::Attendance(_) => "asistencia",
            ValidationError::Completed(_) => "trabajos_completados",
            ValidationError::Partial(_) => "nota_parcial",
            ValidationError::NotANumber { field } => *field,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("training data unavailable: {0}")]
    DataSource(String),
    #[error("training failed: {0}")]
    Training(String),
    #[error("model artifact is unreadable: {0}")]
    CorruptArtifact(String),
    #[error("could not write model artifact: {0}")]
    Persist(String),
    #[error("no model is available, try again later ({0})")]
    ModelUnavailable(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("prediction failed: {0}")]
    Inference(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

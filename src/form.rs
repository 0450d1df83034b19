use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, ValidationError};
use crate::models::FeatureVector;
use crate::service::PredictionService;
use crate::validate::RawInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    // Only the page layer sends it.
    #[allow(dead_code)]
    Get,
    Post,
}

/// Form payload as submitted, before any parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionForm {
    #[serde(default)]
    pub horas_estudio: String,
    #[serde(default)]
    pub asistencia: String,
    #[serde(default)]
    pub trabajos_completados: String,
    #[serde(default)]
    pub nota_parcial: String,
}

/// What the page shows after a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionView {
    pub grade: f64,
    pub label: &'static str,
    pub css_class: &'static str,
    pub message: &'static str,
    pub recommendation: &'static str,
    pub submitted: FeatureVector,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormResponse {
    RedirectToForm,
    Rendered(PredictionView),
    Error(String),
}

fn parse_field(value: &str, field: &'static str) -> Result<f64, ValidationError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::NotANumber { field })
}

impl PredictionForm {
    pub fn parse(&self) -> Result<RawInput, ValidationError> {
        Ok(RawInput {
            hours: parse_field(&self.horas_estudio, "horas_estudio")?,
            attendance: parse_field(&self.asistencia, "asistencia")?,
            completed: parse_field(&self.trabajos_completados, "trabajos_completados")?,
            partial: parse_field(&self.nota_parcial, "nota_parcial")?,
        })
    }
}

/// Turns one form submission into something the page layer can render.
/// Every failure becomes a user-visible message.
pub fn handle_submission(
    service: &PredictionService,
    method: Method,
    form: &PredictionForm,
) -> FormResponse {
    if method != Method::Post {
        return FormResponse::RedirectToForm;
    }

    let assessment = form
        .parse()
        .map_err(PipelineError::from)
        .and_then(|raw| service.assess(raw));

    match assessment {
        Ok(assessment) => {
            debug!(grade = assessment.grade, tier = ?assessment.tier, "prediction served");
            FormResponse::Rendered(PredictionView {
                grade: assessment.grade,
                label: assessment.tier.label(),
                css_class: assessment.tier.css_class(),
                message: assessment.tier.message(),
                recommendation: assessment.tier.recommendation(),
                submitted: assessment.features,
            })
        }
        Err(PipelineError::Validation(err)) => {
            debug!(field = err.field(), "rejected input");
            FormResponse::Error(err.to_string())
        }
        Err(PipelineError::ModelUnavailable(_)) => FormResponse::Error(
            "The model could not be loaded, please try again later.".to_string(),
        ),
        Err(err) => {
            warn!(error = %err, "prediction request failed");
            FormResponse::Error(format!("Prediction error: {err}"))
        }
    }
}

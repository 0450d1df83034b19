use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::Settings;
use crate::data;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{FeatureVector, TrainedModel, TrainingOutcome, MAX_GRADE};
use crate::store;
use crate::tier::{classify, PerformanceTier};
use crate::trainer;
use crate::validate::{validate, RawInput};

static GLOBAL: OnceCell<PredictionService> = OnceCell::new();

/// How `ensure_ready` obtained the active model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySource {
    AlreadyActive,
    Loaded,
    Trained,
}

/// A validated request, its grade and the tier that grade falls in.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub features: FeatureVector,
    pub grade: f64,
    pub tier: PerformanceTier,
}

/// Owns the active model. Initialization and replacement run under one
/// lock, so concurrent first callers wait for a single load or train.
#[derive(Debug)]
pub struct PredictionService {
    settings: Settings,
    active: Mutex<Option<Arc<TrainedModel>>>,
}

impl PredictionService {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            active: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_model(settings: Settings, model: TrainedModel) -> Self {
        Self {
            settings,
            active: Mutex::new(Some(Arc::new(model))),
        }
    }

    /// Process-wide instance. `settings` only applies on the first call.
    pub fn global(settings: Settings) -> &'static PredictionService {
        GLOBAL.get_or_init(|| PredictionService::new(settings))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn active_model(&self) -> Option<Arc<TrainedModel>> {
        self.active.lock().clone()
    }

    /// Loads the persisted model, or trains one when the artifact is missing
    /// or unreadable. On failure the slot stays empty and a later call retries.
    pub fn ensure_ready(&self) -> PipelineResult<ReadySource> {
        let mut slot = self.active.lock();
        if slot.is_some() {
            return Ok(ReadySource::AlreadyActive);
        }

        let (model, source) = self.load_or_train().map_err(|err| {
            warn!(error = %err, "model unavailable");
            PipelineError::ModelUnavailable(err.to_string())
        })?;
        *slot = Some(Arc::new(model));
        Ok(source)
    }

    fn load_or_train(&self) -> PipelineResult<(TrainedModel, ReadySource)> {
        match store::load(&self.settings.model_path) {
            Ok(model) => return Ok((model, ReadySource::Loaded)),
            Err(err) => warn!(error = %err, "no usable model artifact, training a new one"),
        }

        let records = data::load_records(&self.settings.data_path)?;
        let outcome = trainer::train(&records, self.settings.split)?;
        if let Err(err) = store::save(&outcome.model, &self.settings.model_path) {
            warn!(error = %err, "keeping freshly trained model in memory only");
        }
        Ok((outcome.model, ReadySource::Trained))
    }

    /// Trains from the configured data, persists, then swaps the model in.
    /// The previous model stays active if any step fails.
    pub fn retrain(&self) -> PipelineResult<TrainingOutcome> {
        let mut slot = self.active.lock();
        let records = data::load_records(&self.settings.data_path)?;
        let outcome =
            trainer::train_and_save(&records, self.settings.split, &self.settings.model_path)?;
        *slot = Some(Arc::new(outcome.model.clone()));
        info!(model_id = %outcome.model.model_id, "retrained model is active");
        Ok(outcome)
    }

    /// Re-reads the artifact and swaps it in.
    pub fn reload(&self) -> PipelineResult<Arc<TrainedModel>> {
        let mut slot = self.active.lock();
        let model = Arc::new(store::load(&self.settings.model_path)?);
        *slot = Some(Arc::clone(&model));
        info!(model_id = %model.model_id, "reloaded model is active");
        Ok(model)
    }

    /// Predicted grade, clamped to `[0, 20]` and rounded to one decimal.
    pub fn predict(&self, features: &FeatureVector) -> PipelineResult<f64> {
        self.predict_clamped(features).map(round_grade)
    }

    /// Predicted grade clamped to `[0, 20]`, not yet rounded.
    fn predict_clamped(&self, features: &FeatureVector) -> PipelineResult<f64> {
        self.ensure_ready()?;
        let model = self
            .active_model()
            .ok_or_else(|| PipelineError::ModelUnavailable("no active model".to_string()))?;

        let raw = model.predict_raw(features);
        if !raw.is_finite() {
            return Err(PipelineError::Inference(format!(
                "model produced {raw} for {features:?}"
            )));
        }
        Ok(clamp_grade(raw))
    }

    /// Validates first; invalid input never reaches the model. The tier is
    /// taken from the clamped grade before rounding; rounding is display only.
    pub fn assess(&self, raw: RawInput) -> PipelineResult<Assessment> {
        let features = validate(raw)?;
        let clamped = self.predict_clamped(&features)?;
        Ok(Assessment {
            features,
            grade: round_grade(clamped),
            tier: classify(clamped),
        })
    }
}

pub fn clamp_grade(raw: f64) -> f64 {
    raw.clamp(0.0, MAX_GRADE)
}

/// One decimal place.
pub fn round_grade(grade: f64) -> f64 {
    (grade * 10.0).round() / 10.0
}

/// Clamp before rounding so rounding cannot leave the range.
pub fn clamp_and_round(raw: f64) -> f64 {
    round_grade(clamp_grade(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{synthetic_records, write_csv};
    use crate::error::ValidationError;
    use chrono::Utc;
    use std::path::Path;
    use uuid::Uuid;

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            model_path: dir.join("model.json"),
            data_path: dir.join("estudiantes.csv"),
            ..Settings::default()
        }
    }

    fn trained_settings(dir: &Path) -> Settings {
        let settings = settings_in(dir);
        write_csv(&synthetic_records(200, 0.5, 42), &settings.data_path).unwrap();
        settings
    }

    fn fixed_model(intercept: f64) -> TrainedModel {
        TrainedModel {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            coefficients: [0.0; 4],
            intercept,
            training_rows: 10,
        }
    }

    fn raw(hours: f64, attendance: f64, completed: f64, partial: f64) -> RawInput {
        RawInput {
            hours,
            attendance,
            completed,
            partial,
        }
    }

    #[test]
    fn clamps_then_rounds() {
        assert_eq!(clamp_and_round(-3.2), 0.0);
        assert_eq!(clamp_and_round(26.4), 20.0);
        assert_eq!(clamp_and_round(19.96), 20.0);
        assert_eq!(clamp_and_round(12.34), 12.3);
        assert_eq!(clamp_and_round(12.36), 12.4);
    }

    #[test]
    fn prediction_is_always_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let features = FeatureVector::new(10.0, 80.0, 5.0, 12.0);
        for intercept in [-1e6, -0.04, 7.77, 20.04, 1e6] {
            let service =
                PredictionService::with_model(settings_in(dir.path()), fixed_model(intercept));
            let grade = service.predict(&features).unwrap();
            assert!((0.0..=20.0).contains(&grade), "{grade}");
        }
    }

    #[test]
    fn tier_uses_the_clamped_grade_before_rounding() {
        let dir = tempfile::tempdir().unwrap();
        let any = raw(10.0, 80.0, 5.0, 12.0);

        let service = PredictionService::with_model(settings_in(dir.path()), fixed_model(10.46));
        let assessment = service.assess(any).unwrap();
        assert_eq!(assessment.grade, 10.5);
        assert_eq!(assessment.tier, PerformanceTier::Insufficient);

        let service = PredictionService::with_model(settings_in(dir.path()), fixed_model(16.96));
        let assessment = service.assess(any).unwrap();
        assert_eq!(assessment.grade, 17.0);
        assert_eq!(assessment.tier, PerformanceTier::Good);

        let service = PredictionService::with_model(settings_in(dir.path()), fixed_model(24.0));
        let assessment = service.assess(any).unwrap();
        assert_eq!(assessment.grade, 20.0);
        assert_eq!(assessment.tier, PerformanceTier::Excellent);
    }

    #[test]
    fn constant_feature_column_still_trains() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let records: Vec<_> = synthetic_records(200, 0.5, 42)
            .into_iter()
            .map(|mut record| {
                record.features.completed = 10.0;
                record
            })
            .collect();
        write_csv(&records, &settings.data_path).unwrap();

        let service = PredictionService::new(settings);
        assert_eq!(service.ensure_ready().unwrap(), ReadySource::Trained);
        let assessment = service.assess(raw(35.0, 95.0, 10.0, 18.0)).unwrap();
        assert_eq!(assessment.tier, PerformanceTier::Excellent);
    }

    #[test]
    fn trains_when_artifact_is_missing_then_persists() {
        let dir = tempfile::tempdir().unwrap();
        let settings = trained_settings(dir.path());
        let service = PredictionService::new(settings.clone());

        assert_eq!(service.ensure_ready().unwrap(), ReadySource::Trained);
        assert!(settings.model_path.exists());

        let fresh = PredictionService::new(settings);
        assert_eq!(fresh.ensure_ready().unwrap(), ReadySource::Loaded);
        assert_eq!(
            fresh.active_model().unwrap().coefficients,
            service.active_model().unwrap().coefficients
        );
    }

    #[test]
    fn ensure_ready_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::new(trained_settings(dir.path()));
        service.ensure_ready().unwrap();
        let first = service.active_model().unwrap();

        assert_eq!(service.ensure_ready().unwrap(), ReadySource::AlreadyActive);
        let second = service.active_model().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn corrupt_artifact_falls_back_to_training() {
        let dir = tempfile::tempdir().unwrap();
        let settings = trained_settings(dir.path());
        std::fs::write(&settings.model_path, b"not a model").unwrap();

        let service = PredictionService::new(settings.clone());
        assert_eq!(service.ensure_ready().unwrap(), ReadySource::Trained);
        assert!(store::load(&settings.model_path).is_ok());
    }

    #[test]
    fn concurrent_first_callers_share_one_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::new(trained_settings(dir.path()));

        let sources: Vec<ReadySource> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| service.ensure_ready().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let initialized = sources
            .iter()
            .filter(|source| **source != ReadySource::AlreadyActive)
            .count();
        assert_eq!(initialized, 1);
    }

    #[test]
    fn strong_student_is_excellent() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::new(trained_settings(dir.path()));
        let assessment = service.assess(raw(35.0, 95.0, 9.0, 18.0)).unwrap();
        assert!(assessment.grade >= 17.0);
        assert_eq!(assessment.tier, PerformanceTier::Excellent);
    }

    #[test]
    fn weak_student_is_insufficient() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::new(trained_settings(dir.path()));
        let assessment = service.assess(raw(2.0, 40.0, 1.0, 5.0)).unwrap();
        assert!(assessment.grade < 10.5);
        assert_eq!(assessment.tier, PerformanceTier::Insufficient);
    }

    #[test]
    fn invalid_attendance_is_rejected_before_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::new(trained_settings(dir.path()));
        let err = service.assess(raw(10.0, 150.0, 5.0, 10.0)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::Attendance(_))
        ));
        assert!(!service.is_ready());
    }

    #[test]
    fn no_artifact_and_no_data_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::new(settings_in(dir.path()));

        assert!(matches!(
            service.ensure_ready(),
            Err(PipelineError::ModelUnavailable(_))
        ));
        assert!(!service.is_ready());

        let features = FeatureVector::new(10.0, 80.0, 5.0, 12.0);
        assert!(matches!(
            service.predict(&features),
            Err(PipelineError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn recovers_once_training_data_appears() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let service = PredictionService::new(settings.clone());
        assert!(service.ensure_ready().is_err());

        write_csv(&synthetic_records(50, 0.5, 5), &settings.data_path).unwrap();
        assert_eq!(service.ensure_ready().unwrap(), ReadySource::Trained);
    }

    #[test]
    fn retrain_replaces_the_active_model() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::new(trained_settings(dir.path()));
        service.ensure_ready().unwrap();
        let before = service.active_model().unwrap();

        let after = service.retrain().unwrap();
        assert_ne!(before.model_id, after.model.model_id);
        assert_eq!(
            store::load(&service.settings().model_path).unwrap().model_id,
            after.model.model_id
        );
        assert_eq!(service.active_model().unwrap().model_id, after.model.model_id);
        assert_eq!(after.holdout.len(), 40);
    }

    #[test]
    fn failed_retrain_keeps_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::with_model(settings_in(dir.path()), fixed_model(12.0));
        assert!(matches!(service.retrain(), Err(PipelineError::DataSource(_))));
        assert_eq!(service.active_model().unwrap().intercept, 12.0);
    }

    #[test]
    fn reload_picks_up_the_saved_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let saved = fixed_model(9.0);
        store::save(&saved, &settings.model_path).unwrap();

        let service = PredictionService::with_model(settings, fixed_model(1.0));
        assert_eq!(service.reload().unwrap().model_id, saved.model_id);
        assert_eq!(service.predict(&FeatureVector::new(1.0, 1.0, 1.0, 1.0)).unwrap(), 9.0);
    }
}

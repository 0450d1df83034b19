use crate::error::ValidationError;
use crate::models::FeatureVector;

/// Raw, unchecked inference input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawInput {
    pub hours: f64,
    pub attendance: f64,
    pub completed: f64,
    pub partial: f64,
}

fn within(value: f64, max: f64) -> bool {
    (0.0..=max).contains(&value)
}

/// Checks hours, attendance, completed and partial in that order and stops
/// at the first value outside its inclusive range. NaN never passes.
pub fn validate(raw: RawInput) -> Result<FeatureVector, ValidationError> {
    if !within(raw.hours, 40.0) {
        return Err(ValidationError::Hours(raw.hours));
    }
    if !within(raw.attendance, 100.0) {
        return Err(ValidationError::Attendance(raw.attendance));
    }
    if !within(raw.completed, 10.0) {
        return Err(ValidationError::Completed(raw.completed));
    }
    if !within(raw.partial, 20.0) {
        return Err(ValidationError::Partial(raw.partial));
    }
    Ok(FeatureVector::new(
        raw.hours,
        raw.attendance,
        raw.completed,
        raw.partial,
    ))
}

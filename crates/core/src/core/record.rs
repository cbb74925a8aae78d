use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::prng::Prng;
use crate::stage::Stage;

/// Length of generated record ids.
pub const RECORD_ID_LEN: usize = 9;

/// One persisted inference result. Immutable once constructed.
///
/// Serialized in the same shape the browser dashboard stores under
/// `alzcare_predictions`; the image reference is transient and never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordWire")]
pub struct PredictionRecord {
    id: String,
    timestamp: DateTime<Utc>,
    stage: Stage,
    confidence: f64,
    #[serde(skip)]
    image_ref: Option<String>,
}

#[derive(Deserialize)]
struct RecordWire {
    id: String,
    timestamp: DateTime<Utc>,
    stage: Stage,
    confidence: f64,
}

impl TryFrom<RecordWire> for PredictionRecord {
    type Error = ValidationError;

    fn try_from(w: RecordWire) -> Result<Self, Self::Error> {
        PredictionRecord::new(w.id, w.timestamp, w.stage, w.confidence)
    }
}

/// Checks the `[0, 1]` confidence invariant.
pub fn validate_confidence(confidence: f64) -> Result<f64, ValidationError> {
    if !confidence.is_finite() {
        return Err(ValidationError::NonFiniteConfidence);
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ValidationError::ConfidenceOutOfRange(confidence));
    }
    Ok(confidence)
}

impl PredictionRecord {
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        stage: Stage,
        confidence: f64,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        let confidence = validate_confidence(confidence)?;
        Ok(Self {
            id,
            timestamp,
            stage,
            confidence,
            image_ref: None,
        })
    }

    /// Attaches a session-local handle to the source image.
    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn confidence_percent(&self) -> f64 {
        self.confidence * 100.0
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn reliability(&self, threshold: f64) -> Reliability {
        Reliability::classify(self.confidence, threshold)
    }
}

/// Display flag derived from confidence. Not a clinical measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reliability {
    High,
    Low,
}

impl Reliability {
    pub fn classify(confidence: f64, threshold: f64) -> Self {
        if confidence >= threshold {
            Reliability::High
        } else {
            Reliability::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Reliability::High => "High reliability",
            Reliability::Low => "Low reliability",
        }
    }
}

pub fn new_record_id(prng: &mut Prng) -> String {
    prng.base36(RECORD_ID_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn rejects_confidence_outside_unit_interval() {
        assert_eq!(
            PredictionRecord::new("a", ts(), Stage::Mild, 1.2),
            Err(ValidationError::ConfidenceOutOfRange(1.2))
        );
        assert_eq!(
            PredictionRecord::new("a", ts(), Stage::Mild, -0.01),
            Err(ValidationError::ConfidenceOutOfRange(-0.01))
        );
        assert_eq!(
            PredictionRecord::new("a", ts(), Stage::Mild, f64::NAN),
            Err(ValidationError::NonFiniteConfidence)
        );
        assert!(PredictionRecord::new("a", ts(), Stage::Mild, 0.0).is_ok());
        assert!(PredictionRecord::new("a", ts(), Stage::Mild, 1.0).is_ok());
    }

    #[test]
    fn rejects_blank_id() {
        assert_eq!(
            PredictionRecord::new("  ", ts(), Stage::Mild, 0.9),
            Err(ValidationError::EmptyId)
        );
    }

    #[test]
    fn image_ref_is_not_persisted() {
        let r = PredictionRecord::new("k3x9a0b1c", ts(), Stage::VeryMild, 0.91)
            .unwrap()
            .with_image_ref("blob:local/1");
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("blob:local"));

        let back: PredictionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.image_ref(), None);
        assert_eq!(back.stage(), Stage::VeryMild);
        assert_eq!(back.timestamp(), ts());
    }

    #[test]
    fn loads_browser_shaped_json_and_validates_it() {
        let json = r#"{"id":"abc123xyz","timestamp":"2025-03-14T09:30:00.000Z","stage":"Moderate Demented","confidence":0.93}"#;
        let r: PredictionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.stage(), Stage::Moderate);

        let bad = r#"{"id":"x","timestamp":"2025-03-14T09:30:00Z","stage":"Mild Demented","confidence":3.0}"#;
        assert!(serde_json::from_str::<PredictionRecord>(bad).is_err());
    }

    #[test]
    fn reliability_uses_inclusive_threshold() {
        assert_eq!(Reliability::classify(0.90, 0.90), Reliability::High);
        assert_eq!(Reliability::classify(0.899, 0.90), Reliability::Low);
    }
}

//! Dashboard configuration.
//!
//! Every threshold here is a presentation or operability knob, not a clinical
//! constant. Missing fields fall back to the defaults below.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audit::DEFAULT_MAX_AUDIT_ENTRIES;
use crate::error::ConfigError;
use crate::stage::Stage;

pub const ENV_INFERENCE_ENDPOINT: &str = "ALZCARE_INFERENCE_ENDPOINT";
pub const ENV_INFERENCE_TIMEOUT_MS: &str = "ALZCARE_INFERENCE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// `None` runs the dashboard in synthetic-only mode.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,
    /// Used when the endpoint omits a confidence value.
    #[serde(default = "default_missing_confidence")]
    pub default_confidence: f64,
    #[serde(default)]
    pub synthetic_band: ConfidenceBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub low: f64,
    pub high: f64,
}

impl Default for ConfidenceBand {
    fn default() -> Self {
        Self {
            low: 0.85,
            high: 0.97,
        }
    }
}

impl ConfidenceBand {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.low && v <= self.high
    }
}

/// Display heuristic: `base[stage] + (confidence - pivot) * weight`, clamped to 0..=100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_base_scores")]
    pub base_scores: StageScores,
    #[serde(default = "default_confidence_pivot")]
    pub confidence_pivot: f64,
    #[serde(default = "default_confidence_weight")]
    pub confidence_weight: f64,
    #[serde(default = "default_reliability_threshold")]
    pub reliability_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageScores {
    pub non_demented: f64,
    pub very_mild: f64,
    pub mild: f64,
    pub moderate: f64,
}

impl StageScores {
    pub fn for_stage(&self, stage: Stage) -> f64 {
        match stage {
            Stage::NonDemented => self.non_demented,
            Stage::VeryMild => self.very_mild,
            Stage::Mild => self.mild,
            Stage::Moderate => self.moderate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_max_audit_entries")]
    pub max_entries: usize,
}

fn default_timeout_ms() -> u32 {
    5_000
}

fn default_missing_confidence() -> f64 {
    0.5
}

fn default_base_scores() -> StageScores {
    StageScores {
        non_demented: 95.0,
        very_mild: 75.0,
        mild: 50.0,
        moderate: 25.0,
    }
}

fn default_confidence_pivot() -> f64 {
    0.9
}

fn default_confidence_weight() -> f64 {
    10.0
}

fn default_reliability_threshold() -> f64 {
    0.90
}

fn default_max_audit_entries() -> usize {
    DEFAULT_MAX_AUDIT_ENTRIES
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_timeout_ms(),
            default_confidence: default_missing_confidence(),
            synthetic_band: ConfidenceBand::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_scores: default_base_scores(),
            confidence_pivot: default_confidence_pivot(),
            confidence_weight: default_confidence_weight(),
            reliability_threshold: default_reliability_threshold(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_audit_entries(),
        }
    }
}

impl AppConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let cfg: AppConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let inf = &self.inference;
        let band = inf.synthetic_band;
        if !(0.0..=1.0).contains(&band.low) || !(0.0..=1.0).contains(&band.high) {
            return Err(ConfigError::Invalid(format!(
                "synthetic_band [{}, {}] must lie within [0, 1]",
                band.low, band.high
            )));
        }
        if band.low > band.high {
            return Err(ConfigError::Invalid(format!(
                "synthetic_band low {} exceeds high {}",
                band.low, band.high
            )));
        }
        if !(0.0..=1.0).contains(&inf.default_confidence) {
            return Err(ConfigError::Invalid(format!(
                "default_confidence {} must lie within [0, 1]",
                inf.default_confidence
            )));
        }
        if inf.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be > 0".to_string()));
        }
        let sc = &self.scoring;
        for (name, v) in [
            ("reliability_threshold", sc.reliability_threshold),
            ("confidence_pivot", sc.confidence_pivot),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::Invalid(format!(
                    "scoring.{name} {v} must lie within [0, 1]"
                )));
            }
        }
        if !sc.confidence_weight.is_finite() || sc.confidence_weight < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "scoring.confidence_weight {} must be a non-negative number",
                sc.confidence_weight
            )));
        }
        for stage in Stage::ALL {
            let base = sc.base_scores.for_stage(stage);
            if !(0.0..=100.0).contains(&base) {
                return Err(ConfigError::Invalid(format!(
                    "scoring base score for {stage} is {base}, expected 0..=100"
                )));
            }
        }
        if self.audit.max_entries == 0 {
            return Err(ConfigError::Invalid("audit.max_entries must be > 0".to_string()));
        }
        Ok(())
    }

    /// Applies `ALZCARE_*` environment overrides. Unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|k| std::env::var(k).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_INFERENCE_ENDPOINT) {
            let v = v.trim();
            self.inference.endpoint = if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            };
        }
        if let Some(v) = lookup(ENV_INFERENCE_TIMEOUT_MS) {
            match v.trim().parse::<u32>() {
                Ok(ms) if ms > 0 => self.inference.timeout_ms = ms,
                _ => warn!("Unknown {} value: {}", ENV_INFERENCE_TIMEOUT_MS, v),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.audit.max_entries, 50);
        assert_eq!(cfg.scoring.base_scores.for_stage(Stage::Mild), 50.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"inference":{"endpoint":"http://localhost:8000/predict"},"scoring":{"reliability_threshold":0.8}}"#,
        )
        .unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(
            cfg.inference.endpoint.as_deref(),
            Some("http://localhost:8000/predict")
        );
        assert_eq!(cfg.inference.timeout_ms, 5_000);
        assert_eq!(cfg.scoring.reliability_threshold, 0.8);
        assert_eq!(cfg.scoring.confidence_pivot, 0.9);
    }

    #[test]
    fn rejects_inverted_band_and_bad_json() {
        let mut cfg = AppConfig::default();
        cfg.inference.synthetic_band = ConfidenceBand {
            low: 0.97,
            high: 0.85,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_scoring() {
        let bad: [fn(&mut ScoringConfig); 4] = [
            |s| s.reliability_threshold = 1.5,
            |s| s.confidence_weight = -10.0,
            |s| s.confidence_pivot = f64::NAN,
            |s| s.base_scores.moderate = 120.0,
        ];
        for tweak in bad {
            let mut cfg = AppConfig::default();
            tweak(&mut cfg.scoring);
            assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"scoring":{"reliability_threshold":-0.2}}"#).unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            (ENV_INFERENCE_ENDPOINT, "http://infer.local/predict"),
            (ENV_INFERENCE_TIMEOUT_MS, "soon"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(
            cfg.inference.endpoint.as_deref(),
            Some("http://infer.local/predict")
        );
        assert_eq!(cfg.inference.timeout_ms, 5_000);
    }
}

//! Inference gateway: one best-effort remote classification with a total,
//! silent local fallback.
//!
//! The gateway never returns an error. Remote failures are logged at `warn`
//! and counted in [`GatewayStats`]; the caller gets a synthetic result marked
//! with [`Source::Synthetic`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ConfidenceBand, InferenceConfig};
use crate::error::{InferenceError, ValidationError};
use crate::prng::Prng;
use crate::record::{validate_confidence, PredictionRecord};
use crate::stage::Stage;

/// Raw classifier output before an id and timestamp are attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub stage: Stage,
    pub confidence: f64,
}

/// A classification strategy that may fail.
pub trait Classifier {
    fn classify(&mut self, image: &[u8]) -> Result<Prediction, InferenceError>;
}

/// A classification strategy that always produces a value.
pub trait FallbackClassifier {
    fn classify_fallback(&mut self, image: &[u8]) -> Prediction;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&mut self, image: &[u8]) -> Result<Prediction, InferenceError> {
        (**self).classify(image)
    }
}

impl<C: FallbackClassifier + ?Sized> FallbackClassifier for Box<C> {
    fn classify_fallback(&mut self, image: &[u8]) -> Prediction {
        (**self).classify_fallback(image)
    }
}

/// Degraded-mode stand-in: a uniformly random stage with a confidence drawn
/// from a high band. Not a model; it ignores the image entirely.
#[derive(Debug, Clone)]
pub struct SyntheticClassifier {
    prng: Prng,
    band: ConfidenceBand,
}

impl SyntheticClassifier {
    pub fn new(prng: Prng, band: ConfidenceBand) -> Self {
        Self { prng, band }
    }

    pub fn band(&self) -> ConfidenceBand {
        self.band
    }
}

impl FallbackClassifier for SyntheticClassifier {
    fn classify_fallback(&mut self, _image: &[u8]) -> Prediction {
        let idx = self.prng.gen_range_usize(0, Stage::ALL.len());
        let raw = self.prng.gen_range_f64(self.band.low, self.band.high);
        // Two decimals, like the confidence values the dashboard has always shown.
        let confidence = ((raw * 100.0).round() / 100.0).clamp(self.band.low, self.band.high);
        Prediction {
            stage: Stage::ALL[idx],
            confidence,
        }
    }
}

impl Classifier for SyntheticClassifier {
    fn classify(&mut self, image: &[u8]) -> Result<Prediction, InferenceError> {
        Ok(self.classify_fallback(image))
    }
}

#[derive(Deserialize)]
struct RemoteResponse {
    #[serde(alias = "label", alias = "prediction")]
    stage: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Parses an endpoint response body. A missing confidence takes `default_confidence`.
pub fn parse_remote_response(
    body: &str,
    default_confidence: f64,
) -> Result<Prediction, InferenceError> {
    let wire: RemoteResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::Malformed(e.to_string()))?;
    let stage: Stage = wire
        .stage
        .parse()
        .map_err(|e: ValidationError| InferenceError::Malformed(e.to_string()))?;
    let confidence = validate_confidence(wire.confidence.unwrap_or(default_confidence))
        .map_err(|e| InferenceError::Malformed(e.to_string()))?;
    Ok(Prediction { stage, confidence })
}

#[cfg(feature = "remote")]
pub use remote::RemoteClassifier;

#[cfg(feature = "remote")]
mod remote {
    use std::time::Duration;

    use super::{parse_remote_response, Classifier, Prediction};
    use crate::config::InferenceConfig;
    use crate::error::InferenceError;

    /// Blocking HTTP client for the inference endpoint.
    ///
    /// Sends the raw image as `application/octet-stream` and expects
    /// `{"stage": "...", "confidence": 0.93}` back.
    pub struct RemoteClassifier {
        agent: ureq::Agent,
        endpoint: String,
        default_confidence: f64,
    }

    impl RemoteClassifier {
        pub fn new(endpoint: impl Into<String>, timeout_ms: u32, default_confidence: f64) -> Self {
            let timeout = Duration::from_millis(u64::from(timeout_ms).max(100));
            let agent = ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout_read(timeout)
                .timeout_write(timeout)
                .timeout(timeout)
                .try_proxy_from_env(false)
                .build();
            Self {
                agent,
                endpoint: endpoint.into(),
                default_confidence,
            }
        }

        /// `None` when no endpoint is configured.
        pub fn from_config(cfg: &InferenceConfig) -> Option<Self> {
            let endpoint = cfg.endpoint.as_deref()?.trim();
            if endpoint.is_empty() {
                return None;
            }
            Some(Self::new(endpoint, cfg.timeout_ms, cfg.default_confidence))
        }

        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    impl Classifier for RemoteClassifier {
        fn classify(&mut self, image: &[u8]) -> Result<Prediction, InferenceError> {
            let resp = self
                .agent
                .post(&self.endpoint)
                .set("Content-Type", "application/octet-stream")
                .set("Accept", "application/json")
                .send_bytes(image)
                .map_err(error_from_ureq)?;
            if !(200..=299).contains(&resp.status()) {
                return Err(InferenceError::Status(resp.status()));
            }
            let body = resp
                .into_string()
                .map_err(|e| InferenceError::Malformed(format!("unreadable body: {e}")))?;
            parse_remote_response(&body, self.default_confidence)
        }
    }

    fn error_from_ureq(err: ureq::Error) -> InferenceError {
        match err {
            ureq::Error::Status(code, _) => InferenceError::Status(code),
            ureq::Error::Transport(transport) => {
                let msg = transport.to_string();
                let lower = msg.to_ascii_lowercase();
                if lower.contains("timed out") || lower.contains("timeout") {
                    InferenceError::Timeout
                } else {
                    InferenceError::Transport(msg)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Remote,
    Synthetic,
}

/// Gateway output. Always usable; `fallback_reason` says why the remote path
/// was skipped, if it was.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub prediction: Prediction,
    pub source: Source,
    pub fallback_reason: Option<InferenceError>,
}

impl Classification {
    pub fn into_record(
        self,
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<PredictionRecord, ValidationError> {
        PredictionRecord::new(
            id,
            timestamp,
            self.prediction.stage,
            self.prediction.confidence,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStats {
    pub remote_ok: u64,
    pub fallbacks: u64,
}

pub struct InferenceGateway<P = Box<dyn Classifier + Send>, F = SyntheticClassifier> {
    primary: Option<P>,
    fallback: F,
    stats: GatewayStats,
}

impl<P: Classifier, F: FallbackClassifier> InferenceGateway<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary: Some(primary),
            fallback,
            stats: GatewayStats::default(),
        }
    }

    /// No remote path; every call is answered by `fallback`.
    pub fn offline(fallback: F) -> Self {
        Self {
            primary: None,
            fallback,
            stats: GatewayStats::default(),
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn stats(&self) -> GatewayStats {
        self.stats
    }

    pub fn classify(&mut self, image: &[u8]) -> Classification {
        let reason = match self.primary.as_mut() {
            Some(primary) => match primary.classify(image) {
                Ok(prediction) => {
                    self.stats.remote_ok += 1;
                    debug!(
                        "remote classification: {} ({:.2})",
                        prediction.stage, prediction.confidence
                    );
                    return Classification {
                        prediction,
                        source: Source::Remote,
                        fallback_reason: None,
                    };
                }
                Err(e) => {
                    warn!("inference endpoint unavailable, using synthetic fallback: {e}");
                    Some(e)
                }
            },
            None => None,
        };

        self.stats.fallbacks += 1;
        Classification {
            prediction: self.fallback.classify_fallback(image),
            source: Source::Synthetic,
            fallback_reason: reason,
        }
    }
}

impl InferenceGateway {
    /// Remote-first gateway when an endpoint is configured, offline otherwise.
    pub fn from_config(cfg: &InferenceConfig, prng: Prng) -> Self {
        let fallback = SyntheticClassifier::new(prng, cfg.synthetic_band);
        match remote_primary(cfg) {
            Some(primary) => Self::new(primary, fallback),
            None => Self::offline(fallback),
        }
    }
}

#[cfg(feature = "remote")]
fn remote_primary(cfg: &InferenceConfig) -> Option<Box<dyn Classifier + Send>> {
    RemoteClassifier::from_config(cfg).map(|r| Box::new(r) as Box<dyn Classifier + Send>)
}

#[cfg(not(feature = "remote"))]
fn remote_primary(_cfg: &InferenceConfig) -> Option<Box<dyn Classifier + Send>> {
    None
}

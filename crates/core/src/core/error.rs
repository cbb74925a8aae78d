//! Error taxonomy for the record store, persistence, inference and export paths.

use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A record that must not enter the store.
///
/// Fatal to the operation that produced it, never to the process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("confidence is not a finite number")]
    NonFiniteConfidence,
    #[error("unknown stage label {0:?}")]
    UnknownStage(String),
    #[error("record id is empty")]
    EmptyId,
    #[error("a record with id {0:?} already exists")]
    DuplicateId(String),
    #[error("timestamp {attempted} is earlier than the latest record ({latest})")]
    TimestampRegression {
        latest: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },
}

/// Failure of the key/value persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed for key {key:?}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("storage quota exceeded writing {key:?} ({needed} bytes, limit {limit})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode {key:?}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored value under {key:?} is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Why a remote classification could not be used. Never crosses the gateway boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("endpoint returned http status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to encode report: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode report: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

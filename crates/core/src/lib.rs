//! # alzcare
//!
//! Prediction record store and longitudinal aggregation for the AlzCare MRI
//! dashboard.
//!
//! An analysis flows through four pieces:
//! the inference gateway classifies an image (remote endpoint first, synthetic
//! fallback otherwise), the record store appends the result, the aggregation
//! engine derives trend and chart series, and the exporter turns records into
//! a report.
//!
//! ## Quick Start
//!
//! ```
//! use alzcare::prelude::*;
//!
//! let cfg = AppConfig::default();
//! let mut prng = Prng::new(42);
//! let mut gateway = InferenceGateway::from_config(&cfg.inference, prng.fork());
//! let mut store = RecordStore::open(MemoryStore::new()).unwrap();
//!
//! let classification = gateway.classify(b"mri-bytes");
//! let record = classification
//!     .into_record(new_record_id(&mut prng), SystemClock.now())
//!     .unwrap();
//! let _durability = store.append(record).unwrap();
//!
//! let view = derive_view(store.all(), &cfg.scoring);
//! assert_eq!(view.trend, Trend::InsufficientData);
//! ```
//!
//! ## Feature Flags
//!
//! - `remote` (default): blocking HTTP client for the inference endpoint via `ureq`.
//!   Disable for wasm32 builds; the gateway then runs offline.
//!
//! ## Modules
//!
//! - [`store`]: append-only, most-recent-first prediction history
//! - [`inference`]: remote-first classification with silent synthetic fallback
//! - [`aggregate`]: trend, cognitive score, chart series, history statistics
//! - [`report`]: single-record and full-history report export
//! - [`audit`]: capped login audit trail for the admin view

#[path = "core/error.rs"]
pub mod error;

#[path = "core/stage.rs"]
pub mod stage;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/clock.rs"]
pub mod clock;

#[path = "core/record.rs"]
pub mod record;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/store.rs"]
pub mod store;

#[path = "core/audit.rs"]
pub mod audit;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/inference.rs"]
pub mod inference;

#[path = "core/aggregate.rs"]
pub mod aggregate;

#[path = "core/report.rs"]
pub mod report;

/// Prelude module for convenient imports.
///
/// ```
/// use alzcare::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aggregate::{
        cognitive_score, derive_view, trend_between, DashboardView, HistoryStats, SeriesPoint,
        Trend,
    };
    pub use crate::audit::{AuditLog, AuditLogEntry, Role};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{AppConfig, ConfidenceBand, InferenceConfig, ScoringConfig};
    pub use crate::error::{
        ConfigError, InferenceError, ReportError, StorageError, ValidationError,
    };
    #[cfg(feature = "remote")]
    pub use crate::inference::RemoteClassifier;
    pub use crate::inference::{
        Classification, Classifier, FallbackClassifier, GatewayStats, InferenceGateway,
        Prediction, Source, SyntheticClassifier,
    };
    pub use crate::prng::Prng;
    pub use crate::record::{new_record_id, PredictionRecord, Reliability};
    pub use crate::report::{export_all, export_one, Report, ReportFormat, ReportScope};
    pub use crate::stage::Stage;
    pub use crate::storage::{FileStore, KeyValueStore, MemoryStore};
    pub use crate::store::{Durability, RecordStore};
}

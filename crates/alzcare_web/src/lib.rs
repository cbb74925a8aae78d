//! Browser host for the AlzCare dashboard.
//!
//! This crate is a stub by default so the workspace builds on native targets
//! without a wasm toolchain. The UI model is plain Rust and tested on the host.
//!
//! Enable the browser bindings with: `--features web` (and a wasm32 target).
//!
//! The browser host has no HTTP client. `Dashboard` always runs an offline
//! gateway built from the default config, so `analyze` yields synthetic
//! results. Predictions from an inference endpoint called in JavaScript are
//! recorded through `Dashboard::record_result` (`recordResult`).

pub mod ui_model;

/// Placeholder function for non-web (or non-wasm) builds.
#[cfg(not(all(feature = "web", target_arch = "wasm32")))]
pub fn placeholder() {
    // No-op.
}

#[cfg(all(feature = "web", target_arch = "wasm32"))]
mod web;

#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub use web::{start, Dashboard};

#[cfg(test)]
mod tests {
    use alzcare::prelude::*;

    #[test]
    fn dashboard_config_builds_offline_gateway() {
        let cfg = AppConfig::default();
        assert!(cfg.inference.endpoint.is_none());
        let mut gw = InferenceGateway::from_config(&cfg.inference, Prng::new(9));
        assert!(!gw.has_primary());
        let c = gw.classify(b"scan");
        assert_eq!(c.source, Source::Synthetic);
    }
}

//! One dashboard session: the single writer of the prediction history.
//!
//! Analyses are serialized. A request that arrives while another is
//! outstanding is rejected instead of racing a second append. The network call
//! is the only suspension point and is bounded twice: by the HTTP client's own
//! timeout and by an outer budget here. A call abandoned at the outer budget
//! keeps the session busy until it actually returns, and its late result is
//! discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alzcare::prelude::*;
use thiserror::Error;
use tracing::{error, info, warn};

/// Slack on top of the client timeout before the session gives up waiting.
const TIMEOUT_GRACE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("an analysis is already in progress")]
    AnalysisInProgress,
    #[error("classification rejected: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug)]
pub struct Analysis {
    pub record: PredictionRecord,
    pub source: Source,
    pub fallback_reason: Option<InferenceError>,
    pub durability: Durability,
}

pub struct Session<S, C = SystemClock> {
    store: Mutex<RecordStore<S>>,
    gateway: Arc<Mutex<InferenceGateway>>,
    rescue: Mutex<SyntheticClassifier>,
    ids: Mutex<Prng>,
    // Outcomes as recorded, not as the gateway saw them.
    stats: Mutex<GatewayStats>,
    clock: C,
    budget: Duration,
    busy: Arc<AtomicBool>,
}

struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S, C> Session<S, C>
where
    S: KeyValueStore,
    C: Clock,
{
    pub fn new(
        store: RecordStore<S>,
        gateway: InferenceGateway,
        cfg: &InferenceConfig,
        mut prng: Prng,
        clock: C,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            gateway: Arc::new(Mutex::new(gateway)),
            rescue: Mutex::new(SyntheticClassifier::new(prng.fork(), cfg.synthetic_band)),
            ids: Mutex::new(prng),
            stats: Mutex::new(GatewayStats::default()),
            clock,
            budget: Duration::from_millis(u64::from(cfg.timeout_ms) + TIMEOUT_GRACE_MS),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Classifies `image` and appends the result to the history.
    pub async fn analyze(&self, image: Vec<u8>) -> Result<Analysis, SessionError> {
        let guard = BusyGuard::acquire(&self.busy).ok_or(SessionError::AnalysisInProgress)?;

        let gateway = Arc::clone(&self.gateway);
        let mut task = tokio::task::spawn_blocking(move || lock(&gateway).classify(&image));
        let classification = match tokio::time::timeout(self.budget, &mut task).await {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => {
                error!("inference task failed, using synthetic fallback: {e}");
                self.rescue(InferenceError::Transport(e.to_string()))
            }
            Err(_) => {
                warn!(
                    "inference exceeded {} ms, using synthetic fallback",
                    self.budget.as_millis()
                );
                // Stay busy until the abandoned call returns; its result is dropped.
                tokio::spawn(async move {
                    let _ = task.await;
                    drop(guard);
                });
                self.rescue(InferenceError::Timeout)
            }
        };

        {
            let mut stats = lock(&self.stats);
            match classification.source {
                Source::Remote => stats.remote_ok += 1,
                Source::Synthetic => stats.fallbacks += 1,
            }
        }

        let id = new_record_id(&mut lock(&self.ids));
        let mut store = lock(&self.store);
        // Keep insertion order non-decreasing even if the wall clock steps back.
        let now = self.clock.now();
        let timestamp = store.latest().map_or(now, |l| now.max(l.timestamp()));

        let source = classification.source;
        let fallback_reason = classification.fallback_reason.clone();
        let record = classification.into_record(id, timestamp)?;
        let durability = store.append(record.clone())?;
        info!(
            "recorded {} {} ({:.2}, {:?})",
            record.id(),
            record.stage(),
            record.confidence(),
            source
        );

        Ok(Analysis {
            record,
            source,
            fallback_reason,
            durability,
        })
    }

    fn rescue(&self, reason: InferenceError) -> Classification {
        Classification {
            prediction: lock(&self.rescue).classify_fallback(&[]),
            source: Source::Synthetic,
            fallback_reason: Some(reason),
        }
    }

    /// Counts of recorded analyses by source. Never waits on an in-flight call.
    pub fn gateway_stats(&self) -> GatewayStats {
        *lock(&self.stats)
    }

    pub fn records(&self) -> Vec<PredictionRecord> {
        lock(&self.store).all().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Slow {
        delay: Duration,
        prediction: Prediction,
    }

    impl Classifier for Slow {
        fn classify(&mut self, _image: &[u8]) -> Result<Prediction, InferenceError> {
            thread::sleep(self.delay);
            Ok(self.prediction)
        }
    }

    fn cfg(timeout_ms: u32) -> InferenceConfig {
        InferenceConfig {
            timeout_ms,
            ..InferenceConfig::default()
        }
    }

    fn session(delay_ms: u64, timeout_ms: u32) -> Session<MemoryStore> {
        let cfg = cfg(timeout_ms);
        let slow = Slow {
            delay: Duration::from_millis(delay_ms),
            prediction: Prediction {
                stage: Stage::VeryMild,
                confidence: 0.66,
            },
        };
        let gateway = InferenceGateway::new(
            Box::new(slow) as Box<dyn Classifier + Send>,
            SyntheticClassifier::new(Prng::new(1), cfg.synthetic_band),
        );
        Session::new(
            RecordStore::open(MemoryStore::new()).unwrap(),
            gateway,
            &cfg,
            Prng::new(2),
            SystemClock,
        )
    }

    #[tokio::test]
    async fn analysis_appends_most_recent_first() {
        let s = session(0, 1_000);
        let a = s.analyze(b"one".to_vec()).await.unwrap();
        let b = s.analyze(b"two".to_vec()).await.unwrap();
        assert_eq!(a.source, Source::Remote);
        assert_eq!(b.record.stage(), Stage::VeryMild);
        assert!(b.durability.is_persisted());

        let ids: Vec<String> = s.records().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec![b.record.id().to_string(), a.record.id().to_string()]);
        assert_eq!(s.gateway_stats().remote_ok, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_analysis_while_busy_is_rejected() {
        let s = Arc::new(session(300, 5_000));
        let first = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.analyze(b"a".to_vec()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(s.is_busy());

        let second = s.analyze(b"b".to_vec()).await;
        assert!(matches!(second, Err(SessionError::AnalysisInProgress)));

        first.await.unwrap().unwrap();
        assert!(!s.is_busy());
        assert_eq!(s.records().len(), 1);
    }

    #[tokio::test]
    async fn outer_budget_falls_back_to_synthetic() {
        // Budget is timeout_ms + grace; the classifier outlasts it.
        let s = session(1_200, 100);
        let a = s.analyze(b"x".to_vec()).await.unwrap();
        assert_eq!(a.source, Source::Synthetic);
        assert_eq!(a.fallback_reason, Some(InferenceError::Timeout));
        assert!((0.85..=0.97).contains(&a.record.confidence()));

        // The abandoned call still holds the gateway; stats must not wait on it.
        let started = std::time::Instant::now();
        let stats = s.gateway_stats();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(
            stats,
            GatewayStats {
                remote_ok: 0,
                fallbacks: 1
            }
        );

        assert!(s.is_busy());
        let second = s.analyze(b"y".to_vec()).await;
        assert!(matches!(second, Err(SessionError::AnalysisInProgress)));

        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while s.is_busy() && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!s.is_busy());
        // The late remote result is dropped, not recorded or counted.
        assert_eq!(s.records().len(), 1);
        assert_eq!(s.gateway_stats().remote_ok, 0);
    }

    #[tokio::test]
    async fn timestamps_never_regress() {
        let cfg = cfg(1_000);
        let clock = Arc::new(ManualClock::at(SystemClock.now()));
        let gateway = InferenceGateway::offline(SyntheticClassifier::new(
            Prng::new(3),
            cfg.synthetic_band,
        ));
        let s = Session::new(
            RecordStore::open(MemoryStore::new()).unwrap(),
            gateway,
            &cfg,
            Prng::new(4),
            Arc::clone(&clock),
        );
        let a = s.analyze(vec![]).await.unwrap();
        clock.advance_millis(-60_000);
        let b = s.analyze(vec![]).await.unwrap();
        assert_eq!(b.record.timestamp(), a.record.timestamp());
    }
}

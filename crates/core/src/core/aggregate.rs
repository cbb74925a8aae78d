//! Longitudinal view over the prediction history.
//!
//! Everything here is a pure function of a most-recent-first record slice.
//! The cognitive score is a display heuristic, not a clinical metric.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::record::{PredictionRecord, Reliability};
use crate::stage::Stage;

/// Direction of change between the two most recent records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    /// Fewer than two records. Distinct from `Stable`.
    InsufficientData,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::Improving => "Improving",
            Trend::Stable => "Stable",
            Trend::Declining => "Declining",
            Trend::InsufficientData => "Insufficient data",
        }
    }
}

/// Compares severity ranks; a higher latest rank means decline.
pub fn trend_between(latest: Stage, previous: Stage) -> Trend {
    match latest.rank().cmp(&previous.rank()) {
        std::cmp::Ordering::Greater => Trend::Declining,
        std::cmp::Ordering::Equal => Trend::Stable,
        std::cmp::Ordering::Less => Trend::Improving,
    }
}

/// Display-only 0..=100 score combining stage and confidence.
pub fn cognitive_score(stage: Stage, confidence: f64, cfg: &ScoringConfig) -> u8 {
    let base = cfg.base_scores.for_stage(stage);
    let raw = base + (confidence - cfg.confidence_pivot) * cfg.confidence_weight;
    if raw.is_nan() {
        return base.clamp(0.0, 100.0).round() as u8;
    }
    raw.clamp(0.0, 100.0).round() as u8
}

/// One chart point, oldest to newest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub id: String,
    /// Short axis label, e.g. "Mar 14".
    pub date: String,
    pub timestamp: DateTime<Utc>,
    pub stage: Stage,
    pub severity_rank: u8,
    pub confidence_percent: f64,
    pub cognitive_score: u8,
}

pub fn series(records: &[PredictionRecord], cfg: &ScoringConfig) -> Vec<SeriesPoint> {
    records
        .iter()
        .rev()
        .map(|r| SeriesPoint {
            id: r.id().to_string(),
            date: r.timestamp().format("%b %-d").to_string(),
            timestamp: r.timestamp(),
            stage: r.stage(),
            severity_rank: r.stage().rank(),
            confidence_percent: r.confidence_percent(),
            cognitive_score: cognitive_score(r.stage(), r.confidence(), cfg),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    /// Indexed by severity rank.
    pub per_stage: [usize; 4],
    pub mean_confidence: Option<f64>,
    pub low_reliability: usize,
    pub most_severe: Option<Stage>,
}

impl HistoryStats {
    pub fn from_records(records: &[PredictionRecord], cfg: &ScoringConfig) -> Self {
        let mut per_stage = [0usize; 4];
        let mut sum = 0.0;
        let mut low_reliability = 0;
        let mut most_severe: Option<Stage> = None;
        for r in records {
            per_stage[r.stage().rank() as usize] += 1;
            sum += r.confidence();
            if r.reliability(cfg.reliability_threshold) == Reliability::Low {
                low_reliability += 1;
            }
            if most_severe.map_or(true, |s| r.stage().rank() > s.rank()) {
                most_severe = Some(r.stage());
            }
        }
        let total = records.len();
        Self {
            total,
            per_stage,
            mean_confidence: (total > 0).then(|| sum / total as f64),
            low_reliability,
            most_severe,
        }
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.per_stage[stage.rank() as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView<'a> {
    pub latest: Option<&'a PredictionRecord>,
    pub previous: Option<&'a PredictionRecord>,
    pub trend: Trend,
    pub latest_score: Option<u8>,
    pub series: Vec<SeriesPoint>,
    pub stats: HistoryStats,
}

/// Derives the dashboard view from a most-recent-first history.
pub fn derive_view<'a>(records: &'a [PredictionRecord], cfg: &ScoringConfig) -> DashboardView<'a> {
    let latest = records.first();
    let previous = records.get(1);
    let trend = match (latest, previous) {
        (Some(l), Some(p)) => trend_between(l.stage(), p.stage()),
        _ => Trend::InsufficientData,
    };
    DashboardView {
        latest,
        previous,
        trend,
        latest_score: latest.map(|r| cognitive_score(r.stage(), r.confidence(), cfg)),
        series: series(records, cfg),
        stats: HistoryStats::from_records(records, cfg),
    }
}

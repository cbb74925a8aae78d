//! Report export.
//!
//! Pure transformation of one record or the whole history into a [`Report`].
//! Encoding to bytes is separate so hosts decide how to deliver the artifact
//! (file, browser download).

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{cognitive_score, derive_view, Trend};
use crate::config::ScoringConfig;
use crate::error::ReportError;
use crate::record::{PredictionRecord, Reliability};
use crate::stage::Stage;

pub const SCORE_DISCLAIMER: &str = "Cognitive scores are a display heuristic derived from \
stage and model confidence. They are not a clinical measure and must not be used for diagnosis.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportScope {
    Single,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Text,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "text" | "txt" => Some(ReportFormat::Text),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Text => "text/plain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub stage: Stage,
    pub stage_description: String,
    pub confidence: f64,
    pub confidence_percent: f64,
    pub reliability: Reliability,
    pub cognitive_score: u8,
}

impl ReportEntry {
    fn from_record(r: &PredictionRecord, cfg: &ScoringConfig) -> Self {
        Self {
            id: r.id().to_string(),
            timestamp: r.timestamp(),
            stage: r.stage(),
            stage_description: r.stage().description().to_string(),
            confidence: r.confidence(),
            confidence_percent: (r.confidence_percent() * 10.0).round() / 10.0,
            reliability: r.reliability(cfg.reliability_threshold),
            cognitive_score: cognitive_score(r.stage(), r.confidence(), cfg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_records: usize,
    pub latest_stage: Option<Stage>,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub scope: ReportScope,
    pub disclaimer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReportSummary>,
    pub entries: Vec<ReportEntry>,
}

pub fn export_one(
    record: &PredictionRecord,
    cfg: &ScoringConfig,
    generated_at: DateTime<Utc>,
) -> Report {
    Report {
        title: format!("MRI Analysis Report {}", record.id()),
        generated_at,
        scope: ReportScope::Single,
        disclaimer: SCORE_DISCLAIMER.to_string(),
        summary: None,
        entries: vec![ReportEntry::from_record(record, cfg)],
    }
}

/// Full-history report, most recent first. An empty history yields a valid
/// report with no entries.
pub fn export_all(
    records: &[PredictionRecord],
    cfg: &ScoringConfig,
    generated_at: DateTime<Utc>,
) -> Report {
    let view = derive_view(records, cfg);
    Report {
        title: "Longitudinal MRI History Report".to_string(),
        generated_at,
        scope: ReportScope::History,
        disclaimer: SCORE_DISCLAIMER.to_string(),
        summary: Some(ReportSummary {
            total_records: records.len(),
            latest_stage: view.latest.map(|r| r.stage()),
            trend: view.trend,
        }),
        entries: records
            .iter()
            .map(|r| ReportEntry::from_record(r, cfg))
            .collect(),
    }
}

impl Report {
    pub fn record_count(&self) -> usize {
        self.entries.len()
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        serde_json::to_string_pretty(self).map_err(ReportError::Encode)
    }

    pub fn from_json(raw: &str) -> Result<Self, ReportError> {
        serde_json::from_str(raw).map_err(ReportError::Decode)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}", "=".repeat(self.title.len()));
        let _ = writeln!(
            out,
            "Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(summary) = &self.summary {
            let _ = writeln!(out, "Records: {}", summary.total_records);
            let latest = summary.latest_stage.map_or("-", |s| s.label());
            let _ = writeln!(out, "Latest stage: {latest}");
            let _ = writeln!(out, "Trend: {}", summary.trend.label());
        }
        let _ = writeln!(out);

        if self.entries.is_empty() {
            let _ = writeln!(out, "No analyses recorded.");
        }
        for e in &self.entries {
            let _ = writeln!(out, "[{}] {}", e.id, e.timestamp.to_rfc3339());
            let _ = writeln!(out, "  Stage:           {}", e.stage.label());
            let _ = writeln!(out, "  Description:     {}", e.stage_description);
            let _ = writeln!(
                out,
                "  Confidence:      {:.1}% ({})",
                e.confidence_percent,
                e.reliability.label()
            );
            let _ = writeln!(out, "  Cognitive score: {}/100", e.cognitive_score);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Note: {}", self.disclaimer);
        out
    }

    pub fn encode(&self, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
        match format {
            ReportFormat::Json => self.to_json().map(String::into_bytes),
            ReportFormat::Text => Ok(self.render_text().into_bytes()),
        }
    }

    /// Suggested download name, e.g. `alzcare-report-k3x9a0b1c.json`.
    pub fn file_name(&self, format: ReportFormat) -> String {
        let stem = match (self.scope, self.entries.first()) {
            (ReportScope::Single, Some(e)) => format!("alzcare-report-{}", e.id),
            _ => format!(
                "alzcare-history-{}",
                self.generated_at.format("%Y%m%d-%H%M%S")
            ),
        };
        format!("{stem}.{}", format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 2, 12, 0, 0).unwrap()
    }

    fn records() -> Vec<PredictionRecord> {
        let t0 = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
        vec![
            PredictionRecord::new("c", t0 + Duration::hours(2), Stage::Mild, 0.934).unwrap(),
            PredictionRecord::new("b", t0 + Duration::hours(1), Stage::VeryMild, 0.88).unwrap(),
            PredictionRecord::new("a", t0, Stage::VeryMild, 0.91).unwrap(),
        ]
    }

    #[test]
    fn export_all_round_trips_record_count() {
        let cfg = ScoringConfig::default();
        let recs = records();
        let report = export_all(&recs, &cfg, now());
        let parsed = Report::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed.record_count(), recs.len());
        assert_eq!(parsed, report);

        let summary = parsed.summary.unwrap();
        assert_eq!(summary.trend, Trend::Declining);
        assert_eq!(summary.latest_stage, Some(Stage::Mild));
    }

    #[test]
    fn export_all_empty_is_a_valid_empty_report() {
        let cfg = ScoringConfig::default();
        let report = export_all(&[], &cfg, now());
        let parsed = Report::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed.record_count(), 0);
        assert_eq!(parsed.summary.unwrap().trend, Trend::InsufficientData);

        let text = report.render_text();
        assert!(text.contains("Records: 0"));
        assert!(text.contains("No analyses recorded."));
    }

    #[test]
    fn export_one_carries_required_fields() {
        let cfg = ScoringConfig::default();
        let recs = records();
        let report = export_one(&recs[0], &cfg, now());
        assert_eq!(report.scope, ReportScope::Single);
        assert_eq!(report.record_count(), 1);
        let e = &report.entries[0];
        assert_eq!(e.stage, Stage::Mild);
        assert_eq!(e.confidence, 0.934);
        assert_eq!(e.confidence_percent, 93.4);
        assert_eq!(e.reliability, Reliability::High);
        assert_eq!(e.timestamp, recs[0].timestamp());

        let text = report.render_text();
        assert!(text.contains("Mild Demented"));
        assert!(text.contains("93.4%"));
        assert!(text.contains("2025-05-01T10:00:00+00:00"));
        assert!(text.contains("not a clinical measure"));
        assert_eq!(report.file_name(ReportFormat::Text), "alzcare-report-c.txt");
    }

    #[test]
    fn history_file_name_uses_generation_time() {
        let report = export_all(&records(), &ScoringConfig::default(), now());
        assert_eq!(
            report.file_name(ReportFormat::Json),
            "alzcare-history-20250502-120000.json"
        );
        assert_eq!(ReportFormat::parse("TXT"), Some(ReportFormat::Text));
    }
}

//! UI models that should be available on both wasm and native.
//!
//! Keeping these out of the wasm-only `web` module allows us to unit-test the
//! dashboard wording on the host.

use alzcare::aggregate::{DashboardView, Trend};
use alzcare::stage::Stage;
use serde::Serialize;

const COLOR_NEUTRAL: &str = "#334155";
const COLOR_DECLINE: &str = "#ef4444";
const COLOR_STEADY: &str = "#10b981";

pub const NO_DATA: &str = "No data";

/// Audience the dashboard is worded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ViewMode {
    #[default]
    Doctor,
    Caretaker,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Doctor => "Doctor",
            ViewMode::Caretaker => "Caretaker",
        }
    }

    pub fn parse(s: &str) -> Option<ViewMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doctor" | "clinician" => Some(ViewMode::Doctor),
            "caretaker" | "caregiver" => Some(ViewMode::Caretaker),
            _ => None,
        }
    }

    pub fn all() -> &'static [ViewMode] {
        &[ViewMode::Doctor, ViewMode::Caretaker]
    }

    pub fn stage_text(self, stage: Stage) -> &'static str {
        match self {
            ViewMode::Doctor => stage.label(),
            ViewMode::Caretaker => match stage {
                Stage::NonDemented => "No signs of dementia",
                Stage::VeryMild => "Very early changes",
                Stage::Mild => "Mild changes",
                Stage::Moderate => "Moderate changes",
            },
        }
    }

    pub fn trend_text(self, trend: Trend) -> &'static str {
        match (self, trend) {
            (ViewMode::Doctor, Trend::Declining) => "Decline",
            (ViewMode::Doctor, t) => t.label(),
            (ViewMode::Caretaker, Trend::Improving) => "Getting better",
            (ViewMode::Caretaker, Trend::Stable) => "Holding steady",
            (ViewMode::Caretaker, Trend::Declining) => "Needs attention",
            (ViewMode::Caretaker, Trend::InsufficientData) => "Not enough scans yet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryCard {
    pub label: &'static str,
    pub value: String,
    pub color: &'static str,
}

fn trend_color(trend: Trend) -> &'static str {
    match trend {
        Trend::Declining => COLOR_DECLINE,
        Trend::Improving | Trend::Stable => COLOR_STEADY,
        Trend::InsufficientData => COLOR_NEUTRAL,
    }
}

/// The four headline cards: Current State, Trend Profile, Inferences, Last Sync.
pub fn summary_cards(view: &DashboardView<'_>, mode: ViewMode) -> [SummaryCard; 4] {
    let (state, state_color) = match view.latest {
        Some(r) => (mode.stage_text(r.stage()).to_string(), r.stage().color()),
        None => (NO_DATA.to_string(), COLOR_NEUTRAL),
    };
    let trend = if view.latest.is_none() {
        NO_DATA.to_string()
    } else {
        mode.trend_text(view.trend).to_string()
    };
    let last_sync = view
        .latest
        .map_or_else(|| NO_DATA.to_string(), |r| r.timestamp().format("%Y-%m-%d").to_string());

    [
        SummaryCard {
            label: "Current State",
            value: state,
            color: state_color,
        },
        SummaryCard {
            label: "Trend Profile",
            value: trend,
            color: trend_color(view.trend),
        },
        SummaryCard {
            label: "Inferences",
            value: view.stats.total.to_string(),
            color: COLOR_NEUTRAL,
        },
        SummaryCard {
            label: "Last Sync",
            value: last_sync,
            color: COLOR_NEUTRAL,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use alzcare::aggregate::derive_view;
    use alzcare::config::ScoringConfig;
    use alzcare::record::PredictionRecord;
    use chrono::{Duration, TimeZone, Utc};

    fn recs(stages: &[Stage]) -> Vec<PredictionRecord> {
        // Oldest first in, most recent first out.
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let mut v: Vec<_> = stages
            .iter()
            .enumerate()
            .map(|(i, s)| {
                PredictionRecord::new(format!("r{i}"), t0 + Duration::days(i as i64), *s, 0.9)
                    .unwrap()
            })
            .collect();
        v.reverse();
        v
    }

    #[test]
    fn empty_history_shows_no_data_not_stable() {
        let cfg = ScoringConfig::default();
        let view = derive_view(&[], &cfg);
        for mode in ViewMode::all() {
            let cards = summary_cards(&view, *mode);
            assert_eq!(cards[0].value, NO_DATA);
            assert_eq!(cards[1].value, NO_DATA);
            assert_eq!(cards[2].value, "0");
            assert_eq!(cards[3].value, NO_DATA);
            assert!(cards.iter().all(|c| c.value != "Stable"));
        }
    }

    #[test]
    fn card_labels_are_fixed() {
        let cfg = ScoringConfig::default();
        let r = recs(&[Stage::Mild]);
        let labels: Vec<_> = summary_cards(&derive_view(&r, &cfg), ViewMode::Doctor)
            .iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(
            labels,
            vec!["Current State", "Trend Profile", "Inferences", "Last Sync"]
        );
    }

    #[test]
    fn decline_is_worded_per_audience() {
        let cfg = ScoringConfig::default();
        let r = recs(&[Stage::VeryMild, Stage::Mild]);
        let view = derive_view(&r, &cfg);

        let doctor = summary_cards(&view, ViewMode::Doctor);
        assert_eq!(doctor[0].value, "Mild Demented");
        assert_eq!(doctor[1].value, "Decline");
        assert_eq!(doctor[1].color, COLOR_DECLINE);
        assert_eq!(doctor[2].value, "2");
        assert_eq!(doctor[3].value, "2025-06-02");

        let caretaker = summary_cards(&view, ViewMode::Caretaker);
        assert_eq!(caretaker[0].value, "Mild changes");
        assert_eq!(caretaker[1].value, "Needs attention");
    }

    #[test]
    fn single_record_is_not_reported_as_stable() {
        let cfg = ScoringConfig::default();
        let r = recs(&[Stage::NonDemented]);
        let cards = summary_cards(&derive_view(&r, &cfg), ViewMode::Doctor);
        assert_eq!(cards[1].value, "Insufficient data");
        assert_eq!(
            summary_cards(&derive_view(&r, &cfg), ViewMode::Caretaker)[1].value,
            "Not enough scans yet"
        );
    }

    #[test]
    fn view_mode_parses_aliases() {
        assert_eq!(ViewMode::parse("Caregiver"), Some(ViewMode::Caretaker));
        assert_eq!(ViewMode::parse("doctor"), Some(ViewMode::Doctor));
        assert_eq!(ViewMode::parse("nurse"), None);
    }
}

use alzcare::prelude::*;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::ui_model::{summary_cards, SummaryCard, ViewMode};

mod files;
mod storage;

use storage::LocalStorageStore;

fn warn(msg: &str) {
    web_sys::console::warn_1(&JsValue::from_str(msg));
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(js_err)
}

pub fn start() {
    web_sys::console::log_1(&JsValue::from_str("alzcare dashboard ready"));
}

/// Reads an uploaded scan so it can be passed to [`Dashboard::analyze`].
#[wasm_bindgen(js_name = readScan)]
pub async fn read_scan(file: web_sys::File) -> Result<js_sys::Uint8Array, JsValue> {
    let bytes = files::read_scan(file).await.map_err(|e| JsValue::from_str(&e))?;
    Ok(js_sys::Uint8Array::from(bytes.as_slice()))
}

#[derive(Serialize)]
struct AnalysisOut<'a> {
    record: &'a PredictionRecord,
    source: Source,
    persisted: bool,
    cognitive_score: u8,
}

#[derive(Serialize)]
struct ViewOut<'a> {
    mode: ViewMode,
    cards: [SummaryCard; 4],
    view: DashboardView<'a>,
}

/// Browser-side dashboard state over `localStorage`.
///
/// The browser build has no blocking HTTP client, so [`Dashboard::analyze`]
/// runs the synthetic classifier. Results from a remote endpoint called from
/// JavaScript enter through [`Dashboard::record_result`].
#[wasm_bindgen]
pub struct Dashboard {
    store: RecordStore<LocalStorageStore>,
    audit: AuditLog<LocalStorageStore>,
    gateway: InferenceGateway,
    ids: Prng,
    scoring: ScoringConfig,
    mode: ViewMode,
}

#[wasm_bindgen]
impl Dashboard {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Dashboard {
        let cfg = AppConfig::default();
        let mut ids = Prng::from_entropy();
        let gateway = InferenceGateway::from_config(&cfg.inference, ids.fork());
        Dashboard {
            store: RecordStore::open_lenient(LocalStorageStore::new()),
            audit: AuditLog::open(LocalStorageStore::new(), cfg.audit.max_entries),
            gateway,
            ids,
            scoring: cfg.scoring,
            mode: ViewMode::default(),
        }
    }

    #[wasm_bindgen(js_name = setViewMode)]
    pub fn set_view_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        self.mode = ViewMode::parse(mode).ok_or_else(|| js_err(format!("unknown mode {mode}")))?;
        Ok(())
    }

    /// Classifies `image` and appends the result. Returns the analysis as JSON.
    pub fn analyze(&mut self, image: &[u8]) -> Result<String, JsValue> {
        let c = self.gateway.classify(image);
        let source = c.source;
        self.append(c.prediction, source)
    }

    /// Appends a classification obtained outside the dashboard.
    #[wasm_bindgen(js_name = recordResult)]
    pub fn record_result(&mut self, stage: &str, confidence: f64) -> Result<String, JsValue> {
        let stage: Stage = stage.parse().map_err(js_err)?;
        self.append(Prediction { stage, confidence }, Source::Remote)
    }

    fn append(&mut self, prediction: Prediction, source: Source) -> Result<String, JsValue> {
        let now = SystemClock.now();
        let timestamp = self
            .store
            .latest()
            .map_or(now, |l| now.max(l.timestamp()));
        let record = PredictionRecord::new(
            new_record_id(&mut self.ids),
            timestamp,
            prediction.stage,
            prediction.confidence,
        )
        .map_err(js_err)?;

        let durability = self.store.append(record.clone()).map_err(js_err)?;
        if let Durability::SessionOnly(e) = &durability {
            warn(&format!("analysis kept for this session only: {e}"));
        }
        to_json(&AnalysisOut {
            record: &record,
            source,
            persisted: durability.is_persisted(),
            cognitive_score: cognitive_score(record.stage(), record.confidence(), &self.scoring),
        })
    }

    #[wasm_bindgen(js_name = historyJson)]
    pub fn history_json(&self) -> Result<String, JsValue> {
        to_json(self.store.all())
    }

    #[wasm_bindgen(js_name = viewJson)]
    pub fn view_json(&self) -> Result<String, JsValue> {
        let view = derive_view(self.store.all(), &self.scoring);
        let cards = summary_cards(&view, self.mode);
        to_json(&ViewOut {
            mode: self.mode,
            cards,
            view,
        })
    }

    pub fn delete(&mut self, id: &str) -> bool {
        match self.store.remove(id) {
            Some((_, Durability::SessionOnly(e))) => {
                warn(&format!("delete not persisted: {e}"));
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Downloads the full-history report.
    #[wasm_bindgen(js_name = exportAll)]
    pub fn export_all(&self, format: &str) -> Result<(), JsValue> {
        let report = export_all(self.store.all(), &self.scoring, SystemClock.now());
        self.download(&report, format)
    }

    /// Downloads the report for one analysis.
    #[wasm_bindgen(js_name = exportOne)]
    pub fn export_one(&self, id: &str, format: &str) -> Result<(), JsValue> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| js_err(format!("no analysis with id {id}")))?;
        let report = export_one(record, &self.scoring, SystemClock.now());
        self.download(&report, format)
    }

    fn download(&self, report: &Report, format: &str) -> Result<(), JsValue> {
        let format =
            ReportFormat::parse(format).ok_or_else(|| js_err(format!("unknown format {format}")))?;
        let bytes = report.encode(format).map_err(js_err)?;
        files::download_report(&report.file_name(format), format.mime_type(), &bytes)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = recordLogin)]
    pub fn record_login(&mut self, email: &str, role: &str, ip: &str) -> Result<bool, JsValue> {
        let role = Role::parse(role).ok_or_else(|| js_err(format!("unknown role {role}")))?;
        let entry = AuditLogEntry::new_login(&mut self.ids, email, role, SystemClock.now(), ip);
        Ok(self.audit.record(entry).is_persisted())
    }

    #[wasm_bindgen(js_name = auditLogJson)]
    pub fn audit_log_json(&self) -> Result<String, JsValue> {
        to_json(self.audit.entries())
    }

    #[wasm_bindgen(js_name = clearAuditLog)]
    pub fn clear_audit_log(&mut self) {
        self.audit.clear();
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

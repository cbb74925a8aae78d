use alzcare::error::StorageError;
use alzcare::storage::KeyValueStore;
use wasm_bindgen::JsValue;

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

fn js_error_text(err: &JsValue) -> String {
    js_sys::Reflect::get(err, &JsValue::from_str("name"))
        .ok()
        .and_then(|v| v.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

/// `window.localStorage`, keyed exactly like the native file store.
///
/// Construction never fails: a browser without storage (private mode, blocked
/// cookies) yields a backend whose writes fail, so the dashboard runs
/// session-only instead of refusing to start.
pub(super) struct LocalStorageStore {
    storage: Option<web_sys::Storage>,
}

impl LocalStorageStore {
    pub(super) fn new() -> Self {
        Self {
            storage: local_storage(),
        }
    }

    fn storage(&self) -> Result<&web_sys::Storage, StorageError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable("localStorage is not available".to_string()))
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(js_error_text(&e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?.set_item(key, value).map_err(|e| {
            let name = js_error_text(&e);
            if name.contains("Quota") {
                StorageError::Unavailable(format!(
                    "quota exceeded writing {key:?} ({} bytes)",
                    value.len()
                ))
            } else {
                StorageError::Unavailable(name)
            }
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.storage()?
            .remove_item(key)
            .map_err(|e| StorageError::Unavailable(js_error_text(&e)))
    }
}

//! Login audit trail consumed by the admin view.
//!
//! Entries are produced by the authentication collaborator at login time and
//! are never edited. The log is capped; the oldest entries fall off first.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::prng::Prng;
use crate::storage::{load_collection, save_collection, KeyValueStore, AUDIT_LOG_KEY};
use crate::store::Durability;

pub const DEFAULT_MAX_AUDIT_ENTRIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Clinician,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Clinician => "CLINICIAN",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "CLINICIAN" => Some(Role::Clinician),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    /// Origin address of the login.
    pub ip: String,
}

impl AuditLogEntry {
    pub fn new_login(
        prng: &mut Prng,
        email: impl Into<String>,
        role: Role,
        timestamp: DateTime<Utc>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            id: prng.base36(9),
            email: email.into(),
            role,
            timestamp,
            ip: ip.into(),
        }
    }
}

pub struct AuditLog<S> {
    backend: S,
    max_entries: usize,
    entries: Vec<AuditLogEntry>,
}

impl<S: KeyValueStore> AuditLog<S> {
    /// Loads the persisted trail, starting empty when it cannot be read.
    pub fn open(backend: S, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        let mut entries = match load_collection::<AuditLogEntry, _>(&backend, AUDIT_LOG_KEY) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("audit log unreadable, starting empty: {e}");
                Vec::new()
            }
        };
        entries.truncate(max_entries);
        Self {
            backend,
            max_entries,
            entries,
        }
    }

    pub fn record(&mut self, entry: AuditLogEntry) -> Durability {
        self.entries.insert(0, entry);
        self.entries.truncate(self.max_entries);
        let result = save_collection(&mut self.backend, AUDIT_LOG_KEY, &self.entries);
        Durability::from_write(result, "audit entry")
    }

    /// Newest first.
    pub fn entries(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Drops the whole trail. Idempotent; backend failures are only logged.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.backend.remove(AUDIT_LOG_KEY) {
            warn!("audit log cleared in memory but not in storage: {e}");
        }
    }

    pub fn into_backend(self) -> S {
        self.backend
    }
}

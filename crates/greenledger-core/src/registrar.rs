//! The real registration side effect: record that an action happened.
//!
//! The registrar knows nothing about tokens, ledgers or bonuses. It writes an
//! `ActionRecord` through an `ActionStore` and returns a confirmation text.

use crate::error::{LedgerError, Result};
use crate::io;
use crate::paths;
use crate::types::ActionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub actor_id: String,
    pub action_type: ActionType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ActionStore
// ---------------------------------------------------------------------------

/// Persistence hook for action records. Separate from the ledger.
pub trait ActionStore: Send + Sync {
    fn persist(&self, record: &ActionRecord) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryActionStore {
    records: Mutex<Vec<ActionRecord>>,
}

impl MemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ActionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ActionStore for MemoryActionStore {
    fn persist(&self, record: &ActionRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// One JSON object per line in `.greenledger/actions.jsonl`.
#[derive(Debug)]
pub struct JsonlActionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlActionStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: paths::actions_path(root),
            write_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored record in write order. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<ActionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        data.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(LedgerError::from))
            .collect()
    }
}

impl ActionStore for JsonlActionStore {
    fn persist(&self, record: &ActionRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let _held = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        io::append_line(&self.path, &line)
    }
}

// ---------------------------------------------------------------------------
// ActionRegistrar
// ---------------------------------------------------------------------------

pub struct ActionRegistrar {
    store: Arc<dyn ActionStore>,
}

impl ActionRegistrar {
    pub fn new(store: Arc<dyn ActionStore>) -> Self {
        Self { store }
    }

    /// Persist the action and return its confirmation text.
    ///
    /// Any store failure surfaces as `RegistrationFailed`.
    pub fn register(
        &self,
        actor_id: &str,
        action_type: &ActionType,
        description: &str,
        impact: Option<f64>,
    ) -> Result<String> {
        let record = ActionRecord {
            id: Uuid::new_v4(),
            actor_id: actor_id.to_string(),
            action_type: action_type.clone(),
            description: description.to_string(),
            impact,
            recorded_at: Utc::now(),
        };
        self.store.persist(&record).map_err(|e| match e {
            LedgerError::RegistrationFailed(_) => e,
            other => LedgerError::RegistrationFailed(other.to_string()),
        })?;
        Ok(confirmation_text(action_type, impact))
    }
}

fn confirmation_text(action_type: &ActionType, impact: Option<f64>) -> String {
    let impact = impact
        .map(|v| v.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    format!("Action '{action_type}' registered successfully. Impact: {impact}.")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Durable ledger storage using redb.
//!
//! # Table design
//!
//! ```text
//! ENTRIES       (actor_id, seq)            -> JSON LedgerEntry
//! ACTION_INDEX  (actor_id, reference_key)  -> seq of the Action entry
//! HEADS         actor_id                   -> (last seq, balance after it)
//! ```
//!
//! Tuple keys sort by actor first, then `seq`, so an actor's history is one
//! contiguous range scan in insertion order. Every insert runs in a single
//! write transaction that reads the head, checks the action index, writes the
//! entry and advances the head; redb serializes write transactions, so the
//! index is a real unique constraint even across concurrent callers.

use std::fmt::Display;
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::action::DedupKey;
use crate::error::{LedgerError, Result};
use crate::types::EntrySource;

use super::{EntryDraft, LedgerBackend, LedgerEntry};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const ENTRIES: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("entries");
const ACTION_INDEX: TableDefinition<(&str, &str), u64> = TableDefinition::new("action_index");
const HEADS: TableDefinition<&str, (u64, i64)> = TableDefinition::new("heads");

fn db_err(e: impl Display) -> LedgerError {
    LedgerError::LedgerDb(e.to_string())
}

// ---------------------------------------------------------------------------
// RedbLedger
// ---------------------------------------------------------------------------

pub struct RedbLedger {
    db: Database,
}

impl RedbLedger {
    /// Open or create the redb database at `path`.
    ///
    /// Creates all tables if they don't already exist.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        // Ensure the tables exist before any reads
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(ENTRIES).map_err(db_err)?;
        wt.open_table(ACTION_INDEX).map_err(db_err)?;
        wt.open_table(HEADS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    fn write_entry(wt: &WriteTransaction, draft: EntryDraft) -> Result<LedgerEntry> {
        let mut entries = wt.open_table(ENTRIES).map_err(db_err)?;
        let mut index = wt.open_table(ACTION_INDEX).map_err(db_err)?;
        let mut heads = wt.open_table(HEADS).map_err(db_err)?;

        let actor = draft.actor_id.clone();
        let is_action = draft.source == EntrySource::Action;
        if is_action {
            let existing = index
                .get((actor.as_str(), draft.reference_key.as_str()))
                .map_err(db_err)?
                .is_some();
            if existing {
                return Err(LedgerError::DuplicateAction(draft.reference_key));
            }
        }

        let (last_seq, balance) = heads
            .get(actor.as_str())
            .map_err(db_err)?
            .map(|head| head.value())
            .unwrap_or((0, 0));
        let entry = draft.seal(last_seq + 1, balance)?;

        let value = serde_json::to_vec(&entry)?;
        entries
            .insert((actor.as_str(), entry.seq), value.as_slice())
            .map_err(db_err)?;
        if is_action {
            index
                .insert((actor.as_str(), entry.reference_key.as_str()), entry.seq)
                .map_err(db_err)?;
        }
        heads
            .insert(actor.as_str(), (entry.seq, entry.balance_after))
            .map_err(db_err)?;
        Ok(entry)
    }
}

impl LedgerBackend for RedbLedger {
    fn insert(&self, draft: EntryDraft) -> Result<LedgerEntry> {
        let wt = self.db.begin_write().map_err(db_err)?;
        match Self::write_entry(&wt, draft) {
            Ok(entry) => {
                wt.commit().map_err(db_err)?;
                Ok(entry)
            }
            Err(e) => {
                wt.abort().map_err(db_err)?;
                Err(e)
            }
        }
    }

    fn find_action(&self, actor_id: &str, key: &DedupKey) -> Result<Option<LedgerEntry>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let index = rt.open_table(ACTION_INDEX).map_err(db_err)?;
        let Some(seq) = index
            .get((actor_id, key.as_str()))
            .map_err(db_err)?
            .map(|v| v.value())
        else {
            return Ok(None);
        };

        let entries = rt.open_table(ENTRIES).map_err(db_err)?;
        let Some(raw) = entries.get((actor_id, seq)).map_err(db_err)? else {
            return Err(LedgerError::LedgerDb(format!(
                "action index points at missing entry {actor_id}#{seq}"
            )));
        };
        let entry: LedgerEntry = serde_json::from_slice(raw.value())?;
        Ok(Some(entry))
    }

    fn balance_of(&self, actor_id: &str) -> Result<i64> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let heads = rt.open_table(HEADS).map_err(db_err)?;
        Ok(heads
            .get(actor_id)
            .map_err(db_err)?
            .map(|head| head.value().1)
            .unwrap_or(0))
    }

    fn entries_for(&self, actor_id: &str) -> Result<Vec<LedgerEntry>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(ENTRIES).map_err(db_err)?;

        let mut result = Vec::new();
        for item in table
            .range((actor_id, 0u64)..=(actor_id, u64::MAX))
            .map_err(db_err)?
        {
            let (_, v) = item.map_err(db_err)?;
            let entry: LedgerEntry = serde_json::from_slice(v.value())?;
            result.push(entry);
        }
        Ok(result)
    }

    fn actor_ids(&self) -> Result<Vec<String>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let heads = rt.open_table(HEADS).map_err(db_err)?;

        let mut result = Vec::new();
        for item in heads.iter().map_err(db_err)? {
            let (k, _) = item.map_err(db_err)?;
            result.push(k.value().to_string());
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! In-process ledger backend.
//!
//! Each actor has its own book behind its own mutex, so inserts for different
//! actors never contend beyond the brief map lookup.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use crate::action::DedupKey;
use crate::error::{LedgerError, Result};
use crate::types::EntrySource;

use super::{EntryDraft, LedgerBackend, LedgerEntry};

#[derive(Debug, Default)]
struct Book {
    entries: Vec<LedgerEntry>,
    /// Action reference key -> index into `entries`.
    actions: HashMap<String, usize>,
}

impl Book {
    fn balance(&self) -> i64 {
        self.entries.last().map(|e| e.balance_after).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    books: RwLock<BTreeMap<String, Arc<Mutex<Book>>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, actor_id: &str) -> Option<Arc<Mutex<Book>>> {
        self.books
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(actor_id)
            .cloned()
    }

    fn book_or_create(&self, actor_id: &str) -> Arc<Mutex<Book>> {
        if let Some(book) = self.book(actor_id) {
            return book;
        }
        self.books
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(actor_id.to_string())
            .or_default()
            .clone()
    }
}

impl LedgerBackend for MemoryLedger {
    fn insert(&self, draft: EntryDraft) -> Result<LedgerEntry> {
        let book = self.book_or_create(&draft.actor_id);
        let mut book = book.lock().unwrap_or_else(|e| e.into_inner());

        let is_action = draft.source == EntrySource::Action;
        if is_action && book.actions.contains_key(&draft.reference_key) {
            return Err(LedgerError::DuplicateAction(draft.reference_key));
        }

        let seq = book.entries.len() as u64 + 1;
        let entry = draft.seal(seq, book.balance())?;
        if is_action {
            let index = book.entries.len();
            book.actions.insert(entry.reference_key.clone(), index);
        }
        book.entries.push(entry.clone());
        Ok(entry)
    }

    fn find_action(&self, actor_id: &str, key: &DedupKey) -> Result<Option<LedgerEntry>> {
        let Some(book) = self.book(actor_id) else {
            return Ok(None);
        };
        let book = book.lock().unwrap_or_else(|e| e.into_inner());
        Ok(book
            .actions
            .get(key.as_str())
            .and_then(|&i| book.entries.get(i))
            .cloned())
    }

    fn balance_of(&self, actor_id: &str) -> Result<i64> {
        Ok(self
            .book(actor_id)
            .map(|book| book.lock().unwrap_or_else(|e| e.into_inner()).balance())
            .unwrap_or(0))
    }

    fn entries_for(&self, actor_id: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .book(actor_id)
            .map(|book| book.lock().unwrap_or_else(|e| e.into_inner()).entries.clone())
            .unwrap_or_default())
    }

    fn actor_ids(&self) -> Result<Vec<String>> {
        // A rejected first insert leaves an empty book behind.
        Ok(self
            .books
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, book)| {
                !book
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .entries
                    .is_empty()
            })
            .map(|(id, _)| id.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionType;

    #[test]
    fn empty_actor_has_zero_balance_and_no_entries() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.balance_of("alice").unwrap(), 0);
        assert!(ledger.entries_for("alice").unwrap().is_empty());
        assert!(ledger.actor_ids().unwrap().is_empty());
    }

    #[test]
    fn rejected_insert_does_not_create_entries() {
        let ledger = MemoryLedger::new();
        let err = ledger
            .insert(EntryDraft::redemption("alice", 5, "too early"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert!(ledger.entries_for("alice").unwrap().is_empty());
    }

    #[test]
    fn rejected_first_insert_does_not_list_actor() {
        let ledger = MemoryLedger::new();
        ledger
            .insert(EntryDraft::redemption("ghost", 5, "nothing earned"))
            .unwrap_err();
        assert!(ledger.actor_ids().unwrap().is_empty());

        ledger
            .insert(EntryDraft::adjustment("alice", 3, "welcome"))
            .unwrap();
        assert_eq!(ledger.actor_ids().unwrap(), vec!["alice"]);
    }

    #[test]
    fn bonus_reference_does_not_occupy_action_index() {
        let ledger = MemoryLedger::new();
        let key = DedupKey::derive("alice", &ActionType::TreePlanting, "1 sapling");
        ledger
            .insert(EntryDraft::action(
                "alice",
                &key,
                ActionType::TreePlanting,
                25,
                "ok",
            ))
            .unwrap();
        ledger
            .insert(EntryDraft::bonus("alice", &key, ActionType::TreePlanting, 5))
            .unwrap();

        let found = ledger.find_action("alice", &key).unwrap().unwrap();
        assert_eq!(found.source, EntrySource::Action);
        assert_eq!(ledger.balance_of("alice").unwrap(), 30);
    }
}

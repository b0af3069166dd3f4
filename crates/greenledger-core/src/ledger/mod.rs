//! Append-only token ledger.
//!
//! The ledger is the only authority for an actor's balance. Every entry is an
//! immutable fact carrying the running `balance_after`, so the balance at any
//! point in history can be rebuilt by summing amounts in `seq` order.
//!
//! `Ledger` wraps a `LedgerBackend` (in-memory or redb) and adds:
//! - per-actor serialization of appends, so balances are computed and
//!   projected in order without blocking other actors;
//! - per-dedup-key serialization for the gate's check-then-act sequence;
//! - verification and projection rebuild over the stored history.

pub mod memory;
pub mod redb_store;

use crate::action::DedupKey;
use crate::actor::BalanceProjection;
use crate::error::{LedgerError, Result};
use crate::types::{ActionType, EntryKind, EntrySource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub use self::memory::MemoryLedger;
pub use self::redb_store::RedbLedger;

// ---------------------------------------------------------------------------
// LedgerEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    /// 1-based position in the actor's history.
    pub seq: u64,
    pub actor_id: String,
    /// Signed: positive for credits, negative for debits.
    pub amount: i64,
    pub kind: EntryKind,
    pub source: EntrySource,
    /// Dedup key for `Action` entries; a derived or generated reference otherwise.
    pub reference_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub balance_after: i64,
}

impl LedgerEntry {
    /// One-line human summary, e.g. `Earned 25 tokens - sustainable action`.
    pub fn describe(&self) -> String {
        let verb = match self.kind {
            EntryKind::Credit => "Earned",
            EntryKind::Debit => "Spent",
        };
        format!(
            "{verb} {} tokens - {}",
            self.amount.unsigned_abs(),
            self.source.label()
        )
    }
}

// ---------------------------------------------------------------------------
// EntryDraft
// ---------------------------------------------------------------------------

/// An entry before the ledger assigns its id, sequence, timestamp and balance.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub actor_id: String,
    pub amount: i64,
    pub source: EntrySource,
    pub reference_key: String,
    pub action_type: Option<ActionType>,
    pub description: String,
}

impl EntryDraft {
    /// The base credit for a registered action. Its reference key is the
    /// action's dedup key, which the backend indexes uniquely.
    pub fn action(
        actor_id: impl Into<String>,
        key: &DedupKey,
        action_type: ActionType,
        tokens: i64,
        confirmation: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            amount: tokens,
            source: EntrySource::Action,
            reference_key: key.as_str().to_string(),
            action_type: Some(action_type),
            description: confirmation.into(),
        }
    }

    pub fn bonus(
        actor_id: impl Into<String>,
        key: &DedupKey,
        action_type: ActionType,
        tokens: i64,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            amount: tokens,
            source: EntrySource::Bonus,
            reference_key: format!("{key}:bonus"),
            description: format!("Bonus for high-impact action: {action_type}"),
            action_type: Some(action_type),
        }
    }

    /// Spend `cost` tokens on a reward. `cost` is given as a positive number.
    pub fn redemption(
        actor_id: impl Into<String>,
        cost: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            amount: cost.saturating_neg(),
            source: EntrySource::Reward,
            reference_key: format!("reward:{}", Uuid::new_v4()),
            action_type: None,
            description: description.into(),
        }
    }

    /// Signed administrative correction.
    pub fn adjustment(
        actor_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            amount,
            source: EntrySource::Admin,
            reference_key: format!("admin:{}", Uuid::new_v4()),
            action_type: None,
            description: description.into(),
        }
    }

    /// Turn the draft into an entry positioned after `balance_before`.
    ///
    /// Shared by every backend so the balance rules are identical regardless
    /// of storage. Callers must hold whatever lock makes `seq` and
    /// `balance_before` current.
    pub(crate) fn seal(self, seq: u64, balance_before: i64) -> Result<LedgerEntry> {
        match self.source {
            EntrySource::Action | EntrySource::Bonus if self.amount < 0 => {
                return Err(LedgerError::InvalidRequest(format!(
                    "{} entries cannot debit ({})",
                    self.source, self.amount
                )));
            }
            EntrySource::Reward if self.amount >= 0 => {
                return Err(LedgerError::InvalidRequest(
                    "reward redemption cost must be positive".to_string(),
                ));
            }
            _ => {}
        }
        let balance_after = balance_before.checked_add(self.amount).ok_or_else(|| {
            LedgerError::InvalidRequest(format!("amount {} overflows balance", self.amount))
        })?;
        if self.amount < 0 && balance_after < 0 {
            return Err(LedgerError::InsufficientBalance {
                actor: self.actor_id,
                balance: balance_before,
                requested: self.amount.unsigned_abs(),
            });
        }
        Ok(LedgerEntry {
            id: Uuid::new_v4(),
            seq,
            kind: EntryKind::for_amount(self.amount),
            actor_id: self.actor_id,
            amount: self.amount,
            source: self.source,
            reference_key: self.reference_key,
            action_type: self.action_type,
            description: self.description,
            timestamp: Utc::now(),
            balance_after,
        })
    }
}

// ---------------------------------------------------------------------------
// LedgerBackend
// ---------------------------------------------------------------------------

/// Storage for ledger entries.
///
/// `insert` must be atomic: the duplicate check on `Action` reference keys,
/// the balance computation and the write happen as one unit, so a concurrent
/// insert with the same key fails with `DuplicateAction` rather than
/// crediting twice.
pub trait LedgerBackend: Send + Sync {
    fn insert(&self, draft: EntryDraft) -> Result<LedgerEntry>;

    /// The `Action` entry recorded under `key` for this actor, if any.
    fn find_action(&self, actor_id: &str, key: &DedupKey) -> Result<Option<LedgerEntry>>;

    /// Balance after the actor's latest entry (0 with no history).
    fn balance_of(&self, actor_id: &str) -> Result<i64>;

    /// All of the actor's entries in `seq` order.
    fn entries_for(&self, actor_id: &str) -> Result<Vec<LedgerEntry>>;

    /// Every actor with at least one entry.
    fn actor_ids(&self) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// KeyedLocks
// ---------------------------------------------------------------------------

/// One mutex per key, created on demand and dropped once nobody holds it.
#[derive(Default)]
struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn with<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(key.to_string()).or_default().clone()
        };
        let out = {
            let _held = slot.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map and this call still reference the slot.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        out
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

// ---------------------------------------------------------------------------
// LedgerAudit
// ---------------------------------------------------------------------------

/// Result of replaying an actor's history against the stored balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub actor_id: String,
    pub entries: usize,
    pub derived_balance: i64,
    pub stored_balance: i64,
    pub issues: Vec<String>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct Ledger {
    backend: Box<dyn LedgerBackend>,
    actor_locks: KeyedLocks,
    key_locks: KeyedLocks,
}

impl Ledger {
    pub fn new(backend: impl LedgerBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            actor_locks: KeyedLocks::default(),
            key_locks: KeyedLocks::default(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryLedger::new())
    }

    /// Open or create the redb ledger at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(RedbLedger::open(path)?))
    }

    /// Append an entry and push the resulting balance into `projection`.
    ///
    /// The entry is permanent once the backend accepts it. If the projection
    /// then fails, the error is returned and the cached total can be repaired
    /// with `rebuild_projection`.
    pub fn append(
        &self,
        draft: EntryDraft,
        projection: &dyn BalanceProjection,
    ) -> Result<LedgerEntry> {
        let actor_id = draft.actor_id.clone();
        self.actor_locks.with(&actor_id, || {
            let entry = self.backend.insert(draft)?;
            tracing::debug!(
                actor = %entry.actor_id,
                seq = entry.seq,
                amount = entry.amount,
                source = %entry.source,
                balance_after = entry.balance_after,
                "ledger entry appended"
            );
            if let Err(e) = projection.project(&entry.actor_id, entry.balance_after) {
                tracing::error!(
                    actor = %entry.actor_id,
                    seq = entry.seq,
                    error = %e,
                    "entry committed but balance projection failed"
                );
                return Err(e);
            }
            Ok(entry)
        })
    }

    /// Run `f` while holding the lock for `key`, serializing every
    /// check-then-append sequence on the same logical action.
    pub fn with_key_guard<T>(&self, key: &DedupKey, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.key_locks.with(key.as_str(), f)
    }

    pub fn find_action(&self, actor_id: &str, key: &DedupKey) -> Result<Option<LedgerEntry>> {
        self.backend.find_action(actor_id, key)
    }

    pub fn find_by_dedup_key(
        &self,
        actor_id: &str,
        action_type: &ActionType,
        description: &str,
    ) -> Result<Option<LedgerEntry>> {
        let key = DedupKey::derive(actor_id, action_type, description);
        self.backend.find_action(actor_id, &key)
    }

    pub fn balance_of(&self, actor_id: &str) -> Result<i64> {
        self.backend.balance_of(actor_id)
    }

    pub fn history(&self, actor_id: &str) -> Result<Vec<LedgerEntry>> {
        self.backend.entries_for(actor_id)
    }

    pub fn actor_ids(&self) -> Result<Vec<String>> {
        self.backend.actor_ids()
    }

    /// Replay the actor's history and compare it with the stored balance.
    pub fn verify(&self, actor_id: &str) -> Result<LedgerAudit> {
        let entries = self.backend.entries_for(actor_id)?;
        let stored_balance = self.backend.balance_of(actor_id)?;
        let mut issues = Vec::new();
        let mut running: i64 = 0;

        for (i, entry) in entries.iter().enumerate() {
            let expected_seq = i as u64 + 1;
            if entry.seq != expected_seq {
                issues.push(format!(
                    "entry {} has seq {}, expected {expected_seq}",
                    entry.id, entry.seq
                ));
            }
            if entry.kind != EntryKind::for_amount(entry.amount) {
                issues.push(format!(
                    "seq {}: kind {} does not match amount {}",
                    entry.seq, entry.kind, entry.amount
                ));
            }
            running = running.saturating_add(entry.amount);
            if entry.balance_after != running {
                issues.push(format!(
                    "seq {}: balance_after {} but replay gives {running}",
                    entry.seq, entry.balance_after
                ));
            }
            if running < 0 {
                issues.push(format!("seq {}: balance went negative ({running})", entry.seq));
            }
        }

        if running != stored_balance {
            issues.push(format!(
                "stored balance {stored_balance} differs from replayed balance {running}"
            ));
        }

        Ok(LedgerAudit {
            actor_id: actor_id.to_string(),
            entries: entries.len(),
            derived_balance: running,
            stored_balance,
            issues,
        })
    }

    /// Overwrite every known actor's cached total with the ledger balance.
    ///
    /// Actors the projection doesn't know are skipped with a warning. Returns
    /// the number of actors projected.
    pub fn rebuild_projection(&self, projection: &dyn BalanceProjection) -> Result<usize> {
        let mut projected = 0;
        for actor_id in self.backend.actor_ids()? {
            let projected_now = self.actor_locks.with(&actor_id, || {
                let balance = self.backend.balance_of(&actor_id)?;
                match projection.project(&actor_id, balance) {
                    Ok(()) => Ok(true),
                    Err(LedgerError::ActorNotFound(_)) => {
                        tracing::warn!(actor = %actor_id, "ledger actor missing from actor store");
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            })?;
            if projected_now {
                projected += 1;
            }
        }
        Ok(projected)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

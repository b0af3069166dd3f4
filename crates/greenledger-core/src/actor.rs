//! Actor lookup and balance projection.
//!
//! Actors live in an external store. The core only needs an id, an
//! authorization flag, and a way to push the ledger-derived balance back into
//! the store's cached total. `MemoryActors` serves tests and embedding;
//! `ActorFile` backs the CLI with `.greenledger/actors.yaml`.

use crate::error::{LedgerError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub authorized: bool,
    /// Cached total. The ledger is authoritative; this is a projection of it.
    pub balance: i64,
}

impl Actor {
    pub fn authorized(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authorized: true,
            balance: 0,
        }
    }

    pub fn unauthorized(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authorized: false,
            balance: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Capability to overwrite an actor's cached balance with the ledger's value.
pub trait BalanceProjection: Send + Sync {
    fn project(&self, actor_id: &str, balance: i64) -> Result<()>;
}

pub trait ActorDirectory: Send + Sync {
    fn lookup(&self, actor_id: &str) -> Result<Actor>;

    /// The store's balance-update capability, if it has one.
    fn balance_projection(&self) -> Option<&dyn BalanceProjection> {
        None
    }
}

// ---------------------------------------------------------------------------
// MemoryActors
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryActors {
    actors: RwLock<BTreeMap<String, Actor>>,
}

impl MemoryActors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(actors: impl IntoIterator<Item = Actor>) -> Self {
        let map = actors.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self {
            actors: RwLock::new(map),
        }
    }

    pub fn set_authorized(&self, actor_id: &str, authorized: bool) -> Result<()> {
        let mut actors = self.actors.write().unwrap_or_else(|e| e.into_inner());
        let actor = actors
            .get_mut(actor_id)
            .ok_or_else(|| LedgerError::ActorNotFound(actor_id.to_string()))?;
        actor.authorized = authorized;
        Ok(())
    }
}

impl ActorDirectory for MemoryActors {
    fn lookup(&self, actor_id: &str) -> Result<Actor> {
        self.actors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(actor_id)
            .cloned()
            .ok_or_else(|| LedgerError::ActorNotFound(actor_id.to_string()))
    }

    fn balance_projection(&self) -> Option<&dyn BalanceProjection> {
        Some(self)
    }
}

impl BalanceProjection for MemoryActors {
    fn project(&self, actor_id: &str, balance: i64) -> Result<()> {
        let mut actors = self.actors.write().unwrap_or_else(|e| e.into_inner());
        let actor = actors
            .get_mut(actor_id)
            .ok_or_else(|| LedgerError::ActorNotFound(actor_id.to_string()))?;
        actor.balance = balance;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ActorFile (actors.yaml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRecord {
    pub id: String,
    pub authorized: bool,
    #[serde(default)]
    pub total_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActorRecord {
    fn to_actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            authorized: self.authorized,
            balance: self.total_points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActorFileData {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    actors: Vec<ActorRecord>,
}

fn default_version() -> u32 {
    1
}

/// YAML-backed actor directory.
///
/// Nothing is cached between calls. Reads parse the file fresh, and every
/// mutation re-reads it under `write_lock`, applies the change and rewrites
/// the whole file atomically. Across processes the CLI holds the ledger
/// database open around mutations.
#[derive(Debug)]
pub struct ActorFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ActorFile {
    /// Write an empty actor file if none exists. Returns true if written.
    pub fn init(root: &Path) -> Result<bool> {
        let empty = ActorFileData {
            version: 1,
            actors: Vec::new(),
        };
        let data = serde_yaml::to_string(&empty)?;
        crate::io::write_if_missing(&paths::actors_path(root), data.as_bytes())
    }

    pub fn load(root: &Path) -> Result<Self> {
        let file = Self {
            path: paths::actors_path(root),
            write_lock: Mutex::new(()),
        };
        // Fail early on a missing or unreadable file.
        file.read()?;
        Ok(file)
    }

    pub fn add(&self, id: &str, authorized: bool) -> Result<Actor> {
        paths::validate_actor_id(id)?;
        self.modify(|data| {
            if data.actors.iter().any(|a| a.id == id) {
                return Err(LedgerError::ActorExists(id.to_string()));
            }
            let now = Utc::now();
            let record = ActorRecord {
                id: id.to_string(),
                authorized,
                total_points: 0,
                created_at: now,
                updated_at: now,
            };
            let actor = record.to_actor();
            data.actors.push(record);
            Ok((actor, true))
        })
    }

    pub fn set_authorized(&self, id: &str, authorized: bool) -> Result<Actor> {
        self.modify(|data| {
            let record = find_mut(data, id)?;
            record.authorized = authorized;
            record.updated_at = Utc::now();
            Ok((record.to_actor(), true))
        })
    }

    pub fn list(&self) -> Result<Vec<Actor>> {
        let data = self.read()?;
        Ok(data.actors.iter().map(ActorRecord::to_actor).collect())
    }

    fn read(&self) -> Result<ActorFileData> {
        if !self.path.exists() {
            return Err(LedgerError::NotInitialized);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Read-modify-write under the write lock. `f` returns its result and
    /// whether the file needs rewriting.
    fn modify<T>(&self, f: impl FnOnce(&mut ActorFileData) -> Result<(T, bool)>) -> Result<T> {
        let _held = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut data = self.read()?;
        let (out, changed) = f(&mut data)?;
        if changed {
            let raw = serde_yaml::to_string(&data)?;
            crate::io::atomic_write(&self.path, raw.as_bytes())?;
        }
        Ok(out)
    }
}

fn find_mut<'a>(data: &'a mut ActorFileData, id: &str) -> Result<&'a mut ActorRecord> {
    data.actors
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| LedgerError::ActorNotFound(id.to_string()))
}

impl ActorDirectory for ActorFile {
    fn lookup(&self, actor_id: &str) -> Result<Actor> {
        self.read()?
            .actors
            .iter()
            .find(|a| a.id == actor_id)
            .map(ActorRecord::to_actor)
            .ok_or_else(|| LedgerError::ActorNotFound(actor_id.to_string()))
    }

    fn balance_projection(&self) -> Option<&dyn BalanceProjection> {
        Some(self)
    }
}

impl BalanceProjection for ActorFile {
    fn project(&self, actor_id: &str, balance: i64) -> Result<()> {
        self.modify(|data| {
            let record = find_mut(data, actor_id)?;
            if record.total_points == balance {
                return Ok(((), false));
            }
            record.total_points = balance;
            record.updated_at = Utc::now();
            Ok(((), true))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

pub mod actor;
pub mod config;
pub mod init;
pub mod ledger;
pub mod register;
pub mod reward;
pub mod strategies;

use anyhow::Context;
use greenledger_core::{actor::ActorFile, config::Config, ledger::Ledger, paths};
use std::path::Path;
use std::sync::Arc;

/// Everything a command needs from an initialized project.
pub struct Project {
    pub config: Config,
    pub actors: Arc<ActorFile>,
    pub ledger: Arc<Ledger>,
}

impl Project {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root).context("failed to load config")?;
        let actors = ActorFile::load(root).context("failed to load actors")?;
        let ledger_path = paths::ledger_path(root);
        let ledger = Ledger::open(&ledger_path)
            .with_context(|| format!("failed to open ledger at {}", ledger_path.display()))?;
        Ok(Self {
            config,
            actors: Arc::new(actors),
            ledger: Arc::new(ledger),
        })
    }
}

/// Open the ledger for its file lock only.
///
/// redb keeps `ledger.redb` exclusively locked while a handle is open. Holding
/// one around a rewrite of a YAML store serializes it against `register` and
/// every other command that writes.
pub fn writer_lock(root: &Path) -> anyhow::Result<Ledger> {
    let ledger_path = paths::ledger_path(root);
    Ledger::open(&ledger_path).with_context(|| {
        format!(
            "failed to lock {} (is another greenledger command running?)",
            ledger_path.display()
        )
    })
}

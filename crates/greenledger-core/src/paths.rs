use crate::error::{LedgerError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const GREENLEDGER_DIR: &str = ".greenledger";

pub const CONFIG_FILE: &str = ".greenledger/config.yaml";
pub const ACTORS_FILE: &str = ".greenledger/actors.yaml";
pub const ACTIONS_FILE: &str = ".greenledger/actions.jsonl";
pub const LEDGER_FILE: &str = ".greenledger/ledger.redb";
pub const REWARDS_FILE: &str = ".greenledger/rewards.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn greenledger_dir(root: &Path) -> PathBuf {
    root.join(GREENLEDGER_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn actors_path(root: &Path) -> PathBuf {
    root.join(ACTORS_FILE)
}

pub fn actions_path(root: &Path) -> PathBuf {
    root.join(ACTIONS_FILE)
}

pub fn ledger_path(root: &Path) -> PathBuf {
    root.join(LEDGER_FILE)
}

pub fn rewards_path(root: &Path) -> PathBuf {
    root.join(REWARDS_FILE)
}

// ---------------------------------------------------------------------------
// Actor id validation
// ---------------------------------------------------------------------------

static ACTOR_ID_RE: OnceLock<Regex> = OnceLock::new();

fn actor_id_re() -> &'static Regex {
    ACTOR_ID_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9._\-]*[a-z0-9]$|^[a-z0-9]$").expect("static regex")
    })
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && actor_id_re().is_match(id)
}

pub fn validate_actor_id(id: &str) -> Result<()> {
    if !is_valid_id(id) {
        return Err(LedgerError::InvalidActorId(id.to_string()));
    }
    Ok(())
}

/// Reward ids follow the actor id rules.
pub fn validate_reward_id(id: &str) -> Result<()> {
    if !is_valid_id(id) {
        return Err(LedgerError::InvalidRequest(format!(
            "invalid reward id '{id}': must be lowercase alphanumeric with '-', '_' or '.'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

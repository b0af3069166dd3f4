//! Reward catalog: what actors can spend their tokens on.
//!
//! Rewards live in `.greenledger/rewards.yaml`. Redeeming one appends a
//! `Reward` debit to the ledger and takes one unit out of stock. The ledger
//! entry is the durable record of the redemption; the catalog only tracks
//! what is still on offer.

use crate::actor::BalanceProjection;
use crate::error::{LedgerError, Result};
use crate::ledger::{EntryDraft, Ledger};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RewardKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Badge,
    Discount,
    Prize,
    Benefit,
}

impl RewardKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RewardKind::Badge => "badge",
            RewardKind::Discount => "discount",
            RewardKind::Prize => "prize",
            RewardKind::Benefit => "benefit",
        }
    }
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RewardKind {
    type Err = LedgerError;

    /// Accepts the English names and the legacy tags (`Medalha`, `Desconto`,
    /// `Prêmio`, `Benefício`), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "badge" | "medalha" => Ok(RewardKind::Badge),
            "discount" | "desconto" => Ok(RewardKind::Discount),
            "prize" | "premio" | "prêmio" => Ok(RewardKind::Prize),
            "benefit" | "beneficio" | "benefício" => Ok(RewardKind::Benefit),
            other => Err(LedgerError::InvalidRequest(format!(
                "unknown reward kind '{other}' (badge, discount, prize, benefit)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Reward
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: RewardKind,
    /// Tokens debited per redemption.
    pub required_points: i64,
    /// Units left. `UNLIMITED_STOCK` never runs out.
    #[serde(default = "default_stock")]
    pub stock: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const UNLIMITED_STOCK: i64 = -1;

fn default_stock() -> i64 {
    UNLIMITED_STOCK
}

fn default_active() -> bool {
    true
}

impl Reward {
    pub fn has_stock(&self) -> bool {
        self.stock == UNLIMITED_STOCK || self.stock > 0
    }

    pub fn is_available(&self) -> bool {
        self.active && self.has_stock()
    }

    pub fn can_be_redeemed_by(&self, balance: i64) -> bool {
        self.is_available() && balance >= self.required_points
    }

    /// Take one unit out of stock. Unlimited rewards are left alone.
    fn take_one(&mut self) {
        if self.stock > 0 {
            self.stock -= 1;
        }
    }
}

/// Parameters for a new catalog entry.
#[derive(Debug, Clone)]
pub struct NewReward {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: RewardKind,
    pub required_points: i64,
    pub stock: i64,
}

impl NewReward {
    fn validate(&self) -> Result<()> {
        paths::validate_reward_id(&self.id)?;
        if self.name.trim().is_empty() {
            return Err(LedgerError::InvalidRequest(
                "reward name must not be empty".to_string(),
            ));
        }
        if self.required_points <= 0 {
            return Err(LedgerError::InvalidRequest(format!(
                "required points must be positive, got {}",
                self.required_points
            )));
        }
        if self.stock < UNLIMITED_STOCK {
            return Err(LedgerError::InvalidRequest(format!(
                "stock must be {UNLIMITED_STOCK} (unlimited) or more, got {}",
                self.stock
            )));
        }
        Ok(())
    }
}

/// Outcome of a successful redemption.
#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
    pub id: Uuid,
    pub actor_id: String,
    pub reward_id: String,
    pub reward_name: String,
    pub points_spent: i64,
    pub balance_after: i64,
    /// Stock after this redemption; `UNLIMITED_STOCK` when unlimited.
    pub stock_left: i64,
    pub reference_key: String,
    pub redeemed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RewardCatalog (rewards.yaml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogData {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    rewards: Vec<Reward>,
}

fn default_version() -> u32 {
    1
}

/// YAML-backed catalog. Like `ActorFile`, every change re-reads the file
/// under `write_lock` and rewrites it atomically.
#[derive(Debug)]
pub struct RewardCatalog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RewardCatalog {
    /// Write an empty catalog if none exists. Returns true if written.
    pub fn init(root: &Path) -> Result<bool> {
        let empty = CatalogData {
            version: 1,
            rewards: Vec::new(),
        };
        let data = serde_yaml::to_string(&empty)?;
        crate::io::write_if_missing(&paths::rewards_path(root), data.as_bytes())
    }

    pub fn load(root: &Path) -> Result<Self> {
        let catalog = Self {
            path: paths::rewards_path(root),
            write_lock: Mutex::new(()),
        };
        catalog.read()?;
        Ok(catalog)
    }

    pub fn add(&self, new: NewReward) -> Result<Reward> {
        new.validate()?;
        self.modify(|data| {
            if data.rewards.iter().any(|r| r.id == new.id) {
                return Err(LedgerError::RewardExists(new.id.clone()));
            }
            let now = Utc::now();
            let reward = Reward {
                id: new.id,
                name: new.name.trim().to_string(),
                description: new.description,
                kind: new.kind,
                required_points: new.required_points,
                stock: new.stock,
                active: true,
                created_at: now,
                updated_at: now,
            };
            data.rewards.push(reward.clone());
            Ok(reward)
        })
    }

    /// Every reward, cheapest first, then by name.
    pub fn list(&self) -> Result<Vec<Reward>> {
        let mut rewards = self.read()?.rewards;
        rewards.sort_by(|a, b| {
            a.required_points
                .cmp(&b.required_points)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(rewards)
    }

    pub fn get(&self, id: &str) -> Result<Reward> {
        self.read()?
            .rewards
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| LedgerError::RewardNotFound(id.to_string()))
    }

    pub fn set_active(&self, id: &str, active: bool) -> Result<Reward> {
        self.modify(|data| {
            let reward = find_mut(data, id)?;
            reward.active = active;
            reward.updated_at = Utc::now();
            Ok(reward.clone())
        })
    }

    /// Replace the stock count, e.g. after a delivery of new vouchers.
    pub fn restock(&self, id: &str, stock: i64) -> Result<Reward> {
        if stock < UNLIMITED_STOCK {
            return Err(LedgerError::InvalidRequest(format!(
                "stock must be {UNLIMITED_STOCK} (unlimited) or more, got {stock}"
            )));
        }
        self.modify(|data| {
            let reward = find_mut(data, id)?;
            reward.stock = stock;
            reward.updated_at = Utc::now();
            Ok(reward.clone())
        })
    }

    /// Spend `actor_id`'s tokens on `reward_id`.
    ///
    /// Availability is checked and stock decremented under the catalog lock,
    /// so two redemptions through one catalog cannot both take the last unit.
    /// The ledger's balance guard decides whether the actor can afford it; a
    /// rejected debit leaves stock untouched.
    pub fn redeem(
        &self,
        ledger: &Ledger,
        projection: &dyn BalanceProjection,
        actor_id: &str,
        reward_id: &str,
    ) -> Result<Redemption> {
        self.modify(|data| {
            let reward = find_mut(data, reward_id)?;
            if !reward.is_available() {
                return Err(LedgerError::RewardUnavailable(reward.id.clone()));
            }

            let id = Uuid::new_v4();
            let draft = EntryDraft {
                reference_key: format!("reward:{}:{id}", reward.id),
                ..EntryDraft::redemption(
                    actor_id,
                    reward.required_points,
                    format!("Redeemed '{}'", reward.name),
                )
            };
            let entry = ledger.append(draft, projection)?;

            reward.take_one();
            reward.updated_at = entry.timestamp;
            tracing::info!(
                actor = %actor_id,
                reward = %reward.id,
                points = reward.required_points,
                stock_left = reward.stock,
                "reward redeemed"
            );
            Ok(Redemption {
                id,
                actor_id: entry.actor_id,
                reward_id: reward.id.clone(),
                reward_name: reward.name.clone(),
                points_spent: reward.required_points,
                balance_after: entry.balance_after,
                stock_left: reward.stock,
                reference_key: entry.reference_key,
                redeemed_at: entry.timestamp,
            })
        })
    }

    fn read(&self) -> Result<CatalogData> {
        if !self.path.exists() {
            return Err(LedgerError::NotInitialized);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Read-modify-write under the write lock. Nothing is written when `f`
    /// fails.
    fn modify<T>(&self, f: impl FnOnce(&mut CatalogData) -> Result<T>) -> Result<T> {
        let _held = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut data = self.read()?;
        let out = f(&mut data)?;
        let raw = serde_yaml::to_string(&data)?;
        crate::io::atomic_write(&self.path, raw.as_bytes())?;
        Ok(out)
    }
}

fn find_mut<'a>(data: &'a mut CatalogData, id: &str) -> Result<&'a mut Reward> {
    data.rewards
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| LedgerError::RewardNotFound(id.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

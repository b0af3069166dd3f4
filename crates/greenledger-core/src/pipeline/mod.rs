//! Reward pipeline: ordered middleware around the base award.
//!
//! Each stage receives the request plus a `Next` handle for the rest of the
//! chain and must return the token amount the chain below it produced. The
//! first stage in the list is the outermost. When the list is exhausted,
//! `Next::run` performs the base step: resolve the strategy and append the
//! `Action` credit.
//!
//! ```text
//! Logging ─▶ Bonus ─▶ base (strategy lookup + Action append)
//! ```
//!
//! Stages never touch balances directly. Anything they credit goes through
//! `Ledger::append`, and every appended entry is recorded on the context so
//! the caller can report it.

pub mod bonus;
pub mod logging;

use std::cell::RefCell;

use crate::action::{ActionRequest, DedupKey};
use crate::actor::BalanceProjection;
use crate::config::{Config, StageKind};
use crate::error::Result;
use crate::ledger::{EntryDraft, Ledger, LedgerEntry};
use crate::strategy::StrategyRegistry;

pub use self::bonus::BonusStage;
pub use self::logging::LoggingStage;

// ---------------------------------------------------------------------------
// AwardContext
// ---------------------------------------------------------------------------

/// Everything a stage may need for one request.
pub struct AwardContext<'a> {
    pub ledger: &'a Ledger,
    pub projection: &'a dyn BalanceProjection,
    pub strategies: &'a StrategyRegistry,
    pub key: &'a DedupKey,
    /// Registrar confirmation, stored on the `Action` entry.
    pub confirmation: &'a str,
    appended: RefCell<Vec<LedgerEntry>>,
}

impl<'a> AwardContext<'a> {
    pub fn new(
        ledger: &'a Ledger,
        projection: &'a dyn BalanceProjection,
        strategies: &'a StrategyRegistry,
        key: &'a DedupKey,
        confirmation: &'a str,
    ) -> Self {
        Self {
            ledger,
            projection,
            strategies,
            key,
            confirmation,
            appended: RefCell::new(Vec::new()),
        }
    }

    /// Append through the ledger and remember the entry.
    pub fn append(&self, draft: EntryDraft) -> Result<LedgerEntry> {
        let entry = self.ledger.append(draft, self.projection)?;
        self.appended.borrow_mut().push(entry.clone());
        Ok(entry)
    }

    /// Entries appended so far, in order.
    #[cfg(test)]
    pub fn appended(&self) -> Vec<LedgerEntry> {
        self.appended.borrow().clone()
    }

    pub fn into_appended(self) -> Vec<LedgerEntry> {
        self.appended.into_inner()
    }
}

// ---------------------------------------------------------------------------
// RewardStage / Next
// ---------------------------------------------------------------------------

pub trait RewardStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Award tokens for `request`, delegating to `next` for the inner chain.
    /// The returned amount must be what `next` returned.
    fn award(&self, ctx: &AwardContext<'_>, request: &ActionRequest, next: Next<'_>)
        -> Result<i64>;
}

/// The remainder of the chain below the current stage.
pub struct Next<'a> {
    rest: &'a [Box<dyn RewardStage>],
}

impl Next<'_> {
    pub fn run(self, ctx: &AwardContext<'_>, request: &ActionRequest) -> Result<i64> {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.award(ctx, request, Next { rest }),
            None => base_award(ctx, request),
        }
    }
}

/// Innermost step. Unknown action types earn 0 and still get an `Action`
/// entry, so the action is recorded and deduplicated like any other.
fn base_award(ctx: &AwardContext<'_>, request: &ActionRequest) -> Result<i64> {
    let tokens = ctx
        .strategies
        .base_tokens(&request.action_type, request.impact);
    if let Some(requested) = request.requested_tokens {
        if requested != tokens {
            tracing::debug!(
                actor = %request.actor_id,
                requested,
                awarded = tokens,
                "requested tokens differ from strategy amount"
            );
        }
    }
    ctx.append(EntryDraft::action(
        request.actor_id.as_str(),
        ctx.key,
        request.action_type.clone(),
        tokens,
        ctx.confirmation,
    ))?;
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn RewardStage>>,
}

impl Pipeline {
    /// No stages: only the base award runs.
    pub fn bare() -> Self {
        Self::default()
    }

    /// Add `stage` inside the stages already present.
    pub fn with_stage(mut self, stage: impl RewardStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Logging, then a bonus of 5 for base awards of 20 or more.
    pub fn standard() -> Self {
        Self::bare()
            .with_stage(LoggingStage)
            .with_stage(BonusStage::new(20, 5))
    }

    pub fn from_config(config: &Config) -> Self {
        let bonus = &config.rewards.bonus;
        let mut pipeline = Self::bare();
        for kind in &config.pipeline.stages {
            match kind {
                StageKind::Logging => pipeline = pipeline.with_stage(LoggingStage),
                StageKind::Bonus if bonus.enabled => {
                    pipeline = pipeline.with_stage(BonusStage::new(bonus.threshold, bonus.amount))
                }
                StageKind::Bonus => {
                    tracing::debug!("bonus stage skipped: rewards.bonus.enabled is false");
                }
            }
        }
        pipeline
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, ctx: &AwardContext<'_>, request: &ActionRequest) -> Result<i64> {
        Next {
            rest: &self.stages,
        }
        .run(ctx, request)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, MemoryActors};
    use crate::types::{ActionType, EntrySource};
    use std::sync::{Arc, Mutex};

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RewardStage for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn award(
            &self,
            ctx: &AwardContext<'_>,
            request: &ActionRequest,
            next: Next<'_>,
        ) -> Result<i64> {
            self.log.lock().unwrap().push(format!("{} in", self.label));
            let tokens = next.run(ctx, request)?;
            self.log
                .lock()
                .unwrap()
                .push(format!("{} out {tokens}", self.label));
            Ok(tokens)
        }
    }

    fn run(pipeline: &Pipeline, ledger: &Ledger, request: &ActionRequest) -> (i64, Vec<LedgerEntry>) {
        let actors = MemoryActors::with([Actor::authorized("alice")]);
        let strategies = StrategyRegistry::standard();
        let key = request.dedup_key();
        let ctx = AwardContext::new(ledger, &actors, &strategies, &key, "ok");
        let tokens = pipeline.run(&ctx, request).unwrap();
        (tokens, ctx.into_appended())
    }

    #[test]
    fn stages_run_outermost_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::bare()
            .with_stage(Recorder {
                label: "outer",
                log: Arc::clone(&log),
            })
            .with_stage(Recorder {
                label: "inner",
                log: Arc::clone(&log),
            });
        let request = ActionRequest::new("alice", ActionType::Recycling, "5kg plastic");
        run(&pipeline, &Ledger::in_memory(), &request);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer in", "inner in", "inner out 10", "outer out 10"]
        );
    }

    #[test]
    fn bare_pipeline_appends_only_the_action() {
        let request = ActionRequest::new("alice", ActionType::TreePlanting, "1 sapling");
        let (tokens, entries) = run(&Pipeline::bare(), &Ledger::in_memory(), &request);
        assert_eq!(tokens, 25);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, EntrySource::Action);
        assert_eq!(entries[0].description, "ok");
    }

    #[test]
    fn standard_pipeline_adds_bonus_without_changing_return() {
        let ledger = Ledger::in_memory();
        let request = ActionRequest::new("alice", ActionType::TreePlanting, "1 sapling");
        let (tokens, entries) = run(&Pipeline::standard(), &ledger, &request);
        assert_eq!(tokens, 25);
        let amounts: Vec<_> = entries.iter().map(|e| (e.amount, e.source)).collect();
        assert_eq!(
            amounts,
            vec![(25, EntrySource::Action), (5, EntrySource::Bonus)]
        );
        assert_eq!(ledger.balance_of("alice").unwrap(), 30);
    }

    #[test]
    fn stage_order_does_not_change_balances() {
        let request = ActionRequest::new("alice", ActionType::ResourceSaving, "cold wash");

        let a = Ledger::in_memory();
        run(&Pipeline::standard(), &a, &request);

        let b = Ledger::in_memory();
        let reversed = Pipeline::bare()
            .with_stage(BonusStage::new(20, 5))
            .with_stage(LoggingStage);
        run(&reversed, &b, &request);

        assert_eq!(a.balance_of("alice").unwrap(), 25);
        assert_eq!(b.balance_of("alice").unwrap(), 25);
    }

    #[test]
    fn unknown_type_records_zero_credit() {
        let request = ActionRequest::new("alice", "composting".parse().unwrap(), "bin");
        let (tokens, entries) = run(&Pipeline::standard(), &Ledger::in_memory(), &request);
        assert_eq!(tokens, 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 0);
    }

    #[test]
    fn from_config_follows_stage_list() {
        let mut config = Config::new("eco");
        assert_eq!(
            Pipeline::from_config(&config).stage_names(),
            vec!["logging", "bonus"]
        );

        config.pipeline.stages = vec![StageKind::Bonus];
        assert_eq!(Pipeline::from_config(&config).stage_names(), vec!["bonus"]);

        config.rewards.bonus.enabled = false;
        assert!(Pipeline::from_config(&config).stage_names().is_empty());
    }
}

use crate::action::ActionRequest;
use crate::error::Result;
use crate::ledger::EntryDraft;

use super::{AwardContext, Next, RewardStage};

/// Credits a separate `Bonus` entry when the inner chain awards at least
/// `threshold` tokens.
///
/// The bonus is appended after the base credit, so a bonus entry never exists
/// without its `Action` entry. The returned amount is the inner amount; the
/// bonus shows up only in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusStage {
    threshold: i64,
    amount: i64,
}

impl BonusStage {
    pub fn new(threshold: i64, amount: i64) -> Self {
        Self { threshold, amount }
    }
}

impl RewardStage for BonusStage {
    fn name(&self) -> &'static str {
        "bonus"
    }

    fn award(
        &self,
        ctx: &AwardContext<'_>,
        request: &ActionRequest,
        next: Next<'_>,
    ) -> Result<i64> {
        let tokens = next.run(ctx, request)?;
        if tokens >= self.threshold && self.amount > 0 {
            let entry = ctx.append(EntryDraft::bonus(
                request.actor_id.as_str(),
                ctx.key,
                request.action_type.clone(),
                self.amount,
            ))?;
            tracing::debug!(
                actor = %entry.actor_id,
                bonus = entry.amount,
                base = tokens,
                "bonus credited"
            );
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, MemoryActors};
    use crate::ledger::Ledger;
    use crate::pipeline::Pipeline;
    use crate::strategy::StrategyRegistry;
    use crate::types::{ActionType, EntrySource};

    fn award(stage: BonusStage, action_type: ActionType) -> (i64, Ledger) {
        let ledger = Ledger::in_memory();
        let actors = MemoryActors::with([Actor::authorized("alice")]);
        let strategies = StrategyRegistry::standard();
        let request = ActionRequest::new("alice", action_type, "something good");
        let key = request.dedup_key();
        let pipeline = Pipeline::bare().with_stage(stage);
        let ctx = AwardContext::new(&ledger, &actors, &strategies, &key, "ok");
        let tokens = pipeline.run(&ctx, &request).unwrap();
        drop(ctx);
        (tokens, ledger)
    }

    #[test]
    fn below_threshold_only_base_entry() {
        let (tokens, ledger) = award(BonusStage::new(20, 5), ActionType::PublicTransport);
        assert_eq!(tokens, 15);
        let history = ledger.history("alice").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source, EntrySource::Action);
    }

    #[test]
    fn at_threshold_adds_bonus_entry() {
        let (tokens, ledger) = award(BonusStage::new(20, 5), ActionType::ResourceSaving);
        assert_eq!(tokens, 20);
        let history = ledger.history("alice").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].source, EntrySource::Bonus);
        assert_eq!(history[1].amount, 5);
        assert_eq!(history[1].balance_after, 25);
        assert!(history[1].reference_key.ends_with(":bonus"));
    }

    #[test]
    fn custom_threshold_and_amount() {
        let (tokens, ledger) = award(BonusStage::new(10, 3), ActionType::Recycling);
        assert_eq!(tokens, 10);
        assert_eq!(ledger.balance_of("alice").unwrap(), 13);
    }
}

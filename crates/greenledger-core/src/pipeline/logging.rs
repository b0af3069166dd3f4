use crate::action::ActionRequest;
use crate::error::Result;

use super::{AwardContext, Next, RewardStage};

/// Emits an audit record of who did what, then delegates.
///
/// Records go to the `greenledger::audit` target at INFO. The amount
/// returned by the inner chain passes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingStage;

impl RewardStage for LoggingStage {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn award(
        &self,
        ctx: &AwardContext<'_>,
        request: &ActionRequest,
        next: Next<'_>,
    ) -> Result<i64> {
        tracing::info!(
            target: "greenledger::audit",
            actor = %request.actor_id,
            action_type = %request.action_type,
            description = %request.description,
            impact = ?request.impact,
            dedup_key = %ctx.key,
            "action submitted for reward"
        );
        next.run(ctx, request)
    }
}

use super::Project;
use crate::output::print_json;
use anyhow::Context;
use greenledger_core::{
    action::ActionRequest,
    pipeline::Pipeline,
    registrar::{ActionRegistrar, JsonlActionStore},
    strategy::StrategyRegistry,
    types::ActionType,
    RegistrationGate,
};
use std::path::Path;
use std::sync::Arc;

pub struct RegisterArgs {
    pub actor: String,
    pub action_type: String,
    pub description: String,
    pub impact: Option<f64>,
    pub requested_tokens: Option<i64>,
    pub idempotency_key: Option<String>,
}

pub fn run(root: &Path, args: RegisterArgs, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    let strategies = StrategyRegistry::from_config(&project.config.rewards)
        .context("invalid reward strategies in config")?;
    let pipeline = Pipeline::from_config(&project.config);

    let store_root = root.to_path_buf();
    let gate = RegistrationGate::new(
        project.actors.clone(),
        project.ledger.clone(),
        Arc::new(strategies),
        pipeline,
        move || Ok(ActionRegistrar::new(Arc::new(JsonlActionStore::new(&store_root)))),
    );

    let action_type: ActionType = args
        .action_type
        .parse()
        .with_context(|| format!("invalid action type '{}'", args.action_type))?;
    let mut request = ActionRequest::new(&args.actor, action_type, args.description);
    if let Some(impact) = args.impact {
        request = request.with_impact(impact);
    }
    if let Some(tokens) = args.requested_tokens {
        request = request.with_requested_tokens(tokens);
    }
    if let Some(key) = args.idempotency_key {
        request = request.with_idempotency_token(key);
    }

    let result = gate
        .register(&request)
        .with_context(|| format!("failed to register action for '{}'", args.actor))?;

    if json {
        return print_json(&result);
    }

    println!("{}", result.confirmation);
    if result.duplicate {
        println!("Already rewarded: no new tokens credited.");
    } else {
        println!("Tokens awarded: {}", result.tokens_awarded);
        if result.bonus_awarded > 0 {
            println!("Bonus:          {}", result.bonus_awarded);
        }
    }
    println!("Balance:        {}", result.balance_after);
    Ok(())
}

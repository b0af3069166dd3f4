use crate::output::{print_json, print_table};
use anyhow::Context;
use greenledger_core::{config::Config, pipeline::Pipeline, strategy::StrategyRegistry};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let registry = StrategyRegistry::from_config(&config.rewards)
        .context("invalid reward strategies in config")?;
    let stages = Pipeline::from_config(&config).stage_names();
    let table = registry.table();

    if json {
        let strategies: Vec<_> = table
            .iter()
            .map(|(action, rule)| serde_json::json!({ "action_type": action, "rule": rule }))
            .collect();
        return print_json(&serde_json::json!({
            "strategies": strategies,
            "bonus": config.rewards.bonus,
            "stages": stages,
        }));
    }

    if registry.is_empty() {
        println!("No reward strategies configured; every action earns 0.");
    } else {
        let rows = table
            .into_iter()
            .map(|(action, rule)| vec![action.to_string(), rule])
            .collect();
        print_table(&["ACTION TYPE", "RULE"], rows);
    }

    let bonus = &config.rewards.bonus;
    println!();
    if bonus.enabled {
        println!(
            "Bonus: +{} for awards of {} or more",
            bonus.amount, bonus.threshold
        );
    } else {
        println!("Bonus: disabled");
    }
    if stages.is_empty() {
        println!("Stages: none");
    } else {
        println!("Stages: {}", stages.join(" -> "));
    }
    Ok(())
}

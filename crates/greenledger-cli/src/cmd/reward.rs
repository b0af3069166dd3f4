use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use greenledger_core::catalog::{NewReward, Reward, RewardCatalog, RewardKind, UNLIMITED_STOCK};
use std::path::Path;

#[derive(Subcommand)]
pub enum RewardSubcommand {
    /// Add a reward to the catalog
    Add {
        id: String,
        /// Tokens spent per redemption
        #[arg(long)]
        points: i64,
        /// Display name (default: the id)
        #[arg(long)]
        name: Option<String>,
        /// badge, discount, prize or benefit
        #[arg(long, default_value = "prize")]
        kind: String,
        /// Units available; -1 for unlimited
        #[arg(long, default_value_t = UNLIMITED_STOCK, allow_negative_numbers = true)]
        stock: i64,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List the catalog, cheapest first
    List,
    /// Offer a reward again
    Enable { id: String },
    /// Withdraw a reward without deleting it
    Disable { id: String },
    /// Set the number of units available (-1 for unlimited)
    Restock {
        id: String,
        #[arg(allow_negative_numbers = true)]
        stock: i64,
    },
}

pub fn run(root: &Path, subcmd: RewardSubcommand, json: bool) -> anyhow::Result<()> {
    let catalog = RewardCatalog::load(root).context("failed to load reward catalog")?;
    match subcmd {
        RewardSubcommand::Add {
            id,
            points,
            name,
            kind,
            stock,
            description,
        } => {
            let kind: RewardKind = kind.parse()?;
            let _lock = super::writer_lock(root)?;
            let reward = catalog
                .add(NewReward {
                    name: name.unwrap_or_else(|| id.clone()),
                    id: id.clone(),
                    description,
                    kind,
                    required_points: points,
                    stock,
                })
                .with_context(|| format!("failed to add reward '{id}'"))?;
            report(&reward, "Added", json)
        }
        RewardSubcommand::List => list(&catalog, json),
        RewardSubcommand::Enable { id } => {
            let _lock = super::writer_lock(root)?;
            let reward = catalog
                .set_active(&id, true)
                .with_context(|| format!("failed to enable '{id}'"))?;
            report(&reward, "Enabled", json)
        }
        RewardSubcommand::Disable { id } => {
            let _lock = super::writer_lock(root)?;
            let reward = catalog
                .set_active(&id, false)
                .with_context(|| format!("failed to disable '{id}'"))?;
            report(&reward, "Disabled", json)
        }
        RewardSubcommand::Restock { id, stock } => {
            let _lock = super::writer_lock(root)?;
            let reward = catalog
                .restock(&id, stock)
                .with_context(|| format!("failed to restock '{id}'"))?;
            report(&reward, "Restocked", json)
        }
    }
}

fn report(reward: &Reward, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(reward);
    }
    println!("{verb} reward: {} ({} tokens)", reward.id, reward.required_points);
    Ok(())
}

fn stock_label(reward: &Reward) -> String {
    if reward.stock == UNLIMITED_STOCK {
        "unlimited".to_string()
    } else {
        reward.stock.to_string()
    }
}

fn list(catalog: &RewardCatalog, json: bool) -> anyhow::Result<()> {
    let rewards = catalog.list().context("failed to read reward catalog")?;
    if json {
        return print_json(&rewards);
    }
    if rewards.is_empty() {
        println!("No rewards yet.");
        return Ok(());
    }
    let rows = rewards
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.name.clone(),
                r.kind.to_string(),
                r.required_points.to_string(),
                stock_label(r),
                if r.is_available() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "KIND", "POINTS", "STOCK", "AVAILABLE"], rows);
    Ok(())
}

use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use greenledger_core::actor::{Actor, ActorFile};
use std::path::Path;

#[derive(Subcommand)]
pub enum ActorSubcommand {
    /// Add an actor (authorized unless --unauthorized)
    Add {
        id: String,
        #[arg(long)]
        unauthorized: bool,
    },
    /// List actors with their cached totals
    List,
    /// Allow an actor to register actions
    Authorize { id: String },
    /// Stop an actor from registering actions
    Revoke { id: String },
}

pub fn run(root: &Path, subcmd: ActorSubcommand, json: bool) -> anyhow::Result<()> {
    let actors = ActorFile::load(root).context("failed to load actors")?;
    match subcmd {
        ActorSubcommand::Add { id, unauthorized } => {
            let _lock = super::writer_lock(root)?;
            let actor = actors
                .add(&id, !unauthorized)
                .with_context(|| format!("failed to add actor '{id}'"))?;
            report(&actor, "Added", json)
        }
        ActorSubcommand::List => list(&actors, json),
        ActorSubcommand::Authorize { id } => {
            let _lock = super::writer_lock(root)?;
            let actor = actors
                .set_authorized(&id, true)
                .with_context(|| format!("failed to authorize '{id}'"))?;
            report(&actor, "Authorized", json)
        }
        ActorSubcommand::Revoke { id } => {
            let _lock = super::writer_lock(root)?;
            let actor = actors
                .set_authorized(&id, false)
                .with_context(|| format!("failed to revoke '{id}'"))?;
            report(&actor, "Revoked", json)
        }
    }
}

fn report(actor: &Actor, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(actor);
    }
    println!("{verb} actor: {}", actor.id);
    Ok(())
}

fn list(actors: &ActorFile, json: bool) -> anyhow::Result<()> {
    let all = actors.list().context("failed to read actors")?;
    if json {
        return print_json(&all);
    }
    if all.is_empty() {
        println!("No actors yet.");
        return Ok(());
    }
    let rows = all
        .iter()
        .map(|a| {
            vec![
                a.id.clone(),
                if a.authorized { "yes" } else { "no" }.to_string(),
                a.balance.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "AUTHORIZED", "BALANCE"], rows);
    Ok(())
}

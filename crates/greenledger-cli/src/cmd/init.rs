use crate::output::print_json;
use anyhow::Context;
use greenledger_core::{
    actor::ActorFile, catalog::RewardCatalog, config::Config, io, ledger::Ledger, paths,
};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    let dir = paths::greenledger_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut created = Vec::new();
    let mut existing = Vec::new();

    // 1. config.yaml
    if paths::config_path(root).exists() {
        existing.push(paths::CONFIG_FILE);
    } else {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
        created.push(paths::CONFIG_FILE);
    }

    // 2. actors.yaml
    if ActorFile::init(root).context("failed to write actors.yaml")? {
        created.push(paths::ACTORS_FILE);
    } else {
        existing.push(paths::ACTORS_FILE);
    }

    // 3. rewards.yaml
    if RewardCatalog::init(root).context("failed to write rewards.yaml")? {
        created.push(paths::REWARDS_FILE);
    } else {
        existing.push(paths::REWARDS_FILE);
    }

    // 4. ledger.redb
    let ledger_path = paths::ledger_path(root);
    if ledger_path.exists() {
        existing.push(paths::LEDGER_FILE);
    } else {
        Ledger::open(&ledger_path).context("failed to create ledger")?;
        created.push(paths::LEDGER_FILE);
    }

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "created": created,
            "existing": existing,
        }))?;
        return Ok(());
    }

    println!("Initializing greenledger in: {}", root.display());
    for file in &created {
        println!("  created: {file}");
    }
    for file in &existing {
        println!("  exists:  {file}");
    }
    println!("\nNext: greenledger actor add <id>");
    Ok(())
}

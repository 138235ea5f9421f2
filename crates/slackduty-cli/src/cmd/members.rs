use crate::output::{print_json, print_table};
use crate::root::load_config;
use anyhow::Context;
use slackduty_core::{Orchestrator, Settings};
use std::path::Path;

pub fn run(config_path: &Path, group: &str, settings: Settings, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    config.group(group)?;
    let orchestrator =
        Orchestrator::from_settings(config, &settings).context("failed to create API clients")?;

    let rt = tokio::runtime::Runtime::new()?;
    let mut members = rt.block_on(async {
        let group = orchestrator.config().group(group)?;
        orchestrator.members(group).await
    })
    .with_context(|| format!("failed to resolve members of '{group}'"))?
    .into_members();
    members.sort_by(|a, b| a.id.cmp(&b.id));

    if json {
        return print_json(&serde_json::json!({
            "group": group,
            "members": members,
        }));
    }
    if members.is_empty() {
        println!("Group '{group}' resolves to no members.");
        return Ok(());
    }
    let rows = members
        .iter()
        .map(|m| vec![m.id.clone(), m.email.clone()])
        .collect();
    print_table(&["SLACK ID", "EMAIL"], rows);
    Ok(())
}

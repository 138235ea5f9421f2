use crate::output::print_json;
use crate::root::load_config;
use slackduty_core::WarnLevel;
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "config": config_path,
            "groups": config.groups.len(),
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!(
            "Config is valid ({} group(s)). No warnings.",
            config.groups.len()
        );
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

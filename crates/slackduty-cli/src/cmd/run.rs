use crate::root::load_config;
use anyhow::Context;
use slackduty_core::{Orchestrator, Settings, WarnLevel};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn run(config_path: &Path, settings: Settings) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => warn!("{}", w.message),
            WarnLevel::Error => tracing::error!("{}", w.message),
        }
    }

    let groups = config.groups.len();
    let external_trigger = settings.external_trigger;
    let orchestrator =
        Orchestrator::from_settings(config, &settings).context("failed to create API clients")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        info!(groups, external_trigger, config = %config_path.display(), "starting slackduty");

        let cancel = CancellationToken::new();
        let driver = orchestrator.run(cancel.clone());
        tokio::pin!(driver);

        tokio::select! {
            _ = &mut driver => return Ok(()),
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                info!("shutdown requested; waiting for running jobs");
                cancel.cancel();
            }
        }
        driver.await;
        Ok(())
    })
}

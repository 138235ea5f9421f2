mod cmd;
mod output;
mod root;

use clap::{Args, Parser, Subcommand};
use slackduty_core::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "slackduty",
    about = "Sync Slack usergroup membership from PagerDuty schedules, services, teams and users",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ~/.slackduty/config.yml)
    #[arg(long, short = 'c', global = true, env = "SLACKDUTY_CONFIG")]
    config: Option<PathBuf>,

    /// Default log level; RUST_LOG directives take precedence
    #[arg(long, global = true, env = "SLACKDUTY_LOG_LEVEL", default_value = "info")]
    log_level: tracing::Level,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(flatten)]
    api: ApiArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ApiArgs {
    /// PagerDuty REST API key
    #[arg(long, global = true, env = "SLACKDUTY_PAGERDUTY_API_KEY", hide_env_values = true)]
    pagerduty_api_key: Option<String>,

    /// Slack bot token
    #[arg(long, global = true, env = "SLACKDUTY_SLACK_API_KEY", hide_env_values = true)]
    slack_api_key: Option<String>,

    /// Run every group once and exit instead of following cron schedules
    #[arg(long, global = true, env = "SLACKDUTY_EXTERNAL_TRIGGER")]
    external_trigger: bool,

    /// Cap on concurrent PagerDuty/Slack API calls (0 = unbounded)
    #[arg(long, global = true, env = "SLACKDUTY_MAX_CONCURRENT_REQUESTS")]
    max_concurrent_requests: Option<usize>,

    /// PagerDuty API base URL
    #[arg(long, global = true, env = "SLACKDUTY_PAGERDUTY_URL", hide = true)]
    pagerduty_url: Option<String>,

    /// Slack Web API base URL
    #[arg(long, global = true, env = "SLACKDUTY_SLACK_URL", hide = true)]
    slack_url: Option<String>,
}

impl ApiArgs {
    fn settings(self) -> anyhow::Result<Settings> {
        let pagerduty_api_key = self.pagerduty_api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
            anyhow::anyhow!("PagerDuty API key missing: pass --pagerduty-api-key or set SLACKDUTY_PAGERDUTY_API_KEY")
        })?;
        let slack_api_key = self.slack_api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
            anyhow::anyhow!("Slack API key missing: pass --slack-api-key or set SLACKDUTY_SLACK_API_KEY")
        })?;
        Ok(Settings {
            pagerduty_api_key,
            slack_api_key,
            external_trigger: self.external_trigger,
            max_concurrent_requests: self.max_concurrent_requests,
            pagerduty_base_url: self.pagerduty_url,
            slack_base_url: self.slack_url,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every configured group (default)
    Run,

    /// Validate the config for common mistakes
    Validate,

    /// Print the members a group would receive, without updating Slack
    Members {
        /// Group name as configured
        #[arg(long)]
        group: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli);

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = root::resolve_config_path(cli.config.as_deref())?;
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd::run::run(&config_path, cli.api.settings()?),
        Commands::Validate => cmd::validate::run(&config_path, cli.json),
        Commands::Members { group } => {
            cmd::members::run(&config_path, &group, cli.api.settings()?, cli.json)
        }
    }
}

use crate::fanout::CallGate;

/// Runtime settings resolved by the caller (flags, environment) and handed
/// to the orchestrator. Nothing below this value reads the environment.
#[derive(Clone, Default)]
pub struct Settings {
    pub pagerduty_api_key: String,
    pub slack_api_key: String,
    /// Run every group once and return instead of following cron schedules.
    pub external_trigger: bool,
    /// Cap on concurrent outbound API calls. `None` or `Some(0)` is unbounded.
    pub max_concurrent_requests: Option<usize>,
    pub pagerduty_base_url: Option<String>,
    pub slack_base_url: Option<String>,
}

impl Settings {
    pub fn new(pagerduty_api_key: impl Into<String>, slack_api_key: impl Into<String>) -> Self {
        Self {
            pagerduty_api_key: pagerduty_api_key.into(),
            slack_api_key: slack_api_key.into(),
            ..Self::default()
        }
    }

    pub fn gate(&self) -> CallGate {
        CallGate::new(self.max_concurrent_requests)
    }
}

// Keys stay out of logs and panic messages.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("pagerduty_api_key", &"<redacted>")
            .field("slack_api_key", &"<redacted>")
            .field("external_trigger", &self.external_trigger)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("pagerduty_base_url", &self.pagerduty_base_url)
            .field("slack_base_url", &self.slack_base_url)
            .finish()
    }
}

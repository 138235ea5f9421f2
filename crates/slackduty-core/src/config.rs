use crate::error::{Result, SlackdutyError};
use crate::job::CronSchedule;
use crate::resolver::RosterSource;
use crate::selector::{Selector, SelectorContext};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".slackduty";
pub const CONFIG_FILE: &str = "config.yml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: String) -> Self {
        Self {
            level: WarnLevel::Warning,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: WarnLevel::Error,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PagerdutyMembers {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Members {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slack: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagerduty: Option<PagerdutyMembers>,
}

impl Members {
    /// Raw selector lists in resolution order.
    fn raw_sources(&self) -> [(SelectorContext, &[String]); 5] {
        let empty: &[String] = &[];
        let (schedules, services, teams, users) = match &self.pagerduty {
            Some(pd) => (
                pd.schedules.as_slice(),
                pd.services.as_slice(),
                pd.teams.as_slice(),
                pd.users.as_slice(),
            ),
            None => (empty, empty, empty, empty),
        };
        [
            (SelectorContext::Schedule, schedules),
            (SelectorContext::Service, services),
            (SelectorContext::Team, teams),
            (SelectorContext::User, users),
            (SelectorContext::SlackUser, self.slack.as_slice()),
        ]
    }

    /// Every configured source, empty ones included. Fails on the first
    /// malformed selector.
    pub fn sources(&self) -> Result<Vec<RosterSource>> {
        let [schedules, services, teams, users, slack] = self.raw_sources().map(|(_, raw)| raw);
        Ok(vec![
            RosterSource::Schedule(parse_all(schedules)?),
            RosterSource::Service(parse_all(services)?),
            RosterSource::Team(parse_all(teams)?),
            RosterSource::User(parse_all(users)?),
            RosterSource::SlackUser(parse_all(slack)?),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.raw_sources().iter().all(|(_, raw)| raw.is_empty())
    }
}

fn parse_all(raw: &[String]) -> Result<Vec<Selector>> {
    raw.iter().map(|r| Selector::parse(r)).collect()
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    /// Cron pattern; ignored when running on an external trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    pub usergroups: Vec<String>,
    #[serde(default)]
    pub members: Members,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl Group {
    pub fn usergroup_selectors(&self) -> Result<Vec<Selector>> {
        parse_all(&self.usergroups)
    }

    pub fn exclude_selectors(&self) -> Result<Vec<Selector>> {
        parse_all(&self.exclude)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Config {
    /// `~/.slackduty/config.yml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = home::home_dir().ok_or(SlackdutyError::HomeNotFound)?;
        Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn group(&self, name: &str) -> Result<&Group> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| SlackdutyError::GroupNotFound(name.to_string()))
    }

    /// Problems worth reporting before a run. `WarnLevel::Error` entries
    /// would make the group fail at every firing.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.groups.is_empty() {
            warnings.push(ConfigWarning::warning("no groups configured".into()));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            let name = &group.name;
            if name.trim().is_empty() {
                warnings.push(ConfigWarning::error("group with an empty name".into()));
            }
            if !seen.insert(name.as_str()) {
                warnings.push(ConfigWarning::error(format!(
                    "duplicate group name '{name}'"
                )));
            }

            if group.usergroups.is_empty() {
                warnings.push(ConfigWarning::error(format!(
                    "group '{name}' has no usergroups to update"
                )));
            }
            let lists = [
                (SelectorContext::Usergroup, group.usergroups.as_slice()),
                (SelectorContext::Exclude, group.exclude.as_slice()),
            ];
            for (context, raw) in lists.into_iter().chain(group.members.raw_sources()) {
                for entry in raw {
                    let checked = Selector::parse(entry).and_then(|s| s.validate_kind(context));
                    if let Err(e) = checked {
                        warnings.push(ConfigWarning::error(format!("group '{name}': {e}")));
                    }
                }
            }
            if group.members.is_empty() {
                warnings.push(ConfigWarning::warning(format!(
                    "group '{name}' has no member sources; nothing will be synced"
                )));
            }

            match &group.schedule {
                Some(pattern) => {
                    if let Err(e) = CronSchedule::parse(pattern) {
                        warnings.push(ConfigWarning::error(format!("group '{name}': {e}")));
                    }
                }
                None => warnings.push(ConfigWarning::warning(format!(
                    "group '{name}' has no schedule; it only runs on an external trigger"
                ))),
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

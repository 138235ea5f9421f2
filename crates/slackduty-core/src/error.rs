use crate::selector::SelectorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlackdutyError {
    #[error("invalid selector '{0}': expected '<kind>:<value>'")]
    Format(String),

    #[error("unsupported selector kind '{kind}' for {context}: must be one of {allowed}")]
    UnsupportedKind {
        kind: SelectorKind,
        context: &'static str,
        allowed: String,
    },

    #[error("no {context} found for {kind}:{value}")]
    NotFound {
        context: &'static str,
        kind: SelectorKind,
        value: String,
    },

    #[error("{count} {context}s match {kind}:{value}; refusing to guess")]
    AmbiguousLookup {
        context: &'static str,
        kind: SelectorKind,
        value: String,
        count: usize,
    },

    #[error("usergroup not found: {0}")]
    UsergroupNotFound(String),

    #[error("{service} API call failed: {message}")]
    ExternalCall {
        service: &'static str,
        message: String,
    },

    #[error("invalid schedule '{pattern}': {reason}")]
    InvalidSchedule { pattern: String, reason: String },

    #[error("resolution task failed: {0}")]
    TaskFailed(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("home directory not found: set HOME or pass --config")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl SlackdutyError {
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalCall {
            service,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SlackdutyError>;

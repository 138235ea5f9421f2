//! `kind:value` selectors used to point at PagerDuty and Slack entities.
//!
//! Every list in the group configuration is made of selectors, e.g.
//! `name:oncall-primary`, `id:PABC123`, `email:a@example.com` or
//! `handle:on-support`. Parsing only checks the shape and the kind word;
//! whether a kind is acceptable depends on where the selector is used, which
//! is what [`SelectorContext`] encodes.

use crate::error::{Result, SlackdutyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = ':';

// ---------------------------------------------------------------------------
// SelectorKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Id,
    Name,
    Email,
    Handle,
}

impl SelectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Email => "email",
            Self::Handle => "handle",
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        match word {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "handle" => Some(Self::Handle),
            _ => None,
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SelectorContext
// ---------------------------------------------------------------------------

/// Where a selector is used. Each context accepts a fixed set of kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorContext {
    Schedule,
    Service,
    Team,
    User,
    SlackUser,
    Usergroup,
    Exclude,
}

impl SelectorContext {
    pub fn allowed(self) -> &'static [SelectorKind] {
        use SelectorKind::*;
        match self {
            Self::Schedule | Self::Service | Self::Team => &[Id, Name],
            Self::User => &[Id, Name, Email],
            Self::SlackUser | Self::Exclude => &[Id, Email],
            Self::Usergroup => &[Id, Handle],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Service => "service",
            Self::Team => "team",
            Self::User => "user",
            Self::SlackUser => "slack user",
            Self::Usergroup => "usergroup",
            Self::Exclude => "exclude entry",
        }
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    kind: SelectorKind,
    value: String,
}

impl Selector {
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Parse `kind:value`. Exactly one separator is allowed and the kind word
    /// is matched case-insensitively.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        let [kind, value] = parts.as_slice() else {
            return Err(SlackdutyError::Format(raw.to_string()));
        };
        if value.is_empty() {
            return Err(SlackdutyError::Format(raw.to_string()));
        }
        let kind = SelectorKind::from_word(&kind.to_lowercase())
            .ok_or_else(|| SlackdutyError::Format(raw.to_string()))?;
        Ok(Self::new(kind, *value))
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::Id, value)
    }

    pub fn email(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::Email, value)
    }

    pub fn kind(&self) -> SelectorKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn validate_kind(&self, context: SelectorContext) -> Result<()> {
        if context.allowed().contains(&self.kind) {
            Ok(())
        } else {
            Err(self.unsupported(context))
        }
    }

    /// The error for a kind the context does not accept.
    pub fn unsupported(&self, context: SelectorContext) -> SlackdutyError {
        let allowed = context
            .allowed()
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        SlackdutyError::UnsupportedKind {
            kind: self.kind,
            context: context.as_str(),
            allowed,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.kind, self.value)
    }
}

impl FromStr for Selector {
    type Err = SlackdutyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = SlackdutyError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod fanout;
pub mod job;
pub mod member;
pub mod orchestrator;
pub mod pagerduty;
pub mod resolver;
pub mod selector;
pub mod settings;
pub mod slack;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{Config, ConfigWarning, Group, WarnLevel};
pub use error::{Result, SlackdutyError};
pub use member::{Member, MembershipSet};
pub use orchestrator::Orchestrator;
pub use selector::{Selector, SelectorContext, SelectorKind};
pub use settings::Settings;

//! Navigation session state

use serde::{Deserialize, Serialize};

/// State of the host navigation session.
///
/// Exactly one is active at a time. Only `ActiveGuidance` opens a telemetry session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationSessionState {
    Idle,
    FreeDrive,
    ActiveGuidance,
}

impl NavigationSessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationSessionState::Idle => "idle",
            NavigationSessionState::FreeDrive => "free_drive",
            NavigationSessionState::ActiveGuidance => "active_guidance",
        }
    }

    pub fn is_guided(&self) -> bool {
        matches!(self, NavigationSessionState::ActiveGuidance)
    }
}

impl std::fmt::Display for NavigationSessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

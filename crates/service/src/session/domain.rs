use serde::{Deserialize, Serialize};

use crate::api::TeacherPayload;

/// Authenticated teacher identity, persisted as JSON alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub username: String,
    pub name: String,
}

impl Teacher {
    /// Build from the token response; every missing or blank field falls
    /// back to the username that was submitted.
    pub fn from_login(payload: Option<&TeacherPayload>, submitted_username: &str) -> Self {
        let pick = |field: Option<&String>| {
            field
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| submitted_username.to_string())
        };
        Self {
            id: pick(payload.and_then(|p| p.id.as_ref())),
            username: pick(payload.and_then(|p| p.username.as_ref())),
            name: pick(payload.and_then(|p| p.name.as_ref())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated(Teacher),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn teacher(&self) -> Option<&Teacher> {
        match self {
            SessionState::Authenticated(t) => Some(t),
            SessionState::Unauthenticated => None,
        }
    }
}

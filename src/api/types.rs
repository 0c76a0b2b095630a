//! API request and response types

use crate::locale::Locale;
use crate::runtime::DialogueSnapshot;
use serde::{Deserialize, Serialize};

/// Request to open a new session
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub locale: Option<String>,
}

/// Request to pick a choice
#[derive(Debug, Deserialize)]
pub struct ChoiceRequest {
    pub index: usize,
}

/// Request to switch display language
#[derive(Debug, Deserialize)]
pub struct LocaleRequest {
    pub locale: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub snapshot: DialogueSnapshot,
}

#[derive(Debug, Serialize)]
pub struct LocaleResponse {
    pub locale: Locale,
    /// False when the locale was already active
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct LocalesResponse {
    pub locales: Vec<Locale>,
    pub default: Locale,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub active_sessions: usize,
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    InvalidRequest,
    UnsupportedMediaType,
    SessionNotFound,
    SessionAlreadyExists,
    InvalidSnapshot,
}

impl ErrorType {
    pub fn as_urn(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "urn:ui-callback:error:invalid_request",
            Self::UnsupportedMediaType => "urn:ui-callback:error:unsupported_media_type",
            Self::SessionNotFound => "urn:ui-callback:error:session_not_found",
            Self::SessionAlreadyExists => "urn:ui-callback:error:session_already_exists",
            Self::InvalidSnapshot => "urn:ui-callback:error:invalid_snapshot",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid Request",
            Self::UnsupportedMediaType => "Unsupported Media Type",
            Self::SessionNotFound => "Session Not Found",
            Self::SessionAlreadyExists => "Session Already Exists",
            Self::InvalidSnapshot => "Invalid Snapshot",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::UnsupportedMediaType => 415,
            Self::SessionNotFound => 404,
            Self::SessionAlreadyExists => 409,
            Self::InvalidSnapshot => 400,
        }
    }
}

/// RFC 7807 problem document returned by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl ProblemDetails {
    pub fn new(error_type: ErrorType, detail: Option<String>) -> Self {
        Self {
            type_: error_type.as_urn().to_string(),
            title: error_type.title().to_string(),
            status: error_type.status_code(),
            detail,
            instance: None,
            extensions: Map::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    #[error("unsupported media type: {message}")]
    UnsupportedMediaType { message: String },
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },
    #[error("session already exists: {session_id}")]
    SessionAlreadyExists { session_id: String },
    #[error("invalid snapshot: {message}")]
    InvalidSnapshot { message: String },
}

impl CallbackError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::InvalidRequest { .. } => ErrorType::InvalidRequest,
            Self::UnsupportedMediaType { .. } => ErrorType::UnsupportedMediaType,
            Self::SessionNotFound { .. } => ErrorType::SessionNotFound,
            Self::SessionAlreadyExists { .. } => ErrorType::SessionAlreadyExists,
            Self::InvalidSnapshot { .. } => ErrorType::InvalidSnapshot,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::SessionNotFound { session_id }
            | Self::SessionAlreadyExists { session_id } => Some(session_id),
            Self::InvalidRequest { .. }
            | Self::UnsupportedMediaType { .. }
            | Self::InvalidSnapshot { .. } => None,
        }
    }

    pub fn to_problem_details(&self) -> ProblemDetails {
        let mut problem = ProblemDetails::new(self.error_type(), Some(self.to_string()));
        if let Some(session_id) = self.session_id() {
            problem
                .extensions
                .insert("sessionId".to_string(), Value::String(session_id.to_string()));
        }
        problem
    }
}

impl From<CallbackError> for ProblemDetails {
    fn from(value: CallbackError) -> Self {
        value.to_problem_details()
    }
}

impl From<&CallbackError> for ProblemDetails {
    fn from(value: &CallbackError) -> Self {
        value.to_problem_details()
    }
}

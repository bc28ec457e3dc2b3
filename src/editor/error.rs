use serde_json::Value;
use std::fmt;

use super::controls::UnsupportedSchemaError;
use crate::models::schema::{EffectName, NodeUid};
use crate::remote::RemoteError;
use crate::services::schema_fetcher::FetchError;

/// An edit that breaks its control's constraints. The edit is not applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    UnknownParameter(String),
    NotAnOption { parameter: String, value: Value },
    NotANumber { parameter: String, value: Value },
    NotABoolean { parameter: String, value: Value },
    /// A schema key has no value to render.
    MissingValue(String),
    UnknownEffect(EffectName),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownParameter(name) => write!(f, "Unknown parameter: {}", name),
            ValidationError::NotAnOption { parameter, value } => {
                write!(f, "{} is not an option of {}", value, parameter)
            }
            ValidationError::NotANumber { parameter, value } => {
                write!(f, "{} expects a number, got {}", parameter, value)
            }
            ValidationError::NotABoolean { parameter, value } => {
                write!(f, "{} expects true or false, got {}", parameter, value)
            }
            ValidationError::MissingValue(name) => write!(f, "No value for parameter {}", name),
            ValidationError::UnknownEffect(effect) => write!(f, "Unknown effect: {}", effect),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A per-field push to the graph server failed. The local value is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateError {
    pub node: NodeUid,
    pub parameter: String,
    pub source: RemoteError,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Updating {} on node {} failed: {}",
            self.parameter, self.node, self.source
        )
    }
}

impl std::error::Error for UpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// The requested action is not allowed in the session's current state or mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    InvalidConfig(String),
    NotReady,
    Closed,
    /// Edit sessions cannot change the node's effect.
    EffectLocked,
    /// Edit sessions push every change as it happens; there is nothing to save.
    SaveUnavailable,
    EffectSwitchPending,
    LoadInFlight,
    /// Reload is only offered while the initial load has not succeeded.
    AlreadyLoaded,
    NothingToRetry(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidConfig(msg) => write!(f, "Invalid editor configuration: {}", msg),
            SessionError::NotReady => write!(f, "Node data is still loading"),
            SessionError::Closed => write!(f, "Editor is closed"),
            SessionError::EffectLocked => write!(f, "The effect of an existing node cannot change"),
            SessionError::SaveUnavailable => write!(f, "Edits are applied immediately; nothing to save"),
            SessionError::EffectSwitchPending => write!(f, "Effect is still loading"),
            SessionError::LoadInFlight => write!(f, "A load is already in progress"),
            SessionError::AlreadyLoaded => write!(f, "Node data is already loaded"),
            SessionError::NothingToRetry(name) => write!(f, "No failed update for {}", name),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    Fetch(FetchError),
    Update(UpdateError),
    Validation(ValidationError),
    UnsupportedSchema(UnsupportedSchemaError),
    Session(SessionError),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::Fetch(e) => write!(f, "{}", e),
            EditorError::Update(e) => write!(f, "{}", e),
            EditorError::Validation(e) => write!(f, "{}", e),
            EditorError::UnsupportedSchema(e) => write!(f, "{}", e),
            EditorError::Session(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EditorError {}

impl From<FetchError> for EditorError {
    fn from(e: FetchError) -> Self {
        EditorError::Fetch(e)
    }
}

impl From<UpdateError> for EditorError {
    fn from(e: UpdateError) -> Self {
        EditorError::Update(e)
    }
}

impl From<ValidationError> for EditorError {
    fn from(e: ValidationError) -> Self {
        EditorError::Validation(e)
    }
}

impl From<UnsupportedSchemaError> for EditorError {
    fn from(e: UnsupportedSchemaError) -> Self {
        EditorError::UnsupportedSchema(e)
    }
}

impl From<SessionError> for EditorError {
    fn from(e: SessionError) -> Self {
        EditorError::Session(e)
    }
}

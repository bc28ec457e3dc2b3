use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::editor::error::SessionError;

/// Parameter name -> raw spec descriptor as served by the graph service.
///
/// A descriptor is a list of options, a `[default, min, max, step]`
/// tuple or a boolean. Anything else is reported by the control resolver.
pub type ParameterSchema = BTreeMap<String, Value>;

/// Parameter name -> current value.
pub type ParameterValues = BTreeMap<String, Value>;

/// Fully qualified effect type, e.g. `audioled.effects.Shift`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct EffectName(pub String);

impl EffectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Class name without the module path.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for EffectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EffectName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EffectName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque reference to a node that already lives in the remote graph.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct NodeUid(pub String);

impl NodeUid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeUid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeUid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Fixed for the lifetime of a session. Edit mode carries the node it edits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditorMode {
    Add,
    Edit(NodeUid),
}

impl EditorMode {
    /// Parse the `mode` / `nodeUid` pair handed over by the owning view.
    pub fn from_props(mode: &str, node_uid: Option<&str>) -> Result<Self, SessionError> {
        match (mode, node_uid) {
            ("add", None) => Ok(EditorMode::Add),
            ("add", Some(uid)) => Err(SessionError::InvalidConfig(format!(
                "add mode does not take a node uid (got {})",
                uid
            ))),
            ("edit", Some(uid)) if !uid.trim().is_empty() => Ok(EditorMode::Edit(NodeUid::new(uid))),
            ("edit", _) => Err(SessionError::InvalidConfig(
                "edit mode requires a node uid".to_string(),
            )),
            (other, _) => Err(SessionError::InvalidConfig(format!(
                "unknown editor mode: {}",
                other
            ))),
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, EditorMode::Add)
    }

    pub fn node_uid(&self) -> Option<&NodeUid> {
        match self {
            EditorMode::Add => None,
            EditorMode::Edit(uid) => Some(uid),
        }
    }
}

/// An existing node's bound effect and its current values.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeState {
    pub effect: EffectName,
    pub values: ParameterValues,
}

/// One effect's schema together with the values that go with it.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectSnapshot {
    pub effect: EffectName,
    pub schema: ParameterSchema,
    pub values: ParameterValues,
}

impl EffectSnapshot {
    /// First schema key without a usable value (absent or `null`).
    pub fn first_missing_value(&self) -> Option<&str> {
        first_missing_value(&self.schema, &self.values)
    }
}

pub(crate) fn first_missing_value<'a>(
    schema: &'a ParameterSchema,
    values: &ParameterValues,
) -> Option<&'a str> {
    schema
        .keys()
        .find(|name| matches!(values.get(name.as_str()), None | Some(Value::Null)))
        .map(String::as_str)
}

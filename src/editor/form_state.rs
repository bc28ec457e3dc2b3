use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::controls::{
    classify_parameter, quantize, range_value, same_value, ControlKind, UnsupportedSchemaError,
};
use super::error::{EditorError, SessionError, UpdateError, ValidationError};
use crate::models::editor::{ControlView, ControlWidget, SyncState};
use crate::models::schema::{
    first_missing_value, EditorMode, NodeUid, ParameterSchema, ParameterValues,
};
use crate::remote::RemoteError;

pub type ControlResult = Result<ControlKind, UnsupportedSchemaError>;

/// When accepted edits reach the graph server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Push each accepted edit to this node right away.
    Immediate(NodeUid),
    /// Keep edits local until the caller commits them.
    Deferred,
}

/// One single-field push, versioned per field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub node: NodeUid,
    pub parameter: String,
    pub version: u64,
    pub patch: ParameterValues,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldStatus {
    Pending { version: u64 },
    Confirmed,
    Failed(UpdateError),
}

impl FieldStatus {
    pub fn sync_state(&self) -> SyncState {
        match self {
            FieldStatus::Pending { .. } => SyncState::Pending,
            FieldStatus::Confirmed => SyncState::Confirmed,
            FieldStatus::Failed(_) => SyncState::Failed,
        }
    }
}

/// How an update completion was taken.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSettle {
    Confirmed,
    Failed(UpdateError),
    /// A newer push for the same field exists; the completion was ignored.
    Superseded,
}

/// Live schema and values of the node being edited.
///
/// Values sit behind an `Arc` and are copied on write, so a snapshot taken
/// with [`FormStateStore::snapshot`] never observes later edits.
pub struct FormStateStore {
    policy: SyncPolicy,
    schema: ParameterSchema,
    values: Arc<ParameterValues>,
    controls: BTreeMap<String, ControlResult>,
    versions: HashMap<String, u64>,
    status: BTreeMap<String, FieldStatus>,
}

impl FormStateStore {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            schema: ParameterSchema::new(),
            values: Arc::new(ParameterValues::new()),
            controls: BTreeMap::new(),
            versions: HashMap::new(),
            status: BTreeMap::new(),
        }
    }

    pub fn for_mode(mode: &EditorMode) -> Self {
        match mode {
            EditorMode::Add => Self::new(SyncPolicy::Deferred),
            EditorMode::Edit(uid) => Self::new(SyncPolicy::Immediate(uid.clone())),
        }
    }

    /// Swap in a new schema and its values, dropping every unsaved edit.
    ///
    /// Loaded values go through the same rules as edits: range values are
    /// clamped and snapped, a bad option or flag rejects the whole load.
    /// Nothing changes if a schema key has no value or a value is rejected.
    pub fn replace_all(
        &mut self,
        schema: ParameterSchema,
        mut values: ParameterValues,
    ) -> Result<(), ValidationError> {
        if let Some(name) = first_missing_value(&schema, &values) {
            return Err(ValidationError::MissingValue(name.to_string()));
        }

        let controls: BTreeMap<String, ControlResult> = schema
            .iter()
            .map(|(name, spec)| (name.clone(), classify_parameter(name, spec)))
            .collect();

        for (name, control) in &controls {
            let kind = match control {
                Ok(kind) => kind,
                Err(err) => {
                    log::warn!("{}", err);
                    continue;
                }
            };
            if let Some(value) = values.get_mut(name) {
                let conformed = coerce(name, kind, value.clone())?;
                if !same_value(&conformed, value) {
                    log::debug!("Loaded {} = {} adjusted to {}", name, value, conformed);
                }
                *value = conformed;
            }
        }

        self.schema = schema;
        self.values = Arc::new(values);
        self.controls = controls;
        // versions survive so late completions from before the swap stay stale
        self.status.clear();
        Ok(())
    }

    /// Validate and apply one edit.
    ///
    /// Under [`SyncPolicy::Immediate`] the returned update must be sent; the
    /// local value is already applied and is not rolled back if it fails.
    pub fn set_value(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<Option<FieldUpdate>, EditorError> {
        let control = self
            .controls
            .get(name)
            .ok_or_else(|| ValidationError::UnknownParameter(name.to_string()))?
            .as_ref()
            .map_err(|e| EditorError::UnsupportedSchema(e.clone()))?;
        let accepted = coerce(name, control, value)?;

        Arc::make_mut(&mut self.values).insert(name.to_string(), accepted.clone());

        match &self.policy {
            SyncPolicy::Deferred => Ok(None),
            SyncPolicy::Immediate(node) => {
                let node = node.clone();
                Ok(Some(self.issue_update(node, name, accepted)))
            }
        }
    }

    /// Record the outcome of a push. Never touches the value itself.
    pub fn finish_update(
        &mut self,
        update: &FieldUpdate,
        outcome: Result<(), RemoteError>,
    ) -> UpdateSettle {
        let latest = self.versions.get(&update.parameter).copied().unwrap_or(0);
        if latest != update.version {
            return UpdateSettle::Superseded;
        }

        match outcome {
            Ok(()) => {
                self.status
                    .insert(update.parameter.clone(), FieldStatus::Confirmed);
                UpdateSettle::Confirmed
            }
            Err(source) => {
                let err = UpdateError {
                    node: update.node.clone(),
                    parameter: update.parameter.clone(),
                    source,
                };
                self.status
                    .insert(update.parameter.clone(), FieldStatus::Failed(err.clone()));
                UpdateSettle::Failed(err)
            }
        }
    }

    /// Re-push the current value of a field whose last push failed.
    pub fn retry(&mut self, name: &str) -> Result<FieldUpdate, EditorError> {
        let failed = matches!(self.status.get(name), Some(FieldStatus::Failed(_)));
        let node = match &self.policy {
            SyncPolicy::Immediate(node) if failed => node.clone(),
            _ => return Err(SessionError::NothingToRetry(name.to_string()).into()),
        };
        let value = self
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| ValidationError::MissingValue(name.to_string()))?;
        Ok(self.issue_update(node, name, value))
    }

    fn issue_update(&mut self, node: NodeUid, name: &str, value: Value) -> FieldUpdate {
        let counter = self.versions.entry(name.to_string()).or_insert(0);
        *counter += 1;
        let version = *counter;

        self.status
            .insert(name.to_string(), FieldStatus::Pending { version });

        let mut patch = ParameterValues::new();
        patch.insert(name.to_string(), value);
        FieldUpdate {
            node,
            parameter: name.to_string(),
            version,
            patch,
        }
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    pub fn values(&self) -> &ParameterValues {
        &self.values
    }

    pub fn snapshot(&self) -> Arc<ParameterValues> {
        Arc::clone(&self.values)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn unsupported(&self) -> Vec<&UnsupportedSchemaError> {
        self.controls
            .values()
            .filter_map(|control| control.as_ref().err())
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<&FieldStatus> {
        self.status.get(name)
    }

    pub fn sync_state(&self, name: &str) -> SyncState {
        self.status
            .get(name)
            .map(FieldStatus::sync_state)
            .unwrap_or(SyncState::Local)
    }

    pub fn pending_updates(&self) -> usize {
        self.status
            .values()
            .filter(|status| matches!(status, FieldStatus::Pending { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    /// One row per parameter, sorted by name. Unsupported specs still get a row.
    pub fn rows(&self) -> Vec<ControlView> {
        self.controls
            .iter()
            .map(|(name, control)| ControlView {
                name: name.clone(),
                widget: match control {
                    Ok(kind) => kind.widget(),
                    Err(err) => ControlWidget::Unsupported {
                        message: err.to_string(),
                    },
                },
                value: self.values.get(name).cloned().unwrap_or(Value::Null),
                sync: self.sync_state(name),
            })
            .collect()
    }
}

fn coerce(name: &str, control: &ControlKind, value: Value) -> Result<Value, ValidationError> {
    match control {
        ControlKind::Enum { options } => options
            .iter()
            .find(|option| same_value(option, &value))
            .cloned()
            .ok_or_else(|| ValidationError::NotAnOption {
                parameter: name.to_string(),
                value,
            }),
        ControlKind::Range {
            min,
            max,
            step,
            integral,
            ..
        } => {
            let number = value.as_f64().ok_or_else(|| ValidationError::NotANumber {
                parameter: name.to_string(),
                value: value.clone(),
            })?;
            Ok(range_value(quantize(number, *min, *max, *step), *integral))
        }
        ControlKind::Boolean => match value {
            Value::Bool(_) => Ok(value),
            other => Err(ValidationError::NotABoolean {
                parameter: name.to_string(),
                value: other,
            }),
        },
    }
}

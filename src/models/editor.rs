use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[ts(export, export_to = "editor.ts")]
pub enum EditorPhase {
    Loading,
    Ready,
    Saving,
    Closed,
}

/// Remote sync state of one field. Only edit sessions leave `Local`.
#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[ts(export, export_to = "editor.ts")]
pub enum SyncState {
    Local,
    Pending,
    Confirmed,
    Failed,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export, export_to = "editor.ts")]
pub enum ControlWidget {
    Dropdown {
        #[ts(type = "Array<unknown>")]
        options: Vec<Value>,
    },
    Slider {
        min: f64,
        max: f64,
        step: f64,
    },
    Checkbox,
    /// Shown in place of a control when the schema shape is not understood.
    Unsupported {
        message: String,
    },
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "editor.ts")]
#[ts(rename_all = "camelCase")]
pub struct ControlView {
    pub name: String,
    pub widget: ControlWidget,
    #[ts(type = "unknown")]
    pub value: Value,
    pub sync: SyncState,
}

/// Everything the popup needs to draw itself.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "editor.ts")]
#[ts(rename_all = "camelCase")]
pub struct EditorView {
    pub title: String,
    pub phase: EditorPhase,
    /// Add mode only; empty when editing.
    pub effects: Vec<String>,
    pub selected_effect: Option<String>,
    pub switching_effect: bool,
    pub rows: Vec<ControlView>,
    pub can_save: bool,
    pub errors: Vec<String>,
}

impl EditorView {
    pub fn row(&self, name: &str) -> Option<&ControlView> {
        self.rows.iter().find(|row| row.name == name)
    }
}

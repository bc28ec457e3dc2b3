//! Add/edit node editor for a remote filter graph.
//!
//! A session loads either the effect catalog (add) or an existing node
//! (edit), renders one control per parameter, validates edits against the
//! inferred control, and ends in exactly one save or cancel callback.

pub mod editor;
pub mod models;
pub mod remote;
pub mod services;
pub mod settings;

pub use editor::{EditorError, EditorSession, SessionCallbacks, SessionOutcome};
pub use models::editor::EditorView;
pub use models::schema::{EditorMode, EffectName, NodeUid, ParameterSchema, ParameterValues};
pub use remote::{FilterGraphClient, GraphService, InMemoryGraph};
pub use services::{commit_new_node, spawn_editor, EditorHandle, Intent};
pub use settings::ClientSettings;

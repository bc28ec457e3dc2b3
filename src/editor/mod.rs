//! The node editor core: control inference, form state, effect switching
//! and the add/edit session that ties them together.

pub mod controls;
pub mod effect_selector;
pub mod error;
pub mod form_state;
pub mod session;

#[cfg(test)]
mod tests;

pub use controls::{classify, quantize, ControlKind, UnsupportedSchemaError};
pub use effect_selector::EffectSelector;
pub use error::{EditorError, SessionError, UpdateError, ValidationError};
pub use form_state::{FieldStatus, FieldUpdate, FormStateStore, SyncPolicy};
pub use session::{Command, Delivery, EditorSession, SessionCallbacks, SessionOutcome};

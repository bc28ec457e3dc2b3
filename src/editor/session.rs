//! Add/edit session state machine.
//!
//! The session never performs I/O. Work it wants done (fetches and per-field
//! pushes) is queued as [`Command`]s; whoever drives the session runs them
//! and reports back through [`EditorSession::on_fetched`] and
//! [`EditorSession::on_update_finished`]. Every response is checked for
//! staleness before it may touch state, and nothing is applied once the
//! session is closed.

use std::collections::VecDeque;

use super::effect_selector::EffectSelector;
use super::error::{EditorError, SessionError};
use super::form_state::{FieldUpdate, FormStateStore, UpdateSettle};
use crate::models::editor::{EditorPhase, EditorView};
use crate::models::schema::{EditorMode, EffectName, ParameterValues};
use crate::remote::RemoteError;
use crate::services::schema_fetcher::{
    FetchError, FetchRequest, FetchTicket, Loaded, RequestSequencer, Tagged,
};
use serde_json::Value;

type SaveCallback = Box<dyn FnOnce(EffectName, ParameterValues) + Send>;
type CancelCallback = Box<dyn FnOnce() + Send>;

/// The owner's terminal hooks. Exactly one of them runs, once.
pub struct SessionCallbacks {
    on_save: Option<SaveCallback>,
    on_cancel: Option<CancelCallback>,
}

impl SessionCallbacks {
    pub fn new(
        on_save: impl FnOnce(EffectName, ParameterValues) + Send + 'static,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            on_save: Some(Box::new(on_save)),
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    fn save(&mut self, effect: EffectName, values: ParameterValues) {
        self.on_cancel = None;
        if let Some(on_save) = self.on_save.take() {
            on_save(effect, values);
        }
    }

    fn cancel(&mut self) {
        self.on_save = None;
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

/// I/O requested by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fetch(Tagged<FetchRequest>),
    Update(FieldUpdate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Saved {
        effect: EffectName,
        values: ParameterValues,
    },
    Cancelled,
}

/// What happened to a response handed to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    /// Reported as an error; prior state kept.
    Failed,
    /// Superseded by a newer request.
    Stale,
    /// The session is closed.
    Discarded,
}

pub struct EditorSession {
    mode: EditorMode,
    phase: EditorPhase,
    effect: Option<EffectName>,
    sequencer: RequestSequencer,
    selector: EffectSelector,
    store: FormStateStore,
    outbox: VecDeque<Command>,
    errors: Vec<EditorError>,
    callbacks: SessionCallbacks,
    outcome: Option<SessionOutcome>,
}

impl EditorSession {
    /// Start a session in `Loading` with the initial fetch queued.
    pub fn open(mode: EditorMode, callbacks: SessionCallbacks) -> Self {
        let mut session = Self {
            store: FormStateStore::for_mode(&mode),
            mode,
            phase: EditorPhase::Loading,
            effect: None,
            sequencer: RequestSequencer::new(),
            selector: EffectSelector::new(),
            outbox: VecDeque::new(),
            errors: Vec::new(),
            callbacks,
            outcome: None,
        };
        log::info!("Opening {} session", session.title());
        session.queue_initial_load();
        session
    }

    fn queue_initial_load(&mut self) {
        let request = match &self.mode {
            EditorMode::Add => FetchRequest::Catalog,
            EditorMode::Edit(uid) => FetchRequest::Node(uid.clone()),
        };
        let ticket = self.sequencer.issue();
        self.outbox.push_back(Command::Fetch(Tagged {
            ticket,
            value: request,
        }));
    }

    /// Drain queued I/O. Empty once the session is closed.
    pub fn take_commands(&mut self) -> Vec<Command> {
        self.outbox.drain(..).collect()
    }

    pub fn on_fetched(&mut self, result: Tagged<Result<Loaded, FetchError>>) -> Delivery {
        let Tagged { ticket, value } = result;

        if self.is_closed() {
            log::debug!("Dropping fetch {} for closed session", ticket.seq());
            return Delivery::Discarded;
        }
        if !self.sequencer.settle(ticket) {
            log::debug!("Dropping stale fetch {}", ticket.seq());
            return Delivery::Stale;
        }

        let applied = value
            .map_err(EditorError::from)
            .and_then(|loaded| self.apply_loaded(ticket, loaded));

        match applied {
            Ok(()) => Delivery::Applied,
            Err(err) => {
                log::warn!("Load failed: {}", err);
                self.selector.fail(ticket);
                self.errors.push(err);
                Delivery::Failed
            }
        }
    }

    fn apply_loaded(&mut self, ticket: FetchTicket, loaded: Loaded) -> Result<(), EditorError> {
        let (catalog, snapshot) = match loaded {
            Loaded::Catalog { effects, snapshot } => (Some(effects), snapshot),
            Loaded::Node(snapshot) | Loaded::Effect(snapshot) => (None, snapshot),
        };

        self.store.replace_all(snapshot.schema, snapshot.values)?;

        match catalog {
            Some(effects) => self.selector.set_catalog(effects, snapshot.effect.clone()),
            None if self.mode.is_add() => self.selector.resolve(ticket, snapshot.effect.clone()),
            None => {}
        }

        if self.phase == EditorPhase::Loading {
            log::info!("{} ready with {}", self.title(), snapshot.effect);
            self.phase = EditorPhase::Ready;
        } else {
            log::info!("Switched to {}", snapshot.effect);
        }
        self.effect = Some(snapshot.effect);
        Ok(())
    }

    pub fn on_update_finished(
        &mut self,
        update: &FieldUpdate,
        outcome: Result<(), RemoteError>,
    ) -> Delivery {
        if self.is_closed() {
            log::debug!(
                "Dropping update result for {} on closed session",
                update.parameter
            );
            return Delivery::Discarded;
        }

        match self.store.finish_update(update, outcome) {
            UpdateSettle::Confirmed => Delivery::Applied,
            UpdateSettle::Failed(err) => {
                log::warn!("{}", err);
                self.errors.push(err.into());
                Delivery::Failed
            }
            UpdateSettle::Superseded => {
                log::debug!(
                    "Ignoring result of superseded update {} v{}",
                    update.parameter,
                    update.version
                );
                Delivery::Stale
            }
        }
    }

    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), EditorError> {
        self.ensure_ready()?;
        if let Some(update) = self.store.set_value(name, value)? {
            self.outbox.push_back(Command::Update(update));
        }
        Ok(())
    }

    pub fn select_effect(&mut self, effect: EffectName) -> Result<(), EditorError> {
        self.ensure_open()?;
        if !self.mode.is_add() {
            return Err(SessionError::EffectLocked.into());
        }
        self.ensure_ready()?;

        if let Some(ticket) = self.selector.select(effect.clone(), &mut self.sequencer)? {
            log::info!("Loading {} (ticket {})", effect, ticket.seq());
            self.outbox.push_back(Command::Fetch(Tagged {
                ticket,
                value: FetchRequest::Effect(effect),
            }));
        }
        Ok(())
    }

    pub fn retry_update(&mut self, name: &str) -> Result<(), EditorError> {
        self.ensure_ready()?;
        let update = self.store.retry(name)?;
        self.outbox.push_back(Command::Update(update));
        Ok(())
    }

    /// Re-run the initial load after it failed.
    pub fn reload(&mut self) -> Result<(), EditorError> {
        self.ensure_open()?;
        if self.phase != EditorPhase::Loading {
            return Err(SessionError::AlreadyLoaded.into());
        }
        if self.sequencer.is_outstanding() {
            return Err(SessionError::LoadInFlight.into());
        }
        self.errors.clear();
        self.queue_initial_load();
        Ok(())
    }

    /// Hand the selected effect and all current values to `on_save`.
    pub fn save(&mut self) -> Result<(), EditorError> {
        self.ensure_open()?;
        if !self.mode.is_add() {
            return Err(SessionError::SaveUnavailable.into());
        }
        self.ensure_ready()?;
        if self.selector.is_switching() {
            return Err(SessionError::EffectSwitchPending.into());
        }
        let effect = self.effect.clone().ok_or(SessionError::NotReady)?;

        self.phase = EditorPhase::Saving;
        let values = self.store.values().clone();
        self.terminate(SessionOutcome::Saved { effect, values });
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), EditorError> {
        self.ensure_open()?;
        self.terminate(SessionOutcome::Cancelled);
        Ok(())
    }

    /// The popup's confirm button: save when adding, close when editing.
    pub fn finish(&mut self) -> Result<(), EditorError> {
        match self.mode {
            EditorMode::Add => self.save(),
            EditorMode::Edit(_) => self.cancel(),
        }
    }

    fn terminate(&mut self, outcome: SessionOutcome) {
        self.outbox.clear();
        self.sequencer.cancel();
        self.selector.abandon();
        self.phase = EditorPhase::Closed;

        match &outcome {
            SessionOutcome::Saved { effect, values } => {
                log::info!("Saving {} with {} values", effect, values.len());
                self.callbacks.save(effect.clone(), values.clone());
            }
            SessionOutcome::Cancelled => {
                log::info!("{} cancelled", self.title());
                self.callbacks.cancel();
            }
        }
        self.outcome = Some(outcome);
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.phase != EditorPhase::Ready {
            return Err(SessionError::NotReady);
        }
        Ok(())
    }

    /// Record an error for display.
    pub fn report(&mut self, err: EditorError) {
        self.errors.push(err);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn errors(&self) -> &[EditorError] {
        &self.errors
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == EditorPhase::Closed
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Effect the form currently shows.
    pub fn effect(&self) -> Option<&EffectName> {
        self.effect.as_ref()
    }

    pub fn store(&self) -> &FormStateStore {
        &self.store
    }

    pub fn values(&self) -> &ParameterValues {
        self.store.values()
    }

    pub fn title(&self) -> &'static str {
        match self.mode {
            EditorMode::Add => "Add Node",
            EditorMode::Edit(_) => "Edit Node",
        }
    }

    pub fn view(&self) -> EditorView {
        let add = self.mode.is_add();
        let selected = if add {
            self.selector.selected()
        } else {
            self.effect.as_ref()
        };

        let errors = self
            .errors
            .iter()
            .map(ToString::to_string)
            .chain(self.store.unsupported().into_iter().map(ToString::to_string))
            .collect();

        EditorView {
            title: self.title().to_string(),
            phase: self.phase,
            effects: self
                .selector
                .effects()
                .iter()
                .map(ToString::to_string)
                .collect(),
            selected_effect: selected.map(ToString::to_string),
            switching_effect: self.selector.is_switching(),
            rows: self.store.rows(),
            can_save: add && self.phase == EditorPhase::Ready && !self.selector.is_switching(),
            errors,
        }
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            log::debug!("{} dropped while open", self.title());
            self.terminate(SessionOutcome::Cancelled);
        }
    }
}

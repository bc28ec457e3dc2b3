//! Runs an [`EditorSession`] on a tokio task.
//!
//! User intents come in over an mpsc channel, views go out over a watch
//! channel. Remote calls run on their own tasks and report back through a
//! completion channel, so the session itself is only ever touched by the
//! host task.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::schema_fetcher::{FetchError, Loaded, SchemaFetcher, Tagged};
use crate::editor::error::SessionError;
use crate::editor::form_state::FieldUpdate;
use crate::editor::session::{Command, EditorSession, SessionCallbacks, SessionOutcome};
use crate::models::editor::EditorView;
use crate::models::schema::{EditorMode, EffectName, NodeUid};
use crate::remote::{GraphService, RemoteError};

const INTENT_BUFFER: usize = 32;
const COMPLETION_BUFFER: usize = 64;

/// What the user asked the popup to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SetValue { name: String, value: Value },
    SelectEffect(EffectName),
    Save,
    Cancel,
    Finish,
    Reload,
    RetryUpdate(String),
    ClearErrors,
}

enum Completion {
    Fetched(Tagged<Result<Loaded, FetchError>>),
    Updated(FieldUpdate, Result<(), RemoteError>),
}

pub struct EditorHandle {
    intents: mpsc::Sender<Intent>,
    views: watch::Receiver<EditorView>,
}

impl EditorHandle {
    pub async fn send(&self, intent: Intent) -> Result<(), SessionError> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Latest published view.
    pub fn view(&self) -> EditorView {
        self.views.borrow().clone()
    }

    /// Wait until a published view satisfies `ready`.
    pub async fn wait_for(
        &mut self,
        ready: impl FnMut(&EditorView) -> bool,
    ) -> Result<EditorView, SessionError> {
        self.views
            .wait_for(ready)
            .await
            .map(|view| view.clone())
            .map_err(|_| SessionError::Closed)
    }
}

/// Open a session for `mode` and drive it until it closes.
///
/// Dropping the handle cancels the session.
pub fn spawn_editor<S>(
    service: Arc<S>,
    mode: EditorMode,
    callbacks: SessionCallbacks,
) -> (EditorHandle, JoinHandle<SessionOutcome>)
where
    S: GraphService + ?Sized + 'static,
{
    let session = EditorSession::open(mode, callbacks);
    let (intent_tx, intent_rx) = mpsc::channel(INTENT_BUFFER);
    let (view_tx, view_rx) = watch::channel(session.view());

    let task = tokio::spawn(run_session(service, session, intent_rx, view_tx));

    (
        EditorHandle {
            intents: intent_tx,
            views: view_rx,
        },
        task,
    )
}

async fn run_session<S>(
    service: Arc<S>,
    mut session: EditorSession,
    mut intents: mpsc::Receiver<Intent>,
    views: watch::Sender<EditorView>,
) -> SessionOutcome
where
    S: GraphService + ?Sized + 'static,
{
    let fetcher = SchemaFetcher::new(Arc::clone(&service));
    let (done_tx, mut done_rx) = mpsc::channel::<Completion>(COMPLETION_BUFFER);

    loop {
        for command in session.take_commands() {
            dispatch(&service, &fetcher, command, done_tx.clone());
        }
        views.send_replace(session.view());

        if let Some(outcome) = session.outcome() {
            return outcome.clone();
        }

        tokio::select! {
            Some(completion) = done_rx.recv() => match completion {
                Completion::Fetched(result) => {
                    session.on_fetched(result);
                }
                Completion::Updated(update, result) => {
                    session.on_update_finished(&update, result);
                }
            },
            intent = intents.recv() => match intent {
                Some(intent) => apply(&mut session, intent),
                None => {
                    log::debug!("Editor handle dropped, cancelling");
                    if let Err(e) = session.cancel() {
                        log::debug!("Cancel on drop: {}", e);
                    }
                }
            },
        }
    }
}

fn dispatch<S>(
    service: &Arc<S>,
    fetcher: &SchemaFetcher<S>,
    command: Command,
    done: mpsc::Sender<Completion>,
) where
    S: GraphService + ?Sized + 'static,
{
    match command {
        Command::Fetch(request) => {
            let fetcher = fetcher.clone();
            tokio::spawn(async move {
                let result = fetcher.fetch(request).await;
                // receiver gone means the session already closed
                let _ = done.send(Completion::Fetched(result)).await;
            });
        }
        Command::Update(update) => {
            let service = Arc::clone(service);
            tokio::spawn(async move {
                let result = service.update_node(&update.node, &update.patch).await;
                let _ = done.send(Completion::Updated(update, result)).await;
            });
        }
    }
}

fn apply(session: &mut EditorSession, intent: Intent) {
    let result = match intent {
        Intent::SetValue { name, value } => session.set_value(&name, value),
        Intent::SelectEffect(effect) => session.select_effect(effect),
        Intent::Save => session.save(),
        Intent::Cancel => session.cancel(),
        Intent::Finish => session.finish(),
        Intent::Reload => session.reload(),
        Intent::RetryUpdate(name) => session.retry_update(&name),
        Intent::ClearErrors => {
            session.clear_errors();
            Ok(())
        }
    };

    if let Err(err) = result {
        log::warn!("{}", err);
        session.report(err);
    }
}

/// Create the node an add session saved. Cancelled sessions create nothing.
pub async fn commit_new_node<S>(
    service: &S,
    outcome: &SessionOutcome,
) -> Result<Option<NodeUid>, RemoteError>
where
    S: GraphService + ?Sized,
{
    match outcome {
        SessionOutcome::Saved { effect, values } => {
            let uid = service.add_node(effect, values).await?;
            log::info!("Created node {} ({})", uid, effect.short_name());
            Ok(Some(uid))
        }
        SessionOutcome::Cancelled => Ok(None),
    }
}

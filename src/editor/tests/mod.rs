use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use super::error::{EditorError, SessionError, ValidationError};
use super::form_state::FieldUpdate;
use super::session::{Command, Delivery, EditorSession, SessionCallbacks};
use crate::models::editor::{ControlWidget, EditorPhase, SyncState};
use crate::models::schema::{EditorMode, EffectName, NodeUid, ParameterValues};
use crate::remote::{GraphService, InMemoryGraph, RemoteCall};
use crate::services::schema_fetcher::SchemaFetcher;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Saved(EffectName, ParameterValues),
    Cancelled,
}

type Events = Arc<Mutex<Vec<Event>>>;

fn recording() -> (SessionCallbacks, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let on_save = Arc::clone(&events);
    let on_cancel = Arc::clone(&events);
    let callbacks = SessionCallbacks::new(
        move |effect, values| on_save.lock().unwrap().push(Event::Saved(effect, values)),
        move || on_cancel.lock().unwrap().push(Event::Cancelled),
    );
    (callbacks, events)
}

fn events(events: &Events) -> Vec<Event> {
    events.lock().unwrap().clone()
}

fn map(pairs: &[(&str, Value)]) -> ParameterValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn delay_defaults() -> ParameterValues {
    map(&[
        ("time", json!(250)),
        ("sync", json!(false)),
        ("mode", json!("tape")),
    ])
}

fn reverb_defaults() -> ParameterValues {
    map(&[("room", json!(0.3)), ("wet", json!(true))])
}

fn add_graph() -> InMemoryGraph {
    InMemoryGraph::new()
        .with_effect(
            "Reverb",
            map(&[("room", json!([0.3, 0.0, 1.0, 0.1])), ("wet", json!(true))]),
            reverb_defaults(),
        )
        .with_effect(
            "Delay",
            map(&[
                ("time", json!([250, 0, 1000, 10])),
                ("sync", json!(false)),
                ("mode", json!(["tape", "digital"])),
            ]),
            delay_defaults(),
        )
}

fn edit_graph() -> InMemoryGraph {
    InMemoryGraph::new()
        .with_effect(
            "audioled.effects.Gain",
            map(&[
                ("gain", json!([0.5, 0.0, 1.0, 0.1])),
                ("curve", json!(["linear", "log"])),
            ]),
            map(&[("gain", json!(0.5)), ("curve", json!("linear"))]),
        )
        .with_node(
            "7",
            "audioled.effects.Gain",
            map(&[("gain", json!(0.5)), ("curve", json!("linear"))]),
        )
}

fn edit_mode() -> EditorMode {
    EditorMode::Edit(NodeUid::from("7"))
}

/// Run queued commands in order until the session asks for nothing more.
async fn pump(session: &mut EditorSession, service: &Arc<InMemoryGraph>) {
    let fetcher = SchemaFetcher::new(Arc::clone(service));
    loop {
        let commands = session.take_commands();
        if commands.is_empty() {
            break;
        }
        for command in commands {
            match command {
                Command::Fetch(request) => {
                    let result = fetcher.fetch(request).await;
                    session.on_fetched(result);
                }
                Command::Update(update) => {
                    let result = service.update_node(&update.node, &update.patch).await;
                    session.on_update_finished(&update, result);
                }
            }
        }
    }
}

fn updates(commands: Vec<Command>) -> Vec<FieldUpdate> {
    commands
        .into_iter()
        .filter_map(|command| match command {
            Command::Update(update) => Some(update),
            Command::Fetch(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn add_session_switches_effect_and_saves_its_defaults() {
    let service = Arc::new(add_graph());
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    assert_eq!(session.phase(), EditorPhase::Loading);

    pump(&mut session, &service).await;

    let view = session.view();
    assert_eq!(view.phase, EditorPhase::Ready);
    assert_eq!(view.effects, vec!["Delay".to_string(), "Reverb".to_string()]);
    assert_eq!(view.selected_effect.as_deref(), Some("Delay"));
    assert_eq!(session.values(), &delay_defaults());

    // local only in add mode
    session.set_value("time", json!(400)).unwrap();
    assert!(session.take_commands().is_empty());

    session.select_effect(EffectName::from("Reverb")).unwrap();
    pump(&mut session, &service).await;

    assert_eq!(session.effect(), Some(&EffectName::from("Reverb")));
    assert_eq!(session.values(), &reverb_defaults());
    assert!(session.store().schema().contains_key("room"));
    assert!(!session.store().schema().contains_key("time"));

    session.save().unwrap();
    assert_eq!(
        events(&log),
        vec![Event::Saved(EffectName::from("Reverb"), reverb_defaults())]
    );
    assert_eq!(session.phase(), EditorPhase::Closed);
    assert!(session.take_commands().is_empty());
    assert!(!service
        .calls()
        .await
        .iter()
        .any(|call| matches!(call, RemoteCall::UpdateNode(..) | RemoteCall::AddNode(..))));
}

#[tokio::test]
async fn edit_session_pushes_single_field_then_cancels_quietly() {
    let service = Arc::new(edit_graph());
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(edit_mode(), callbacks);
    pump(&mut session, &service).await;

    assert_eq!(session.values().get("gain"), Some(&json!(0.5)));
    assert_eq!(session.view().title, "Edit Node");

    session.set_value("gain", json!(0.8)).unwrap();
    assert_eq!(session.values().get("gain"), Some(&json!(0.8)));

    let pushed = updates(session.take_commands());
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].node, NodeUid::from("7"));
    assert_eq!(pushed[0].patch, map(&[("gain", json!(0.8))]));

    let result = service
        .update_node(&pushed[0].node, &pushed[0].patch)
        .await;
    assert_eq!(session.on_update_finished(&pushed[0], result), Delivery::Applied);
    assert_eq!(session.view().row("gain").unwrap().sync, SyncState::Confirmed);

    let calls_before = service.calls().await.len();
    session.cancel().unwrap();

    assert_eq!(events(&log), vec![Event::Cancelled]);
    assert!(session.take_commands().is_empty());
    assert_eq!(service.calls().await.len(), calls_before);
    assert_eq!(
        service.node_values(&NodeUid::from("7")).await.unwrap().get("gain"),
        Some(&json!(0.8))
    );
}

#[tokio::test]
async fn rapid_switches_apply_only_the_latest_selection() {
    let service = Arc::new(add_graph().with_effect(
        "Chorus",
        map(&[("depth", json!([0.5, 0.0, 1.0, 0.1]))]),
        map(&[("depth", json!(0.5))]),
    ));
    let fetcher = SchemaFetcher::new(Arc::clone(&service));
    let (callbacks, _log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;
    assert_eq!(session.effect(), Some(&EffectName::from("Chorus")));

    session.select_effect(EffectName::from("Delay")).unwrap();
    let mut first = session.take_commands();
    session.select_effect(EffectName::from("Reverb")).unwrap();
    let mut second = session.take_commands();
    assert_eq!(session.view().selected_effect.as_deref(), Some("Reverb"));
    assert!(session.view().switching_effect);

    let (Some(Command::Fetch(a)), Some(Command::Fetch(b))) = (first.pop(), second.pop()) else {
        panic!("expected two fetches");
    };

    // B resolves first, then A's late response arrives
    let b_result = fetcher.fetch(b).await;
    assert_eq!(session.on_fetched(b_result), Delivery::Applied);
    let a_result = fetcher.fetch(a).await;
    assert_eq!(session.on_fetched(a_result), Delivery::Stale);

    assert_eq!(session.effect(), Some(&EffectName::from("Reverb")));
    assert_eq!(session.values(), &reverb_defaults());
    assert!(!session.view().switching_effect);
}

#[tokio::test]
async fn early_response_of_superseded_switch_is_stale() {
    let service = Arc::new(add_graph());
    let fetcher = SchemaFetcher::new(Arc::clone(&service));
    let (callbacks, _log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;

    session.select_effect(EffectName::from("Reverb")).unwrap();
    let stale = session.take_commands();
    session.select_effect(EffectName::from("Delay")).unwrap();
    // back to the loaded effect: nothing new to fetch
    assert!(session.take_commands().is_empty());

    for command in stale {
        if let Command::Fetch(request) = command {
            let result = fetcher.fetch(request).await;
            assert_eq!(session.on_fetched(result), Delivery::Stale);
        }
    }
    assert_eq!(session.effect(), Some(&EffectName::from("Delay")));
    assert_eq!(session.values(), &delay_defaults());
}

#[tokio::test]
async fn responses_after_close_are_discarded() {
    let service = Arc::new(add_graph());
    let fetcher = SchemaFetcher::new(Arc::clone(&service));
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);

    let initial = session.take_commands();
    session.cancel().unwrap();

    for command in initial {
        if let Command::Fetch(request) = command {
            let result = fetcher.fetch(request).await;
            assert_eq!(session.on_fetched(result), Delivery::Discarded);
        }
    }
    assert_eq!(session.phase(), EditorPhase::Closed);
    assert!(session.view().rows.is_empty());
    assert_eq!(events(&log), vec![Event::Cancelled]);
}

#[tokio::test]
async fn update_results_after_close_are_discarded() {
    let service = Arc::new(edit_graph());
    let (callbacks, _log) = recording();
    let mut session = EditorSession::open(edit_mode(), callbacks);
    pump(&mut session, &service).await;

    session.set_value("curve", json!("log")).unwrap();
    let pushed = updates(session.take_commands());
    session.finish().unwrap();

    let result = service.update_node(&pushed[0].node, &pushed[0].patch).await;
    assert_eq!(
        session.on_update_finished(&pushed[0], result),
        Delivery::Discarded
    );
}

#[tokio::test]
async fn failed_push_keeps_local_value_and_can_be_retried() {
    let service = Arc::new(edit_graph().rejecting_updates_for("gain"));
    let (callbacks, _log) = recording();
    let mut session = EditorSession::open(edit_mode(), callbacks);
    pump(&mut session, &service).await;

    session.set_value("gain", json!(0.8)).unwrap();
    pump(&mut session, &service).await;

    assert_eq!(session.values().get("gain"), Some(&json!(0.8)));
    assert!(matches!(session.errors(), [EditorError::Update(_)]));
    let view = session.view();
    assert_eq!(view.row("gain").unwrap().sync, SyncState::Failed);
    assert_eq!(view.errors.len(), 1);

    service.accept_updates_for("gain").await;
    session.clear_errors();
    session.retry_update("gain").unwrap();
    pump(&mut session, &service).await;

    assert!(session.errors().is_empty());
    assert_eq!(session.view().row("gain").unwrap().sync, SyncState::Confirmed);
    assert_eq!(
        service.node_values(&NodeUid::from("7")).await.unwrap().get("gain"),
        Some(&json!(0.8))
    );
    assert!(matches!(
        session.retry_update("gain"),
        Err(EditorError::Session(SessionError::NothingToRetry(_)))
    ));
}

#[tokio::test]
async fn late_failure_of_older_push_is_not_reported() {
    let service = Arc::new(edit_graph());
    let (callbacks, _log) = recording();
    let mut session = EditorSession::open(edit_mode(), callbacks);
    pump(&mut session, &service).await;

    session.set_value("gain", json!(0.2)).unwrap();
    session.set_value("gain", json!(0.9)).unwrap();
    let pushed = updates(session.take_commands());
    assert_eq!(pushed.len(), 2);

    assert_eq!(session.on_update_finished(&pushed[1], Ok(())), Delivery::Applied);
    let late = Err(crate::remote::RemoteError::RequestFailed("timeout".to_string()));
    assert_eq!(session.on_update_finished(&pushed[0], late), Delivery::Stale);

    assert!(session.errors().is_empty());
    assert_eq!(session.values().get("gain"), Some(&json!(0.9)));
    assert_eq!(session.view().row("gain").unwrap().sync, SyncState::Confirmed);
}

#[tokio::test]
async fn edit_mode_has_no_save_and_locked_effect() {
    let service = Arc::new(edit_graph());
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(edit_mode(), callbacks);
    pump(&mut session, &service).await;

    assert_eq!(
        session.select_effect(EffectName::from("Delay")),
        Err(EditorError::Session(SessionError::EffectLocked))
    );
    assert_eq!(
        session.save(),
        Err(EditorError::Session(SessionError::SaveUnavailable))
    );
    let view = session.view();
    assert!(!view.can_save);
    assert!(view.effects.is_empty());
    assert_eq!(view.selected_effect.as_deref(), Some("audioled.effects.Gain"));

    session.finish().unwrap();
    assert_eq!(events(&log), vec![Event::Cancelled]);
}

#[tokio::test]
async fn terminal_callback_fires_exactly_once() {
    let service = Arc::new(add_graph());
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;

    session.finish().unwrap();
    assert_eq!(
        session.cancel(),
        Err(EditorError::Session(SessionError::Closed))
    );
    assert_eq!(
        session.save(),
        Err(EditorError::Session(SessionError::Closed))
    );
    assert_eq!(
        session.set_value("time", json!(10)),
        Err(EditorError::Session(SessionError::Closed))
    );
    drop(session);

    assert_eq!(
        events(&log),
        vec![Event::Saved(EffectName::from("Delay"), delay_defaults())]
    );
}

#[test]
fn dropping_an_open_session_cancels_once() {
    let (callbacks, log) = recording();
    let session = EditorSession::open(EditorMode::Add, callbacks);
    drop(session);
    assert_eq!(events(&log), vec![Event::Cancelled]);
}

#[tokio::test]
async fn failed_initial_load_can_be_reloaded() {
    let service = Arc::new(edit_graph());
    service.set_offline(true).await;
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(edit_mode(), callbacks);
    pump(&mut session, &service).await;

    assert_eq!(session.phase(), EditorPhase::Loading);
    assert!(matches!(session.errors(), [EditorError::Fetch(_)]));
    assert!(session.view().rows.is_empty());
    assert_eq!(
        session.set_value("gain", json!(0.1)),
        Err(EditorError::Session(SessionError::NotReady))
    );

    service.set_offline(false).await;
    session.reload().unwrap();
    assert_eq!(
        session.reload(),
        Err(EditorError::Session(SessionError::LoadInFlight))
    );
    pump(&mut session, &service).await;

    assert_eq!(session.phase(), EditorPhase::Ready);
    assert!(session.errors().is_empty());
    assert_eq!(
        session.reload(),
        Err(EditorError::Session(SessionError::AlreadyLoaded))
    );
    assert!(events(&log).is_empty());
}

#[tokio::test]
async fn failed_switch_keeps_previous_effect() {
    let service = Arc::new(add_graph());
    let (callbacks, _log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;
    session.set_value("mode", json!("digital")).unwrap();

    service.set_offline(true).await;
    session.select_effect(EffectName::from("Reverb")).unwrap();
    pump(&mut session, &service).await;

    assert!(matches!(session.errors(), [EditorError::Fetch(_)]));
    assert_eq!(session.view().selected_effect.as_deref(), Some("Delay"));
    assert_eq!(session.values().get("mode"), Some(&json!("digital")));
    assert!(session.view().can_save);
}

#[tokio::test]
async fn save_waits_for_pending_switch() {
    let service = Arc::new(add_graph());
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;

    session.select_effect(EffectName::from("Reverb")).unwrap();
    assert!(!session.view().can_save);
    assert_eq!(
        session.save(),
        Err(EditorError::Session(SessionError::EffectSwitchPending))
    );

    pump(&mut session, &service).await;
    session.save().unwrap();
    assert_eq!(
        events(&log),
        vec![Event::Saved(EffectName::from("Reverb"), reverb_defaults())]
    );
}

#[tokio::test]
async fn invalid_edits_are_rejected_without_side_effects() {
    let service = Arc::new(edit_graph());
    let (callbacks, _log) = recording();
    let mut session = EditorSession::open(edit_mode(), callbacks);
    pump(&mut session, &service).await;

    assert!(matches!(
        session.set_value("curve", json!("cubic")),
        Err(EditorError::Validation(ValidationError::NotAnOption { .. }))
    ));
    assert!(matches!(
        session.set_value("gain", json!(true)),
        Err(EditorError::Validation(ValidationError::NotANumber { .. }))
    ));
    assert!(session.take_commands().is_empty());
    assert_eq!(session.values().get("curve"), Some(&json!("linear")));
}

#[tokio::test]
async fn range_edits_land_on_the_grid() {
    let service = Arc::new(add_graph());
    let (callbacks, _log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;

    for raw in [-50.0, 3.0, 14.9, 255.0, 999.0, 1004.9, 5000.0] {
        session.set_value("time", json!(raw)).unwrap();
        let stored = session.values()["time"].as_i64().expect("integer range");
        assert!((0..=1000).contains(&stored), "{} -> {}", raw, stored);
        assert_eq!(stored % 10, 0, "{} -> {}", raw, stored);
    }
}

#[tokio::test]
async fn unsupported_parameters_are_shown_not_hidden() {
    let service = Arc::new(InMemoryGraph::new().with_effect(
        "Palette",
        map(&[("color", json!("red")), ("bright", json!(true))]),
        map(&[("color", json!("red")), ("bright", json!(true))]),
    ));
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;

    let view = session.view();
    assert_eq!(view.rows.len(), 2);
    assert!(matches!(
        view.row("color").unwrap().widget,
        ControlWidget::Unsupported { .. }
    ));
    assert!(view.errors.iter().any(|e| e.contains("color")));
    assert!(matches!(
        session.set_value("color", json!("blue")),
        Err(EditorError::UnsupportedSchema(_))
    ));

    session.save().unwrap();
    assert_eq!(
        events(&log),
        vec![Event::Saved(
            EffectName::from("Palette"),
            map(&[("color", json!("red")), ("bright", json!(true))])
        )]
    );
}

#[tokio::test]
async fn nonconforming_defaults_never_reach_the_form_or_save() {
    let service = Arc::new(InMemoryGraph::new().with_effect(
        "Gain",
        map(&[
            ("gain", json!([0.5, 0.0, 1.0, 0.1])),
            ("wave", json!(["sine", "saw"])),
            ("mute", json!(true)),
        ]),
        map(&[
            ("gain", json!(7.3)),
            ("wave", json!("triangle")),
            ("mute", json!("yes")),
        ]),
    ));
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;

    assert_eq!(session.phase(), EditorPhase::Loading);
    assert!(matches!(
        session.errors(),
        [EditorError::Validation(ValidationError::NotABoolean { .. })]
    ));
    assert!(session.view().rows.is_empty());
    assert_eq!(
        session.save(),
        Err(EditorError::Session(SessionError::NotReady))
    );
    assert!(events(&log).is_empty());
}

#[tokio::test]
async fn out_of_range_defaults_are_saved_on_the_grid() {
    let service = Arc::new(InMemoryGraph::new().with_effect(
        "Gain",
        map(&[
            ("gain", json!([0.5, 0.0, 1.0, 0.1])),
            ("wave", json!(["sine", "saw"])),
            ("mute", json!(true)),
        ]),
        map(&[
            ("gain", json!(7.3)),
            ("wave", json!("saw")),
            ("mute", json!(false)),
        ]),
    ));
    let (callbacks, log) = recording();
    let mut session = EditorSession::open(EditorMode::Add, callbacks);
    pump(&mut session, &service).await;

    assert_eq!(session.view().row("gain").unwrap().value, json!(1.0));
    session.save().unwrap();
    assert_eq!(
        events(&log),
        vec![Event::Saved(
            EffectName::from("Gain"),
            map(&[
                ("gain", json!(1.0)),
                ("wave", json!("saw")),
                ("mute", json!(false)),
            ])
        )]
    );
}

//! The simulated obs-websocket server.
//!
//! `Simulator` owns every piece of state and is driven by two inputs:
//! requests (`send`) and virtual time (`advance`). Timed effects sit in a
//! timer queue and run one at a time, each re-checking the state it expects
//! before committing.

mod dispatch;
mod outputs;
mod scenes;
mod sources;

use crate::catalog::builtin::builtin_catalog;
use crate::catalog::SourceCatalog;
use crate::cloner::{deep_clone, SettingsValue};
use crate::config::SimulatorConfig;
use crate::error::{BuildError, RequestError, RequestResult};
use crate::event_bus::{EventBus, SubscriptionId};
use crate::events::{Event, EventKind, Notification};
use crate::lifecycle::{format_timecode, OutputKind, OutputLifecycle, OutputState};
use crate::model::fixtures::default_collections;
use crate::model::{CollectionRegistry, SceneCollection};
use crate::protocol::{self, Request};
use crate::timers::{TimerId, TimerQueue, TimerTask};
use crate::transition::TransitionEngine;
use serde_json::Value;

/// Stream service settings: a service type plus an open-ended settings map.
#[derive(Debug)]
struct StreamSettings {
    service_type: String,
    settings: SettingsValue,
}

impl StreamSettings {
    fn copy(&self) -> Self {
        Self {
            service_type: self.service_type.clone(),
            settings: deep_clone(&self.settings),
        }
    }
}

/// Challenge issued for one connection.
#[derive(Debug, Clone)]
struct AuthChallenge {
    salt: String,
    challenge: String,
}

/// Per-connection runtime state, rebuilt from scratch on every reset.
#[derive(Debug)]
struct Session {
    authenticated: bool,
    challenge: Option<AuthChallenge>,
    studio_mode: bool,
    preview_scene: Option<String>,
    profile: String,
    heartbeat: Option<TimerId>,
    status_timer: Option<TimerId>,
    pulse: bool,
    stream: StreamSettings,
    rec_folder: String,
    filename_formatting: String,
    recording_filename: Option<String>,
    /// Virtual time the connection opened at, for render counters
    opened_ms: u64,
}

impl Session {
    fn new(config: &SimulatorConfig, stream: StreamSettings) -> Self {
        Self {
            authenticated: false,
            challenge: None,
            studio_mode: false,
            preview_scene: None,
            profile: config.profiles.names.first().cloned().unwrap_or_default(),
            heartbeat: None,
            status_timer: None,
            pulse: false,
            stream,
            rec_folder: config.recording.folder.clone(),
            filename_formatting: config.recording.filename_formatting.clone(),
            recording_filename: None,
            opened_ms: 0,
        }
    }
}

pub struct Simulator {
    config: SimulatorConfig,
    catalog: SourceCatalog,
    collections: CollectionRegistry,
    streaming: OutputLifecycle,
    recording: OutputLifecycle,
    replay: OutputLifecycle,
    transitions: TransitionEngine,
    timers: TimerQueue,
    bus: EventBus,
    /// Stream settings a reset restores; replaced by `SaveStreamSettings`
    saved_stream: StreamSettings,
    session: Session,
    connected: bool,
    now_ms: u64,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("connected", &self.connected)
            .field("now_ms", &self.now_ms)
            .field("collection", &self.collections.active_name())
            .field("streaming", &self.streaming.state())
            .field("recording", &self.recording.state())
            .field("replay", &self.replay.state())
            .field("pending_timers", &self.timers.len())
            .finish()
    }
}

impl Simulator {
    /// Simulator with the built-in catalog and default collections.
    pub fn new(config: SimulatorConfig) -> Result<Self, BuildError> {
        let catalog = builtin_catalog()?;
        let collections = default_collections(&catalog)?;
        Self::with_collections(config, catalog, collections)
    }

    /// Simulator over caller-built collections. The first one starts active.
    pub fn with_collections(
        config: SimulatorConfig,
        catalog: SourceCatalog,
        collections: Vec<SceneCollection>,
    ) -> Result<Self, BuildError> {
        let collections = CollectionRegistry::new(collections)?;
        let saved_stream = StreamSettings {
            service_type: config.stream.service_type.clone(),
            settings: SettingsValue::from_json(&config.stream.settings_json()),
        };
        let session = Session::new(&config, saved_stream.copy());
        Ok(Self {
            transitions: TransitionEngine::new(config.timing.transition_fallback_ms),
            config,
            catalog,
            collections,
            streaming: OutputLifecycle::new(OutputKind::Streaming),
            recording: OutputLifecycle::new(OutputKind::Recording),
            replay: OutputLifecycle::new(OutputKind::ReplayBuffer),
            timers: TimerQueue::new(),
            bus: EventBus::new(),
            saved_stream,
            session,
            connected: false,
            now_ms: 0,
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────────────

    /// Open a connection. With a password configured, `Some(password)` runs
    /// the challenge handshake and fails on mismatch; `None` leaves the
    /// session unauthenticated until an `Authenticate` request succeeds.
    pub fn connect(&mut self, password: Option<&str>) -> RequestResult<()> {
        if self.connected {
            log::debug!("connect ignored: already connected");
            return Ok(());
        }
        let challenge = self.config.password.as_ref().map(|_| AuthChallenge {
            salt: protocol::random_token(),
            challenge: protocol::random_token(),
        });

        let authenticated = match (&challenge, password) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(c), Some(given)) => {
                let auth = protocol::generate_auth_string(given, &c.challenge, &c.salt);
                if !self.check_auth(c, &auth) {
                    log::info!("connection refused: authentication failed");
                    self.emit(Event::AuthenticationFailure);
                    return Err(RequestError::AuthenticationFailed);
                }
                true
            }
        };

        self.connected = true;
        self.session.opened_ms = self.now_ms;
        self.session.challenge = challenge;
        self.session.authenticated = authenticated;
        log::info!("connected (authenticated: {})", authenticated);
        self.emit(Event::ConnectionOpened);
        if authenticated && self.config.password.is_some() {
            self.emit(Event::AuthenticationSuccess);
        }
        Ok(())
    }

    fn check_auth(&self, challenge: &AuthChallenge, auth: &str) -> bool {
        match &self.config.password {
            Some(password) => {
                protocol::generate_auth_string(password, &challenge.challenge, &challenge.salt) == auth
            }
            None => true,
        }
    }

    /// Close the connection, cancel every pending timer and restore all
    /// state to its baseline. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        let was_connected = self.connected;
        self.reset();
        if was_connected {
            log::info!("disconnected");
            self.emit(Event::ConnectionClosed);
        }
    }

    fn reset(&mut self) {
        self.timers.cancel_all();
        self.collections.reset();
        self.streaming.reset();
        self.recording.reset();
        self.replay.reset();
        self.transitions.reset();
        self.session = Session::new(&self.config, self.saved_stream.copy());
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_authenticated(&self) -> bool {
        self.connected && self.session.authenticated
    }

    // ─────────────────────────────────────────────────────────────────
    // Requests
    // ─────────────────────────────────────────────────────────────────

    /// Handle a raw JSON request and return the response object.
    pub fn send(&mut self, raw: Value) -> Value {
        match Request::from_json(raw.clone()) {
            Ok(request) => self.send_request(&request),
            Err(e) => protocol::error_response(&protocol::message_id_of(&raw), &e),
        }
    }

    pub fn send_request(&mut self, request: &Request) -> Value {
        match self.dispatch(request) {
            Ok(body) => protocol::ok_response(&request.message_id, body),
            Err(e) => {
                log::debug!("{} failed: {}", request.request_type, e);
                protocol::error_response(&request.message_id, &e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + 'static,
    {
        self.bus.on(kind, callback)
    }

    pub fn on_any<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + 'static,
    {
        self.bus.on_any(callback)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.bus.off(id)
    }

    fn emit(&self, event: Event) {
        let timecode = |output: &OutputLifecycle| {
            output
                .has_timecode()
                .then(|| format_timecode(output.elapsed_ms(self.now_ms)))
        };
        let notification = Notification {
            event,
            at_ms: self.now_ms,
            stream_timecode: timecode(&self.streaming),
            rec_timecode: timecode(&self.recording),
        };
        self.bus.emit(&notification);
    }

    // ─────────────────────────────────────────────────────────────────
    // Virtual time
    // ─────────────────────────────────────────────────────────────────

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Due instant of the earliest pending timer.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.timers.next_due()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn advance(&mut self, delta_ms: u64) {
        self.advance_to(self.now_ms.saturating_add(delta_ms));
    }

    /// Move virtual time forward to `target_ms`, running every timer due on
    /// the way in (due time, schedule order). Time never moves backwards.
    pub fn advance_to(&mut self, target_ms: u64) {
        while let Some((due, task)) = self.timers.pop_due(target_ms) {
            self.now_ms = self.now_ms.max(due);
            self.fire(task);
        }
        self.now_ms = self.now_ms.max(target_ms);
    }

    fn fire(&mut self, task: TimerTask) {
        match task {
            TimerTask::StartDone(kind) => self.complete_output_start(kind),
            TimerTask::StopDone(kind) => self.complete_output_stop(kind),
            TimerTask::ReplaySaved => self.emit(Event::ReplayBufferSaved),
            TimerTask::TransitionDone { id } => self.complete_transition(id),
            TimerTask::Heartbeat => self.heartbeat_tick(),
            TimerTask::Status => self.status_tick(),
        }
    }

    fn schedule_in(&mut self, delay_ms: u64, task: TimerTask) -> TimerId {
        self.timers.schedule_at(self.now_ms.saturating_add(delay_ms), task)
    }

    // ─────────────────────────────────────────────────────────────────
    // Read-only accessors
    // ─────────────────────────────────────────────────────────────────

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn collections(&self) -> &CollectionRegistry {
        &self.collections
    }

    fn collection(&self) -> &SceneCollection {
        self.collections.active()
    }

    fn collection_mut(&mut self) -> &mut SceneCollection {
        self.collections.active_mut()
    }

    pub fn current_scene(&self) -> &str {
        self.collection().current_scene()
    }

    pub fn output_state(&self, kind: OutputKind) -> OutputState {
        self.output(kind).state()
    }

    fn output(&self, kind: OutputKind) -> &OutputLifecycle {
        match kind {
            OutputKind::Streaming => &self.streaming,
            OutputKind::Recording => &self.recording,
            OutputKind::ReplayBuffer => &self.replay,
        }
    }

    fn output_mut(&mut self, kind: OutputKind) -> &mut OutputLifecycle {
        match kind {
            OutputKind::Streaming => &mut self.streaming,
            OutputKind::Recording => &mut self.recording,
            OutputKind::ReplayBuffer => &mut self.replay,
        }
    }

    /// Elapsed time of an output, 0 unless it has a running or frozen clock.
    pub fn output_elapsed_ms(&self, kind: OutputKind) -> u64 {
        self.output(kind).elapsed_ms(self.now_ms)
    }

    pub fn studio_mode(&self) -> bool {
        self.session.studio_mode
    }

    pub fn preview_scene(&self) -> Option<&str> {
        self.session.preview_scene.as_deref()
    }

    pub fn heartbeat_enabled(&self) -> bool {
        self.session.heartbeat.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn request(kind: &str) -> Value {
        json!({"request-type": kind, "message-id": "1"})
    }

    fn recorder(sim: &mut Simulator) -> Arc<Mutex<Vec<EventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        sim.on_any(move |n| s.lock().unwrap().push(n.kind()));
        seen
    }

    #[test]
    fn requests_require_connection() {
        let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
        let resp = sim.send(request("GetCurrentScene"));
        assert_eq!(resp["status"], json!("error"));
        assert_eq!(resp["error"], json!("not connected"));

        sim.connect(None).unwrap();
        let resp = sim.send(request("GetCurrentScene"));
        assert_eq!(resp["status"], json!("ok"));
        assert_eq!(resp["name"], json!("Starting"));
    }

    #[test]
    fn malformed_request_echoes_message_id() {
        let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
        sim.connect(None).unwrap();
        let resp = sim.send(json!({"message-id": "abc"}));
        assert_eq!(resp["status"], json!("error"));
        assert_eq!(resp["message-id"], json!("abc"));
    }

    #[test]
    fn connect_and_disconnect_emit_once() {
        let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
        let seen = recorder(&mut sim);

        sim.connect(None).unwrap();
        sim.connect(None).unwrap();
        sim.disconnect();
        sim.disconnect();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::ConnectionOpened, EventKind::ConnectionClosed]
        );
    }

    #[test]
    fn password_handshake() {
        let config = SimulatorConfig {
            password: Some("hunter2".into()),
            ..SimulatorConfig::default()
        };
        let mut sim = Simulator::new(config).unwrap();
        let seen = recorder(&mut sim);

        assert_eq!(sim.connect(Some("nope")), Err(RequestError::AuthenticationFailed));
        assert!(!sim.is_connected());

        sim.connect(Some("hunter2")).unwrap();
        assert!(sim.is_authenticated());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                EventKind::AuthenticationFailure,
                EventKind::ConnectionOpened,
                EventKind::AuthenticationSuccess
            ]
        );
    }

    #[test]
    fn advance_runs_timers_in_order_and_never_rewinds() {
        let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
        sim.connect(None).unwrap();
        sim.send(request("StartStreaming"));
        assert_eq!(sim.next_due_ms(), Some(500));

        sim.advance_to(499);
        assert_eq!(sim.output_state(OutputKind::Streaming), OutputState::Starting);
        sim.advance_to(500);
        assert_eq!(sim.output_state(OutputKind::Streaming), OutputState::Started);

        sim.advance_to(100);
        assert_eq!(sim.now_ms(), 500);
    }

    #[test]
    fn disconnect_cancels_timers_and_resets_outputs() {
        let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
        sim.connect(None).unwrap();
        sim.send(request("StartRecording"));
        sim.send(json!({"request-type": "SetHeartbeat", "message-id": "2", "enable": true}));
        assert!(sim.pending_timers() > 0);

        sim.disconnect();

        assert_eq!(sim.pending_timers(), 0);
        assert_eq!(sim.output_state(OutputKind::Recording), OutputState::Stopped);
        assert!(!sim.heartbeat_enabled());
    }
}

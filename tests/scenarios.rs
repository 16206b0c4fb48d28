//! End-to-end scenarios driven through the public request surface.

use obs_sim_lib::catalog::builtin::builtin_catalog;
use obs_sim_lib::cloner::{deep_clone, SettingsValue};
use obs_sim_lib::model::builder::CollectionBuilder;
use obs_sim_lib::{
    EventKind, Notification, OutputKind, OutputState, Request, Simulator, SimulatorConfig,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Seen = Arc<Mutex<Vec<Notification>>>;

fn record(sim: &mut Simulator) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    sim.on_any(move |n| s.lock().unwrap().push(n.clone()));
    seen
}

fn kinds(seen: &Seen) -> Vec<EventKind> {
    seen.lock()
        .unwrap()
        .iter()
        .map(Notification::kind)
        .filter(|k| *k != EventKind::StreamStatus)
        .collect()
}

fn default_sim() -> Simulator {
    let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
    sim.connect(None).unwrap();
    sim
}

/// Two transitions, no explicit current transition, three scenes.
fn cut_fade_sim() -> Simulator {
    let catalog = builtin_catalog().unwrap();
    let mut b = CollectionBuilder::new("Minimal");
    b.transition("Cut", "Cut", 0).transition("Fade", "Fade", 300);
    b.source("Mic", "pulse_input_capture").volume(0.5);
    b.source("Logo", "image_source");
    b.scene("One", &["Mic", "Logo"])
        .scene("Two", &["Logo"])
        .scene("Three", &[]);
    let collection = b.finalize(&catalog).unwrap();

    let mut sim =
        Simulator::with_collections(SimulatorConfig::default(), catalog, vec![collection]).unwrap();
    sim.connect(None).unwrap();
    sim
}

fn call(sim: &mut Simulator, request: Request) -> Value {
    sim.send_request(&request)
}

fn req(kind: &str) -> Request {
    Request::new(kind, "t")
}

#[test]
fn streaming_status_is_false_until_start_completes() {
    let mut sim = default_sim();
    call(&mut sim, req("StartStreaming"));
    sim.advance(499);

    let resp = call(&mut sim, req("GetStreamingStatus"));
    assert_eq!(resp["status"], json!("ok"));
    assert_eq!(resp["streaming"], json!(false));
    assert!(resp.get("stream-timecode").is_none());

    sim.advance(1);
    let resp = call(&mut sim, req("GetStreamingStatus"));
    assert_eq!(resp["streaming"], json!(true));
}

#[test]
fn stop_while_stopping_is_invalid_state() {
    let mut sim = default_sim();
    call(&mut sim, req("StartStreaming"));
    sim.advance(600);
    call(&mut sim, req("StopStreaming"));

    let resp = call(&mut sim, req("StopStreaming"));
    assert_eq!(resp["status"], json!("error"));
    assert_eq!(resp["error"], json!("streaming not active"));
    assert_eq!(sim.output_state(OutputKind::Streaming), OutputState::Stopping);
}

#[test]
fn toggle_follows_the_action_table() {
    let mut sim = default_sim();
    let seen = record(&mut sim);

    // Stopped -> start, Starting -> stop, Stopping -> start, then let it land.
    call(&mut sim, req("StartStopRecording"));
    call(&mut sim, req("StartStopRecording"));
    call(&mut sim, req("StartStopRecording"));
    assert_eq!(sim.output_state(OutputKind::Recording), OutputState::Starting);
    sim.advance(500);
    assert_eq!(sim.output_state(OutputKind::Recording), OutputState::Started);

    // Started -> stop.
    call(&mut sim, req("StartStopRecording"));
    sim.advance(500);
    assert_eq!(sim.output_state(OutputKind::Recording), OutputState::Stopped);

    assert_eq!(
        kinds(&seen),
        vec![
            EventKind::RecordingStarting,
            EventKind::RecordingStopping,
            EventKind::RecordingStarting,
            EventKind::RecordingStarted,
            EventKind::RecordingStopping,
            EventKind::RecordingStopped,
        ]
    );
}

#[test]
fn paused_interval_is_excluded_from_record_time() {
    let mut sim = default_sim();
    let seen = record(&mut sim);
    call(&mut sim, req("StartRecording"));
    sim.advance(500);
    sim.advance(2000);
    call(&mut sim, req("PauseRecording"));
    sim.advance(5000);
    call(&mut sim, req("ResumeRecording"));
    sim.advance(1000);

    let resp = call(&mut sim, req("GetRecordingStatus"));
    assert_eq!(resp["isRecording"], json!(true));
    assert_eq!(resp["isRecordingPaused"], json!(false));
    assert_eq!(resp["recordTimecode"], json!("00:00:03.000"));
    assert!(kinds(&seen).ends_with(&[EventKind::RecordingPaused, EventKind::RecordingResumed]));
}

#[test]
fn stop_from_pause_keeps_the_pause_instant() {
    let mut sim = default_sim();
    let seen = record(&mut sim);
    call(&mut sim, req("StartRecording"));
    sim.advance(1500);
    call(&mut sim, req("PauseRecording"));
    sim.advance(4000);
    call(&mut sim, req("StopRecording"));

    let stopping = seen
        .lock()
        .unwrap()
        .iter()
        .find(|n| n.kind() == EventKind::RecordingStopping)
        .cloned()
        .unwrap();
    assert_eq!(stopping.rec_timecode.as_deref(), Some("00:00:01.000"));
}

#[test]
fn rapid_switches_end_once_at_the_last_target() {
    let mut sim = cut_fade_sim();
    let seen = record(&mut sim);

    call(&mut sim, req("SetCurrentScene").with("scene-name", json!("Two")));
    sim.advance(100);
    call(&mut sim, req("SetCurrentScene").with("scene-name", json!("Three")));
    sim.advance(1000);

    let events: Vec<Value> = seen.lock().unwrap().iter().map(Notification::to_json).collect();
    let types: Vec<&str> = events
        .iter()
        .map(|e| e["update-type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec!["TransitionBegin", "TransitionBegin", "TransitionEnd", "SwitchScenes"]
    );
    assert_eq!(events[2]["to-scene"], json!("Three"));
    assert_eq!(events[3]["scene-name"], json!("Three"));
    assert_eq!(sim.current_scene(), "Three");
}

#[test]
fn transition_position_tracks_the_flight() {
    let mut sim = cut_fade_sim();
    assert_eq!(call(&mut sim, req("GetTransitionPosition"))["position"], json!(1.0));

    call(&mut sim, req("SetCurrentScene").with("scene-name", json!("Two")));
    sim.advance(150);
    assert_eq!(call(&mut sim, req("GetTransitionPosition"))["position"], json!(0.5));

    sim.advance(150);
    assert_eq!(call(&mut sim, req("GetTransitionPosition"))["position"], json!(1.0));
}

#[test]
fn second_transition_is_the_default_and_cut_is_synchronous() {
    let mut sim = cut_fade_sim();
    let resp = call(&mut sim, req("GetCurrentTransition"));
    assert_eq!(resp["name"], json!("Fade"));
    assert_eq!(resp["duration"], json!(300));
    assert_eq!(sim.current_scene(), "One");

    let seen = record(&mut sim);
    call(&mut sim, req("SetCurrentTransition").with("transition-name", json!("Cut")));
    call(&mut sim, req("SetCurrentScene").with("scene-name", json!("Two")));
    assert_eq!(sim.current_scene(), "Two");
    sim.advance(1000);

    assert_eq!(
        kinds(&seen),
        vec![EventKind::SwitchTransition, EventKind::SwitchScenes]
    );
}

#[test]
fn audio_requests_on_video_only_sources_are_inert() {
    let mut sim = cut_fade_sim();
    let seen = record(&mut sim);

    let set = call(&mut sim, req("SetVolume").with("source", json!("Logo")).with("volume", json!(0.7)));
    assert_eq!(set["status"], json!("ok"));
    let mute = call(&mut sim, req("SetMute").with("source", json!("Logo")).with("mute", json!(false)));
    assert_eq!(mute["status"], json!("ok"));

    let resp = call(&mut sim, req("GetVolume").with("source", json!("Logo")));
    assert_eq!(resp["volume"], json!(0.0));
    assert_eq!(resp["muted"], json!(true));
    assert_eq!(call(&mut sim, req("GetMute").with("source", json!("Logo")))["muted"], json!(true));
    assert!(kinds(&seen).is_empty());
}

#[test]
fn reconnect_restores_the_builder_baseline() {
    let mut sim = cut_fade_sim();
    call(&mut sim, req("SetVolume").with("source", json!("Mic")).with("volume", json!(0.1)));
    call(&mut sim, req("SetMute").with("source", json!("Mic")).with("mute", json!(true)));
    call(&mut sim, req("SetCurrentTransition").with("transition-name", json!("Cut")));
    call(&mut sim, req("SetCurrentScene").with("scene-name", json!("Three")));
    call(&mut sim, req("StartStreaming"));

    sim.disconnect();
    assert_eq!(sim.pending_timers(), 0);
    sim.connect(None).unwrap();

    let resp = call(&mut sim, req("GetVolume").with("source", json!("Mic")));
    assert_eq!(resp["volume"], json!(0.5));
    assert_eq!(resp["muted"], json!(false));
    assert_eq!(sim.current_scene(), "One");
    assert_eq!(call(&mut sim, req("GetCurrentTransition"))["name"], json!("Fade"));
    assert_eq!(sim.output_state(OutputKind::Streaming), OutputState::Stopped);
}

#[test]
fn unknown_names_fail_without_mutating() {
    let mut sim = default_sim();
    let before = sim.current_scene().to_string();
    let resp = call(&mut sim, req("SetCurrentScene").with("scene-name", json!("Nowhere")));
    assert_eq!(resp["status"], json!("error"));
    assert_eq!(resp["error"], json!("scene 'Nowhere' does not exist"));
    assert_eq!(sim.current_scene(), before);

    let resp = call(&mut sim, req("FlyToTheMoon"));
    assert_eq!(resp["error"], json!("invalid request type: FlyToTheMoon"));
}

#[test]
fn studio_mode_preview_flow() {
    let mut sim = default_sim();
    let seen = record(&mut sim);

    call(&mut sim, req("EnableStudioMode"));
    assert_eq!(sim.preview_scene(), Some("Starting"));
    call(&mut sim, req("SetPreviewScene").with("scene-name", json!("Starting")));
    call(&mut sim, req("SetPreviewScene").with("scene-name", json!("Live")));
    call(
        &mut sim,
        req("TransitionToProgram").with("with-transition", json!({"name": "Cut"})),
    );
    assert_eq!(sim.current_scene(), "Live");

    let resp = call(&mut sim, req("SetPreviewScene").with("scene-name", json!("Backstage")));
    assert_eq!(resp["status"], json!("error"));

    assert_eq!(
        kinds(&seen),
        vec![
            EventKind::StudioModeSwitched,
            EventKind::PreviewSceneChanged,
            EventKind::SwitchTransition,
            EventKind::SwitchScenes,
        ]
    );
}

#[test]
fn stream_settings_skip_the_connection_check() {
    let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
    let resp = call(&mut sim, req("GetStreamSettings"));
    assert_eq!(resp["status"], json!("ok"));
    assert_eq!(resp["type"], json!("rtmp_custom"));

    let resp = call(&mut sim, req("GetCurrentScene"));
    assert_eq!(resp["error"], json!("not connected"));
}

#[test]
fn settings_responses_do_not_alias_internal_state() {
    let mut sim = default_sim();
    let mut resp = call(&mut sim, req("GetSourceSettings").with("sourceName", json!("Starting Soon")));
    resp["sourceSettings"]["text"] = json!("tampered");

    let again = call(&mut sim, req("GetSourceSettings").with("sourceName", json!("Starting Soon")));
    assert_eq!(again["sourceSettings"]["text"], json!("Starting soon..."));
}

#[test]
fn deep_clone_handles_self_reference() {
    let original = SettingsValue::map();
    original.insert("name", SettingsValue::string("loop"));
    original.insert("self", original.clone());

    let copy = deep_clone(&original);
    let inner = copy.get("self").unwrap();
    assert!(inner.ptr_eq(&copy));
    assert!(!inner.ptr_eq(&original));

    copy.insert("name", SettingsValue::string("changed"));
    assert_eq!(original.get("name").unwrap().as_str(), Some("loop"));
}

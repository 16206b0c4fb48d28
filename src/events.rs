//! Event catalog.
//!
//! Every event the simulator can emit, with the protocol's field names. The
//! catalog is closed, so subscribers key on [`EventKind`] and payloads are
//! plain typed structs.

use serde::Serialize;
use serde_json::{Map, Value};

/// Closed set of event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ConnectionOpened,
    ConnectionClosed,
    AuthenticationSuccess,
    AuthenticationFailure,
    SwitchScenes,
    SceneCollectionChanged,
    ProfileChanged,
    SwitchTransition,
    TransitionDurationChanged,
    TransitionBegin,
    TransitionEnd,
    StreamStarting,
    StreamStarted,
    StreamStopping,
    StreamStopped,
    StreamStatus,
    RecordingStarting,
    RecordingStarted,
    RecordingStopping,
    RecordingStopped,
    RecordingPaused,
    RecordingResumed,
    ReplayStarting,
    ReplayStarted,
    ReplayStopping,
    ReplayStopped,
    ReplayBufferSaved,
    Heartbeat,
    SourceVolumeChanged,
    SourceMuteStateChanged,
    SceneItemVisibilityChanged,
    SceneItemTransformChanged,
    PreviewSceneChanged,
    StudioModeSwitched,
}

/// Render and output counters shared by `GetStats`, `Heartbeat` and
/// `StreamStatus`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub fps: f64,
    #[serde(rename = "render-total-frames")]
    pub render_total_frames: u64,
    #[serde(rename = "render-missed-frames")]
    pub render_missed_frames: u64,
    #[serde(rename = "output-total-frames")]
    pub output_total_frames: u64,
    #[serde(rename = "output-skipped-frames")]
    pub output_skipped_frames: u64,
    #[serde(rename = "average-frame-time")]
    pub average_frame_time: f64,
    #[serde(rename = "cpu-usage")]
    pub cpu_usage: f64,
    #[serde(rename = "memory-usage")]
    pub memory_usage: f64,
    #[serde(rename = "free-disk-space")]
    pub free_disk_space: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatPayload {
    pub pulse: bool,
    #[serde(rename = "current-profile")]
    pub current_profile: String,
    #[serde(rename = "current-scene")]
    pub current_scene: String,
    pub streaming: bool,
    #[serde(rename = "total-stream-time", skip_serializing_if = "Option::is_none")]
    pub total_stream_time: Option<u64>,
    #[serde(rename = "total-stream-bytes", skip_serializing_if = "Option::is_none")]
    pub total_stream_bytes: Option<u64>,
    #[serde(rename = "total-stream-frames", skip_serializing_if = "Option::is_none")]
    pub total_stream_frames: Option<u64>,
    pub recording: bool,
    #[serde(rename = "total-record-time", skip_serializing_if = "Option::is_none")]
    pub total_record_time: Option<u64>,
    #[serde(rename = "total-record-bytes", skip_serializing_if = "Option::is_none")]
    pub total_record_bytes: Option<u64>,
    #[serde(rename = "total-record-frames", skip_serializing_if = "Option::is_none")]
    pub total_record_frames: Option<u64>,
    pub stats: Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStatusPayload {
    pub streaming: bool,
    pub recording: bool,
    #[serde(rename = "replay-buffer-active")]
    pub replay_buffer_active: bool,
    #[serde(rename = "bytes-per-sec")]
    pub bytes_per_sec: u64,
    #[serde(rename = "kbits-per-sec")]
    pub kbits_per_sec: u64,
    pub strain: f64,
    #[serde(rename = "total-stream-time")]
    pub total_stream_time: u64,
    #[serde(rename = "num-total-frames")]
    pub num_total_frames: u64,
    #[serde(rename = "num-dropped-frames")]
    pub num_dropped_frames: u64,
    #[serde(flatten)]
    pub stats: Stats,
    #[serde(rename = "preview-only")]
    pub preview_only: bool,
}

/// An event with its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "update-type")]
pub enum Event {
    ConnectionOpened,
    ConnectionClosed,
    AuthenticationSuccess,
    AuthenticationFailure,
    SwitchScenes {
        #[serde(rename = "scene-name")]
        scene_name: String,
        sources: Vec<Value>,
    },
    SceneCollectionChanged {
        #[serde(rename = "sceneCollection")]
        scene_collection: String,
    },
    ProfileChanged {
        profile: String,
    },
    SwitchTransition {
        #[serde(rename = "transition-name")]
        transition_name: String,
    },
    TransitionDurationChanged {
        #[serde(rename = "old-duration")]
        old_duration: u64,
        #[serde(rename = "new-duration")]
        new_duration: u64,
    },
    TransitionBegin {
        name: String,
        #[serde(rename = "type")]
        type_id: String,
        duration: u64,
        #[serde(rename = "from-scene")]
        from_scene: String,
        #[serde(rename = "to-scene")]
        to_scene: String,
    },
    TransitionEnd {
        name: String,
        #[serde(rename = "type")]
        type_id: String,
        duration: u64,
        #[serde(rename = "to-scene")]
        to_scene: String,
    },
    StreamStarting {
        #[serde(rename = "preview-only")]
        preview_only: bool,
    },
    StreamStarted,
    StreamStopping {
        #[serde(rename = "preview-only")]
        preview_only: bool,
    },
    StreamStopped,
    StreamStatus(Box<StreamStatusPayload>),
    RecordingStarting,
    RecordingStarted {
        #[serde(rename = "recordingFilename")]
        recording_filename: String,
    },
    RecordingStopping {
        #[serde(rename = "recordingFilename")]
        recording_filename: String,
    },
    RecordingStopped {
        #[serde(rename = "recordingFilename")]
        recording_filename: String,
    },
    RecordingPaused,
    RecordingResumed,
    ReplayStarting,
    ReplayStarted,
    ReplayStopping,
    ReplayStopped,
    ReplayBufferSaved,
    Heartbeat(Box<HeartbeatPayload>),
    SourceVolumeChanged {
        #[serde(rename = "sourceName")]
        source_name: String,
        volume: f64,
        #[serde(rename = "volumeDb")]
        volume_db: f64,
    },
    SourceMuteStateChanged {
        #[serde(rename = "sourceName")]
        source_name: String,
        muted: bool,
    },
    SceneItemVisibilityChanged {
        #[serde(rename = "scene-name")]
        scene_name: String,
        #[serde(rename = "item-name")]
        item_name: String,
        #[serde(rename = "item-id")]
        item_id: u64,
        #[serde(rename = "item-visible")]
        item_visible: bool,
    },
    SceneItemTransformChanged {
        #[serde(rename = "scene-name")]
        scene_name: String,
        #[serde(rename = "item-name")]
        item_name: String,
        #[serde(rename = "item-id")]
        item_id: u64,
        transform: Value,
    },
    PreviewSceneChanged {
        #[serde(rename = "scene-name")]
        scene_name: String,
        sources: Vec<Value>,
    },
    StudioModeSwitched {
        #[serde(rename = "new-state")]
        new_state: bool,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ConnectionOpened => EventKind::ConnectionOpened,
            Event::ConnectionClosed => EventKind::ConnectionClosed,
            Event::AuthenticationSuccess => EventKind::AuthenticationSuccess,
            Event::AuthenticationFailure => EventKind::AuthenticationFailure,
            Event::SwitchScenes { .. } => EventKind::SwitchScenes,
            Event::SceneCollectionChanged { .. } => EventKind::SceneCollectionChanged,
            Event::ProfileChanged { .. } => EventKind::ProfileChanged,
            Event::SwitchTransition { .. } => EventKind::SwitchTransition,
            Event::TransitionDurationChanged { .. } => EventKind::TransitionDurationChanged,
            Event::TransitionBegin { .. } => EventKind::TransitionBegin,
            Event::TransitionEnd { .. } => EventKind::TransitionEnd,
            Event::StreamStarting { .. } => EventKind::StreamStarting,
            Event::StreamStarted => EventKind::StreamStarted,
            Event::StreamStopping { .. } => EventKind::StreamStopping,
            Event::StreamStopped => EventKind::StreamStopped,
            Event::StreamStatus(_) => EventKind::StreamStatus,
            Event::RecordingStarting => EventKind::RecordingStarting,
            Event::RecordingStarted { .. } => EventKind::RecordingStarted,
            Event::RecordingStopping { .. } => EventKind::RecordingStopping,
            Event::RecordingStopped { .. } => EventKind::RecordingStopped,
            Event::RecordingPaused => EventKind::RecordingPaused,
            Event::RecordingResumed => EventKind::RecordingResumed,
            Event::ReplayStarting => EventKind::ReplayStarting,
            Event::ReplayStarted => EventKind::ReplayStarted,
            Event::ReplayStopping => EventKind::ReplayStopping,
            Event::ReplayStopped => EventKind::ReplayStopped,
            Event::ReplayBufferSaved => EventKind::ReplayBufferSaved,
            Event::Heartbeat(_) => EventKind::Heartbeat,
            Event::SourceVolumeChanged { .. } => EventKind::SourceVolumeChanged,
            Event::SourceMuteStateChanged { .. } => EventKind::SourceMuteStateChanged,
            Event::SceneItemVisibilityChanged { .. } => EventKind::SceneItemVisibilityChanged,
            Event::SceneItemTransformChanged { .. } => EventKind::SceneItemTransformChanged,
            Event::PreviewSceneChanged { .. } => EventKind::PreviewSceneChanged,
            Event::StudioModeSwitched { .. } => EventKind::StudioModeSwitched,
        }
    }
}

/// An emitted event plus the output timecodes current at emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub event: Event,
    /// Virtual time of emission, in milliseconds
    pub at_ms: u64,
    pub stream_timecode: Option<String>,
    pub rec_timecode: Option<String>,
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Wire form: `{"update-type": .., fields.., "stream-timecode"?, "rec-timecode"?}`
    pub fn to_json(&self) -> Value {
        let mut obj = match serde_json::to_value(&self.event) {
            Ok(Value::Object(obj)) => obj,
            _ => Map::new(),
        };
        if let Some(tc) = &self.stream_timecode {
            obj.insert("stream-timecode".to_string(), Value::String(tc.clone()));
        }
        if let Some(tc) = &self.rec_timecode {
            obj.insert("rec-timecode".to_string(), Value::String(tc.clone()));
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(event: Event) -> Notification {
        Notification {
            event,
            at_ms: 0,
            stream_timecode: None,
            rec_timecode: None,
        }
    }

    #[test]
    fn unit_event_has_only_update_type() {
        assert_eq!(
            note(Event::StreamStarted).to_json(),
            json!({"update-type": "StreamStarted"})
        );
    }

    #[test]
    fn transition_begin_uses_protocol_field_names() {
        let v = note(Event::TransitionBegin {
            name: "Fade".into(),
            type_id: "fade_transition".into(),
            duration: 300,
            from_scene: "A".into(),
            to_scene: "B".into(),
        })
        .to_json();
        assert_eq!(
            v,
            json!({
                "update-type": "TransitionBegin",
                "name": "Fade",
                "type": "fade_transition",
                "duration": 300,
                "from-scene": "A",
                "to-scene": "B",
            })
        );
    }

    #[test]
    fn timecodes_are_attached_when_present() {
        let mut n = note(Event::RecordingPaused);
        n.stream_timecode = Some("00:00:01.000".into());
        n.rec_timecode = Some("00:00:02.500".into());
        let v = n.to_json();
        assert_eq!(v["stream-timecode"], json!("00:00:01.000"));
        assert_eq!(v["rec-timecode"], json!("00:00:02.500"));
    }

    #[test]
    fn stream_status_flattens_stats() {
        let stats = Stats {
            fps: 30.0,
            render_total_frames: 60,
            render_missed_frames: 0,
            output_total_frames: 60,
            output_skipped_frames: 0,
            average_frame_time: 4.2,
            cpu_usage: 3.0,
            memory_usage: 250.0,
            free_disk_space: 100_000.0,
        };
        let v = note(Event::StreamStatus(Box::new(StreamStatusPayload {
            streaming: true,
            recording: false,
            replay_buffer_active: false,
            bytes_per_sec: 312_500,
            kbits_per_sec: 2500,
            strain: 0.0,
            total_stream_time: 2,
            num_total_frames: 60,
            num_dropped_frames: 0,
            stats,
            preview_only: false,
        })))
        .to_json();
        assert_eq!(v["update-type"], json!("StreamStatus"));
        assert_eq!(v["render-total-frames"], json!(60));
        assert_eq!(v["kbits-per-sec"], json!(2500));
        assert!(v.get("stats").is_none());
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Event::ReplayBufferSaved.kind(), EventKind::ReplayBufferSaved);
        assert_eq!(
            Event::StudioModeSwitched { new_state: true }.kind(),
            EventKind::StudioModeSwitched
        );
    }
}

//! Request routing, connection/auth gates and the general handlers.

use super::{AuthChallenge, Simulator};
use crate::error::{EntityKind, RequestError, RequestResult};
use crate::events::Event;
use crate::protocol::Request;
use serde_json::{json, Map, Value};

type Handler = fn(&mut Simulator, &Request) -> RequestResult<Value>;

/// What a request needs before its handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    /// Runs even while disconnected
    None,
    /// Needs a connection, not authentication
    Connected,
    /// Needs a connection and, with a password set, authentication
    Authenticated,
}

const VERSION: f64 = 1.1;
const OBS_WEBSOCKET_VERSION: &str = "4.9.1";
const OBS_STUDIO_VERSION: &str = "27.2.4";

const ROUTES: &[(&str, Gate, Handler)] = &[
    // General
    ("GetVersion", Gate::Connected, Simulator::get_version),
    ("GetAuthRequired", Gate::Connected, Simulator::get_auth_required),
    ("Authenticate", Gate::Connected, Simulator::authenticate),
    ("SetHeartbeat", Gate::Authenticated, Simulator::set_heartbeat),
    ("GetStats", Gate::Authenticated, Simulator::get_stats),
    ("GetVideoInfo", Gate::Authenticated, Simulator::get_video_info),
    ("SetFilenameFormatting", Gate::Authenticated, Simulator::set_filename_formatting),
    ("GetFilenameFormatting", Gate::Authenticated, Simulator::get_filename_formatting),
    // Profiles
    ("SetCurrentProfile", Gate::Authenticated, Simulator::set_current_profile),
    ("GetCurrentProfile", Gate::Authenticated, Simulator::get_current_profile),
    ("ListProfiles", Gate::Authenticated, Simulator::list_profiles),
    // Scene collections
    ("SetCurrentSceneCollection", Gate::Authenticated, Simulator::set_current_scene_collection),
    ("GetCurrentSceneCollection", Gate::Authenticated, Simulator::get_current_scene_collection),
    ("ListSceneCollections", Gate::Authenticated, Simulator::list_scene_collections),
    // Scenes
    ("SetCurrentScene", Gate::Authenticated, Simulator::set_current_scene),
    ("GetCurrentScene", Gate::Authenticated, Simulator::get_current_scene),
    ("GetSceneList", Gate::Authenticated, Simulator::get_scene_list),
    // Scene items
    ("GetSceneItemList", Gate::Authenticated, Simulator::get_scene_item_list),
    ("GetSceneItemProperties", Gate::Authenticated, Simulator::get_scene_item_properties),
    ("SetSceneItemProperties", Gate::Authenticated, Simulator::set_scene_item_properties),
    ("SetSceneItemRender", Gate::Authenticated, Simulator::set_scene_item_render),
    ("ResetSceneItem", Gate::Authenticated, Simulator::reset_scene_item),
    // Sources
    ("GetSourcesList", Gate::Authenticated, Simulator::get_sources_list),
    ("GetSourceTypesList", Gate::Authenticated, Simulator::get_source_types_list),
    ("GetVolume", Gate::Authenticated, Simulator::get_volume),
    ("SetVolume", Gate::Authenticated, Simulator::set_volume),
    ("GetMute", Gate::Authenticated, Simulator::get_mute),
    ("SetMute", Gate::Authenticated, Simulator::set_mute),
    ("ToggleMute", Gate::Authenticated, Simulator::toggle_mute),
    ("GetSourceSettings", Gate::Authenticated, Simulator::get_source_settings),
    ("SetSourceSettings", Gate::Authenticated, Simulator::set_source_settings),
    ("GetSourceFilters", Gate::Authenticated, Simulator::get_source_filters),
    ("GetSpecialSources", Gate::Authenticated, Simulator::get_special_sources),
    ("TakeSourceScreenshot", Gate::Authenticated, Simulator::take_source_screenshot),
    // Streaming
    ("GetStreamingStatus", Gate::Authenticated, Simulator::get_streaming_status),
    ("StartStopStreaming", Gate::Authenticated, Simulator::start_stop_streaming),
    ("StartStreaming", Gate::Authenticated, Simulator::start_streaming),
    ("StopStreaming", Gate::Authenticated, Simulator::stop_streaming),
    // Stream settings skip the connection check, unlike every other request.
    ("GetStreamSettings", Gate::None, Simulator::get_stream_settings),
    ("SetStreamSettings", Gate::None, Simulator::set_stream_settings),
    ("SaveStreamSettings", Gate::None, Simulator::save_stream_settings),
    // Recording
    ("GetRecordingStatus", Gate::Authenticated, Simulator::get_recording_status),
    ("StartStopRecording", Gate::Authenticated, Simulator::start_stop_recording),
    ("StartRecording", Gate::Authenticated, Simulator::start_recording),
    ("StopRecording", Gate::Authenticated, Simulator::stop_recording),
    ("PauseRecording", Gate::Authenticated, Simulator::pause_recording),
    ("ResumeRecording", Gate::Authenticated, Simulator::resume_recording),
    ("SetRecordingFolder", Gate::Authenticated, Simulator::set_recording_folder),
    ("GetRecordingFolder", Gate::Authenticated, Simulator::get_recording_folder),
    // Replay buffer
    ("GetReplayBufferStatus", Gate::Authenticated, Simulator::get_replay_buffer_status),
    ("StartStopReplayBuffer", Gate::Authenticated, Simulator::start_stop_replay_buffer),
    ("StartReplayBuffer", Gate::Authenticated, Simulator::start_replay_buffer),
    ("StopReplayBuffer", Gate::Authenticated, Simulator::stop_replay_buffer),
    ("SaveReplayBuffer", Gate::Authenticated, Simulator::save_replay_buffer),
    // Transitions
    ("GetTransitionList", Gate::Authenticated, Simulator::get_transition_list),
    ("GetCurrentTransition", Gate::Authenticated, Simulator::get_current_transition),
    ("SetCurrentTransition", Gate::Authenticated, Simulator::set_current_transition),
    ("SetTransitionDuration", Gate::Authenticated, Simulator::set_transition_duration),
    ("GetTransitionDuration", Gate::Authenticated, Simulator::get_transition_duration),
    ("GetTransitionPosition", Gate::Authenticated, Simulator::get_transition_position),
    // Studio mode
    ("GetStudioModeStatus", Gate::Authenticated, Simulator::get_studio_mode_status),
    ("GetPreviewScene", Gate::Authenticated, Simulator::get_preview_scene),
    ("SetPreviewScene", Gate::Authenticated, Simulator::set_preview_scene),
    ("TransitionToProgram", Gate::Authenticated, Simulator::transition_to_program),
    ("EnableStudioMode", Gate::Authenticated, Simulator::enable_studio_mode),
    ("DisableStudioMode", Gate::Authenticated, Simulator::disable_studio_mode),
    ("ToggleStudioMode", Gate::Authenticated, Simulator::toggle_studio_mode),
];

fn route(request_type: &str) -> Option<(Gate, Handler)> {
    ROUTES
        .iter()
        .find(|(name, _, _)| *name == request_type)
        .map(|(_, gate, handler)| (*gate, *handler))
}

/// Every request type the simulator answers, in catalog order.
pub fn request_types() -> impl Iterator<Item = &'static str> {
    ROUTES.iter().map(|(name, _, _)| *name)
}

/// Turn a handler's JSON object into response fields.
fn into_body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Simulator {
    pub(super) fn dispatch(&mut self, request: &Request) -> RequestResult<Map<String, Value>> {
        let Some((gate, handler)) = route(&request.request_type) else {
            return Err(RequestError::Unhandled(request.request_type.clone()));
        };
        if gate != Gate::None && !self.connected {
            return Err(RequestError::NotConnected);
        }
        if gate == Gate::Authenticated && !self.session.authenticated {
            return Err(RequestError::NotAuthenticated);
        }
        log::debug!("handling {}", request.request_type);
        handler(self, request).map(into_body)
    }

    // ─────────────────────────────────────────────────────────────────
    // General
    // ─────────────────────────────────────────────────────────────────

    fn get_version(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({
            "version": VERSION,
            "obs-websocket-version": OBS_WEBSOCKET_VERSION,
            "obs-studio-version": OBS_STUDIO_VERSION,
            "available-requests": request_types().collect::<Vec<_>>().join(","),
            "supported-image-export-formats": "png",
        }))
    }

    fn get_auth_required(&mut self, _req: &Request) -> RequestResult<Value> {
        match &self.session.challenge {
            Some(AuthChallenge { salt, challenge }) if !self.session.authenticated => Ok(json!({
                "authRequired": true,
                "challenge": challenge,
                "salt": salt,
            })),
            _ => Ok(json!({ "authRequired": false })),
        }
    }

    fn authenticate(&mut self, req: &Request) -> RequestResult<Value> {
        let auth = req.str("auth")?;
        if self.session.authenticated {
            return Err(RequestError::invalid_state("already authenticated"));
        }
        let accepted = match &self.session.challenge {
            Some(challenge) => self.check_auth(challenge, auth),
            None => true,
        };
        if !accepted {
            self.emit(Event::AuthenticationFailure);
            return Err(RequestError::AuthenticationFailed);
        }
        self.session.authenticated = true;
        log::info!("client authenticated");
        self.emit(Event::AuthenticationSuccess);
        Ok(json!({}))
    }

    fn set_heartbeat(&mut self, req: &Request) -> RequestResult<Value> {
        let enable = req.bool("enable")?;
        match (enable, self.session.heartbeat) {
            (true, None) => {
                let interval = self.config.timing.heartbeat_interval_ms;
                self.session.heartbeat =
                    Some(self.schedule_in(interval, crate::timers::TimerTask::Heartbeat));
            }
            (false, Some(id)) => {
                self.timers.cancel(id);
                self.session.heartbeat = None;
            }
            _ => {}
        }
        Ok(json!({}))
    }

    fn get_stats(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "stats": self.stats() }))
    }

    fn get_video_info(&mut self, _req: &Request) -> RequestResult<Value> {
        let video = &self.config.video;
        Ok(json!({
            "baseWidth": video.base_width,
            "baseHeight": video.base_height,
            "outputWidth": video.output_width,
            "outputHeight": video.output_height,
            "scaleType": video.scale_type,
            "fps": self.config.output.fps,
            "videoFormat": video.video_format,
            "colorSpace": video.color_space,
            "colorRange": video.color_range,
        }))
    }

    fn set_filename_formatting(&mut self, req: &Request) -> RequestResult<Value> {
        let formatting = req.str("filename-formatting")?;
        if formatting.trim().is_empty() {
            return Err(RequestError::invalid_request("filename-formatting must not be empty"));
        }
        self.session.filename_formatting = formatting.to_string();
        Ok(json!({}))
    }

    fn get_filename_formatting(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "filename-formatting": self.session.filename_formatting }))
    }

    // ─────────────────────────────────────────────────────────────────
    // Profiles
    // ─────────────────────────────────────────────────────────────────

    fn set_current_profile(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("profile-name")?;
        if !self.config.profiles.names.iter().any(|p| p == name) {
            return Err(RequestError::not_found(EntityKind::Profile, name));
        }
        if self.session.profile != name {
            self.session.profile = name.to_string();
            self.emit(Event::ProfileChanged {
                profile: name.to_string(),
            });
        }
        Ok(json!({}))
    }

    fn get_current_profile(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "profile-name": self.session.profile }))
    }

    fn list_profiles(&mut self, _req: &Request) -> RequestResult<Value> {
        let profiles: Vec<Value> = self
            .config
            .profiles
            .names
            .iter()
            .map(|name| json!({ "profile-name": name }))
            .collect();
        Ok(json!({ "profiles": profiles }))
    }

    // ─────────────────────────────────────────────────────────────────
    // Scene collections
    // ─────────────────────────────────────────────────────────────────

    fn set_current_scene_collection(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("sc-name")?;
        if self.collections.set_active(name)? {
            // Scenes of the old collection no longer resolve.
            if let Some(flight) = self.transitions.supersede() {
                log::debug!("collection switch dropped transition {}", flight.id);
            }
            if self.session.studio_mode {
                self.session.preview_scene = Some(self.current_scene().to_string());
            } else {
                self.session.preview_scene = None;
            }
            self.emit(Event::SceneCollectionChanged {
                scene_collection: name.to_string(),
            });
        }
        Ok(json!({}))
    }

    fn get_current_scene_collection(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "sc-name": self.collections.active_name() }))
    }

    fn list_scene_collections(&mut self, _req: &Request) -> RequestResult<Value> {
        let collections: Vec<Value> = self
            .collections
            .names()
            .map(|name| json!({ "sc-name": name }))
            .collect();
        Ok(json!({ "scene-collections": collections }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;
    use crate::protocol::generate_auth_string;

    fn connected() -> Simulator {
        let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
        sim.connect(None).unwrap();
        sim
    }

    fn call(sim: &mut Simulator, req: Request) -> Value {
        sim.send_request(&req)
    }

    #[test]
    fn unknown_request_is_unhandled() {
        let mut sim = connected();
        let resp = call(&mut sim, Request::new("FlyToTheMoon", "1"));
        assert_eq!(resp["error"], json!("invalid request type: FlyToTheMoon"));
    }

    #[test]
    fn routes_are_unique() {
        let mut names: Vec<_> = request_types().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn version_lists_requests() {
        let mut sim = connected();
        let resp = call(&mut sim, Request::new("GetVersion", "1"));
        let available = resp["available-requests"].as_str().unwrap();
        assert!(available.split(',').any(|r| r == "TransitionToProgram"));
        assert_eq!(resp["obs-websocket-version"], json!("4.9.1"));
    }

    #[test]
    fn stream_settings_work_while_disconnected() {
        let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
        let resp = call(&mut sim, Request::new("GetStreamSettings", "1"));
        assert_eq!(resp["status"], json!("ok"));
        assert_eq!(resp["type"], json!("rtmp_custom"));
    }

    #[test]
    fn password_gates_everything_but_the_handshake() {
        let config = SimulatorConfig {
            password: Some("pw".into()),
            ..SimulatorConfig::default()
        };
        let mut sim = Simulator::new(config).unwrap();
        sim.connect(None).unwrap();

        let resp = call(&mut sim, Request::new("GetSceneList", "1"));
        assert_eq!(resp["error"], json!("Not Authenticated"));
        assert_eq!(call(&mut sim, Request::new("GetVersion", "2"))["status"], json!("ok"));

        let challenge = call(&mut sim, Request::new("GetAuthRequired", "3"));
        assert_eq!(challenge["authRequired"], json!(true));

        let bad = call(&mut sim, Request::new("Authenticate", "4").with("auth", json!("nope")));
        assert_eq!(bad["error"], json!("Authentication Failed."));

        let auth = generate_auth_string(
            "pw",
            challenge["challenge"].as_str().unwrap(),
            challenge["salt"].as_str().unwrap(),
        );
        let ok = call(&mut sim, Request::new("Authenticate", "5").with("auth", json!(auth)));
        assert_eq!(ok["status"], json!("ok"));
        assert_eq!(call(&mut sim, Request::new("GetSceneList", "6"))["status"], json!("ok"));
        assert_eq!(
            call(&mut sim, Request::new("GetAuthRequired", "7"))["authRequired"],
            json!(false)
        );
    }

    #[test]
    fn heartbeat_enable_is_idempotent() {
        let mut sim = connected();
        let on = || Request::new("SetHeartbeat", "1").with("enable", json!(true));
        call(&mut sim, on());
        call(&mut sim, on());
        assert_eq!(sim.pending_timers(), 1);

        call(&mut sim, Request::new("SetHeartbeat", "2").with("enable", json!(false)));
        assert_eq!(sim.pending_timers(), 0);
    }

    #[test]
    fn profiles_switch_and_validate() {
        let mut sim = connected();
        let resp = call(
            &mut sim,
            Request::new("SetCurrentProfile", "1").with("profile-name", json!("Missing")),
        );
        assert_eq!(resp["error"], json!("profile 'Missing' does not exist"));

        call(
            &mut sim,
            Request::new("SetCurrentProfile", "2").with("profile-name", json!("Recording")),
        );
        let resp = call(&mut sim, Request::new("GetCurrentProfile", "3"));
        assert_eq!(resp["profile-name"], json!("Recording"));
    }

    #[test]
    fn scene_collection_switch_changes_scene_list() {
        let mut sim = connected();
        call(
            &mut sim,
            Request::new("SetCurrentSceneCollection", "1").with("sc-name", json!("Podcast")),
        );
        let resp = call(&mut sim, Request::new("GetSceneList", "2"));
        assert_eq!(resp["current-scene"], json!("Wide"));
        let resp = call(&mut sim, Request::new("GetCurrentSceneCollection", "3"));
        assert_eq!(resp["sc-name"], json!("Podcast"));
    }
}

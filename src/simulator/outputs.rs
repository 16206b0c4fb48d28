//! Streaming, recording and replay buffer, plus the periodic Heartbeat and
//! StreamStatus emitters that report on them.

use super::Simulator;
use crate::error::{RequestError, RequestResult};
use crate::events::{Event, HeartbeatPayload, Stats, StreamStatusPayload};
use crate::lifecycle::{format_timecode, OutputKind, ToggleAction};
use crate::cloner::SettingsValue;
use crate::protocol::Request;
use crate::timers::TimerTask;
use serde_json::{json, Value};

/// Calendar date of virtual time zero, used in recording filenames.
const EPOCH_DATE: (&str, &str, &str) = ("2024", "01", "01");

fn frames(elapsed_ms: u64, fps: f64) -> u64 {
    (elapsed_ms as f64 * fps / 1000.0) as u64
}

fn bytes(elapsed_ms: u64, bitrate_kbps: u64) -> u64 {
    elapsed_ms * bitrate_kbps / 8
}

impl Simulator {
    // ─────────────────────────────────────────────────────────────────
    // Lifecycle plumbing
    // ─────────────────────────────────────────────────────────────────

    fn start_output(&mut self, kind: OutputKind, explicit: bool) -> RequestResult<()> {
        self.output_mut(kind).start(explicit)?;
        log::debug!("{:?} starting", kind);
        match kind {
            OutputKind::Streaming => self.emit(Event::StreamStarting { preview_only: false }),
            OutputKind::Recording => {
                self.session.recording_filename = Some(self.recording_path());
                self.emit(Event::RecordingStarting);
            }
            OutputKind::ReplayBuffer => self.emit(Event::ReplayStarting),
        }
        self.schedule_in(self.config.timing.output_start_ms, TimerTask::StartDone(kind));
        if kind != OutputKind::ReplayBuffer {
            self.ensure_status_timer();
        }
        Ok(())
    }

    fn stop_output(&mut self, kind: OutputKind, explicit: bool) -> RequestResult<()> {
        let now = self.now_ms;
        self.output_mut(kind).stop(now, explicit)?;
        log::debug!("{:?} stopping", kind);
        match kind {
            OutputKind::Streaming => self.emit(Event::StreamStopping { preview_only: false }),
            OutputKind::Recording => self.emit(Event::RecordingStopping {
                recording_filename: self.session.recording_filename.clone().unwrap_or_default(),
            }),
            OutputKind::ReplayBuffer => self.emit(Event::ReplayStopping),
        }
        self.schedule_in(self.config.timing.output_stop_ms, TimerTask::StopDone(kind));
        Ok(())
    }

    fn toggle_output(&mut self, kind: OutputKind) -> RequestResult<()> {
        match self.output(kind).toggle_action() {
            ToggleAction::Start => self.start_output(kind, false),
            ToggleAction::Stop => self.stop_output(kind, false),
        }
    }

    pub(super) fn complete_output_start(&mut self, kind: OutputKind) {
        let now = self.now_ms;
        if !self.output_mut(kind).complete_start(now) {
            log::debug!("dropping stale {:?} start completion", kind);
            return;
        }
        log::debug!("{:?} started", kind);
        match kind {
            OutputKind::Streaming => self.emit(Event::StreamStarted),
            OutputKind::Recording => self.emit(Event::RecordingStarted {
                recording_filename: self.session.recording_filename.clone().unwrap_or_default(),
            }),
            OutputKind::ReplayBuffer => self.emit(Event::ReplayStarted),
        }
    }

    pub(super) fn complete_output_stop(&mut self, kind: OutputKind) {
        if !self.output_mut(kind).complete_stop() {
            log::debug!("dropping stale {:?} stop completion", kind);
            return;
        }
        log::debug!("{:?} stopped", kind);
        match kind {
            OutputKind::Streaming => self.emit(Event::StreamStopped),
            OutputKind::Recording => {
                let recording_filename = self.session.recording_filename.take().unwrap_or_default();
                self.emit(Event::RecordingStopped { recording_filename });
            }
            OutputKind::ReplayBuffer => self.emit(Event::ReplayStopped),
        }
    }

    fn recording_path(&self) -> String {
        let secs = self.now_ms / 1000;
        let (year, month, day) = EPOCH_DATE;
        let name = self
            .session
            .filename_formatting
            .replace("%CCYY", year)
            .replace("%YY", &year[2..])
            .replace("%MM", month)
            .replace("%DD", day)
            .replace("%hh", &format!("{:02}", secs / 3600 % 24))
            .replace("%mm", &format!("{:02}", secs / 60 % 60))
            .replace("%ss", &format!("{:02}", secs % 60));
        format!("{}/{}.mkv", self.session.rec_folder.trim_end_matches('/'), name)
    }

    // ─────────────────────────────────────────────────────────────────
    // Periodic reports
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn stats(&self) -> Stats {
        let fps = self.config.output.fps;
        let uptime = self.now_ms.saturating_sub(self.session.opened_ms);
        let output_ms = self
            .output_elapsed_ms(OutputKind::Streaming)
            .max(self.output_elapsed_ms(OutputKind::Recording));
        let busy = self.streaming.is_busy() || self.recording.is_busy();
        Stats {
            fps,
            render_total_frames: frames(uptime, fps),
            render_missed_frames: 0,
            output_total_frames: frames(output_ms, fps),
            output_skipped_frames: 0,
            average_frame_time: 1000.0 / fps / 8.0,
            cpu_usage: if busy { 6.5 } else { 1.5 },
            memory_usage: 256.0,
            free_disk_space: 512_000.0,
        }
    }

    fn ensure_status_timer(&mut self) {
        if self.session.status_timer.is_none() {
            let interval = self.config.timing.status_interval_ms;
            self.session.status_timer = Some(self.schedule_in(interval, TimerTask::Status));
        }
    }

    pub(super) fn status_tick(&mut self) {
        self.session.status_timer = None;
        if !(self.streaming.is_busy() || self.recording.is_busy()) {
            log::debug!("status timer idle, not rescheduling");
            return;
        }
        let bitrate = self.config.output.bitrate_kbps;
        let elapsed = self.output_elapsed_ms(OutputKind::Streaming);
        let live = self.streaming.is_started();
        let payload = StreamStatusPayload {
            streaming: live,
            recording: self.recording.is_active(),
            replay_buffer_active: self.replay.is_started(),
            bytes_per_sec: if live { bitrate * 1000 / 8 } else { 0 },
            kbits_per_sec: if live { bitrate } else { 0 },
            strain: 0.0,
            total_stream_time: elapsed / 1000,
            num_total_frames: frames(elapsed, self.config.output.fps),
            num_dropped_frames: 0,
            stats: self.stats(),
            preview_only: false,
        };
        self.emit(Event::StreamStatus(Box::new(payload)));
        self.ensure_status_timer();
    }

    pub(super) fn heartbeat_tick(&mut self) {
        if self.session.heartbeat.is_none() {
            return;
        }
        self.session.pulse = !self.session.pulse;

        let fps = self.config.output.fps;
        let bitrate = self.config.output.bitrate_kbps;
        let stream_ms = self.streaming.has_timecode().then(|| self.output_elapsed_ms(OutputKind::Streaming));
        let record_ms = self.recording.has_timecode().then(|| self.output_elapsed_ms(OutputKind::Recording));
        let payload = HeartbeatPayload {
            pulse: self.session.pulse,
            current_profile: self.session.profile.clone(),
            current_scene: self.current_scene().to_string(),
            streaming: self.streaming.is_started(),
            total_stream_time: stream_ms.map(|ms| ms / 1000),
            total_stream_bytes: stream_ms.map(|ms| bytes(ms, bitrate)),
            total_stream_frames: stream_ms.map(|ms| frames(ms, fps)),
            recording: self.recording.is_active(),
            total_record_time: record_ms.map(|ms| ms / 1000),
            total_record_bytes: record_ms.map(|ms| bytes(ms, bitrate)),
            total_record_frames: record_ms.map(|ms| frames(ms, fps)),
            stats: self.stats(),
        };
        self.emit(Event::Heartbeat(Box::new(payload)));

        let interval = self.config.timing.heartbeat_interval_ms;
        self.session.heartbeat = Some(self.schedule_in(interval, TimerTask::Heartbeat));
    }

    // ─────────────────────────────────────────────────────────────────
    // Streaming
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn get_streaming_status(&mut self, _req: &Request) -> RequestResult<Value> {
        let mut body = json!({
            "streaming": self.streaming.is_started(),
            "recording": self.recording.is_active(),
            "recording-paused": self.recording.is_paused(),
            "preview-only": false,
        });
        if self.streaming.has_timecode() {
            body["stream-timecode"] = json!(format_timecode(self.output_elapsed_ms(OutputKind::Streaming)));
        }
        if self.recording.has_timecode() {
            body["rec-timecode"] = json!(format_timecode(self.output_elapsed_ms(OutputKind::Recording)));
        }
        Ok(body)
    }

    pub(super) fn start_stop_streaming(&mut self, _req: &Request) -> RequestResult<Value> {
        self.toggle_output(OutputKind::Streaming)?;
        Ok(json!({}))
    }

    pub(super) fn start_streaming(&mut self, _req: &Request) -> RequestResult<Value> {
        self.start_output(OutputKind::Streaming, true)?;
        Ok(json!({}))
    }

    pub(super) fn stop_streaming(&mut self, _req: &Request) -> RequestResult<Value> {
        self.stop_output(OutputKind::Streaming, true)?;
        Ok(json!({}))
    }

    pub(super) fn get_stream_settings(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({
            "type": self.session.stream.service_type,
            "settings": self.session.stream.settings.to_json(),
        }))
    }

    pub(super) fn set_stream_settings(&mut self, req: &Request) -> RequestResult<Value> {
        let service_type = req.str("type")?.to_string();
        let settings = req.object("settings")?.clone();
        let save = req.opt_bool("save")?.unwrap_or(false);

        self.session.stream.service_type = service_type;
        self.session
            .stream
            .settings
            .merge_from(&SettingsValue::from_json(&Value::Object(settings)));
        if save {
            self.saved_stream = self.session.stream.copy();
        }
        Ok(json!({}))
    }

    pub(super) fn save_stream_settings(&mut self, _req: &Request) -> RequestResult<Value> {
        self.saved_stream = self.session.stream.copy();
        Ok(json!({}))
    }

    // ─────────────────────────────────────────────────────────────────
    // Recording
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn get_recording_status(&mut self, _req: &Request) -> RequestResult<Value> {
        let mut body = json!({
            "isRecording": self.recording.is_active(),
            "isRecordingPaused": self.recording.is_paused(),
        });
        if self.recording.has_timecode() {
            body["recordTimecode"] = json!(format_timecode(self.output_elapsed_ms(OutputKind::Recording)));
        }
        if let Some(filename) = &self.session.recording_filename {
            body["recordingFilename"] = json!(filename);
        }
        Ok(body)
    }

    pub(super) fn start_stop_recording(&mut self, _req: &Request) -> RequestResult<Value> {
        self.toggle_output(OutputKind::Recording)?;
        Ok(json!({}))
    }

    pub(super) fn start_recording(&mut self, _req: &Request) -> RequestResult<Value> {
        self.start_output(OutputKind::Recording, true)?;
        Ok(json!({}))
    }

    pub(super) fn stop_recording(&mut self, _req: &Request) -> RequestResult<Value> {
        self.stop_output(OutputKind::Recording, true)?;
        Ok(json!({}))
    }

    pub(super) fn pause_recording(&mut self, _req: &Request) -> RequestResult<Value> {
        let now = self.now_ms;
        self.recording.pause(now)?;
        self.emit(Event::RecordingPaused);
        Ok(json!({}))
    }

    pub(super) fn resume_recording(&mut self, _req: &Request) -> RequestResult<Value> {
        let now = self.now_ms;
        self.recording.resume(now)?;
        self.emit(Event::RecordingResumed);
        Ok(json!({}))
    }

    pub(super) fn set_recording_folder(&mut self, req: &Request) -> RequestResult<Value> {
        let folder = req.str("rec-folder")?;
        if folder.trim().is_empty() {
            return Err(RequestError::invalid_request("rec-folder must not be empty"));
        }
        self.session.rec_folder = folder.to_string();
        Ok(json!({}))
    }

    pub(super) fn get_recording_folder(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "rec-folder": self.session.rec_folder }))
    }

    // ─────────────────────────────────────────────────────────────────
    // Replay buffer
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn get_replay_buffer_status(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "isReplayBufferActive": self.replay.is_started() }))
    }

    pub(super) fn start_stop_replay_buffer(&mut self, _req: &Request) -> RequestResult<Value> {
        self.toggle_output(OutputKind::ReplayBuffer)?;
        Ok(json!({}))
    }

    pub(super) fn start_replay_buffer(&mut self, _req: &Request) -> RequestResult<Value> {
        self.start_output(OutputKind::ReplayBuffer, true)?;
        Ok(json!({}))
    }

    pub(super) fn stop_replay_buffer(&mut self, _req: &Request) -> RequestResult<Value> {
        self.stop_output(OutputKind::ReplayBuffer, true)?;
        Ok(json!({}))
    }

    /// Accepted in any replay buffer state; only the delayed event results.
    pub(super) fn save_replay_buffer(&mut self, _req: &Request) -> RequestResult<Value> {
        self.schedule_in(self.config.timing.replay_save_ms, TimerTask::ReplaySaved);
        Ok(json!({}))
    }
}

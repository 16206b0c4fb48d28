//! Output lifecycles: streaming, recording and the replay buffer.
//!
//! Each output is a small automaton `Stopped -> Starting -> Started ->
//! Stopping -> Stopped`; recording adds `Paused`. Transitions into `Starting`
//! and `Stopping` are completed later by a timer, and the completion only
//! applies if the automaton is still in the state it expects. Time is passed
//! in as milliseconds so the automata stay deterministic.

use crate::error::{RequestError, RequestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Stopped,
    Starting,
    Started,
    Stopping,
    Paused,
}

/// Which output an automaton drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Streaming,
    Recording,
    ReplayBuffer,
}

impl OutputKind {
    fn noun(&self) -> &'static str {
        match self {
            OutputKind::Streaming => "streaming",
            OutputKind::Recording => "recording",
            OutputKind::ReplayBuffer => "replay buffer",
        }
    }

    fn pausable(&self) -> bool {
        matches!(self, OutputKind::Recording)
    }
}

/// What a start/stop toggle resolves to in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Start,
    Stop,
}

#[derive(Debug, Clone)]
pub struct OutputLifecycle {
    kind: OutputKind,
    state: OutputState,
    /// Start instant; zero until the start completes
    start_ms: u64,
    /// Stop (or pause) instant, captured when leaving `Started`
    stop_ms: Option<u64>,
}

impl OutputLifecycle {
    pub fn new(kind: OutputKind) -> Self {
        Self {
            kind,
            state: OutputState::Stopped,
            start_ms: 0,
            stop_ms: None,
        }
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    /// Anything other than fully stopped.
    pub fn is_busy(&self) -> bool {
        self.state != OutputState::Stopped
    }

    pub fn is_started(&self) -> bool {
        self.state == OutputState::Started
    }

    /// Started or paused: the output exists and has a running clock.
    pub fn is_active(&self) -> bool {
        matches!(self.state, OutputState::Started | OutputState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state == OutputState::Paused
    }

    /// Whether events should carry this output's timecode.
    pub fn has_timecode(&self) -> bool {
        matches!(
            self.state,
            OutputState::Started | OutputState::Paused | OutputState::Stopping
        )
    }

    pub fn toggle_action(&self) -> ToggleAction {
        match self.state {
            OutputState::Stopped | OutputState::Stopping => ToggleAction::Start,
            OutputState::Starting | OutputState::Started | OutputState::Paused => {
                ToggleAction::Stop
            }
        }
    }

    /// Enter `Starting`. An explicit start is only valid from `Stopped`; a
    /// toggle may also interrupt a pending stop.
    pub fn start(&mut self, explicit: bool) -> RequestResult<()> {
        let allowed = match self.state {
            OutputState::Stopped => true,
            OutputState::Stopping => !explicit,
            _ => false,
        };
        if !allowed {
            return Err(RequestError::invalid_state(format!(
                "{} already active",
                self.kind.noun()
            )));
        }
        self.state = OutputState::Starting;
        self.start_ms = 0;
        self.stop_ms = None;
        Ok(())
    }

    /// Timer completion of a start. No-op unless still `Starting`.
    pub fn complete_start(&mut self, now_ms: u64) -> bool {
        if self.state != OutputState::Starting {
            return false;
        }
        self.state = OutputState::Started;
        self.start_ms = now_ms;
        true
    }

    /// Enter `Stopping`. An explicit stop needs `Started` (or `Paused`); a
    /// toggle may also abort a pending start.
    pub fn stop(&mut self, now_ms: u64, explicit: bool) -> RequestResult<()> {
        match self.state {
            OutputState::Started => {
                self.stop_ms = Some(now_ms);
            }
            // The stop instant was captured when pausing.
            OutputState::Paused => {}
            OutputState::Starting if !explicit => {
                self.stop_ms = Some(self.start_ms);
            }
            _ => {
                return Err(RequestError::invalid_state(format!(
                    "{} not active",
                    self.kind.noun()
                )))
            }
        }
        self.state = OutputState::Stopping;
        Ok(())
    }

    /// Timer completion of a stop. No-op unless still `Stopping`.
    pub fn complete_stop(&mut self) -> bool {
        if self.state != OutputState::Stopping {
            return false;
        }
        self.state = OutputState::Stopped;
        self.start_ms = 0;
        self.stop_ms = None;
        true
    }

    pub fn pause(&mut self, now_ms: u64) -> RequestResult<()> {
        if !self.kind.pausable() {
            return Err(RequestError::invalid_state(format!(
                "{} cannot be paused",
                self.kind.noun()
            )));
        }
        match self.state {
            OutputState::Started => {
                self.state = OutputState::Paused;
                self.stop_ms = Some(now_ms);
                Ok(())
            }
            OutputState::Paused => Err(RequestError::invalid_state(format!(
                "{} already paused",
                self.kind.noun()
            ))),
            _ => Err(RequestError::invalid_state(format!(
                "{} not active",
                self.kind.noun()
            ))),
        }
    }

    /// Leave `Paused`, moving the start instant forward by the paused span so
    /// elapsed time excludes it.
    pub fn resume(&mut self, now_ms: u64) -> RequestResult<()> {
        if self.state != OutputState::Paused {
            return Err(RequestError::invalid_state(format!(
                "{} is not paused",
                self.kind.noun()
            )));
        }
        let paused_at = self.stop_ms.take().unwrap_or(now_ms);
        self.start_ms += now_ms.saturating_sub(paused_at);
        self.state = OutputState::Started;
        Ok(())
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match self.state {
            OutputState::Started => now_ms.saturating_sub(self.start_ms),
            OutputState::Paused | OutputState::Stopping => self
                .stop_ms
                .map(|stop| stop.saturating_sub(self.start_ms))
                .unwrap_or(0),
            OutputState::Stopped | OutputState::Starting => 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.kind);
    }
}

/// `HH:MM:SS.mmm`, the protocol's timecode format.
pub fn format_timecode(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use OutputState::*;

    fn in_state(kind: OutputKind, state: OutputState) -> OutputLifecycle {
        let mut l = OutputLifecycle::new(kind);
        match state {
            Stopped => {}
            Starting => l.start(true).unwrap(),
            Started => {
                l.start(true).unwrap();
                l.complete_start(1000);
            }
            Stopping => {
                l.start(true).unwrap();
                l.complete_start(1000);
                l.stop(4000, true).unwrap();
            }
            Paused => {
                l.start(true).unwrap();
                l.complete_start(1000);
                l.pause(3000).unwrap();
            }
        }
        l
    }

    #[test]
    fn toggle_table() {
        let cases = [
            (Stopped, ToggleAction::Start),
            (Starting, ToggleAction::Stop),
            (Started, ToggleAction::Stop),
            (Stopping, ToggleAction::Start),
            (Paused, ToggleAction::Stop),
        ];
        for (state, expected) in cases {
            let l = in_state(OutputKind::Recording, state);
            assert_eq!(l.toggle_action(), expected, "from {:?}", state);
        }
    }

    #[test]
    fn explicit_start_table() {
        for state in [Stopped, Starting, Started, Stopping, Paused] {
            let mut l = in_state(OutputKind::Recording, state);
            let result = l.start(true);
            if state == Stopped {
                assert!(result.is_ok());
                assert_eq!(l.state(), Starting);
            } else {
                assert!(matches!(result, Err(RequestError::InvalidState(_))), "from {:?}", state);
                assert_eq!(l.state(), state);
            }
        }
    }

    #[test]
    fn explicit_stop_table() {
        for state in [Stopped, Starting, Started, Stopping] {
            let mut l = in_state(OutputKind::Streaming, state);
            let result = l.stop(5000, true);
            if state == Started {
                assert!(result.is_ok());
                assert_eq!(l.state(), Stopping);
            } else {
                assert!(matches!(result, Err(RequestError::InvalidState(_))), "from {:?}", state);
                assert_eq!(l.state(), state);
            }
        }
    }

    #[test]
    fn stop_while_stopping_fails() {
        let mut l = in_state(OutputKind::Streaming, Stopping);
        assert_eq!(
            l.stop(5000, true),
            Err(RequestError::InvalidState("streaming not active".into()))
        );
    }

    #[test]
    fn start_completion_sets_start_time() {
        let mut l = in_state(OutputKind::Streaming, Starting);
        assert_eq!(l.elapsed_ms(200), 0);
        assert!(l.complete_start(500));
        assert_eq!(l.state(), Started);
        assert_eq!(l.elapsed_ms(1500), 1000);
    }

    #[test]
    fn superseded_completions_are_no_ops() {
        // A toggle stop races the pending start.
        let mut l = in_state(OutputKind::Streaming, Starting);
        l.stop(100, false).unwrap();
        assert!(!l.complete_start(500));
        assert_eq!(l.state(), Stopping);

        // A toggle start races the pending stop.
        let mut l = in_state(OutputKind::Streaming, Stopping);
        l.start(false).unwrap();
        assert!(!l.complete_stop());
        assert_eq!(l.state(), Starting);
    }

    #[test]
    fn stopping_reports_frozen_elapsed_time() {
        let l = in_state(OutputKind::Streaming, Stopping);
        assert_eq!(l.elapsed_ms(9999), 3000);
    }

    #[test]
    fn pause_resume_excludes_paused_span() {
        let mut l = in_state(OutputKind::Recording, Started);
        assert_eq!(l.elapsed_ms(3000), 2000);
        l.pause(3000).unwrap();
        assert_eq!(l.elapsed_ms(8000), 2000);
        l.resume(8000).unwrap();
        assert_eq!(l.state(), Started);
        assert_eq!(l.elapsed_ms(9000), 3000);
    }

    #[test]
    fn stop_from_paused_keeps_pause_instant() {
        let mut l = in_state(OutputKind::Recording, Paused);
        l.stop(7000, true).unwrap();
        assert_eq!(l.state(), Stopping);
        assert_eq!(l.elapsed_ms(7000), 2000);
        assert!(l.complete_stop());
        assert_eq!(l.elapsed_ms(7500), 0);
    }

    #[test]
    fn pause_and_resume_preconditions() {
        let mut l = in_state(OutputKind::Recording, Stopped);
        assert!(l.pause(0).is_err());
        assert!(l.resume(0).is_err());

        let mut l = in_state(OutputKind::Recording, Paused);
        assert_eq!(
            l.pause(0),
            Err(RequestError::InvalidState("recording already paused".into()))
        );

        let mut l = in_state(OutputKind::ReplayBuffer, Started);
        assert!(l.pause(2000).is_err());
        assert_eq!(l.state(), Started);
    }

    #[test]
    fn reset_returns_to_stopped() {
        let mut l = in_state(OutputKind::Recording, Paused);
        l.reset();
        assert_eq!(l.state(), Stopped);
        assert_eq!(l.elapsed_ms(10_000), 0);
        assert_eq!(l.kind(), OutputKind::Recording);
    }

    #[test]
    fn timecode_format() {
        assert_eq!(format_timecode(0), "00:00:00.000");
        assert_eq!(format_timecode(3_723_045), "01:02:03.045");
    }
}

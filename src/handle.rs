//! Wall-clock driver for a `Simulator`.
//!
//! The simulator itself only moves when told to. `SimulatorHandle` shares it
//! behind a mutex and runs a background worker that maps elapsed wall time
//! onto virtual time, so timers fire on their own the way they would against
//! a live server.

use crate::error::RequestResult;
use crate::protocol::Request;
use crate::simulator::Simulator;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the worker catches virtual time up with the wall clock
const PUMP_INTERVAL_MS: u64 = 10;

/// Virtual time origin: the simulator's clock at spawn paired with the
/// wall-clock instant it corresponds to.
#[derive(Debug, Clone, Copy)]
struct Clock {
    started: Instant,
    base_ms: u64,
}

impl Clock {
    fn now_ms(&self) -> u64 {
        self.base_ms + self.started.elapsed().as_millis() as u64
    }
}

/// Thread-safe, self-advancing simulator.
///
/// Event subscribers run on whichever thread advanced time, with the
/// simulator locked; they must not call back into the handle.
pub struct SimulatorHandle {
    sim: Arc<Mutex<Simulator>>,
    clock: Clock,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

fn lock(sim: &Mutex<Simulator>) -> MutexGuard<'_, Simulator> {
    // A panicking subscriber must not wedge every later caller.
    sim.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatorHandle {
    /// Take ownership of `sim` and start the background worker.
    pub fn spawn(sim: Simulator) -> Self {
        let clock = Clock {
            started: Instant::now(),
            base_ms: sim.now_ms(),
        };
        let sim = Arc::new(Mutex::new(sim));
        let stop = Arc::new(AtomicBool::new(false));

        let sim_clone = Arc::clone(&sim);
        let stop_clone = Arc::clone(&stop);
        let worker = thread::Builder::new()
            .name("obs-sim-clock".into())
            .spawn(move || worker_loop(sim_clone, stop_clone, clock))
            .map_err(|e| log::error!("failed to start clock worker: {}", e))
            .ok();

        Self { sim, clock, stop, worker }
    }

    /// Lock the simulator with virtual time caught up to the wall clock.
    fn synced(&self) -> MutexGuard<'_, Simulator> {
        let mut sim = lock(&self.sim);
        sim.advance_to(self.clock.now_ms());
        sim
    }

    pub fn send(&self, raw: Value) -> Value {
        self.synced().send(raw)
    }

    pub fn send_request(&self, request: &Request) -> Value {
        self.synced().send_request(request)
    }

    pub fn connect(&self, password: Option<&str>) -> RequestResult<()> {
        self.synced().connect(password)
    }

    pub fn disconnect(&self) {
        self.synced().disconnect();
    }

    /// Run `f` against the simulator, e.g. to subscribe or inspect state.
    pub fn with<R>(&self, f: impl FnOnce(&mut Simulator) -> R) -> R {
        f(&mut self.synced())
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("clock worker panicked");
            }
        }
    }
}

/// Background worker that fires due timers as wall time passes.
fn worker_loop(sim: Arc<Mutex<Simulator>>, stop: Arc<AtomicBool>, clock: Clock) {
    log::debug!("clock worker started");
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(PUMP_INTERVAL_MS));

        let now = clock.now_ms();
        let mut guard = lock(&sim);
        if guard.next_due_ms().is_some_and(|due| due <= now) {
            guard.advance_to(now);
        }
    }
    log::debug!("clock worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;
    use crate::events::EventKind;
    use serde_json::json;
    use std::sync::mpsc;

    fn handle() -> SimulatorHandle {
        let handle = SimulatorHandle::spawn(Simulator::new(SimulatorConfig::default()).unwrap());
        handle.connect(None).unwrap();
        handle
    }

    #[test]
    fn timers_fire_without_requests() {
        let handle = handle();
        let (tx, rx) = mpsc::channel();
        handle.with(|sim| {
            sim.on(EventKind::StreamStarted, move |n| {
                let _ = tx.send(n.at_ms);
            })
        });

        let resp = handle.send(json!({"request-type": "StartStreaming", "message-id": "1"}));
        assert_eq!(resp["status"], json!("ok"));

        let at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(at >= 500);
    }

    #[test]
    fn requests_see_caught_up_state() {
        let handle = handle();
        handle.send_request(&Request::new("StartRecording", "1"));
        thread::sleep(Duration::from_millis(700));

        let resp = handle.send_request(&Request::new("GetRecordingStatus", "2"));
        assert_eq!(resp["isRecording"], json!(true));
    }

    #[test]
    fn drop_stops_the_worker() {
        let handle = handle();
        handle.send_request(&Request::new("SetHeartbeat", "1").with("enable", json!(true)));
        drop(handle);
    }
}

//! Timed scene switches.
//!
//! Each timed switch gets a fresh id. Only the completion carrying the
//! current id may commit; anything older was superseded and is dropped.

use crate::model::Transition;

pub const DEFAULT_FALLBACK_DURATION_MS: u64 = 300;

/// A switch waiting for its transition to finish.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlight {
    pub id: u64,
    pub started_ms: u64,
    pub duration_ms: u64,
    pub name: String,
    pub type_id: String,
    pub from_scene: String,
    pub to_scene: String,
}

#[derive(Debug)]
pub struct TransitionEngine {
    next_id: u64,
    fallback_ms: u64,
    in_flight: Option<InFlight>,
}

impl TransitionEngine {
    pub fn new(fallback_ms: u64) -> Self {
        Self {
            next_id: 0,
            fallback_ms,
            in_flight: None,
        }
    }

    /// Record a new timed switch, superseding any switch still in flight.
    pub fn begin(&mut self, now_ms: u64, transition: &Transition, from: &str, to: &str) -> InFlight {
        self.next_id += 1;
        let flight = InFlight {
            id: self.next_id,
            started_ms: now_ms,
            duration_ms: transition.effective_duration_ms(self.fallback_ms),
            name: transition.name.clone(),
            type_id: transition.kind.type_id.to_string(),
            from_scene: from.to_string(),
            to_scene: to.to_string(),
        };
        self.in_flight = Some(flight.clone());
        flight
    }

    /// Forget the switch in flight, if any. Its completion will be dropped.
    pub fn supersede(&mut self) -> Option<InFlight> {
        self.in_flight.take()
    }

    /// Claim the completion for `id`. Returns `None` when a newer switch (or
    /// a reset) has replaced it.
    pub fn complete(&mut self, id: u64) -> Option<InFlight> {
        match &self.in_flight {
            Some(flight) if flight.id == id => self.in_flight.take(),
            _ => None,
        }
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    /// Progress of the switch in flight, 1.0 when idle.
    pub fn position(&self, now_ms: u64) -> f64 {
        match &self.in_flight {
            Some(flight) if flight.duration_ms > 0 => {
                let elapsed = now_ms.saturating_sub(flight.started_ms) as f64;
                (elapsed / flight.duration_ms as f64).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    pub fn reset(&mut self) {
        self.next_id = 0;
        self.in_flight = None;
    }
}

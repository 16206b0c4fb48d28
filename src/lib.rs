//! In-process simulator of the OBS Studio websocket control protocol (4.x).
//!
//! A [`Simulator`] answers protocol requests against canned scene
//! collections and emits protocol events on an in-process bus. Time is
//! virtual: delayed effects (output start/stop, transitions, heartbeats) run
//! when the caller advances the clock, or automatically under a
//! [`SimulatorHandle`].

pub mod catalog;
pub mod cloner;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod handle;
pub mod lifecycle;
pub mod model;
pub mod protocol;
pub mod screenshot;
pub mod simulator;
pub mod timers;
pub mod transition;

pub use config::SimulatorConfig;
pub use error::{BuildError, RequestError};
pub use event_bus::SubscriptionId;
pub use events::{Event, EventKind, Notification};
pub use handle::SimulatorHandle;
pub use lifecycle::{OutputKind, OutputState};
pub use protocol::Request;
pub use simulator::Simulator;

//! Source type catalog.
//!
//! Static registry of the source, filter and transition types a simulated
//! OBS instance knows about, with their capability flags. Built once at
//! simulator construction and read-only afterwards.

pub mod builtin;
pub mod registry;
pub mod types;

pub use registry::SourceCatalog;
pub use types::{
    lookup_transition_type, Capabilities, SourceType, TransitionType, TypeKind, TRANSITION_TYPES,
};

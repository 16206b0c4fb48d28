//! Error taxonomy for the simulator.
//!
//! `RequestError` is what a client sees when a request fails. `BuildError` is
//! raised while a scene collection blueprint is finalized.

use thiserror::Error;

/// What kind of entity a failed lookup referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Scene,
    Source,
    SceneItem,
    Transition,
    SourceType,
    Profile,
    SceneCollection,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Scene => "scene",
            EntityKind::Source => "source",
            EntityKind::SceneItem => "scene item",
            EntityKind::Transition => "transition",
            EntityKind::SourceType => "source type",
            EntityKind::Profile => "profile",
            EntityKind::SceneCollection => "scene collection",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single request. All of these are reported synchronously and
/// leave the simulator state untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("not connected")]
    NotConnected,

    #[error("Not Authenticated")]
    NotAuthenticated,

    #[error("Authentication Failed.")]
    AuthenticationFailed,

    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: EntityKind, name: String },

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid request type: {0}")]
    Unhandled(String),
}

impl RequestError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        RequestError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        RequestError::InvalidState(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        RequestError::InvalidRequest(msg.into())
    }
}

/// Construction-time validation failure of a scene collection blueprint or
/// the source catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("source type '{0}' is already registered")]
    DuplicateType(String),

    #[error("name '{0}' is already used in this collection")]
    DuplicateName(String),

    #[error("type '{0}' is not registered")]
    UnknownType(String),

    #[error("source '{0}' does not exist")]
    UnknownSource(String),

    #[error("transition type '{0}' may only be used once per collection")]
    PrivilegedTransition(String),

    #[error("unknown special source role '{0}'")]
    UnknownSpecialRole(String),

    #[error("collection '{0}' needs at least one scene and one transition")]
    Empty(String),
}

pub type RequestResult<T> = Result<T, RequestError>;

//! Catalog entry types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What a registered type produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Input,
    Filter,
    Transition,
    Other,
}

impl TypeKind {
    /// Wire name used in `GetSourceTypesList`
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Input => "input",
            TypeKind::Filter => "filter",
            TypeKind::Transition => "transition",
            TypeKind::Other => "other",
        }
    }
}

/// Capability flags of a source type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub is_async: bool,
    pub has_video: bool,
    pub has_audio: bool,
    pub can_interact: bool,
    pub is_composite: bool,
    pub do_not_duplicate: bool,
    pub do_not_self_monitor: bool,
    pub is_deprecated: bool,
}

impl Capabilities {
    pub fn video() -> Self {
        Self {
            has_video: true,
            ..Self::default()
        }
    }

    pub fn audio() -> Self {
        Self {
            has_audio: true,
            ..Self::default()
        }
    }

    pub fn audio_video() -> Self {
        Self {
            has_video: true,
            has_audio: true,
            ..Self::default()
        }
    }

    pub fn with_async(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn with_interact(mut self) -> Self {
        self.can_interact = true;
        self
    }

    pub fn with_composite(mut self) -> Self {
        self.is_composite = true;
        self
    }

    pub fn with_no_duplicate(mut self) -> Self {
        self.do_not_duplicate = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.is_deprecated = true;
        self
    }
}

/// A registered source/filter/transition type.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceType {
    /// Unique identifier (e.g., "ffmpeg_source", "color_filter")
    pub type_id: String,
    /// Human-readable name
    pub display_name: String,
    pub kind: TypeKind,
    pub caps: Capabilities,
    /// Settings a freshly created source of this type starts with
    pub default_settings: Value,
}

impl SourceType {
    pub fn new(type_id: &str, display_name: &str, kind: TypeKind, caps: Capabilities) -> Self {
        Self {
            type_id: type_id.to_string(),
            display_name: display_name.to_string(),
            kind,
            caps,
            default_settings: json!({}),
        }
    }

    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.default_settings = defaults;
        self
    }

    /// Entry as listed by `GetSourceTypesList`
    pub fn to_wire(&self) -> Value {
        json!({
            "typeId": self.type_id,
            "displayName": self.display_name,
            "type": self.kind.as_str(),
            "defaultSettings": self.default_settings,
            "caps": self.caps,
        })
    }
}

/// Fixed transition type table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionType {
    /// Display name, used by collection fixtures to pick the type
    pub name: &'static str,
    /// Catalog type id reported in transition events
    pub type_id: &'static str,
    /// Whether the user-configured duration applies
    pub supports_duration: bool,
}

impl TransitionType {
    /// "Cut" and "Fade" may be instantiated at most once per collection.
    pub fn is_privileged(&self) -> bool {
        matches!(self.name, "Cut" | "Fade")
    }

    pub fn is_cut(&self) -> bool {
        self.name == "Cut"
    }
}

pub const TRANSITION_TYPES: &[TransitionType] = &[
    TransitionType { name: "Cut", type_id: "cut_transition", supports_duration: false },
    TransitionType { name: "Fade", type_id: "fade_transition", supports_duration: true },
    TransitionType { name: "Swipe", type_id: "swipe_transition", supports_duration: true },
    TransitionType { name: "Slide", type_id: "slide_transition", supports_duration: true },
    TransitionType { name: "Stinger", type_id: "obs_stinger_transition", supports_duration: false },
    TransitionType { name: "Fade to Color", type_id: "fade_to_color_transition", supports_duration: true },
    TransitionType { name: "Luma Wipe", type_id: "wipe_transition", supports_duration: true },
    TransitionType { name: "Shader", type_id: "shader_transition", supports_duration: false },
];

/// Look up a transition type by display name.
pub fn lookup_transition_type(name: &str) -> Option<&'static TransitionType> {
    TRANSITION_TYPES.iter().find(|t| t.name == name)
}

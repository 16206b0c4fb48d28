//! Scene collection state: sources, scenes, scene items and transitions.

use super::builder::Blueprint;
use crate::catalog::TransitionType;
use crate::cloner::SettingsValue;
use crate::error::{EntityKind, RequestError, RequestResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

/// Kind of a source as reported by `GetSourcesList`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Input,
    Filter,
    Transition,
    Scene,
    Unknown,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Input => "input",
            SourceKind::Filter => "filter",
            SourceKind::Transition => "transition",
            SourceKind::Scene => "scene",
            SourceKind::Unknown => "unknown",
        }
    }
}

/// Fixed audio role slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecialRole {
    Desktop1,
    Desktop2,
    Mic1,
    Mic2,
    Mic3,
}

impl SpecialRole {
    pub const ALL: [SpecialRole; 5] = [
        SpecialRole::Desktop1,
        SpecialRole::Desktop2,
        SpecialRole::Mic1,
        SpecialRole::Mic2,
        SpecialRole::Mic3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialRole::Desktop1 => "desktop-1",
            SpecialRole::Desktop2 => "desktop-2",
            SpecialRole::Mic1 => "mic-1",
            SpecialRole::Mic2 => "mic-2",
            SpecialRole::Mic3 => "mic-3",
        }
    }

    pub fn parse(role: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == role)
    }
}

/// A filter attached to a source.
#[derive(Debug)]
pub struct Filter {
    pub name: String,
    pub type_id: String,
    pub enabled: bool,
    pub settings: SettingsValue,
}

/// A named source in a collection. Scenes appear here too, with kind `Scene`.
///
/// Not `Clone`: settings are shared handles and must be copied with
/// [`deep_clone`](crate::cloner::deep_clone).
#[derive(Debug)]
pub struct Source {
    pub name: String,
    pub type_id: String,
    pub kind: SourceKind,
    /// Copied from the catalog at construction so audio checks need no lookup
    pub has_audio: bool,
    pub width: u32,
    pub height: u32,
    pub settings: SettingsValue,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub alignment: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(rename = "type")]
    pub kind: String,
    pub alignment: u32,
    pub x: f64,
    pub y: f64,
}

/// Scene item transform, with the protocol's field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Position,
    pub rotation: f64,
    pub scale: Scale,
    pub crop: Crop,
    pub bounds: Bounds,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Position { x: 0.0, y: 0.0, alignment: 5 },
            rotation: 0.0,
            scale: Scale { x: 1.0, y: 1.0 },
            crop: Crop::default(),
            bounds: Bounds {
                kind: "OBS_BOUNDS_NONE".to_string(),
                alignment: 0,
                x: 0.0,
                y: 0.0,
            },
        }
    }
}

/// Placement of a source inside a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneItem {
    pub id: u64,
    pub source_name: String,
    pub transform: Transform,
    pub visible: bool,
    pub locked: bool,
}

/// How a request names a scene item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemRef {
    Id(u64),
    Name(String),
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemRef::Id(id) => write!(f, "#{}", id),
            ItemRef::Name(name) => f.write_str(name),
        }
    }
}

/// Ordered items, front to back.
#[derive(Debug, Clone)]
pub struct Scene {
    pub name: String,
    pub items: Vec<SceneItem>,
}

impl Scene {
    /// Find an item by id, or the first item showing the named source.
    pub fn find_item(&self, item: &ItemRef) -> RequestResult<&SceneItem> {
        self.items
            .iter()
            .find(|i| item_matches(i, item))
            .ok_or_else(|| RequestError::not_found(EntityKind::SceneItem, item.to_string()))
    }

    pub fn find_item_mut(&mut self, item: &ItemRef) -> RequestResult<&mut SceneItem> {
        self.items
            .iter_mut()
            .find(|i| item_matches(i, item))
            .ok_or_else(|| RequestError::not_found(EntityKind::SceneItem, item.to_string()))
    }
}

fn item_matches(candidate: &SceneItem, item: &ItemRef) -> bool {
    match item {
        ItemRef::Id(id) => candidate.id == *id,
        ItemRef::Name(name) => candidate.source_name == *name,
    }
}

/// A configured transition instance.
#[derive(Debug, Clone)]
pub struct Transition {
    pub name: String,
    pub kind: &'static TransitionType,
    pub duration_ms: u64,
}

impl Transition {
    /// Duration the transition actually takes; types without a configurable
    /// duration use `fallback_ms`.
    pub fn effective_duration_ms(&self, fallback_ms: u64) -> u64 {
        if self.kind.supports_duration {
            self.duration_ms
        } else {
            fallback_ms
        }
    }
}

/// One named scene collection.
#[derive(Debug)]
pub struct SceneCollection {
    pub(super) blueprint: Blueprint,
    pub(super) next_item_id: u64,
    pub(super) sources: IndexMap<String, Source>,
    pub(super) scenes: IndexMap<String, Scene>,
    pub(super) transitions: IndexMap<String, Transition>,
    pub(super) volumes: HashMap<String, f64>,
    pub(super) muted: HashMap<String, bool>,
    pub(super) special: BTreeMap<SpecialRole, String>,
    pub(super) current_scene: String,
    pub(super) current_transition: String,
}

impl SceneCollection {
    pub fn name(&self) -> &str {
        &self.blueprint.name
    }

    /// Discard every runtime change and rebuild from the blueprint. Item ids
    /// restart at 1.
    pub fn reset(&mut self) {
        *self = super::builder::construct(self.blueprint.clone());
    }

    pub fn current_scene(&self) -> &str {
        &self.current_scene
    }

    pub fn current_transition(&self) -> &Transition {
        // Construction guarantees the name resolves and nothing is ever removed.
        &self.transitions[self.current_transition.as_str()]
    }

    pub fn set_current_scene(&mut self, name: &str) -> RequestResult<()> {
        self.scene(name)?;
        self.current_scene = name.to_string();
        Ok(())
    }

    pub fn set_current_transition(&mut self, name: &str) -> RequestResult<()> {
        self.transition(name)?;
        self.current_transition = name.to_string();
        Ok(())
    }

    pub fn scene(&self, name: &str) -> RequestResult<&Scene> {
        self.scenes
            .get(name)
            .ok_or_else(|| RequestError::not_found(EntityKind::Scene, name))
    }

    pub fn scene_mut(&mut self, name: &str) -> RequestResult<&mut Scene> {
        self.scenes
            .get_mut(name)
            .ok_or_else(|| RequestError::not_found(EntityKind::Scene, name))
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    pub fn source(&self, name: &str) -> RequestResult<&Source> {
        self.sources
            .get(name)
            .ok_or_else(|| RequestError::not_found(EntityKind::Source, name))
    }

    pub fn source_mut(&mut self, name: &str) -> RequestResult<&mut Source> {
        self.sources
            .get_mut(name)
            .ok_or_else(|| RequestError::not_found(EntityKind::Source, name))
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn transition(&self, name: &str) -> RequestResult<&Transition> {
        self.transitions
            .get(name)
            .ok_or_else(|| RequestError::not_found(EntityKind::Transition, name))
    }

    pub fn transition_mut(&mut self, name: &str) -> RequestResult<&mut Transition> {
        self.transitions
            .get_mut(name)
            .ok_or_else(|| RequestError::not_found(EntityKind::Transition, name))
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn special_source(&self, role: SpecialRole) -> Option<&str> {
        self.special.get(&role).map(String::as_str)
    }

    /// Volume (multiplier) and mute state. Sources without audio always read
    /// as silent and muted.
    pub fn audio_state(&self, name: &str) -> RequestResult<(f64, bool)> {
        let source = self.source(name)?;
        if !source.has_audio {
            return Ok((0.0, true));
        }
        let volume = self.volumes.get(name).copied().unwrap_or(1.0);
        let muted = self.muted.get(name).copied().unwrap_or(false);
        Ok((volume, muted))
    }

    /// Set the volume multiplier. Returns whether anything changed; sources
    /// without audio accept the call and ignore it.
    pub fn set_volume(&mut self, name: &str, volume: f64) -> RequestResult<bool> {
        if !self.source(name)?.has_audio {
            return Ok(false);
        }
        let previous = self.volumes.insert(name.to_string(), volume);
        Ok(previous != Some(volume))
    }

    /// Set the mute flag, with the same audio rule as [`set_volume`](Self::set_volume).
    pub fn set_muted(&mut self, name: &str, muted: bool) -> RequestResult<bool> {
        if !self.source(name)?.has_audio {
            return Ok(false);
        }
        let previous = self.muted.insert(name.to_string(), muted);
        Ok(previous != Some(muted))
    }

    /// Scene items in the shape `SwitchScenes` / `GetCurrentScene` report them.
    pub fn scene_sources_wire(&self, scene: &str) -> RequestResult<Vec<Value>> {
        let scene = self.scene(scene)?;
        Ok(scene.items.iter().map(|item| self.item_summary(item)).collect())
    }

    fn item_summary(&self, item: &SceneItem) -> Value {
        let (volume, muted) = self
            .audio_state(&item.source_name)
            .unwrap_or((0.0, true));
        let (kind, width, height) = match self.sources.get(&item.source_name) {
            Some(s) => (s.type_id.as_str(), s.width, s.height),
            None => ("unknown", 0, 0),
        };
        let t = &item.transform;
        json!({
            "id": item.id,
            "name": item.source_name,
            "type": kind,
            "render": item.visible,
            "locked": item.locked,
            "muted": muted,
            "volume": volume,
            "x": t.position.x,
            "y": t.position.y,
            "alignment": t.position.alignment,
            "source_cx": width,
            "source_cy": height,
            "cx": width as f64 * t.scale.x,
            "cy": height as f64 * t.scale.y,
        })
    }

    /// Full item properties as `GetSceneItemProperties` reports them.
    pub fn item_properties_wire(&self, scene: &str, item: &ItemRef) -> RequestResult<Value> {
        let item = self.scene(scene)?.find_item(item)?;
        let (_, muted) = self.audio_state(&item.source_name).unwrap_or((0.0, true));
        let (width, height) = self
            .sources
            .get(&item.source_name)
            .map(|s| (s.width, s.height))
            .unwrap_or((0, 0));
        let t = &item.transform;
        Ok(json!({
            "name": item.source_name,
            "itemId": item.id,
            "position": t.position,
            "rotation": t.rotation,
            "scale": t.scale,
            "crop": t.crop,
            "visible": item.visible,
            "muted": muted,
            "locked": item.locked,
            "bounds": t.bounds,
            "sourceWidth": width,
            "sourceHeight": height,
            "width": width as f64 * t.scale.x,
            "height": height as f64 * t.scale.y,
        }))
    }
}

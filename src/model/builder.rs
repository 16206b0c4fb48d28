//! Scene collection blueprints.
//!
//! Fixture functions describe a collection with [`CollectionBuilder`]; nothing
//! is checked until [`CollectionBuilder::finalize`] validates the whole
//! blueprint once and constructs the collection. The validated blueprint is
//! kept so [`SceneCollection::reset`] can rebuild the exact baseline.

use super::collection::{
    Filter, Scene, SceneCollection, SceneItem, Source, SourceKind, SpecialRole, Transform,
    Transition,
};
use crate::catalog::{lookup_transition_type, SourceCatalog, TypeKind};
use crate::cloner::SettingsValue;
use crate::error::BuildError;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

const DEFAULT_VIDEO_SIZE: (u32, u32) = (1920, 1080);

#[derive(Debug, Clone)]
pub struct TransitionDef {
    pub name: String,
    pub type_name: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FilterDef {
    pub name: String,
    pub type_id: String,
    pub enabled: bool,
    pub settings: Value,
}

#[derive(Debug, Clone)]
pub struct SourceDef {
    pub name: String,
    pub type_id: String,
    pub settings: Value,
    pub volume: f64,
    pub muted: bool,
    pub size: Option<(u32, u32)>,
    pub filters: Vec<FilterDef>,
    // Filled in by finalize from the catalog
    kind: SourceKind,
    has_audio: bool,
}

impl SourceDef {
    pub fn settings(&mut self, settings: Value) -> &mut Self {
        self.settings = settings;
        self
    }

    pub fn volume(&mut self, volume: f64) -> &mut Self {
        self.volume = volume;
        self
    }

    pub fn muted(&mut self, muted: bool) -> &mut Self {
        self.muted = muted;
        self
    }

    pub fn size(&mut self, width: u32, height: u32) -> &mut Self {
        self.size = Some((width, height));
        self
    }

    pub fn filter(&mut self, name: &str, type_id: &str, settings: Value) -> &mut Self {
        self.filters.push(FilterDef {
            name: name.to_string(),
            type_id: type_id.to_string(),
            enabled: true,
            settings,
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct ItemDef {
    pub source: String,
    pub visible: bool,
    pub locked: bool,
    pub transform: Transform,
}

impl ItemDef {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            visible: true,
            locked: false,
            transform: Transform::default(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.transform.position.x = x;
        self.transform.position.y = y;
        self
    }

    pub fn scaled(mut self, sx: f64, sy: f64) -> Self {
        self.transform.scale.x = sx;
        self.transform.scale.y = sy;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SceneDef {
    pub name: String,
    pub items: Vec<ItemDef>,
}

/// Plain-data description of a collection.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub name: String,
    pub transitions: Vec<TransitionDef>,
    pub sources: Vec<SourceDef>,
    pub scenes: Vec<SceneDef>,
    pub special: Vec<(String, String)>,
    pub current_scene: Option<String>,
    pub current_transition: Option<String>,
}

/// Accumulates a [`Blueprint`].
#[derive(Debug, Clone)]
pub struct CollectionBuilder {
    blueprint: Blueprint,
}

impl CollectionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            blueprint: Blueprint {
                name: name.to_string(),
                transitions: Vec::new(),
                sources: Vec::new(),
                scenes: Vec::new(),
                special: Vec::new(),
                current_scene: None,
                current_transition: None,
            },
        }
    }

    pub fn transition(&mut self, name: &str, type_name: &str, duration_ms: u64) -> &mut Self {
        self.blueprint.transitions.push(TransitionDef {
            name: name.to_string(),
            type_name: type_name.to_string(),
            duration_ms,
        });
        self
    }

    /// Add a source and return it for further configuration.
    pub fn source(&mut self, name: &str, type_id: &str) -> &mut SourceDef {
        self.blueprint.sources.push(SourceDef {
            name: name.to_string(),
            type_id: type_id.to_string(),
            settings: json!({}),
            volume: 1.0,
            muted: false,
            size: None,
            filters: Vec::new(),
            kind: SourceKind::Unknown,
            has_audio: false,
        });
        let last = self.blueprint.sources.len() - 1;
        &mut self.blueprint.sources[last]
    }

    /// Add a scene whose items show the named sources with default placement.
    pub fn scene(&mut self, name: &str, sources: &[&str]) -> &mut Self {
        let items = sources.iter().map(|s| ItemDef::new(s)).collect();
        self.scene_with(name, items)
    }

    pub fn scene_with(&mut self, name: &str, items: Vec<ItemDef>) -> &mut Self {
        self.blueprint.scenes.push(SceneDef {
            name: name.to_string(),
            items,
        });
        self
    }

    pub fn special(&mut self, role: &str, source: &str) -> &mut Self {
        self.blueprint
            .special
            .push((role.to_string(), source.to_string()));
        self
    }

    pub fn current_scene(&mut self, name: &str) -> &mut Self {
        self.blueprint.current_scene = Some(name.to_string());
        self
    }

    pub fn current_transition(&mut self, name: &str) -> &mut Self {
        self.blueprint.current_transition = Some(name.to_string());
        self
    }

    /// Validate the blueprint against the catalog and build the collection.
    pub fn finalize(&self, catalog: &SourceCatalog) -> Result<SceneCollection, BuildError> {
        let blueprint = validate(self.blueprint.clone(), catalog)?;
        Ok(construct(blueprint))
    }
}

fn validate(mut bp: Blueprint, catalog: &SourceCatalog) -> Result<Blueprint, BuildError> {
    if bp.scenes.is_empty() || bp.transitions.is_empty() {
        return Err(BuildError::Empty(bp.name));
    }

    let mut transition_names = HashSet::new();
    let mut privileged_used = HashSet::new();
    for t in &bp.transitions {
        let kind = lookup_transition_type(&t.type_name)
            .ok_or_else(|| BuildError::UnknownType(t.type_name.clone()))?;
        if !transition_names.insert(t.name.as_str()) {
            return Err(BuildError::DuplicateName(t.name.clone()));
        }
        if kind.is_privileged() && !privileged_used.insert(kind.name) {
            return Err(BuildError::PrivilegedTransition(kind.name.to_string()));
        }
    }

    // Sources and scenes share one namespace.
    let mut names = HashSet::new();
    for source in bp.sources.iter_mut() {
        let source_type = catalog
            .lookup(&source.type_id)
            .map_err(|_| BuildError::UnknownType(source.type_id.clone()))?;
        if !names.insert(source.name.clone()) {
            return Err(BuildError::DuplicateName(source.name.clone()));
        }
        source.kind = match source_type.kind {
            TypeKind::Input => SourceKind::Input,
            TypeKind::Filter => SourceKind::Filter,
            TypeKind::Transition => SourceKind::Transition,
            TypeKind::Other => SourceKind::Unknown,
        };
        source.has_audio = catalog.has_audio(&source.type_id);
        if source.size.is_none() {
            source.size = Some(if source_type.caps.has_video {
                DEFAULT_VIDEO_SIZE
            } else {
                (0, 0)
            });
        }
        for filter in &source.filters {
            if !catalog.contains(&filter.type_id) {
                return Err(BuildError::UnknownType(filter.type_id.clone()));
            }
        }
    }
    for scene in &bp.scenes {
        if !names.insert(scene.name.clone()) {
            return Err(BuildError::DuplicateName(scene.name.clone()));
        }
    }
    for scene in &bp.scenes {
        for item in &scene.items {
            if !names.contains(&item.source) {
                return Err(BuildError::UnknownSource(item.source.clone()));
            }
        }
    }

    for (role, source) in &bp.special {
        if SpecialRole::parse(role).is_none() {
            return Err(BuildError::UnknownSpecialRole(role.clone()));
        }
        if !bp.sources.iter().any(|s| &s.name == source) {
            return Err(BuildError::UnknownSource(source.clone()));
        }
    }

    if let Some(scene) = &bp.current_scene {
        if !bp.scenes.iter().any(|s| &s.name == scene) {
            return Err(BuildError::UnknownSource(scene.clone()));
        }
    }
    if let Some(transition) = &bp.current_transition {
        if !transition_names.contains(transition.as_str()) {
            return Err(BuildError::UnknownSource(transition.clone()));
        }
    }

    Ok(bp)
}

/// Build a collection from an already validated blueprint.
pub(super) fn construct(bp: Blueprint) -> SceneCollection {
    let mut transitions = IndexMap::new();
    for t in &bp.transitions {
        if let Some(kind) = lookup_transition_type(&t.type_name) {
            transitions.insert(
                t.name.clone(),
                Transition {
                    name: t.name.clone(),
                    kind,
                    duration_ms: t.duration_ms,
                },
            );
        }
    }

    let mut sources = IndexMap::new();
    let mut volumes = HashMap::new();
    let mut muted = HashMap::new();
    for def in &bp.sources {
        let (width, height) = def.size.unwrap_or((0, 0));
        sources.insert(
            def.name.clone(),
            Source {
                name: def.name.clone(),
                type_id: def.type_id.clone(),
                kind: def.kind,
                has_audio: def.has_audio,
                width,
                height,
                settings: SettingsValue::from_json(&def.settings),
                filters: def
                    .filters
                    .iter()
                    .map(|f| Filter {
                        name: f.name.clone(),
                        type_id: f.type_id.clone(),
                        enabled: f.enabled,
                        settings: SettingsValue::from_json(&f.settings),
                    })
                    .collect(),
            },
        );
        if def.has_audio {
            volumes.insert(def.name.clone(), def.volume);
            muted.insert(def.name.clone(), def.muted);
        }
    }

    let mut next_item_id = 1;
    let mut scenes = IndexMap::new();
    for def in &bp.scenes {
        let items = def
            .items
            .iter()
            .map(|item| {
                let id = next_item_id;
                next_item_id += 1;
                SceneItem {
                    id,
                    source_name: item.source.clone(),
                    transform: item.transform.clone(),
                    visible: item.visible,
                    locked: item.locked,
                }
            })
            .collect();
        scenes.insert(
            def.name.clone(),
            Scene {
                name: def.name.clone(),
                items,
            },
        );
        sources.insert(
            def.name.clone(),
            Source {
                name: def.name.clone(),
                type_id: "scene".to_string(),
                kind: SourceKind::Scene,
                has_audio: false,
                width: DEFAULT_VIDEO_SIZE.0,
                height: DEFAULT_VIDEO_SIZE.1,
                settings: SettingsValue::map(),
                filters: Vec::new(),
            },
        );
    }

    let special: BTreeMap<SpecialRole, String> = bp
        .special
        .iter()
        .filter_map(|(role, source)| SpecialRole::parse(role).map(|r| (r, source.clone())))
        .collect();

    // Defaults: second registered transition (conventionally "Fade"), first scene.
    let current_transition = bp
        .current_transition
        .clone()
        .or_else(|| bp.transitions.get(1).or(bp.transitions.first()).map(|t| t.name.clone()))
        .unwrap_or_default();
    let current_scene = bp
        .current_scene
        .clone()
        .or_else(|| bp.scenes.first().map(|s| s.name.clone()))
        .unwrap_or_default();

    SceneCollection {
        blueprint: bp,
        next_item_id,
        sources,
        scenes,
        transitions,
        volumes,
        muted,
        special,
        current_scene,
        current_transition,
    }
}

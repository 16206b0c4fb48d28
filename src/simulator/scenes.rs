//! Scenes, scene items, transitions and studio mode.

use super::Simulator;
use crate::error::{RequestError, RequestResult};
use crate::events::Event;
use crate::model::collection::{Bounds, Transform};
use crate::model::ItemRef;
use crate::protocol::Request;
use crate::timers::TimerTask;
use serde_json::{json, Map, Value};

const BOUNDS_TYPES: &[&str] = &[
    "OBS_BOUNDS_NONE",
    "OBS_BOUNDS_STRETCH",
    "OBS_BOUNDS_SCALE_INNER",
    "OBS_BOUNDS_SCALE_OUTER",
    "OBS_BOUNDS_SCALE_TO_WIDTH",
    "OBS_BOUNDS_SCALE_TO_HEIGHT",
    "OBS_BOUNDS_MAX_ONLY",
];

fn opt_number(obj: &Map<String, Value>, key: &str, context: &str) -> RequestResult<Option<f64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| RequestError::invalid_request(format!("{}.{} must be a number", context, key))),
    }
}

fn opt_integer(obj: &Map<String, Value>, key: &str, context: &str) -> RequestResult<Option<i64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| RequestError::invalid_request(format!("{}.{} must be an integer", context, key))),
    }
}

fn opt_alignment(obj: &Map<String, Value>, context: &str) -> RequestResult<Option<u32>> {
    match opt_integer(obj, "alignment", context)? {
        None => Ok(None),
        Some(a) => u32::try_from(a)
            .map(Some)
            .map_err(|_| RequestError::invalid_request(format!("{}.alignment out of range", context))),
    }
}

/// Apply the transform fields present in `req` to a copy of `current`.
/// Nothing is committed if any field is invalid.
fn updated_transform(current: &Transform, req: &Request) -> RequestResult<Transform> {
    let mut t = current.clone();

    if let Some(position) = req.opt_object("position")? {
        if let Some(x) = opt_number(position, "x", "position")? {
            t.position.x = x;
        }
        if let Some(y) = opt_number(position, "y", "position")? {
            t.position.y = y;
        }
        if let Some(alignment) = opt_alignment(position, "position")? {
            t.position.alignment = alignment;
        }
    }
    if let Some(rotation) = req.opt_f64("rotation")? {
        t.rotation = rotation;
    }
    if let Some(scale) = req.opt_object("scale")? {
        if let Some(x) = opt_number(scale, "x", "scale")? {
            t.scale.x = x;
        }
        if let Some(y) = opt_number(scale, "y", "scale")? {
            t.scale.y = y;
        }
    }
    if let Some(crop) = req.opt_object("crop")? {
        for (key, slot) in [
            ("top", &mut t.crop.top),
            ("right", &mut t.crop.right),
            ("bottom", &mut t.crop.bottom),
            ("left", &mut t.crop.left),
        ] {
            if let Some(v) = opt_integer(crop, key, "crop")? {
                if v < 0 {
                    return Err(RequestError::invalid_request(format!("crop.{} must not be negative", key)));
                }
                *slot = v;
            }
        }
    }
    if let Some(bounds) = req.opt_object("bounds")? {
        t.bounds = updated_bounds(&t.bounds, bounds)?;
    }
    Ok(t)
}

fn updated_bounds(current: &Bounds, obj: &Map<String, Value>) -> RequestResult<Bounds> {
    let mut b = current.clone();
    match obj.get("type") {
        None | Some(Value::Null) => {}
        Some(Value::String(kind)) if BOUNDS_TYPES.contains(&kind.as_str()) => b.kind = kind.clone(),
        Some(other) => {
            return Err(RequestError::invalid_request(format!("invalid bounds type: {}", other)))
        }
    }
    if let Some(alignment) = opt_alignment(obj, "bounds")? {
        b.alignment = alignment;
    }
    if let Some(x) = opt_number(obj, "x", "bounds")? {
        b.x = x;
    }
    if let Some(y) = opt_number(obj, "y", "bounds")? {
        b.y = y;
    }
    Ok(b)
}

impl Simulator {
    /// Scene named by `scene-name`, or the program scene.
    fn target_scene(&self, req: &Request, key: &str) -> RequestResult<String> {
        let name = match req.opt_str(key)? {
            Some(name) => name.to_string(),
            None => self.current_scene().to_string(),
        };
        self.collection().scene(&name)?;
        Ok(name)
    }

    fn require_studio_mode(&self) -> RequestResult<()> {
        if self.session.studio_mode {
            Ok(())
        } else {
            Err(RequestError::invalid_state("studio mode not enabled"))
        }
    }

    fn scene_wire(&self, name: &str) -> RequestResult<Value> {
        Ok(json!({
            "name": name,
            "sources": self.collection().scene_sources_wire(name)?,
        }))
    }

    // ─────────────────────────────────────────────────────────────────
    // Scene switching
    // ─────────────────────────────────────────────────────────────────

    /// Switch the program scene through the current transition. A cut
    /// commits immediately; anything else begins a timed switch that
    /// supersedes the one in flight.
    pub(super) fn switch_scenes(&mut self, target: &str) -> RequestResult<()> {
        self.collection().scene(target)?;
        let transition = self.collection().current_transition().clone();

        if transition.kind.is_cut() {
            if let Some(flight) = self.transitions.supersede() {
                log::debug!("cut to '{}' superseded transition {}", target, flight.id);
            }
            return self.commit_scene(target);
        }

        let from = self.current_scene().to_string();
        let flight = self.transitions.begin(self.now_ms, &transition, &from, target);
        log::debug!(
            "transition {} '{}' -> '{}' over {} ms",
            flight.id,
            from,
            target,
            flight.duration_ms
        );
        self.emit(Event::TransitionBegin {
            name: flight.name.clone(),
            type_id: flight.type_id.clone(),
            duration: flight.duration_ms,
            from_scene: flight.from_scene.clone(),
            to_scene: flight.to_scene.clone(),
        });
        self.schedule_in(flight.duration_ms, TimerTask::TransitionDone { id: flight.id });
        Ok(())
    }

    fn commit_scene(&mut self, target: &str) -> RequestResult<()> {
        self.collection_mut().set_current_scene(target)?;
        let sources = self.collection().scene_sources_wire(target)?;
        self.emit(Event::SwitchScenes {
            scene_name: target.to_string(),
            sources,
        });
        Ok(())
    }

    pub(super) fn complete_transition(&mut self, id: u64) {
        let Some(flight) = self.transitions.complete(id) else {
            log::debug!("dropping superseded transition {}", id);
            return;
        };
        self.emit(Event::TransitionEnd {
            name: flight.name,
            type_id: flight.type_id,
            duration: flight.duration_ms,
            to_scene: flight.to_scene.clone(),
        });
        if let Err(e) = self.commit_scene(&flight.to_scene) {
            log::warn!("transition {} could not commit: {}", id, e);
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Scenes
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn set_current_scene(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("scene-name")?;
        self.switch_scenes(name)?;
        Ok(json!({}))
    }

    pub(super) fn get_current_scene(&mut self, _req: &Request) -> RequestResult<Value> {
        let current = self.current_scene().to_string();
        self.scene_wire(&current)
    }

    pub(super) fn get_scene_list(&mut self, _req: &Request) -> RequestResult<Value> {
        let scenes = self
            .collection()
            .scenes()
            .map(|scene| self.scene_wire(&scene.name))
            .collect::<RequestResult<Vec<_>>>()?;
        Ok(json!({
            "current-scene": self.current_scene(),
            "scenes": scenes,
        }))
    }

    // ─────────────────────────────────────────────────────────────────
    // Scene items
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn get_scene_item_list(&mut self, req: &Request) -> RequestResult<Value> {
        let scene_name = self.target_scene(req, "sceneName")?;
        let collection = self.collection();
        let items: Vec<Value> = collection
            .scene(&scene_name)?
            .items
            .iter()
            .map(|item| {
                let (type_id, kind) = collection
                    .source(&item.source_name)
                    .map(|s| (s.type_id.as_str(), s.kind.as_str()))
                    .unwrap_or(("", "unknown"));
                json!({
                    "itemId": item.id,
                    "sourceKind": type_id,
                    "sourceName": item.source_name,
                    "sourceType": kind,
                })
            })
            .collect();
        Ok(json!({ "sceneName": scene_name, "sceneItems": items }))
    }

    pub(super) fn get_scene_item_properties(&mut self, req: &Request) -> RequestResult<Value> {
        let scene_name = self.target_scene(req, "scene-name")?;
        let item = req.item("item")?;
        self.collection().item_properties_wire(&scene_name, &item)
    }

    pub(super) fn set_scene_item_properties(&mut self, req: &Request) -> RequestResult<Value> {
        let scene_name = self.target_scene(req, "scene-name")?;
        let item_ref = req.item("item")?;
        let visible = req.opt_bool("visible")?;
        let locked = req.opt_bool("locked")?;

        let item = self.collection().scene(&scene_name)?.find_item(&item_ref)?;
        let transform = updated_transform(&item.transform, req)?;
        let transform_changed = transform != item.transform;
        let visibility_changed = visible.is_some_and(|v| v != item.visible);

        let scene = self.collection_mut().scene_mut(&scene_name)?;
        let item = scene.find_item_mut(&item_ref)?;
        item.transform = transform;
        if let Some(v) = visible {
            item.visible = v;
        }
        if let Some(l) = locked {
            item.locked = l;
        }
        let item = item.clone();

        if transform_changed {
            self.emit(Event::SceneItemTransformChanged {
                scene_name: scene_name.clone(),
                item_name: item.source_name.clone(),
                item_id: item.id,
                transform: serde_json::to_value(&item.transform).unwrap_or(Value::Null),
            });
        }
        if visibility_changed {
            self.emit(Event::SceneItemVisibilityChanged {
                scene_name,
                item_name: item.source_name,
                item_id: item.id,
                item_visible: item.visible,
            });
        }
        Ok(json!({}))
    }

    pub(super) fn set_scene_item_render(&mut self, req: &Request) -> RequestResult<Value> {
        let scene_name = self.target_scene(req, "scene-name")?;
        let item_ref = match req.opt_u64("item")? {
            Some(id) => ItemRef::Id(id),
            None => ItemRef::Name(req.str("source")?.to_string()),
        };
        let render = req.bool("render")?;

        let scene = self.collection_mut().scene_mut(&scene_name)?;
        let item = scene.find_item_mut(&item_ref)?;
        if item.visible == render {
            return Ok(json!({}));
        }
        item.visible = render;
        let (item_name, item_id) = (item.source_name.clone(), item.id);
        self.emit(Event::SceneItemVisibilityChanged {
            scene_name,
            item_name,
            item_id,
            item_visible: render,
        });
        Ok(json!({}))
    }

    pub(super) fn reset_scene_item(&mut self, req: &Request) -> RequestResult<Value> {
        let scene_name = self.target_scene(req, "scene-name")?;
        let item_ref = req.item("item")?;

        let scene = self.collection_mut().scene_mut(&scene_name)?;
        let item = scene.find_item_mut(&item_ref)?;
        if item.transform == Transform::default() {
            return Ok(json!({}));
        }
        item.transform = Transform::default();
        let (item_name, item_id) = (item.source_name.clone(), item.id);
        let transform = serde_json::to_value(Transform::default()).unwrap_or(Value::Null);
        self.emit(Event::SceneItemTransformChanged {
            scene_name,
            item_name,
            item_id,
            transform,
        });
        Ok(json!({}))
    }

    // ─────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn get_transition_list(&mut self, _req: &Request) -> RequestResult<Value> {
        let collection = self.collection();
        let transitions: Vec<Value> = collection
            .transitions()
            .map(|t| json!({ "name": t.name }))
            .collect();
        Ok(json!({
            "current-transition": collection.current_transition().name,
            "transitions": transitions,
        }))
    }

    pub(super) fn get_current_transition(&mut self, _req: &Request) -> RequestResult<Value> {
        let transition = self.collection().current_transition();
        let mut body = json!({ "name": transition.name });
        if transition.kind.supports_duration {
            body["duration"] = json!(transition.duration_ms);
        }
        Ok(body)
    }

    fn change_transition(&mut self, name: &str) -> RequestResult<()> {
        if self.collection().current_transition().name == name {
            self.collection().transition(name)?;
            return Ok(());
        }
        self.collection_mut().set_current_transition(name)?;
        self.emit(Event::SwitchTransition {
            transition_name: name.to_string(),
        });
        Ok(())
    }

    fn change_transition_duration(&mut self, duration_ms: u64) {
        let name = self.collection().current_transition().name.clone();
        let Ok(transition) = self.collection_mut().transition_mut(&name) else {
            return;
        };
        let old = transition.duration_ms;
        if old == duration_ms {
            return;
        }
        transition.duration_ms = duration_ms;
        self.emit(Event::TransitionDurationChanged {
            old_duration: old,
            new_duration: duration_ms,
        });
    }

    pub(super) fn set_current_transition(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("transition-name")?;
        self.change_transition(name)?;
        Ok(json!({}))
    }

    pub(super) fn set_transition_duration(&mut self, req: &Request) -> RequestResult<Value> {
        let duration = req.u64("duration")?;
        self.change_transition_duration(duration);
        Ok(json!({}))
    }

    pub(super) fn get_transition_duration(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "transition-duration": self.collection().current_transition().duration_ms }))
    }

    pub(super) fn get_transition_position(&mut self, _req: &Request) -> RequestResult<Value> {
        let position = if self.collection().current_transition().kind.is_cut() {
            1.0
        } else {
            self.transitions.position(self.now_ms)
        };
        Ok(json!({ "position": position }))
    }

    // ─────────────────────────────────────────────────────────────────
    // Studio mode
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn get_studio_mode_status(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "studio-mode": self.session.studio_mode }))
    }

    pub(super) fn get_preview_scene(&mut self, _req: &Request) -> RequestResult<Value> {
        self.require_studio_mode()?;
        let preview = self.preview_or_program();
        self.scene_wire(&preview)
    }

    fn preview_or_program(&self) -> String {
        self.session
            .preview_scene
            .clone()
            .unwrap_or_else(|| self.current_scene().to_string())
    }

    pub(super) fn set_preview_scene(&mut self, req: &Request) -> RequestResult<Value> {
        self.require_studio_mode()?;
        let name = req.str("scene-name")?;
        let sources = self.collection().scene_sources_wire(name)?;
        if self.session.preview_scene.as_deref() == Some(name) {
            return Ok(json!({}));
        }
        self.session.preview_scene = Some(name.to_string());
        self.emit(Event::PreviewSceneChanged {
            scene_name: name.to_string(),
            sources,
        });
        Ok(json!({}))
    }

    pub(super) fn transition_to_program(&mut self, req: &Request) -> RequestResult<Value> {
        self.require_studio_mode()?;
        let mut name = None;
        let mut duration = None;
        if let Some(with) = req.opt_object("with-transition")? {
            name = match with.get("name") {
                None | Some(Value::Null) => None,
                Some(Value::String(n)) => Some(n.clone()),
                Some(_) => return Err(RequestError::invalid_request("with-transition.name must be a string")),
            };
            duration = match with.get("duration") {
                None | Some(Value::Null) => None,
                Some(v) => Some(v.as_u64().ok_or_else(|| {
                    RequestError::invalid_request("with-transition.duration must be a non-negative integer")
                })?),
            };
        }
        if let Some(name) = &name {
            self.collection().transition(name)?;
        }
        let preview = self.preview_or_program();
        self.collection().scene(&preview)?;

        if let Some(name) = &name {
            self.change_transition(name)?;
        }
        if let Some(duration) = duration {
            self.change_transition_duration(duration);
        }
        self.switch_scenes(&preview)?;
        Ok(json!({}))
    }

    fn set_studio_mode(&mut self, enabled: bool) {
        if self.session.studio_mode == enabled {
            return;
        }
        self.session.studio_mode = enabled;
        if enabled && self.session.preview_scene.is_none() {
            self.session.preview_scene = Some(self.current_scene().to_string());
        }
        self.emit(Event::StudioModeSwitched { new_state: enabled });
    }

    pub(super) fn enable_studio_mode(&mut self, _req: &Request) -> RequestResult<Value> {
        self.set_studio_mode(true);
        Ok(json!({}))
    }

    pub(super) fn disable_studio_mode(&mut self, _req: &Request) -> RequestResult<Value> {
        self.set_studio_mode(false);
        Ok(json!({}))
    }

    pub(super) fn toggle_studio_mode(&mut self, _req: &Request) -> RequestResult<Value> {
        self.set_studio_mode(!self.session.studio_mode);
        Ok(json!({}))
    }
}

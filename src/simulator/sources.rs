//! Sources: listing, audio, settings, filters and screenshots.

use super::Simulator;
use crate::cloner::{deep_clone, SettingsValue};
use crate::error::{RequestError, RequestResult};
use crate::events::Event;
use crate::model::SpecialRole;
use crate::protocol::Request;
use crate::screenshot;
use serde_json::{json, Map, Value};

const MAX_VOLUME_MUL: f64 = 20.0;
const MAX_VOLUME_DB: f64 = 26.0;
/// Reported for silence, where the real value is -inf
const SILENCE_DB: f64 = -100.0;

pub fn mul_to_db(mul: f64) -> f64 {
    if mul <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * mul.log10()).max(SILENCE_DB)
    }
}

pub fn db_to_mul(db: f64) -> f64 {
    if db <= SILENCE_DB {
        0.0
    } else {
        10f64.powf(db / 20.0)
    }
}

impl Simulator {
    /// A detached copy of a source's settings.
    pub fn source_settings(&self, name: &str) -> RequestResult<SettingsValue> {
        Ok(deep_clone(&self.collection().source(name)?.settings))
    }

    /// Volume multiplier and mute flag as clients observe them.
    pub fn source_audio(&self, name: &str) -> RequestResult<(f64, bool)> {
        self.collection().audio_state(name)
    }

    pub(super) fn get_sources_list(&mut self, _req: &Request) -> RequestResult<Value> {
        let sources: Vec<Value> = self
            .collection()
            .sources()
            .map(|s| {
                json!({
                    "name": s.name,
                    "typeId": s.type_id,
                    "type": s.kind.as_str(),
                })
            })
            .collect();
        Ok(json!({ "sources": sources }))
    }

    pub(super) fn get_source_types_list(&mut self, _req: &Request) -> RequestResult<Value> {
        Ok(json!({ "types": self.catalog.to_wire() }))
    }

    // ─────────────────────────────────────────────────────────────────
    // Audio
    // ─────────────────────────────────────────────────────────────────

    pub(super) fn get_volume(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("source")?;
        let use_db = req.opt_bool("useDecibel")?.unwrap_or(false);
        let (volume, muted) = self.collection().audio_state(name)?;
        let volume = if use_db { mul_to_db(volume) } else { volume };
        Ok(json!({ "name": name, "volume": volume, "muted": muted }))
    }

    pub(super) fn set_volume(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("source")?;
        let volume = req.f64("volume")?;
        let use_db = req.opt_bool("useDecibel")?.unwrap_or(false);
        let mul = if use_db {
            if volume > MAX_VOLUME_DB {
                return Err(RequestError::invalid_request(format!(
                    "volume must be at most {} dB",
                    MAX_VOLUME_DB
                )));
            }
            db_to_mul(volume)
        } else {
            if !(0.0..=MAX_VOLUME_MUL).contains(&volume) {
                return Err(RequestError::invalid_request(format!(
                    "volume must be between 0.0 and {}",
                    MAX_VOLUME_MUL
                )));
            }
            volume
        };

        if self.collection_mut().set_volume(name, mul)? {
            self.emit(Event::SourceVolumeChanged {
                source_name: name.to_string(),
                volume: mul,
                volume_db: mul_to_db(mul),
            });
        }
        Ok(json!({}))
    }

    pub(super) fn get_mute(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("source")?;
        let (_, muted) = self.collection().audio_state(name)?;
        Ok(json!({ "name": name, "muted": muted }))
    }

    fn apply_mute(&mut self, name: &str, muted: bool) -> RequestResult<()> {
        if self.collection_mut().set_muted(name, muted)? {
            self.emit(Event::SourceMuteStateChanged {
                source_name: name.to_string(),
                muted,
            });
        }
        Ok(())
    }

    pub(super) fn set_mute(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("source")?;
        let mute = req.bool("mute")?;
        self.apply_mute(name, mute)?;
        Ok(json!({}))
    }

    pub(super) fn toggle_mute(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("source")?;
        let (_, muted) = self.collection().audio_state(name)?;
        self.apply_mute(name, !muted)?;
        Ok(json!({}))
    }

    // ─────────────────────────────────────────────────────────────────
    // Settings and filters
    // ─────────────────────────────────────────────────────────────────

    /// Resolve `sourceName`, checking `sourceType` when the client gave one.
    fn typed_source(&self, req: &Request) -> RequestResult<(String, String)> {
        let name = req.str("sourceName")?;
        let source = self.collection().source(name)?;
        if let Some(expected) = req.opt_str("sourceType")? {
            if expected != source.type_id {
                return Err(RequestError::invalid_request(format!(
                    "source '{}' is of type '{}', not '{}'",
                    name, source.type_id, expected
                )));
            }
        }
        Ok((source.name.clone(), source.type_id.clone()))
    }

    pub(super) fn get_source_settings(&mut self, req: &Request) -> RequestResult<Value> {
        let (name, type_id) = self.typed_source(req)?;
        let settings = self.collection().source(&name)?.settings.to_json();
        Ok(json!({
            "sourceName": name,
            "sourceType": type_id,
            "sourceSettings": settings,
        }))
    }

    pub(super) fn set_source_settings(&mut self, req: &Request) -> RequestResult<Value> {
        let (name, type_id) = self.typed_source(req)?;
        let incoming = SettingsValue::from_json(&Value::Object(req.object("sourceSettings")?.clone()));
        let source = self.collection_mut().source_mut(&name)?;
        source.settings.merge_from(&incoming);
        let settings = source.settings.to_json();
        Ok(json!({
            "sourceName": name,
            "sourceType": type_id,
            "sourceSettings": settings,
        }))
    }

    pub(super) fn get_source_filters(&mut self, req: &Request) -> RequestResult<Value> {
        let name = req.str("sourceName")?;
        let filters: Vec<Value> = self
            .collection()
            .source(name)?
            .filters
            .iter()
            .map(|f| {
                json!({
                    "enabled": f.enabled,
                    "type": f.type_id,
                    "name": f.name,
                    "settings": f.settings.to_json(),
                })
            })
            .collect();
        Ok(json!({ "filters": filters }))
    }

    pub(super) fn get_special_sources(&mut self, _req: &Request) -> RequestResult<Value> {
        let collection = self.collection();
        let mut body = Map::new();
        for role in SpecialRole::ALL {
            if let Some(source) = collection.special_source(role) {
                body.insert(role.as_str().to_string(), json!(source));
            }
        }
        Ok(Value::Object(body))
    }

    /// Canned image; the named source is deliberately not looked up.
    pub(super) fn take_source_screenshot(&mut self, req: &Request) -> RequestResult<Value> {
        if req.get("saveToFilePath").is_some() {
            return Err(RequestError::invalid_request(
                "saving screenshots to a file is not supported",
            ));
        }
        if let Some(format) = req.opt_str("embedPictureFormat")? {
            if !format.eq_ignore_ascii_case("png") {
                return Err(RequestError::invalid_request(format!(
                    "unsupported picture format: {}",
                    format
                )));
            }
        }
        let name = match req.opt_str("sourceName")? {
            Some(name) => name.to_string(),
            None => self.current_scene().to_string(),
        };
        let (width, height) = screenshot::resolve_size(req.opt_u64("width")?, req.opt_u64("height")?)?;
        let img = screenshot::data_url(&name, width, height)?;
        Ok(json!({ "sourceName": name, "img": img }))
    }
}

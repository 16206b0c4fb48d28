//! Types a stock OBS Studio install registers.

use super::registry::SourceCatalog;
use super::types::{Capabilities, SourceType, TypeKind, TRANSITION_TYPES};
use crate::error::BuildError;
use serde_json::json;

fn input(type_id: &str, name: &str, caps: Capabilities) -> SourceType {
    SourceType::new(type_id, name, TypeKind::Input, caps)
}

fn filter(type_id: &str, name: &str, caps: Capabilities) -> SourceType {
    SourceType::new(type_id, name, TypeKind::Filter, caps)
}

/// Build the catalog every simulator instance starts with.
pub fn builtin_catalog() -> Result<SourceCatalog, BuildError> {
    let mut catalog = SourceCatalog::new();

    // Inputs
    catalog.register(
        input("ffmpeg_source", "Media Source", Capabilities::audio_video().with_async())
            .with_defaults(json!({"is_local_file": true, "looping": false, "restart_on_activate": true})),
    )?;
    catalog.register(input("image_source", "Image", Capabilities::video()).with_defaults(json!({"unload": false})))?;
    catalog.register(
        input("color_source", "Color", Capabilities::video())
            .with_defaults(json!({"color": 4294967295u32, "width": 400, "height": 400})),
    )?;
    catalog.register(
        input("text_ft2_source", "Text (FreeType 2)", Capabilities::video())
            .with_defaults(json!({"font": {"face": "Sans Serif", "size": 32}, "text": ""})),
    )?;
    catalog.register(
        input(
            "browser_source",
            "Browser",
            Capabilities::audio_video().with_interact().with_no_duplicate(),
        )
        .with_defaults(json!({"url": "https://obsproject.com/browser-source", "width": 800, "height": 600, "fps": 30})),
    )?;
    catalog.register(input("monitor_capture", "Display Capture", Capabilities::video().with_no_duplicate()))?;
    catalog.register(input("window_capture", "Window Capture", Capabilities::video()))?;
    catalog.register(input("game_capture", "Game Capture", Capabilities::video().with_no_duplicate()))?;
    catalog.register(input(
        "dshow_input",
        "Video Capture Device",
        Capabilities::audio_video().with_async().with_no_duplicate(),
    ))?;
    catalog.register(input("wasapi_input_capture", "Audio Input Capture", Capabilities::audio()))?;
    catalog.register(input("wasapi_output_capture", "Audio Output Capture", Capabilities::audio()))?;
    catalog.register(input("pulse_input_capture", "Audio Input Capture (PulseAudio)", Capabilities::audio()))?;
    catalog.register(input("pulse_output_capture", "Audio Output Capture (PulseAudio)", Capabilities::audio()))?;
    catalog.register(input("text_gdiplus", "Text (GDI+)", Capabilities::video().deprecated()))?;

    // Filters
    catalog.register(filter("color_filter", "Color Correction", Capabilities::video()))?;
    catalog.register(filter("chroma_key_filter", "Chroma Key", Capabilities::video()))?;
    catalog.register(filter("mask_filter", "Image Mask/Blend", Capabilities::video()))?;
    catalog.register(filter("crop_filter", "Crop/Pad", Capabilities::video()))?;
    catalog.register(filter("gain_filter", "Gain", Capabilities::audio()))?;
    catalog.register(filter("noise_suppress_filter", "Noise Suppression", Capabilities::audio()))?;
    catalog.register(filter("compressor_filter", "Compressor", Capabilities::audio()))?;

    // Transitions
    for t in TRANSITION_TYPES {
        catalog.register(SourceType::new(
            t.type_id,
            t.name,
            TypeKind::Transition,
            Capabilities::video().with_composite(),
        ))?;
    }

    // Scenes and groups
    catalog.register(SourceType::new(
        "scene",
        "Scene",
        TypeKind::Other,
        Capabilities::video().with_composite(),
    ))?;
    catalog.register(SourceType::new(
        "group",
        "Group",
        TypeKind::Other,
        Capabilities::video().with_composite(),
    ))?;

    Ok(catalog)
}

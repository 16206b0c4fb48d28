//! Scene collections a fresh simulator starts with.

use super::builder::{CollectionBuilder, ItemDef};
use super::collection::SceneCollection;
use crate::catalog::SourceCatalog;
use crate::error::BuildError;
use serde_json::json;

/// The collection OBS creates on first launch, filled in with a typical
/// streaming setup.
pub fn untitled() -> CollectionBuilder {
    let mut b = CollectionBuilder::new("Untitled");

    b.transition("Cut", "Cut", 0)
        .transition("Fade", "Fade", 300)
        .transition("Swipe", "Swipe", 700)
        .transition("Stinger", "Stinger", 0);

    b.source("Desktop Audio", "wasapi_output_capture")
        .settings(json!({"device_id": "default"}));
    b.source("Mic/Aux", "wasapi_input_capture")
        .settings(json!({"device_id": "default"}))
        .volume(0.8)
        .filter("Noise Suppression", "noise_suppress_filter", json!({"suppress_level": -30}))
        .filter("Gain", "gain_filter", json!({"db": 3.0}));
    b.source("Webcam", "dshow_input")
        .settings(json!({"video_device_id": "webcam", "res_type": 1}))
        .size(1280, 720)
        .filter("Color Correction", "color_filter", json!({"gamma": 0.0, "contrast": 0.1}));
    b.source("Display", "monitor_capture")
        .settings(json!({"monitor": 0, "capture_cursor": true}));
    b.source("Starting Soon", "text_ft2_source")
        .settings(json!({"text": "Starting soon...", "font": {"face": "Sans Serif", "size": 72}}))
        .size(900, 120);
    b.source("Background", "color_source")
        .settings(json!({"color": 4278190080u32, "width": 1920, "height": 1080}));
    b.source("Intro Video", "ffmpeg_source")
        .settings(json!({"local_file": "intro.mp4", "looping": true}))
        .volume(0.6);
    b.source("Alerts", "browser_source")
        .settings(json!({"url": "https://example.com/alerts", "width": 800, "height": 600}))
        .size(800, 600)
        .muted(true);

    b.scene_with(
        "Starting",
        vec![
            ItemDef::new("Starting Soon").at(510.0, 480.0),
            ItemDef::new("Intro Video"),
            ItemDef::new("Background").locked(),
        ],
    );
    b.scene_with(
        "Live",
        vec![
            ItemDef::new("Alerts").at(1100.0, 20.0),
            ItemDef::new("Webcam").at(1400.0, 760.0).scaled(0.35, 0.35),
            ItemDef::new("Display"),
        ],
    );
    b.scene_with(
        "Just Chatting",
        vec![ItemDef::new("Webcam").scaled(1.5, 1.5), ItemDef::new("Alerts").hidden()],
    );
    b.scene("Be Right Back", &["Starting Soon", "Background"]);
    b.scene("Ending", &["Background"]);

    b.special("desktop-1", "Desktop Audio")
        .special("mic-1", "Mic/Aux");
    b
}

/// A smaller second collection for collection-switching clients.
pub fn podcast() -> CollectionBuilder {
    let mut b = CollectionBuilder::new("Podcast");

    b.transition("Fade", "Fade", 500)
        .transition("Cut", "Cut", 0)
        .transition("Slide", "Slide", 400);

    b.source("Host Mic", "wasapi_input_capture");
    b.source("Guest Mic", "wasapi_input_capture").volume(0.9);
    b.source("Host Cam", "dshow_input").size(1280, 720);
    b.source("Guest Cam", "dshow_input").size(1280, 720);
    b.source("Lower Third", "text_ft2_source")
        .settings(json!({"text": "Episode 1"}))
        .size(1200, 100);

    b.scene_with(
        "Wide",
        vec![
            ItemDef::new("Host Cam").scaled(0.5, 0.5),
            ItemDef::new("Guest Cam").at(960.0, 0.0).scaled(0.5, 0.5),
            ItemDef::new("Lower Third").at(360.0, 940.0),
            ItemDef::new("Host Mic"),
            ItemDef::new("Guest Mic"),
        ],
    );
    b.scene("Host", &["Host Cam", "Host Mic", "Guest Mic"]);
    b.scene("Guest", &["Guest Cam", "Host Mic", "Guest Mic"]);

    b.special("mic-1", "Host Mic")
        .special("mic-2", "Guest Mic")
        .current_transition("Cut");
    b
}

/// Build every default collection, in listing order.
pub fn default_collections(catalog: &SourceCatalog) -> Result<Vec<SceneCollection>, BuildError> {
    [untitled(), podcast()]
        .iter()
        .map(|b| b.finalize(catalog))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin::builtin_catalog;
    use crate::model::SpecialRole;

    #[test]
    fn defaults_build() {
        let catalog = builtin_catalog().unwrap();
        let collections = default_collections(&catalog).expect("fixtures are valid");
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].name(), "Untitled");
    }

    #[test]
    fn untitled_uses_fade_and_starting_scene() {
        let catalog = builtin_catalog().unwrap();
        let c = untitled().finalize(&catalog).unwrap();
        assert_eq!(c.current_transition().name, "Fade");
        assert_eq!(c.current_scene(), "Starting");
        assert_eq!(c.special_source(SpecialRole::Mic1), Some("Mic/Aux"));
        assert_eq!(c.special_source(SpecialRole::Mic2), None);
    }

    #[test]
    fn podcast_picks_cut_explicitly() {
        let catalog = builtin_catalog().unwrap();
        let c = podcast().finalize(&catalog).unwrap();
        assert_eq!(c.current_transition().name, "Cut");
    }
}

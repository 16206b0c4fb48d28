//! Canned screenshots for `TakeSourceScreenshot`.
//!
//! The simulator has no pixels, so a screenshot is a solid fill whose colour
//! is derived from the source name, encoded as PNG and wrapped in a data URL.

use crate::error::{RequestError, RequestResult};
use base64::Engine;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 360;
const MAX_DIMENSION: u32 = 8192;

/// Resolve the output size. A single given dimension keeps 16:9.
pub fn resolve_size(width: Option<u64>, height: Option<u64>) -> RequestResult<(u32, u32)> {
    let check = |d: u64| -> RequestResult<u32> {
        if (1..=MAX_DIMENSION as u64).contains(&d) {
            Ok(d as u32)
        } else {
            Err(RequestError::invalid_request(format!(
                "screenshot dimension {} out of range 1..={}",
                d, MAX_DIMENSION
            )))
        }
    };
    // Given dimensions are range-checked before the other side is derived.
    let (w, h) = match (width.map(check).transpose()?, height.map(check).transpose()?) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (w * 9 / 16).max(1)),
        (None, Some(h)) => ((h * 16 / 9).max(1), h),
        (None, None) => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
    };
    Ok((check(w as u64)?, check(h as u64)?))
}

/// Stable fill colour for a source name.
fn fill_for(name: &str) -> [u8; 4] {
    let hash = name
        .bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));
    let [r, g, b, _] = hash.to_le_bytes();
    [r, g, b, 255]
}

#[cfg(feature = "screenshots")]
fn encode_png(width: u32, height: u32, fill: [u8; 4]) -> RequestResult<Vec<u8>> {
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    let img = RgbaImage::from_pixel(width, height, Rgba(fill));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| RequestError::invalid_request(format!("screenshot encoding failed: {}", e)))?;
    Ok(bytes.into_inner())
}

#[cfg(not(feature = "screenshots"))]
fn encode_png(_width: u32, _height: u32, _fill: [u8; 4]) -> RequestResult<Vec<u8>> {
    // 1x1 transparent pixel
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";
    base64::engine::general_purpose::STANDARD
        .decode(PIXEL)
        .map_err(|e| RequestError::invalid_request(e.to_string()))
}

/// Render the canned screenshot as a `data:image/png;base64,` URL.
pub fn data_url(source_name: &str, width: u32, height: u32) -> RequestResult<String> {
    let png = encode_png(width, height, fill_for(source_name))?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_defaults_and_aspect() {
        assert_eq!(resolve_size(None, None).unwrap(), (640, 360));
        assert_eq!(resolve_size(Some(1280), None).unwrap(), (1280, 720));
        assert_eq!(resolve_size(None, Some(90)).unwrap(), (160, 90));
        assert_eq!(resolve_size(Some(100), Some(100)).unwrap(), (100, 100));
        assert!(resolve_size(Some(0), Some(10)).is_err());
        assert!(resolve_size(Some(10_000), None).is_err());
    }

    #[test]
    fn huge_dimensions_are_rejected_not_overflowed() {
        assert!(matches!(
            resolve_size(Some(u64::MAX), None),
            Err(RequestError::InvalidRequest(_))
        ));
        assert!(matches!(
            resolve_size(None, Some(u64::MAX)),
            Err(RequestError::InvalidRequest(_))
        ));
        assert!(resolve_size(Some(u64::MAX), Some(u64::MAX)).is_err());
        assert_eq!(
            resolve_size(None, Some(8192)).unwrap_err().to_string(),
            "screenshot dimension 14563 out of range 1..=8192"
        );
    }

    #[test]
    fn fill_is_stable_per_name() {
        assert_eq!(fill_for("Webcam"), fill_for("Webcam"));
        assert_ne!(fill_for("Webcam"), fill_for("Display"));
        assert_eq!(fill_for("Webcam")[3], 255);
    }

    #[test]
    fn data_url_holds_a_png() {
        let url = data_url("Webcam", 32, 18).unwrap();
        let payload = url.strip_prefix("data:image/png;base64,").expect("prefix");
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[cfg(feature = "screenshots")]
    #[test]
    fn png_has_requested_dimensions() {
        let bytes = encode_png(48, 27, [10, 20, 30, 255]).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (48, 27));
    }
}

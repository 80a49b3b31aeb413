//! QR code rendering for verification links.
//!
//! Renders never fail from the caller's point of view: an encoding error yields an
//! empty image and a warning in the log, and the certificate is printed without a code.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{Rgb, RgbImage};
use log::warn;
use png::{BitDepth as PngBitDepth, ColorType as PngColorType, Encoder as PngEncoder};
use qrcode::{Color, QrCode};
use thiserror::Error;

/// Thumbnail size used in the record list.
pub const THUMBNAIL_SIZE: u32 = 200;
/// Size used on printed certificates so the code scans from paper.
pub const PRINT_SIZE: u32 = 600;

const MIN_SIZE: u32 = 64;
const MAX_SIZE: u32 = 2048;
/// Quiet zone, in modules.
const MARGIN: u32 = 2;
const DARK: Rgb<u8> = Rgb([0x1a, 0x1a, 0x2e]);
const LIGHT: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
}

/// Draws the QR modules for `url`, scaled so the image is at least `target_size` wide.
fn render_image(url: &str, target_size: u32) -> Result<RgbImage, QrError> {
    let code = QrCode::new(url.as_bytes())?;
    let modules = code.width() as u32;
    let colors = code.to_colors();

    let target = target_size.clamp(MIN_SIZE, MAX_SIZE);
    let span = modules + 2 * MARGIN;
    let scale = target.div_ceil(span).max(1);
    let size = span * scale;

    Ok(RgbImage::from_fn(size, size, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        let inside = (MARGIN..MARGIN + modules).contains(&mx) && (MARGIN..MARGIN + modules).contains(&my);
        if !inside {
            return LIGHT;
        }
        let idx = ((my - MARGIN) * modules + (mx - MARGIN)) as usize;
        match colors.get(idx) {
            Some(Color::Dark) => DARK,
            _ => LIGHT,
        }
    }))
}

fn encode_png(img: &RgbImage) -> Result<Vec<u8>, QrError> {
    let (w, h) = img.dimensions();
    let mut buf = Vec::new();
    {
        let mut encoder = PngEncoder::new(&mut buf, w, h);
        encoder.set_color(PngColorType::Rgb);
        encoder.set_depth(PngBitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(img.as_raw())?;
        writer.finish()?;
    }
    Ok(buf)
}

fn try_render_png(url: &str, target_size: u32) -> Result<Vec<u8>, QrError> {
    encode_png(&render_image(url, target_size)?)
}

/// PNG bytes of the QR code for `url`, or an empty vector if rendering failed.
pub fn render_png(url: &str, target_size: u32) -> Vec<u8> {
    try_render_png(url, target_size).unwrap_or_else(|e| {
        warn!("QR rendering failed for {}: {}", url, e);
        Vec::new()
    })
}

/// `data:image/png;base64,...` URL of the QR code, or an empty string on failure.
pub fn render_data_url(url: &str, target_size: u32) -> String {
    let png = render_png(url, target_size);
    if png.is_empty() {
        return String::new();
    }
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn image_is_at_least_target_size_with_light_quiet_zone() {
        let img = render_image("https://certs.example.org/verify/ICES-2024-001", 200).unwrap();
        assert!(img.width() >= 200);
        assert_eq!(img.width(), img.height());
        assert_eq!(*img.get_pixel(0, 0), LIGHT);
        assert!(img.pixels().any(|p| *p == DARK));
    }

    #[test]
    fn size_is_clamped() {
        let tiny = render_image("x", 1).unwrap();
        assert!(tiny.width() >= MIN_SIZE);
        let huge = render_image("x", 100_000).unwrap();
        assert!(huge.width() < MAX_SIZE + 200);
    }

    #[test]
    fn png_and_data_url_outputs() {
        let png = render_png("https://certs.example.org/verify/ICES-2024-001", THUMBNAIL_SIZE);
        assert_eq!(&png[..8], &PNG_SIGNATURE);

        let data_url = render_data_url("https://certs.example.org", THUMBNAIL_SIZE);
        assert!(data_url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn oversized_input_yields_empty_output() {
        let too_long = "A".repeat(10_000);
        assert!(render_png(&too_long, PRINT_SIZE).is_empty());
        assert_eq!(render_data_url(&too_long, PRINT_SIZE), "");
    }
}

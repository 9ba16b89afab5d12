//! QR encoding collaborator.
//!
//! Turns text plus appearance settings into an RGBA bitmap. The QR math itself
//! lives in the `qrcode` crate; this module only lays the module matrix out on
//! a canvas of the requested size and converts the result to PNG / data URIs.

use crate::model::Rgb;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbaImage};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

/// Error-correction tier used for every code: the highest one offered.
pub const ERROR_CORRECTION: EcLevel = EcLevel::H;

/// Light border around the symbol, in modules.
const QUIET_ZONE: u32 = 4;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("QR encode error: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
    #[cfg(any(test, feature = "tui"))]
    #[error("malformed data URI: {0}")]
    DataUri(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub text: String,
    pub width: u32,
    pub height: u32,
    pub dark: Rgb,
    pub light: Rgb,
    pub ec_level: EcLevel,
}

/// A rendered code: the bitmap plus the module matrix it was drawn from.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub image: RgbaImage,
    pub dark: Rgb,
    pub light: Rgb,
    modules: Vec<bool>,
    module_width: usize,
}

impl Artifact {
    /// Number of modules per side, excluding the quiet zone.
    pub fn module_width(&self) -> usize {
        self.module_width
    }

    /// Whether the module at (x, y) is dark. Coordinates outside the symbol
    /// are part of the quiet zone and therefore light.
    pub fn is_dark(&self, x: i64, y: i64) -> bool {
        let w = self.module_width as i64;
        if x < 0 || y < 0 || x >= w || y >= w {
            return false;
        }
        self.modules[(y * w + x) as usize]
    }

    pub fn png_bytes(&self) -> Result<Vec<u8>, RenderError> {
        let mut buf = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    pub fn data_uri(&self) -> Result<String, RenderError> {
        let png = self.png_bytes()?;
        Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(png)))
    }
}

/// Decode a `data:image/png;base64,...` snapshot back into a bitmap.
#[cfg(any(test, feature = "tui"))]
pub fn decode_data_uri(uri: &str) -> Result<RgbaImage, RenderError> {
    let payload = uri
        .strip_prefix(DATA_URI_PREFIX)
        .ok_or_else(|| RenderError::DataUri("expected a base64 PNG data URI".into()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| RenderError::DataUri(e.to_string()))?;
    let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
    Ok(img.to_rgba8())
}

/// Anything able to turn a [`RenderRequest`] into an [`Artifact`].
pub trait QrEncoder: Send + Sync + 'static {
    fn render(&self, request: &RenderRequest) -> Result<Artifact, RenderError>;
}

/// Encoder backed by the `qrcode` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrCodeEncoder;

impl QrEncoder for QrCodeEncoder {
    fn render(&self, request: &RenderRequest) -> Result<Artifact, RenderError> {
        if request.width == 0 || request.height == 0 {
            return Err(RenderError::Dimensions {
                width: request.width,
                height: request.height,
            });
        }

        let code = QrCode::with_error_correction_level(request.text.as_bytes(), request.ec_level)?;
        let module_width = code.width();
        let modules: Vec<bool> = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();

        // Integral module scale so every module is a crisp square; the symbol
        // is centred and the canvas only grows when the request is too small.
        let span = module_width as u32 + 2 * QUIET_ZONE;
        let scale = (request.width.min(request.height) / span).max(1);
        let drawn = span * scale;
        let width = request.width.max(drawn);
        let height = request.height.max(drawn);

        let mut image = RgbaImage::from_pixel(width, height, request.light.to_rgba());
        let origin_x = (width - drawn) / 2 + QUIET_ZONE * scale;
        let origin_y = (height - drawn) / 2 + QUIET_ZONE * scale;
        let dark = request.dark.to_rgba();

        for (i, is_dark) in modules.iter().enumerate() {
            if !is_dark {
                continue;
            }
            let x = (i % module_width) as u32;
            let y = (i / module_width) as u32;
            for dy in 0..scale {
                for dx in 0..scale {
                    image.put_pixel(origin_x + x * scale + dx, origin_y + y * scale + dy, dark);
                }
            }
        }

        Ok(Artifact {
            image,
            dark: request.dark,
            light: request.light,
            modules,
            module_width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, size: u32) -> RenderRequest {
        RenderRequest {
            text: text.to_string(),
            width: size,
            height: size,
            dark: Rgb::new(0x10, 0x20, 0x30),
            light: Rgb::new(0xfa, 0xfb, 0xfc),
            ec_level: ERROR_CORRECTION,
        }
    }

    #[test]
    fn renders_exact_requested_size() {
        let artifact = QrCodeEncoder.render(&request("https://example.com", 200)).unwrap();
        assert_eq!(artifact.image.width(), 200);
        assert_eq!(artifact.image.height(), 200);
    }

    #[test]
    fn uses_requested_colours() {
        let req = request("https://example.com", 200);
        let artifact = QrCodeEncoder.render(&req).unwrap();
        assert_eq!(*artifact.image.get_pixel(0, 0), req.light.to_rgba());
        assert!(artifact.image.pixels().any(|p| *p == req.dark.to_rgba()));
        // Top-left finder pattern corner is always dark.
        assert!(artifact.is_dark(0, 0));
        assert!(!artifact.is_dark(-1, 0));
    }

    #[test]
    fn grows_canvas_when_too_small() {
        let artifact = QrCodeEncoder.render(&request("hello", 10)).unwrap();
        let side = artifact.module_width() as u32 + 2 * QUIET_ZONE;
        assert_eq!(artifact.image.width(), side);
    }

    #[test]
    fn rejects_text_over_capacity() {
        let long = "a".repeat(2000);
        let err = QrCodeEncoder.render(&request(&long, 200)).unwrap_err();
        assert!(matches!(err, RenderError::Encode(_)));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let err = QrCodeEncoder.render(&request("hi", 0)).unwrap_err();
        assert!(matches!(err, RenderError::Dimensions { .. }));
    }

    #[test]
    fn data_uri_decodes_to_same_bitmap() {
        let artifact = QrCodeEncoder.render(&request("snapshot", 128)).unwrap();
        let uri = artifact.data_uri().unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        let decoded = decode_data_uri(&uri).unwrap();
        assert_eq!(decoded, artifact.image);
    }

    #[test]
    fn rejects_foreign_data_uri() {
        assert!(matches!(
            decode_data_uri("data:image/jpeg;base64,AAAA"),
            Err(RenderError::DataUri(_))
        ));
    }
}

//! QR code generation for stored-file links.
//!
//! The artifact is a pure function of the URL: no timestamps, no randomness,
//! so the same URL always produces byte-identical output and artifacts stay
//! content-addressable by URL alone.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

/// Artifact generation errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot encode an empty URL")]
    EmptyInput,

    #[error("QR encoding failed: {0}")]
    Encoding(String),

    #[error("PNG rendering failed: {0}")]
    Render(String),
}

/// Encodes a URL into an inline scannable image representation.
pub trait LinkArtifact: Clone + Send + Sync + 'static {
    fn generate(&self, url: &str) -> Result<String, ArtifactError>;
}

/// QR code generator producing a `data:image/png;base64,` URL, the shape
/// browsers can drop straight into an `<img src>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrGenerator;

impl LinkArtifact for QrGenerator {
    fn generate(&self, url: &str) -> Result<String, ArtifactError> {
        if url.is_empty() {
            return Err(ArtifactError::EmptyInput);
        }

        let code = qrcode::QrCode::new(url.as_bytes())
            .map_err(|e| ArtifactError::Encoding(e.to_string()))?;

        let image = code
            .render::<image::Luma<u8>>()
            .min_dimensions(256, 256)
            .build();

        let mut png = Vec::new();
        image
            .write_to(
                &mut std::io::Cursor::new(&mut png),
                image::ImageFormat::Png,
            )
            .map_err(|e| ArtifactError::Render(e.to_string()))?;

        Ok(format!("data:image/png;base64,{}", BASE64.encode(&png)))
    }
}

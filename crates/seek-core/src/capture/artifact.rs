//! Static image exports of a drawing surface.

use super::{CaptureError, CaptureResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// MIME type of every artifact the engine produces.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// An immutable encoded snapshot of a drawing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterizedArtifact {
    bytes: Vec<u8>,
    content_type: String,
    width: u32,
    height: u32,
}

impl RasterizedArtifact {
    pub fn png(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            content_type: PNG_CONTENT_TYPE.to_string(),
            width,
            height,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encode as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.bytes))
    }

    /// Decode a base64 `data:` URI.
    ///
    /// Dimensions are read from the PNG header when the payload is a PNG and left at zero otherwise.
    pub fn from_data_uri(uri: &str) -> CaptureResult<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| CaptureError::InvalidDataUri("missing data: prefix".to_string()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| CaptureError::InvalidDataUri("missing payload separator".to_string()))?;
        let content_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| CaptureError::InvalidDataUri("only base64 payloads are supported".to_string()))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| CaptureError::InvalidDataUri(e.to_string()))?;
        let (width, height) = png_dimensions(&bytes).unwrap_or((0, 0));
        Ok(Self {
            bytes,
            content_type: content_type.to_string(),
            width,
            height,
        })
    }
}

/// Width and height from a PNG IHDR chunk.
fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if bytes.len() < 24 || bytes[..8] != SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type used when neither the content nor the caller says otherwise.
const FALLBACK_MIME: &str = "application/octet-stream";

// ============================================================================
// PHOTO
// ============================================================================

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unrecognised image format")]
    UnknownFormat,
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// The user-supplied source photo. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Photo {
    bytes: Vec<u8>,
    mime: String,
    width: u32,
    height: u32,
}

impl Photo {
    /// Measure an encoded photo. Only the header is decoded; the bytes are
    /// kept verbatim for submission.
    pub fn from_bytes(bytes: Vec<u8>, declared_mime: Option<&str>) -> Result<Self, PhotoError> {
        let reader = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| PhotoError::Decode(image::ImageError::IoError(e)))?;
        let format = reader.format().ok_or(PhotoError::UnknownFormat)?;
        let (width, height) = reader.into_dimensions()?;
        if width == 0 || height == 0 {
            return Err(PhotoError::EmptyImage { width, height });
        }

        let mime = match mime_for_format(format) {
            Some(detected) => {
                if let Some(declared) = declared_mime
                    && !declared.eq_ignore_ascii_case(detected)
                {
                    debug!("declared MIME {} but content is {}", declared, detected);
                }
                detected.to_string()
            }
            None => declared_mime.unwrap_or(FALLBACK_MIME).to_string(),
        };

        Ok(Self {
            bytes,
            mime,
            width,
            height,
        })
    }

    pub fn open(path: &Path) -> Result<Self, PhotoError> {
        let bytes = fs::read(path).map_err(|source| PhotoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let declared = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .and_then(mime_for_format);
        let photo = Self::from_bytes(bytes, declared)?;
        info!(
            "loaded photo {} ({}x{}, {})",
            path.display(),
            photo.width,
            photo.height,
            photo.mime
        );
        Ok(photo)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Fully decode to RGBA (used for the preview overlay only).
    pub fn decode_rgba(&self) -> Result<RgbaImage, PhotoError> {
        Ok(image::load_from_memory(&self.bytes)?.to_rgba8())
    }

    pub fn to_encoded(&self) -> EncodedImage {
        EncodedImage::new(self.mime.clone(), self.bytes.clone())
    }
}

/// MIME type for the formats a browser upload can realistically carry.
pub fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Tga => Some("image/x-tga"),
        ImageFormat::Ico => Some("image/x-icon"),
        ImageFormat::Avif => Some("image/avif"),
        _ => None,
    }
}

// ============================================================================
// ENCODED IMAGE / DATA URI
// ============================================================================

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("not a data URI")]
    NotADataUri,
    #[error("unsupported data URI encoding {0:?}; only base64 is accepted")]
    UnsupportedEncoding(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Raw encoded image bytes plus an explicit MIME type: the form every image
/// takes when it crosses the submission boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime: String,
    #[serde(rename = "data", with = "base64_payload")]
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Strip the `data:<mime>;base64,` prefix and decode the payload.
    pub fn from_data_uri(uri: &str) -> Result<Self, EncodingError> {
        let (mime, payload) = strip_data_uri(uri)?;
        Ok(Self::new(mime, STANDARD.decode(payload.trim())?))
    }
}

/// Split a base64 data URI into its MIME type and the still-encoded payload.
pub fn strip_data_uri(uri: &str) -> Result<(&str, &str), EncodingError> {
    let rest = uri
        .trim_start()
        .strip_prefix("data:")
        .ok_or(EncodingError::NotADataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(EncodingError::NotADataUri)?;

    let mut params = header.split(';');
    let mime = params.next().unwrap_or("");
    let encoding = params.last().unwrap_or("");
    if !encoding.eq_ignore_ascii_case("base64") {
        return Err(EncodingError::UnsupportedEncoding(encoding.to_string()));
    }

    let mime = if mime.is_empty() { FALLBACK_MIME } else { mime };
    Ok((mime, payload))
}

mod base64_payload {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// Build a MIME-tagged image from a file on disk (reference images).
pub fn read_encoded(path: &Path) -> Result<EncodedImage, PhotoError> {
    let bytes = fs::read(path).map_err(|source| PhotoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mime = image::guess_format(&bytes)
        .ok()
        .and_then(mime_for_format)
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(ImageFormat::from_extension)
                .and_then(mime_for_format)
        })
        .unwrap_or(FALLBACK_MIME);
    Ok(EncodedImage::new(mime, bytes))
}

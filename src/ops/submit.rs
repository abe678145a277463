// ============================================================================
// Submission boundary: what the core hands to the image generator
// ============================================================================
//
// The generator itself (network I/O, model invocation, retries) lives outside
// this crate behind `GenerativeBackend`. The core only assembles the request
// and checks that a response actually carries an image.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::EncodedImage;
use crate::ops::mask::MaskError;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no photo loaded")]
    NoPhoto,
    #[error("the mask is empty; paint the area to renovate first")]
    EmptyMask,
    #[error("a submission is already in progress")]
    AlreadyInFlight,
    #[error("the photo changed while the request was in flight; result discarded")]
    Superseded,
    #[error("the generator returned no image")]
    NoImage,
    #[error("generation failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Mask(#[from] MaskError),
}

/// A style reference with the user's note about what to take from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub image: EncodedImage,
    pub description: String,
}

/// Everything the generator receives, in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Original photo bytes and declared MIME type.
    pub photo: EncodedImage,
    /// Binary PNG: white = edit, black = protect.
    pub mask: EncodedImage,
    pub references: Vec<ReferenceImage>,
    pub prompt: String,
}

/// Raw reply from the generator. Only `image` matters to the core.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationResponse {
    pub image: Option<EncodedImage>,
    pub text: Option<String>,
}

impl GenerationResponse {
    /// The generated image, or `NoImage` when the reply carried none.
    pub fn into_image(self) -> Result<EncodedImage, SubmitError> {
        match self.image {
            Some(image) if !image.bytes.is_empty() => Ok(image),
            _ => Err(SubmitError::NoImage),
        }
    }
}

/// External image generator.
pub trait GenerativeBackend {
    fn generate(&self, request: &SubmissionRequest) -> Result<GenerationResponse, SubmitError>;
}

impl<F> GenerativeBackend for F
where
    F: Fn(&SubmissionRequest) -> Result<GenerationResponse, SubmitError>,
{
    fn generate(&self, request: &SubmissionRequest) -> Result<GenerationResponse, SubmitError> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_without_image_is_an_error() {
        let reply = GenerationResponse {
            image: None,
            text: Some("I can't do that".to_string()),
        };
        assert!(matches!(reply.into_image(), Err(SubmitError::NoImage)));

        let empty = GenerationResponse {
            image: Some(EncodedImage::new("image/png", Vec::new())),
            text: None,
        };
        assert!(matches!(empty.into_image(), Err(SubmitError::NoImage)));
    }

    #[test]
    fn closures_act_as_backends() {
        let backend = |req: &SubmissionRequest| -> Result<GenerationResponse, SubmitError> {
            Ok(GenerationResponse {
                image: Some(EncodedImage::new("image/png", req.prompt.as_bytes().to_vec())),
                text: None,
            })
        };
        let request = SubmissionRequest {
            photo: EncodedImage::new("image/jpeg", vec![1]),
            mask: EncodedImage::new("image/png", vec![2]),
            references: Vec::new(),
            prompt: "paint it teal".to_string(),
        };
        let image = backend.generate(&request).unwrap().into_image().unwrap();
        assert_eq!(image.bytes, b"paint it teal");
    }

    #[test]
    fn request_serializes_with_base64_payloads() {
        let request = SubmissionRequest {
            photo: EncodedImage::new("image/jpeg", b"ABC".to_vec()),
            mask: EncodedImage::new("image/png", b"ABC".to_vec()),
            references: vec![ReferenceImage {
                image: EncodedImage::new("image/webp", b"ABC".to_vec()),
                description: "awning colour".to_string(),
            }],
            prompt: "modern facade".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["photo"]["data"], "QUJD");
        assert_eq!(json["references"][0]["description"], "awning colour");
        let back: SubmissionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }
}

//! Face matching: image normalization, encoder seam and the distance policy.
//!
//! The encoder itself is a black box behind [`FaceEncoder`]. This module only
//! owns preprocessing, the threshold decision and error translation.

pub mod onnx;
#[cfg(test)]
pub mod stub;

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageOutputFormat};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Distances strictly below this are a match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

pub type FaceEncoding = Vec<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Reference,
    Probe,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Reference => write!(f, "stored reference photo"),
            ImageRole::Probe => write!(f, "uploaded verification photo"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FaceError {
    #[error("No face detected in the {0}")]
    NoFaceDetected(ImageRole),

    #[error("More than one face detected in the {0}")]
    MultipleFaces(ImageRole),

    #[error("Image error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::OrtError),
}

/// Produces one encoding per detected face, most confident face first.
pub trait FaceEncoder: Send + Sync {
    fn encode(&self, image: &DynamicImage) -> Result<Vec<FaceEncoding>, FaceError>;
}

#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub threshold: f32,
    pub reject_multiple_faces: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            reject_multiple_faces: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct MatchResult {
    pub verified: bool,
    #[schema(example = 0.31)]
    pub distance: f32,
    #[schema(example = 0.6)]
    pub threshold: f32,
}

pub struct FaceMatcher {
    encoder: Arc<dyn FaceEncoder>,
    policy: MatchPolicy,
}

impl FaceMatcher {
    pub fn new(encoder: Arc<dyn FaceEncoder>, policy: MatchPolicy) -> Self {
        Self { encoder, policy }
    }

    pub fn threshold(&self) -> f32 {
        self.policy.threshold
    }

    /// Encodes the stored reference photo. The first detected face wins.
    pub fn encode_reference(&self, bytes: &[u8]) -> Result<FaceEncoding, FaceError> {
        let image = normalize_image(bytes)?;
        let encodings = self.encoder.encode(&image)?;
        select_face(encodings, ImageRole::Reference, false)
    }

    /// Probes go through the same RGB PNG re-encode as stored photos.
    pub fn encode_probe(&self, bytes: &[u8]) -> Result<FaceEncoding, FaceError> {
        let image = normalize_image(&normalize_to_png(bytes)?)?;
        let encodings = self.encoder.encode(&image)?;
        select_face(
            encodings,
            ImageRole::Probe,
            self.policy.reject_multiple_faces,
        )
    }

    pub fn compare(&self, reference: &[f32], probe: &[f32]) -> MatchResult {
        let distance = euclidean_distance(reference, probe);
        MatchResult {
            verified: distance < self.policy.threshold,
            distance,
            threshold: self.policy.threshold,
        }
    }

    /// Dissimilarity between the faces in two images. Requests use the
    /// cached reference encoding with [`FaceMatcher::compare`] instead.
    #[cfg(test)]
    pub fn score(&self, reference: &[u8], probe: &[u8]) -> Result<f32, FaceError> {
        let reference = self.encode_reference(reference)?;
        let probe = self.encode_probe(probe)?;
        Ok(euclidean_distance(&reference, &probe))
    }
}

fn select_face(
    encodings: Vec<FaceEncoding>,
    role: ImageRole,
    reject_multiple: bool,
) -> Result<FaceEncoding, FaceError> {
    if reject_multiple && encodings.len() > 1 {
        return Err(FaceError::MultipleFaces(role));
    }
    encodings
        .into_iter()
        .next()
        .ok_or(FaceError::NoFaceDetected(role))
}

/// Decodes any supported format into 8-bit RGB.
pub fn normalize_image(bytes: &[u8]) -> Result<DynamicImage, FaceError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(DynamicImage::ImageRgb8(decoded.to_rgb8()))
}

/// Normalizes an upload and re-encodes it as PNG for storage.
pub fn normalize_to_png(bytes: &[u8]) -> Result<Vec<u8>, FaceError> {
    let image = normalize_image(bytes)?;
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf.into_inner())
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::stub::{StubEncoder, solid_png, two_face_png};
    use super::*;

    fn matcher(encoder: Arc<StubEncoder>) -> FaceMatcher {
        FaceMatcher::new(encoder, MatchPolicy::default())
    }

    #[test]
    fn identical_images_have_zero_distance() {
        let matcher = matcher(Arc::new(StubEncoder::default()));
        let photo = solid_png(40, 40, [200, 120, 90]);

        let distance = matcher.score(&photo, &photo).unwrap();
        assert_eq!(distance, 0.0);

        let reference = matcher.encode_reference(&photo).unwrap();
        let result = matcher.compare(&reference, &reference);
        assert!(result.verified);
        assert_eq!(result.threshold, DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn distant_faces_are_rejected() {
        let matcher = matcher(Arc::new(StubEncoder::default()));
        let red = matcher.encode_probe(&solid_png(40, 40, [255, 0, 0])).unwrap();
        let blue = matcher.encode_probe(&solid_png(40, 40, [0, 0, 255])).unwrap();

        let result = matcher.compare(&red, &blue);
        assert!(!result.verified);
        assert!(result.distance > 1.0);
    }

    #[test]
    fn threshold_is_strict() {
        let matcher = FaceMatcher::new(
            Arc::new(StubEncoder::default()),
            MatchPolicy {
                threshold: 0.5,
                reject_multiple_faces: true,
            },
        );
        let result = matcher.compare(&[0.0, 0.0], &[0.5, 0.0]);
        assert_eq!(result.distance, 0.5);
        assert!(!result.verified);
    }

    #[test]
    fn blank_probe_has_no_face() {
        let matcher = matcher(Arc::new(StubEncoder::default()));
        let err = matcher.encode_probe(&solid_png(40, 40, [0, 0, 0])).unwrap_err();
        assert!(matches!(err, FaceError::NoFaceDetected(ImageRole::Probe)));
    }

    #[test]
    fn multiple_faces_follow_policy() {
        let photo = two_face_png();

        let strict = matcher(Arc::new(StubEncoder::default()));
        assert!(matches!(
            strict.encode_probe(&photo),
            Err(FaceError::MultipleFaces(ImageRole::Probe))
        ));
        // reference photos always take the first face
        assert!(strict.encode_reference(&photo).is_ok());

        let lenient = FaceMatcher::new(
            Arc::new(StubEncoder::default()),
            MatchPolicy {
                threshold: DEFAULT_MATCH_THRESHOLD,
                reject_multiple_faces: false,
            },
        );
        assert!(lenient.encode_probe(&photo).is_ok());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            normalize_image(b"definitely not an image"),
            Err(FaceError::Decode(_))
        ));
    }

    #[test]
    fn normalized_png_is_rgb() {
        let gray = {
            let img = image::GrayImage::from_pixel(8, 8, image::Luma([90]));
            let mut buf = Cursor::new(Vec::new());
            DynamicImage::ImageLuma8(img)
                .write_to(&mut buf, ImageOutputFormat::Png)
                .unwrap();
            buf.into_inner()
        };

        let png = normalize_to_png(&gray).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn probe_format_does_not_change_the_match() {
        let matcher = matcher(Arc::new(StubEncoder::default()));
        let reference = normalize_to_png(&solid_png(40, 40, [200, 120, 90])).unwrap();

        let rgba = {
            let img = image::RgbaImage::from_pixel(40, 40, image::Rgba([200, 120, 90, 255]));
            let mut buf = Cursor::new(Vec::new());
            DynamicImage::ImageRgba8(img)
                .write_to(&mut buf, ImageOutputFormat::Png)
                .unwrap();
            buf.into_inner()
        };
        assert_eq!(matcher.score(&reference, &rgba).unwrap(), 0.0);

        let jpeg = {
            let mut buf = Cursor::new(Vec::new());
            image::load_from_memory(&reference)
                .unwrap()
                .write_to(&mut buf, ImageOutputFormat::Jpeg(95))
                .unwrap();
            buf.into_inner()
        };
        let distance = matcher.score(&reference, &jpeg).unwrap();
        assert!(distance < 0.05, "jpeg probe drifted by {}", distance);
    }

    #[test]
    fn mismatched_lengths_never_match() {
        assert_eq!(euclidean_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
    }
}

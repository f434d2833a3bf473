use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};

use super::{FaceEncoder, FaceEncoding, FaceError};

const NMS_IOU_THRESHOLD: f32 = 0.45;
const MIN_FACE_SIDE: f32 = 10.0;
const MAX_FACES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 { 0.0 } else { intersection / union }
    }
}

#[derive(Debug, Clone)]
pub struct OnnxSettings {
    pub detector_input_width: u32,
    pub detector_input_height: u32,
    pub recognizer_input_size: u32,
    pub detection_confidence: f32,
}

impl Default for OnnxSettings {
    fn default() -> Self {
        Self {
            detector_input_width: 640,
            detector_input_height: 640,
            recognizer_input_size: 112,
            detection_confidence: 0.5,
        }
    }
}

/// Detector + embedding model pair run through ONNX Runtime.
pub struct OnnxFaceEncoder {
    detector: Mutex<Session>,
    recognizer: Mutex<Session>,
    _environment: Arc<Environment>,
    settings: OnnxSettings,
}

impl OnnxFaceEncoder {
    pub fn load(
        detector_path: &Path,
        recognizer_path: &Path,
        settings: OnnxSettings,
    ) -> Result<Self, FaceError> {
        let environment = Arc::new(
            Environment::builder()
                .with_name("attendance_faces")
                .build()
                .map_err(|e| FaceError::Model(format!("Failed to create environment: {}", e)))?,
        );

        let detector = load_session(&environment, detector_path)?;
        let recognizer = load_session(&environment, recognizer_path)?;

        tracing::info!(
            detector = %detector_path.display(),
            recognizer = %recognizer_path.display(),
            "Face models loaded"
        );

        Ok(Self {
            detector: Mutex::new(detector),
            recognizer: Mutex::new(recognizer),
            _environment: environment,
            settings,
        })
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>, FaceError> {
        let width = self.settings.detector_input_width;
        let height = self.settings.detector_input_height;

        let resized = image.resize_exact(width, height, FilterType::Triangle);
        let input = rgb_tensor(&resized, |p| p as f32 / 255.0);
        let (data, shape) = run_single(&self.detector, input)?;

        let mut faces = parse_detections(
            &data,
            &shape,
            width as f32,
            height as f32,
            self.settings.detection_confidence,
        );

        let scale_x = image.width() as f32 / width as f32;
        let scale_y = image.height() as f32 / height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        Ok(faces)
    }

    fn embed(&self, image: &DynamicImage, face: &FaceBox) -> Result<FaceEncoding, FaceError> {
        let x = face.x1.max(0.0) as u32;
        let y = face.y1.max(0.0) as u32;
        let w = (face.x2 - face.x1).max(1.0) as u32;
        let h = (face.y2 - face.y1).max(1.0) as u32;

        let size = self.settings.recognizer_input_size;
        let crop = image
            .crop_imm(x, y, w, h)
            .resize_exact(size, size, FilterType::Triangle);

        // ArcFace normalization
        let input = rgb_tensor(&crop, |p| (p as f32 - 127.5) / 127.5);
        let (mut embedding, _) = run_single(&self.recognizer, input)?;
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&self, image: &DynamicImage) -> Result<Vec<FaceEncoding>, FaceError> {
        let faces = self.detect(image)?;
        tracing::debug!(faces = faces.len(), "Face detection finished");

        faces.iter().map(|face| self.embed(image, face)).collect()
    }
}

fn load_session(environment: &Arc<Environment>, path: &Path) -> Result<Session, FaceError> {
    if !path.exists() {
        return Err(FaceError::Model(format!(
            "Model not found at: {}",
            path.display()
        )));
    }

    let session = SessionBuilder::new(environment)?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_model_from_file(path)?;
    Ok(session)
}

fn lock(session: &Mutex<Session>) -> Result<MutexGuard<'_, Session>, FaceError> {
    session
        .lock()
        .map_err(|_| FaceError::Model("session lock poisoned".to_string()))
}

/// Runs a single-input model and returns its first output flattened with its shape.
fn run_single(
    session: &Mutex<Session>,
    input: Array4<f32>,
) -> Result<(Vec<f32>, Vec<usize>), FaceError> {
    let session = lock(session)?;
    let cow_array = CowArray::from(input.into_dyn());
    let input_tensor = Value::from_array(session.allocator(), &cow_array)?;
    let outputs = session.run(vec![input_tensor])?;

    let output = outputs
        .first()
        .ok_or_else(|| FaceError::Model("model produced no output".to_string()))?;
    let tensor = output.try_extract::<f32>()?;
    let view = tensor.view();
    let shape = view.shape().to_vec();
    let data = view.iter().copied().collect();
    Ok((data, shape))
}

fn rgb_tensor(image: &DynamicImage, normalize: impl Fn(u8) -> f32) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut array = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            array[[0, c, y as usize, x as usize]] = normalize(pixel[c]);
        }
    }
    array
}

fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Decodes `[x_center, y_center, w, h, confidence]` rows.
///
/// Accepts `[1, N, 5+]`, the transposed `[1, 5+, N]`, and `[N, 5+]`.
/// Coordinates in `0..=1` are treated as normalized to the input size.
pub fn parse_detections(
    data: &[f32],
    shape: &[usize],
    input_width: f32,
    input_height: f32,
    min_confidence: f32,
) -> Vec<FaceBox> {
    let (count, attrs, transposed) = match shape {
        [1, a, b] if (5..=16).contains(a) && (*b < 5 || *a < *b) => (*b, *a, true),
        [1, a, b] => (*a, *b, false),
        [a, b] => (*a, *b, false),
        _ => {
            tracing::warn!(?shape, "Unexpected detector output shape");
            return Vec::new();
        }
    };
    if attrs < 5 || data.len() < count * attrs {
        tracing::warn!(?shape, len = data.len(), "Detector output too small");
        return Vec::new();
    }

    let at = |i: usize, k: usize| {
        if transposed {
            data[k * count + i]
        } else {
            data[i * attrs + k]
        }
    };

    let mut faces = Vec::new();
    for i in 0..count {
        let confidence = at(i, 4);
        if confidence < min_confidence {
            continue;
        }

        let (mut cx, mut cy, mut w, mut h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
        if cx <= 1.0 && cy <= 1.0 && w <= 1.0 && h <= 1.0 {
            cx *= input_width;
            w *= input_width;
            cy *= input_height;
            h *= input_height;
        }

        let x1 = (cx - w / 2.0).max(0.0);
        let y1 = (cy - h / 2.0).max(0.0);
        let x2 = (cx + w / 2.0).min(input_width);
        let y2 = (cy + h / 2.0).min(input_height);

        if x2 - x1 > MIN_FACE_SIDE && y2 - y1 > MIN_FACE_SIDE {
            faces.push(FaceBox {
                x1,
                y1,
                x2,
                y2,
                confidence,
            });
        }
    }

    let mut faces = apply_nms(faces, NMS_IOU_THRESHOLD);
    faces.truncate(MAX_FACES);
    faces
}

/// Greedy suppression; the result is ordered by descending confidence.
pub fn apply_nms(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<FaceBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> FaceBox {
        FaceBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn nms_keeps_most_confident_of_overlapping_boxes() {
        let boxes = vec![
            face(0.0, 0.0, 100.0, 100.0, 0.7),
            face(5.0, 5.0, 105.0, 105.0, 0.9),
            face(300.0, 300.0, 400.0, 400.0, 0.8),
        ];

        let kept = apply_nms(boxes, NMS_IOU_THRESHOLD);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.8);
    }

    #[test]
    fn parses_row_major_pixel_output() {
        // two rows: one confident face, one below threshold
        let data = vec![
            320.0, 320.0, 100.0, 120.0, 0.95, //
            100.0, 100.0, 50.0, 50.0, 0.10,
        ];
        let faces = parse_detections(&data, &[1, 2, 5], 640.0, 640.0, 0.5);

        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0], face(270.0, 260.0, 370.0, 380.0, 0.95));
    }

    #[test]
    fn parses_transposed_normalized_output() {
        // attributes are rows, predictions are columns
        let data = vec![
            0.5, 0.25, // cx
            0.5, 0.25, // cy
            0.25, 0.125, // w
            0.25, 0.125, // h
            0.6, 0.9, // confidence
        ];
        let faces = parse_detections(&data, &[1, 5, 2], 400.0, 400.0, 0.5);

        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].confidence, 0.9);
        assert_eq!(faces[0].x1, 75.0);
        assert_eq!(faces[1].x2, 250.0);
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(parse_detections(&[0.0; 8], &[2, 2, 2], 10.0, 10.0, 0.1).is_empty());
        assert!(parse_detections(&[0.0; 4], &[1, 4], 10.0, 10.0, 0.1).is_empty());
    }

    #[test]
    fn normalizes_embeddings() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.6, 0.8]);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}

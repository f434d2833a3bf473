//! Deterministic encoder for tests: a "face" is the mean colour of a region.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

use super::{FaceEncoder, FaceEncoding, FaceError};

/// Dark images contain no face; images at least three times wider than tall
/// contain two (left and right half).
#[derive(Default)]
pub struct StubEncoder {
    calls: AtomicUsize,
}

impl StubEncoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceEncoder for StubEncoder {
    fn encode(&self, image: &DynamicImage) -> Result<Vec<FaceEncoding>, FaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let whole = mean_rgb(&rgb, 0, width);
        if whole.iter().sum::<f32>() < 0.05 {
            return Ok(Vec::new());
        }
        if width >= height * 3 {
            let half = width / 2;
            return Ok(vec![mean_rgb(&rgb, 0, half), mean_rgb(&rgb, half, width)]);
        }
        Ok(vec![whole])
    }
}

fn mean_rgb(image: &RgbImage, from_x: u32, to_x: u32) -> FaceEncoding {
    let mut sum = [0.0f32; 3];
    let mut count = 0.0f32;
    for (x, _, pixel) in image.enumerate_pixels() {
        if x < from_x || x >= to_x {
            continue;
        }
        for (c, total) in sum.iter_mut().enumerate() {
            *total += pixel[c] as f32 / 255.0;
        }
        count += 1.0;
    }
    sum.iter().map(|v| v / count.max(1.0)).collect()
}

pub fn solid_png(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
    encode_png(RgbImage::from_pixel(width, height, Rgb(colour)))
}

pub fn two_face_png() -> Vec<u8> {
    let mut image = RgbImage::from_pixel(90, 30, Rgb([220, 180, 150]));
    for x in 45..90 {
        for y in 0..30 {
            image.put_pixel(x, y, Rgb([90, 60, 40]));
        }
    }
    encode_png(image)
}

fn encode_png(image: RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .expect("png encoding");
    buf.into_inner()
}

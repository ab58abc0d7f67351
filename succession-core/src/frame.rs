//! Candidate keyframe images

use image::RgbImage;

/// A decoded candidate keyframe
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB pixels of the frame
    pub image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Mean grayscale intensity on a 0-255 scale
    pub fn mean_intensity(&self) -> f64 {
        mean_intensity(&self.image)
    }
}

/// Mean grayscale intensity of an image on a 0-255 scale.
///
/// Uses the ITU-R BT.601 luma weights. An image with no pixels has a mean of 0.
pub fn mean_intensity(image: &RgbImage) -> f64 {
    let pixel_count = image.width() as u64 * image.height() as u64;
    if pixel_count == 0 {
        return 0.0;
    }

    let sum: u64 = image
        .pixels()
        .map(|p| p[0] as u64 * 299 + p[1] as u64 * 587 + p[2] as u64 * 114)
        .sum();

    sum as f64 / 1000.0 / pixel_count as f64
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}

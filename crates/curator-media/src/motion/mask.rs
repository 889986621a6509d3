//! Per-frame foreground mask cleanup and blob measurement.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};

use super::background::BackgroundModel;
use super::config::MotionConfig;
use crate::error::MediaResult;

/// Motion measurements for one processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMotion {
    /// Pixel area of the largest foreground blob.
    pub max_blob_area: u32,
    /// Number of foreground blobs.
    pub blob_count: usize,
    /// Whether any blob reached the minimum area.
    pub motion: bool,
}

/// Gaussian smoothing. A sigma of 1.1 matches a 5x5 kernel.
pub fn smooth(frame: &GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 {
        gaussian_blur_f32(frame, sigma)
    } else {
        frame.clone()
    }
}

/// Keep mask values strictly above `threshold` as 255, zero the rest.
pub fn binarize(mask: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = mask.clone();
    for p in out.iter_mut() {
        *p = if *p > threshold { 255 } else { 0 };
    }
    out
}

/// Dilate with a 3x3 square element, `iterations` times.
pub fn dilate_square(mask: &GrayImage, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    dilate(mask, Norm::LInf, iterations)
}

/// Pixel areas of 8-connected foreground regions, in label order.
pub fn blob_areas(mask: &GrayImage) -> Vec<u32> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut areas: Vec<u32> = Vec::new();
    for label in labels.iter().copied().filter(|l| *l > 0) {
        let idx = label as usize - 1;
        if idx >= areas.len() {
            areas.resize(idx + 1, 0);
        }
        areas[idx] += 1;
    }
    areas
}

/// Classifies frames as motion or still against a running background.
pub struct MotionDetector {
    model: BackgroundModel,
    blur_sigma: f32,
    foreground_threshold: u8,
    dilate_iterations: u8,
    min_blob_area: u32,
}

impl MotionDetector {
    /// Create a detector with a fresh background model.
    pub fn new(config: &MotionConfig) -> MediaResult<Self> {
        config.validate()?;
        Ok(Self {
            model: BackgroundModel::new(config.background.clone())?,
            blur_sigma: config.blur_sigma,
            foreground_threshold: config.foreground_threshold,
            dilate_iterations: config.dilate_iterations,
            min_blob_area: config.min_blob_area,
        })
    }

    /// Cleaned foreground mask for `frame`. Updates the model.
    pub fn foreground_mask(&mut self, frame: &GrayImage) -> MediaResult<GrayImage> {
        let smoothed = smooth(frame, self.blur_sigma);
        let raw = self.model.apply(&smoothed)?;
        let binary = binarize(&raw, self.foreground_threshold);
        Ok(dilate_square(&binary, self.dilate_iterations))
    }

    /// Measure motion in `frame`. Updates the model.
    pub fn detect(&mut self, frame: &GrayImage) -> MediaResult<FrameMotion> {
        let mask = self.foreground_mask(frame)?;
        let areas = blob_areas(&mask);
        let max_blob_area = areas.iter().copied().max().unwrap_or(0);

        Ok(FrameMotion {
            max_blob_area,
            blob_count: areas.len(),
            motion: max_blob_area >= self.min_blob_area,
        })
    }

    /// Reset the background model for a new video.
    pub fn reset(&mut self) {
        self.model.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;

    fn square(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        img
    }

    #[test]
    fn test_binarize_drops_shadow_value() {
        let mut mask = GrayImage::new(3, 1);
        mask.put_pixel(0, 0, Luma([127]));
        mask.put_pixel(1, 0, Luma([200]));
        mask.put_pixel(2, 0, Luma([255]));

        let out = binarize(&mask, 200);
        assert_eq!(out.into_raw(), vec![0, 0, 255]);
    }

    #[test]
    fn test_detector_rejects_threshold_that_keeps_shadows() {
        let mut config = MotionConfig::default().with_min_blob_area(10);
        config.foreground_threshold = 100;
        assert!(matches!(
            MotionDetector::new(&config),
            Err(MediaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_shadow_only_frame_is_not_motion() {
        let config = MotionConfig::default().with_min_blob_area(10);
        let mut detector = MotionDetector::new(&config).unwrap();

        let lit = GrayImage::from_pixel(64, 64, Luma([200]));
        for _ in 0..20 {
            detector.detect(&lit).unwrap();
        }

        let mut shaded = lit.clone();
        for y in 20..28 {
            for x in 20..28 {
                shaded.put_pixel(x, y, Luma([150]));
            }
        }
        let motion = detector.detect(&shaded).unwrap();
        assert!(!motion.motion);
        assert_eq!(motion.max_blob_area, 0);
    }

    #[test]
    fn test_dilate_grows_by_iterations() {
        let mut mask = GrayImage::new(11, 11);
        mask.put_pixel(5, 5, Luma([255]));

        let once = dilate_square(&mask, 1);
        assert_eq!(once.iter().filter(|p| **p == 255).count(), 9);

        let twice = dilate_square(&mask, 2);
        assert_eq!(twice.iter().filter(|p| **p == 255).count(), 25);

        assert_eq!(dilate_square(&mask, 0), mask);
    }

    #[test]
    fn test_blob_areas() {
        let mut mask = square(40, 2, 2, 5);
        for y in 20..30 {
            for x in 20..30 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let mut areas = blob_areas(&mask);
        areas.sort_unstable();
        assert_eq!(areas, vec![25, 100]);
    }

    #[test]
    fn test_diagonal_pixels_join_one_blob() {
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, Luma([255]));
        mask.put_pixel(1, 1, Luma([255]));
        assert_eq!(blob_areas(&mask), vec![2]);
    }

    #[test]
    fn test_empty_mask_has_no_blobs() {
        assert!(blob_areas(&GrayImage::new(8, 8)).is_empty());
    }

    #[test]
    fn test_detector_flags_large_object() {
        let config = MotionConfig::default().with_min_blob_area(200);
        let mut detector = MotionDetector::new(&config).unwrap();

        let still = GrayImage::new(64, 64);
        for _ in 0..20 {
            let motion = detector.detect(&still).unwrap();
            assert!(!motion.motion);
            assert_eq!(motion.blob_count, 0);
        }

        let moving = detector.detect(&square(64, 10, 10, 20)).unwrap();
        assert!(moving.motion);
        assert_eq!(moving.blob_count, 1);
        assert!(moving.max_blob_area >= 400);
    }

    #[test]
    fn test_detector_ignores_small_object() {
        let config = MotionConfig::default().with_min_blob_area(2000);
        let mut detector = MotionDetector::new(&config).unwrap();

        let still = GrayImage::new(64, 64);
        for _ in 0..20 {
            detector.detect(&still).unwrap();
        }

        let motion = detector.detect(&square(64, 10, 10, 6)).unwrap();
        assert!(!motion.motion);
        assert!(motion.max_blob_area > 0);
    }
}

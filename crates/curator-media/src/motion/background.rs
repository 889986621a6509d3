//! Adaptive per-pixel Gaussian mixture background model.
//!
//! Each pixel keeps up to `max_modes` Gaussian modes (weight, mean,
//! variance) sorted by weight. A new sample either updates the first mode
//! it fits or spawns a new one; modes are decayed every frame and pruned
//! once their weight becomes negligible. The leading modes whose weights
//! sum to `background_ratio` describe the background.
//!
//! Mask values: `0` background, `shadow_value` shadow, `255` foreground.

use image::GrayImage;

use super::config::BackgroundModelConfig;
use crate::error::{MediaError, MediaResult};

/// Mask value for foreground pixels.
pub const FOREGROUND: u8 = 255;

/// Mask value for background pixels.
pub const BACKGROUND: u8 = 0;

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    weight: f32,
    mean: f32,
    variance: f32,
}

/// Background subtractor state for one video.
///
/// The model is sized by the first frame it sees; every later frame must
/// have the same dimensions.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    config: BackgroundModelConfig,
    width: u32,
    height: u32,
    modes: Vec<Mode>,
    used: Vec<u8>,
    frames_seen: u64,
}

impl BackgroundModel {
    /// Create an empty model.
    pub fn new(config: BackgroundModelConfig) -> MediaResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            width: 0,
            height: 0,
            modes: Vec::new(),
            used: Vec::new(),
            frames_seen: 0,
        })
    }

    /// Number of frames applied since creation or the last reset.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Forget everything learnt so far.
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.modes.clear();
        self.used.clear();
        self.frames_seen = 0;
    }

    /// Current learning rate.
    fn learning_rate(&self) -> f32 {
        let span = (2 * self.frames_seen).min(self.config.history as u64).max(1);
        1.0 / span as f32
    }

    /// Feed one frame and return its foreground mask.
    ///
    /// The first frame only seeds the model and yields an all-background
    /// mask.
    pub fn apply(&mut self, frame: &GrayImage) -> MediaResult<GrayImage> {
        let (width, height) = frame.dimensions();

        if self.frames_seen == 0 {
            self.seed(frame);
            return Ok(GrayImage::new(width, height));
        }

        if (width, height) != (self.width, self.height) {
            return Err(MediaError::invalid_video(format!(
                "Frame size changed from {}x{} to {}x{}",
                self.width, self.height, width, height
            )));
        }

        self.frames_seen += 1;
        let alpha = self.learning_rate();
        let max_modes = self.config.max_modes;

        let mut mask = GrayImage::new(width, height);
        for (idx, (pixel, out)) in frame
            .as_raw()
            .iter()
            .zip(mask.iter_mut())
            .enumerate()
        {
            let base = idx * max_modes;
            let modes = &mut self.modes[base..base + max_modes];
            *out = update_pixel(modes, &mut self.used[idx], *pixel as f32, alpha, &self.config);
        }

        Ok(mask)
    }

    fn seed(&mut self, frame: &GrayImage) {
        let (width, height) = frame.dimensions();
        let max_modes = self.config.max_modes;
        let pixels = width as usize * height as usize;

        self.width = width;
        self.height = height;
        self.modes = vec![Mode::default(); pixels * max_modes];
        self.used = vec![1; pixels];

        for (idx, pixel) in frame.as_raw().iter().enumerate() {
            self.modes[idx * max_modes] = Mode {
                weight: 1.0,
                mean: *pixel as f32,
                variance: self.config.var_init,
            };
        }

        self.frames_seen = 1;
    }
}

/// Update one pixel's modes with `value` and classify it.
fn update_pixel(
    modes: &mut [Mode],
    used: &mut u8,
    value: f32,
    alpha: f32,
    config: &BackgroundModelConfig,
) -> u8 {
    let keep = 1.0 - alpha;
    let prune = -alpha * config.complexity_reduction;
    let tb = config.var_threshold;
    let tg = config.var_threshold_gen;

    let mut n = *used as usize;
    let mut total_weight = 0.0f32;
    let mut background = false;
    let mut fits = false;

    for mode in modes.iter_mut().take(n) {
        let mut weight = keep * mode.weight + prune;

        if !fits {
            let diff = value - mode.mean;
            let dist2 = diff * diff;

            if total_weight < config.background_ratio && dist2 < tb * mode.variance {
                background = true;
            }

            if dist2 < tg * mode.variance {
                fits = true;
                weight += alpha;
                let k = alpha / weight;
                mode.mean += k * diff;
                mode.variance = (mode.variance + k * (dist2 - mode.variance))
                    .clamp(config.var_min, config.var_max);
            }
        }

        mode.weight = weight;
        total_weight += weight;
    }

    // Drop decayed modes, keeping order.
    let mut kept = 0;
    for i in 0..n {
        if modes[i].weight >= -prune {
            modes[kept] = modes[i];
            kept += 1;
        }
    }
    n = kept;

    let remaining: f32 = modes[..n].iter().map(|m| m.weight).sum();
    if remaining > 0.0 {
        for mode in &mut modes[..n] {
            mode.weight /= remaining;
        }
    }

    if !fits {
        let slot = if n == modes.len() { n - 1 } else { n };
        n = slot + 1;

        if n == 1 {
            modes[slot].weight = 1.0;
        } else {
            for mode in &mut modes[..slot] {
                mode.weight *= keep;
            }
            modes[slot].weight = alpha;
        }
        modes[slot].mean = value;
        modes[slot].variance = config.var_init;
    }

    modes[..n].sort_by(|a, b| b.weight.total_cmp(&a.weight));
    *used = n as u8;

    if background {
        BACKGROUND
    } else if config.detect_shadows && is_shadow(value, &modes[..n], config) {
        config.shadow_value
    } else {
        FOREGROUND
    }
}

/// A darker version of a background mode with similar chromaticity.
fn is_shadow(value: f32, modes: &[Mode], config: &BackgroundModelConfig) -> bool {
    let mut total_weight = 0.0f32;

    for mode in modes {
        let numerator = value * mode.mean;
        let denominator = mode.mean * mode.mean;

        if denominator == 0.0 {
            return false;
        }

        if numerator <= denominator && numerator >= config.shadow_tau * denominator {
            let a = numerator / denominator;
            let d = a * mode.mean - value;
            if d * d < config.var_threshold * mode.variance * a * a {
                return true;
            }
        }

        total_weight += mode.weight;
        if total_weight > config.background_ratio {
            return false;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    fn with_square(base: u8, value: u8) -> GrayImage {
        let mut frame = flat(32, 32, base);
        for y in 8..16 {
            for x in 8..16 {
                frame.put_pixel(x, y, Luma([value]));
            }
        }
        frame
    }

    fn trained(config: BackgroundModelConfig, base: u8, frames: usize) -> BackgroundModel {
        let mut model = BackgroundModel::new(config).unwrap();
        for _ in 0..frames {
            model.apply(&flat(32, 32, base)).unwrap();
        }
        model
    }

    #[test]
    fn test_first_frame_is_background() {
        let mut model = BackgroundModel::new(BackgroundModelConfig::default()).unwrap();
        let mask = model.apply(&with_square(10, 240)).unwrap();
        assert!(mask.pixels().all(|p| p[0] == BACKGROUND));
        assert_eq!(model.frames_seen(), 1);
    }

    #[test]
    fn test_static_scene_stays_background() {
        let mut model = trained(BackgroundModelConfig::default(), 80, 1);
        for _ in 0..50 {
            let mask = model.apply(&flat(32, 32, 80)).unwrap();
            assert!(mask.pixels().all(|p| p[0] == BACKGROUND));
        }
    }

    #[test]
    fn test_bright_object_is_foreground() {
        let mut model = trained(BackgroundModelConfig::default(), 50, 30);
        let mask = model.apply(&with_square(50, 200)).unwrap();

        assert_eq!(mask.get_pixel(10, 10)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(0, 0)[0], BACKGROUND);
        let foreground = mask.pixels().filter(|p| p[0] == FOREGROUND).count();
        assert_eq!(foreground, 64);
    }

    #[test]
    fn test_darker_region_is_shadow() {
        let mut model = trained(BackgroundModelConfig::default(), 200, 30);
        let mask = model.apply(&with_square(200, 150)).unwrap();
        assert_eq!(mask.get_pixel(10, 10)[0], 127);

        let config = BackgroundModelConfig::default().with_detect_shadows(false);
        let mut model = trained(config, 200, 30);
        let mask = model.apply(&with_square(200, 150)).unwrap();
        assert_eq!(mask.get_pixel(10, 10)[0], FOREGROUND);
    }

    #[test]
    fn test_black_background_never_shadow() {
        let mut model = trained(BackgroundModelConfig::default(), 0, 30);
        let mask = model.apply(&with_square(0, 255)).unwrap();
        assert_eq!(mask.get_pixel(10, 10)[0], FOREGROUND);
    }

    #[test]
    fn test_persistent_change_is_absorbed() {
        let config = BackgroundModelConfig::default().with_history(20);
        let mut model = trained(config, 50, 30);

        let changed = with_square(50, 200);
        let first = model.apply(&changed).unwrap();
        assert_eq!(first.get_pixel(10, 10)[0], FOREGROUND);

        let mut last = first;
        for _ in 0..40 {
            last = model.apply(&changed).unwrap();
        }
        assert!(last.pixels().all(|p| p[0] == BACKGROUND));
    }

    #[test]
    fn test_dimension_change_rejected() {
        let mut model = trained(BackgroundModelConfig::default(), 50, 2);
        let err = model.apply(&flat(16, 16, 50)).unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[test]
    fn test_reset_accepts_new_size() {
        let mut model = trained(BackgroundModelConfig::default(), 50, 5);
        model.reset();
        assert_eq!(model.frames_seen(), 0);

        let mask = model.apply(&flat(16, 16, 50)).unwrap();
        assert_eq!(mask.dimensions(), (16, 16));
    }

    #[test]
    fn test_deterministic() {
        let frames: Vec<GrayImage> = (0..20u8)
            .map(|i| with_square(40, 40 + i * 10))
            .collect();

        let run = || {
            let mut model = BackgroundModel::new(BackgroundModelConfig::default()).unwrap();
            frames
                .iter()
                .map(|f| model.apply(f).unwrap().into_raw())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }
}

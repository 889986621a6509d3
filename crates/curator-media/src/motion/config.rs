//! Configuration for motion detection.
//!
//! The defaults are tuned for fixed-camera footage at 640x360 and above,
//! where a person or vehicle crossing the frame covers several thousand
//! pixels once the mask has been dilated.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Configuration for the adaptive background model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundModelConfig {
    /// Number of frames the model effectively remembers.
    ///
    /// The learning rate is `1 / min(2 * frames_seen, history)`, so the
    /// model adapts quickly at first and settles to `1 / history`.
    pub history: u32,

    /// Squared Mahalanobis distance under which a pixel matches a
    /// background mode.
    ///
    /// - Lower values (16-25): More sensitive, picks up sensor noise
    /// - Default (50): Ignores compression noise and small flicker
    /// - Higher values (100+): Only strong changes register
    pub var_threshold: f32,

    /// Mark shadow pixels with `shadow_value` instead of foreground.
    pub detect_shadows: bool,

    /// Squared distance under which a pixel updates an existing mode
    /// rather than spawning a new one.
    pub var_threshold_gen: f32,

    /// Fraction of accumulated mode weight treated as background.
    pub background_ratio: f32,

    /// Variance assigned to newly created modes.
    pub var_init: f32,

    /// Lower variance clamp.
    pub var_min: f32,

    /// Upper variance clamp.
    pub var_max: f32,

    /// Weight decay applied to every mode per frame, scaled by the
    /// learning rate. Modes whose weight drops below zero are discarded.
    pub complexity_reduction: f32,

    /// Maximum Gaussian modes per pixel.
    pub max_modes: usize,

    /// Mask value written for shadow pixels.
    pub shadow_value: u8,

    /// Minimum brightness ratio against the background for a darker pixel
    /// to count as shadow.
    pub shadow_tau: f32,
}

impl Default for BackgroundModelConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 50.0,
            detect_shadows: true,
            var_threshold_gen: 9.0,
            background_ratio: 0.9,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            max_modes: 5,
            shadow_value: 127,
            shadow_tau: 0.5,
        }
    }
}

impl BackgroundModelConfig {
    /// Builder-style setter for the history length.
    pub fn with_history(mut self, history: u32) -> Self {
        self.history = history;
        self
    }

    /// Builder-style setter for the match threshold.
    pub fn with_var_threshold(mut self, threshold: f32) -> Self {
        self.var_threshold = threshold;
        self
    }

    /// Builder-style setter for shadow detection.
    pub fn with_detect_shadows(mut self, detect: bool) -> Self {
        self.detect_shadows = detect;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> MediaResult<()> {
        if self.history == 0 {
            return Err(MediaError::invalid_config("history must be greater than zero"));
        }
        if !(self.var_threshold > 0.0) || !(self.var_threshold_gen > 0.0) {
            return Err(MediaError::invalid_config("variance thresholds must be positive"));
        }
        if !(self.background_ratio > 0.0 && self.background_ratio <= 1.0) {
            return Err(MediaError::invalid_config("background_ratio must be in (0, 1]"));
        }
        if !(self.var_min > 0.0) || self.var_max < self.var_min {
            return Err(MediaError::invalid_config("variance clamp must satisfy 0 < var_min <= var_max"));
        }
        if !(self.var_init >= self.var_min && self.var_init <= self.var_max) {
            return Err(MediaError::invalid_config("var_init must lie within the variance clamp"));
        }
        if self.max_modes == 0 || self.max_modes > u8::MAX as usize {
            return Err(MediaError::invalid_config(format!(
                "max_modes must be between 1 and {}",
                u8::MAX
            )));
        }
        if !(self.shadow_tau > 0.0 && self.shadow_tau < 1.0) {
            return Err(MediaError::invalid_config("shadow_tau must be in (0, 1)"));
        }
        Ok(())
    }
}

/// Configuration for per-frame motion classification and segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Process every Nth frame. Skipped frames do not touch the model.
    pub frame_stride: u32,

    /// Minimum blob area (pixels) for a frame to count as motion.
    ///
    /// - 2000-4000: Small objects at distance
    /// - Default (8000): A person crossing a 640x360 frame
    /// - 20000+: Only large foreground objects
    pub min_blob_area: u32,

    /// Consecutive motion-free processed frames that end an interval.
    pub no_motion_frames_required: u32,

    /// Gaussian blur sigma applied before background subtraction.
    pub blur_sigma: f32,

    /// Mask values above this are foreground. Must be at least the shadow
    /// value while shadows are marked.
    pub foreground_threshold: u8,

    /// Dilation iterations with a 3x3 square element.
    pub dilate_iterations: u8,

    /// Background model parameters.
    pub background: BackgroundModelConfig,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            frame_stride: 1,
            min_blob_area: 8000,
            no_motion_frames_required: 5,
            blur_sigma: 1.1,
            foreground_threshold: 200,
            dilate_iterations: 2,
            background: BackgroundModelConfig::default(),
        }
    }
}

impl MotionConfig {
    /// Builder-style setter for the frame stride.
    pub fn with_frame_stride(mut self, stride: u32) -> Self {
        self.frame_stride = stride;
        self
    }

    /// Builder-style setter for the minimum blob area.
    pub fn with_min_blob_area(mut self, area: u32) -> Self {
        self.min_blob_area = area;
        self
    }

    /// Builder-style setter for the no-motion requirement.
    pub fn with_no_motion_frames(mut self, frames: u32) -> Self {
        self.no_motion_frames_required = frames;
        self
    }

    /// Builder-style setter for the background model.
    pub fn with_background(mut self, background: BackgroundModelConfig) -> Self {
        self.background = background;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> MediaResult<()> {
        if self.frame_stride == 0 {
            return Err(MediaError::invalid_config("frame_stride must be at least 1"));
        }
        if self.no_motion_frames_required == 0 {
            return Err(MediaError::invalid_config(
                "no_motion_frames_required must be at least 1",
            ));
        }
        if !(self.blur_sigma >= 0.0) || !self.blur_sigma.is_finite() {
            return Err(MediaError::invalid_config("blur_sigma must be a finite non-negative number"));
        }
        // Shadow pixels must not pass the foreground threshold.
        if self.background.detect_shadows
            && self.foreground_threshold < self.background.shadow_value
        {
            return Err(MediaError::invalid_config(format!(
                "foreground_threshold {} must be at least the shadow value {}",
                self.foreground_threshold, self.background.shadow_value
            )));
        }
        self.background.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MotionConfig::default();
        assert_eq!(config.frame_stride, 1);
        assert_eq!(config.min_blob_area, 8000);
        assert_eq!(config.no_motion_frames_required, 5);
        assert_eq!(config.background.history, 500);
        assert!(config.background.detect_shadows);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_drops_shadows() {
        let config = MotionConfig::default();
        assert!(config.foreground_threshold >= config.background.shadow_value);
    }

    #[test]
    fn test_threshold_below_shadow_value_rejected() {
        let mut config = MotionConfig::default();
        config.foreground_threshold = 100;
        assert!(matches!(config.validate(), Err(MediaError::InvalidConfig(_))));

        config.foreground_threshold = config.background.shadow_value;
        assert!(config.validate().is_ok());

        // Without shadow marking the mask only holds 0 and 255.
        let mut config = MotionConfig::default()
            .with_background(BackgroundModelConfig::default().with_detect_shadows(false));
        config.foreground_threshold = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_modes_bounds() {
        let mut config = BackgroundModelConfig::default();
        config.max_modes = 0;
        assert!(config.validate().is_err());

        config.max_modes = u8::MAX as usize;
        assert!(config.validate().is_ok());

        config.max_modes = u8::MAX as usize + 1;
        assert!(matches!(config.validate(), Err(MediaError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_pattern() {
        let config = MotionConfig::default()
            .with_frame_stride(2)
            .with_min_blob_area(500)
            .with_no_motion_frames(3)
            .with_background(BackgroundModelConfig::default().with_history(100));

        assert_eq!(config.frame_stride, 2);
        assert_eq!(config.min_blob_area, 500);
        assert_eq!(config.no_motion_frames_required, 3);
        assert_eq!(config.background.history, 100);
    }

    #[test]
    fn test_invalid_values() {
        assert!(MotionConfig::default().with_frame_stride(0).validate().is_err());
        assert!(MotionConfig::default().with_no_motion_frames(0).validate().is_err());
        assert!(BackgroundModelConfig::default()
            .with_history(0)
            .validate()
            .is_err());
        assert!(BackgroundModelConfig::default()
            .with_var_threshold(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MotionConfig =
            serde_json::from_str(r#"{"min_blob_area": 1200, "background": {"history": 60}}"#)
                .unwrap();
        assert_eq!(config.min_blob_area, 1200);
        assert_eq!(config.frame_stride, 1);
        assert_eq!(config.background.history, 60);
        assert!((config.background.var_threshold - 50.0).abs() < f32::EPSILON);
    }
}

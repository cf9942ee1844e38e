//! Configuration types for background replacement operations
//!
//! Every numeric threshold used by the pipeline lives here. The defaults are
//! empirically tuned for centered portraits on a roughly uniform background;
//! they are starting points, not derived constants.

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG (lossless, default)
    #[default]
    Png,
    /// JPEG (lossy, alpha dropped)
    Jpeg,
    /// WebP (lossless encoder of the `image` crate)
    WebP,
    /// TIFF with lossless compression
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::WebP => write!(f, "webp"),
            Self::Tiff => write!(f, "tiff"),
            Self::Rgba8 => write!(f, "rgba8"),
        }
    }
}

/// Solid backdrop color painted behind the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackgroundColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::white()
    }
}

impl BackgroundColor {
    /// Create a new backdrop color with RGB values
    ///
    /// # Examples
    /// ```rust
    /// use portrait_bgswap::BackgroundColor;
    /// let navy = BackgroundColor::new(0, 0, 128);
    /// assert_eq!(navy.b, 128);
    /// ```
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// White (255, 255, 255), the usual CV photo backdrop
    #[must_use]
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Black (0, 0, 0)
    #[must_use]
    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Light studio gray (240, 240, 240)
    #[must_use]
    pub fn light_gray() -> Self {
        Self::new(240, 240, 240)
    }

    /// Fully opaque RGBA pixel for this color
    #[must_use]
    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 255])
    }
}

impl std::fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Thresholds for the background estimator and the per-pixel classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Side of each corner sampling square as a fraction of `min(width, height)`
    pub sample_fraction: f32,
    /// Normalized center distance below which pixels are always kept
    pub protect_ratio: f32,
    /// Color-distance threshold at the outer edge of the protected ramp
    pub similarity_base: f32,
    /// Color-distance threshold right next to the protected center
    pub similarity_max: f32,
    /// Brightness above which low-saturation pixels count as background
    pub bright_threshold: f32,
    /// Saturation below which bright pixels count as background
    pub saturation_threshold: f32,
    /// Minimum center ratio for the bright/low-saturation rule
    pub bright_ratio: f32,
    /// Center ratio beyond which the aggressive corner rule applies
    pub corner_ratio: f32,
    /// Color distance used by the aggressive corner rule
    pub corner_distance: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sample_fraction: 0.15,
            protect_ratio: 0.3,
            similarity_base: 30.0,
            similarity_max: 80.0,
            bright_threshold: 180.0,
            saturation_threshold: 0.25,
            bright_ratio: 0.4,
            corner_ratio: 0.8,
            corner_distance: 60.0,
        }
    }
}

impl ClassifierConfig {
    /// Validate threshold ranges
    ///
    /// # Errors
    /// - Any fraction or ratio outside its valid range
    /// - `similarity_base` greater than `similarity_max`
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 0.5) {
            return Err(BgRemovalError::config_value_error(
                "sample fraction",
                self.sample_fraction,
                "(0, 0.5]",
                Some(0.15),
            ));
        }

        for (name, value, default) in [
            ("protect ratio", self.protect_ratio, 0.3),
            ("saturation threshold", self.saturation_threshold, 0.25),
            ("bright ratio", self.bright_ratio, 0.4),
            ("corner ratio", self.corner_ratio, 0.8),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BgRemovalError::config_value_error(
                    name,
                    value,
                    "0.0-1.0",
                    Some(default),
                ));
            }
        }

        for (name, value, default) in [
            ("similarity base", self.similarity_base, 30.0),
            ("similarity max", self.similarity_max, 80.0),
            ("corner distance", self.corner_distance, 60.0),
        ] {
            // Euclidean RGB distance never exceeds 255 * sqrt(3)
            if !(0.0..=442.0).contains(&value) {
                return Err(BgRemovalError::config_value_error(
                    name,
                    value,
                    "0-442",
                    Some(default),
                ));
            }
        }

        if !(0.0..=255.0).contains(&self.bright_threshold) {
            return Err(BgRemovalError::config_value_error(
                "bright threshold",
                self.bright_threshold,
                "0-255",
                Some(180.0),
            ));
        }

        if self.similarity_base > self.similarity_max {
            return Err(BgRemovalError::invalid_config(format!(
                "similarity base ({}) must not exceed similarity max ({})",
                self.similarity_base, self.similarity_max
            )));
        }

        Ok(())
    }
}

/// Mask cleanup settings for the component filter and morphological refiner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Mask value at or above which a pixel is a foreground candidate
    pub candidate_threshold: u8,
    /// Mask value at or above which a pixel is foreground before morphology
    pub binarize_threshold: u8,
    /// Erode/dilate passes per opening and per closing (0 disables morphology)
    pub morph_iterations: u32,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            candidate_threshold: 16,
            binarize_threshold: 128,
            morph_iterations: 1,
        }
    }
}

impl RefinementConfig {
    /// Validate refinement settings
    ///
    /// # Errors
    /// - Zero thresholds (every pixel would become foreground)
    /// - More than 32 morphology iterations
    pub fn validate(&self) -> Result<()> {
        if self.candidate_threshold == 0 {
            return Err(BgRemovalError::config_value_error(
                "candidate threshold",
                self.candidate_threshold,
                "1-255",
                Some(16),
            ));
        }
        if self.binarize_threshold == 0 {
            return Err(BgRemovalError::config_value_error(
                "binarize threshold",
                self.binarize_threshold,
                "1-255",
                Some(128),
            ));
        }
        if self.morph_iterations > 32 {
            return Err(BgRemovalError::config_value_error(
                "morphology iterations",
                self.morph_iterations,
                "0-32",
                Some(1),
            ));
        }
        Ok(())
    }
}

/// Alpha feathering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatherConfig {
    /// Base radius is `round(min(width, height) / radius_divisor)`, at least 1
    pub radius_divisor: f32,
    /// Fixed base radius overriding the size-derived one
    pub radius: Option<u32>,
    /// Number of separable box-blur passes (0 disables feathering)
    pub passes: u32,
}

impl Default for FeatherConfig {
    fn default() -> Self {
        Self {
            radius_divisor: 120.0,
            radius: None,
            passes: 3,
        }
    }
}

impl FeatherConfig {
    /// Validate feathering settings
    ///
    /// # Errors
    /// - Non-positive radius divisor
    /// - Zero radius override
    /// - More than 16 passes
    pub fn validate(&self) -> Result<()> {
        if !(self.radius_divisor.is_finite() && self.radius_divisor > 0.0) {
            return Err(BgRemovalError::config_value_error(
                "blur radius divisor",
                self.radius_divisor,
                "> 0",
                Some(120.0),
            ));
        }
        if self.radius == Some(0) {
            return Err(BgRemovalError::invalid_config(
                "blur radius override must be at least 1",
            ));
        }
        if self.passes > 16 {
            return Err(BgRemovalError::config_value_error(
                "blur passes",
                self.passes,
                "0-16",
                Some(3),
            ));
        }
        Ok(())
    }
}

/// Configuration for background replacement operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Backdrop painted behind the subject
    pub backdrop: BackgroundColor,

    /// Estimator and classifier thresholds
    pub classifier: ClassifierConfig,

    /// Component filter and morphology settings
    pub refinement: RefinementConfig,

    /// Feathering settings
    pub feather: FeatherConfig,

    /// Output format
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// Split per-pixel stages across rayon workers on large images
    pub parallel: bool,

    /// Enable debug mode (additional logging of intermediate statistics)
    pub debug: bool,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            backdrop: BackgroundColor::default(),
            classifier: ClassifierConfig::default(),
            refinement: RefinementConfig::default(),
            feather: FeatherConfig::default(),
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            parallel: true,
            debug: false,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    /// ```rust
    /// use portrait_bgswap::{BackgroundColor, OutputFormat, RemovalConfig};
    ///
    /// let config = RemovalConfig::builder()
    ///     .backdrop(BackgroundColor::new(30, 60, 120))
    ///     .output_format(OutputFormat::Png)
    ///     .morph_iterations(2)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.refinement.morph_iterations, 2);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Invalid JPEG quality value (must be 0-100)
    /// - Any classifier, refinement or feathering value out of range
    ///
    /// # Examples
    /// ```rust
    /// use portrait_bgswap::RemovalConfig;
    ///
    /// let mut config = RemovalConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.jpeg_quality = 150;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(BgRemovalError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }

        self.classifier.validate()?;
        self.refinement.validate()?;
        self.feather.validate()?;
        Ok(())
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    /// - File cannot be read
    /// - JSON is malformed or has wrongly typed fields
    /// - Resulting configuration fails [`RemovalConfig::validate`]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path_ref, &e))?;
        Self::from_json_str(&content)
    }

    /// Parse a configuration from a JSON string
    ///
    /// # Errors
    /// - JSON is malformed or has wrongly typed fields
    /// - Resulting configuration fails [`RemovalConfig::validate`]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BgRemovalError::invalid_config(format!("Malformed JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as pretty-printed JSON
    ///
    /// # Errors
    /// - Serialization failure
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BgRemovalError::processing(format!("Failed to serialize config: {}", e)))
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Start from an existing configuration
    #[must_use]
    pub fn from_config(config: RemovalConfig) -> Self {
        Self { config }
    }

    /// Set backdrop color
    #[must_use]
    pub fn backdrop(mut self, color: BackgroundColor) -> Self {
        self.config.backdrop = color;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    /// Replace all classifier thresholds
    #[must_use]
    pub fn classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.config.classifier = classifier;
        self
    }

    /// Set corner sampling fraction
    #[must_use]
    pub fn sample_fraction(mut self, fraction: f32) -> Self {
        self.config.classifier.sample_fraction = fraction;
        self
    }

    /// Set center protection radius ratio
    #[must_use]
    pub fn protect_ratio(mut self, ratio: f32) -> Self {
        self.config.classifier.protect_ratio = ratio;
        self
    }

    /// Set base/max color-similarity thresholds
    #[must_use]
    pub fn similarity_thresholds(mut self, base: f32, max: f32) -> Self {
        self.config.classifier.similarity_base = base;
        self.config.classifier.similarity_max = max;
        self
    }

    /// Set brightness and saturation cutoffs for bright-background detection
    #[must_use]
    pub fn bright_background(mut self, brightness: f32, saturation: f32) -> Self {
        self.config.classifier.bright_threshold = brightness;
        self.config.classifier.saturation_threshold = saturation;
        self
    }

    /// Replace all refinement settings
    #[must_use]
    pub fn refinement(mut self, refinement: RefinementConfig) -> Self {
        self.config.refinement = refinement;
        self
    }

    /// Set morphology iteration count
    #[must_use]
    pub fn morph_iterations(mut self, iterations: u32) -> Self {
        self.config.refinement.morph_iterations = iterations;
        self
    }

    /// Replace all feathering settings
    #[must_use]
    pub fn feather(mut self, feather: FeatherConfig) -> Self {
        self.config.feather = feather;
        self
    }

    /// Set number of blur passes
    #[must_use]
    pub fn blur_passes(mut self, passes: u32) -> Self {
        self.config.feather.passes = passes;
        self
    }

    /// Use a fixed blur radius instead of the size-derived one
    #[must_use]
    pub fn blur_radius(mut self, radius: u32) -> Self {
        self.config.feather.radius = Some(radius);
        self
    }

    /// Enable or disable rayon parallelism inside stages
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any value rejected by [`RemovalConfig::validate`]
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_values() {
        let config = RemovalConfig::default();
        assert_eq!(config.classifier.sample_fraction, 0.15);
        assert_eq!(config.classifier.protect_ratio, 0.3);
        assert_eq!(config.classifier.similarity_base, 30.0);
        assert_eq!(config.classifier.similarity_max, 80.0);
        assert_eq!(config.classifier.bright_threshold, 180.0);
        assert_eq!(config.classifier.saturation_threshold, 0.25);
        assert_eq!(config.refinement.morph_iterations, 1);
        assert_eq!(config.feather.passes, 3);
        assert_eq!(config.backdrop, BackgroundColor::white());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_clamps_quality() {
        let config = RemovalConfig::builder().jpeg_quality(200).build().unwrap();
        assert_eq!(config.jpeg_quality, 100);
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        assert!(RemovalConfig::builder().sample_fraction(0.0).build().is_err());
        assert!(RemovalConfig::builder().sample_fraction(0.75).build().is_err());
        assert!(RemovalConfig::builder().protect_ratio(1.5).build().is_err());
        assert!(RemovalConfig::builder()
            .similarity_thresholds(90.0, 40.0)
            .build()
            .is_err());
        assert!(RemovalConfig::builder().bright_background(300.0, 0.2).build().is_err());
        assert!(RemovalConfig::builder().blur_radius(0).build().is_err());
        assert!(RemovalConfig::builder().blur_passes(40).build().is_err());
        assert!(RemovalConfig::builder().morph_iterations(100).build().is_err());
    }

    #[test]
    fn test_validation_error_mentions_parameter() {
        let err = RemovalConfig::builder().protect_ratio(-0.1).build().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("protect ratio"));
        assert!(message.contains("0.0-1.0"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "backdrop": { "r": 10, "g": 20, "b": 30 }, "feather": { "passes": 1 } }"#;
        let config = RemovalConfig::from_json_str(json).unwrap();
        assert_eq!(config.backdrop, BackgroundColor::new(10, 20, 30));
        assert_eq!(config.feather.passes, 1);
        assert_eq!(config.feather.radius_divisor, 120.0);
        assert_eq!(config.classifier, ClassifierConfig::default());
    }

    #[test]
    fn test_json_round_trip_preserves_config() {
        let config = RemovalConfig::builder()
            .backdrop(BackgroundColor::black())
            .output_format(OutputFormat::Tiff)
            .blur_radius(4)
            .build()
            .unwrap();
        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"tiff\""));
        assert_eq!(RemovalConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = RemovalConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidConfig(_)));
    }

    #[test]
    fn test_background_color_display() {
        assert_eq!(BackgroundColor::new(255, 128, 0).to_string(), "#ff8000");
        assert_eq!(BackgroundColor::white().to_rgba(), image::Rgba([255, 255, 255, 255]));
    }
}

//! Output format handling service

use crate::config::OutputFormat;
use image::{DynamicImage, ImageFormat, RgbaImage};

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an RGBA image into the pixel layout the format stores
    ///
    /// JPEG has no alpha channel, so the alpha is dropped.
    ///
    /// # Examples
    /// ```rust
    /// use portrait_bgswap::{services::OutputFormatHandler, OutputFormat};
    /// use image::RgbaImage;
    ///
    /// let converted = OutputFormatHandler::convert_format(RgbaImage::new(4, 4), OutputFormat::Jpeg);
    /// assert!(converted.as_rgb8().is_some());
    /// ```
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba_image).to_rgb8()),
            OutputFormat::Png | OutputFormat::WebP | OutputFormat::Tiff | OutputFormat::Rgba8 => {
                DynamicImage::ImageRgba8(rgba_image)
            },
        }
    }

    /// Get the file extension (without the dot) for a format
    ///
    /// # Examples
    /// ```rust
    /// use portrait_bgswap::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "rgba",
        }
    }

    /// `image` crate format used for encoding; raw RGBA8 has none
    #[must_use]
    pub fn image_format(format: OutputFormat) -> Option<ImageFormat> {
        match format {
            OutputFormat::Png => Some(ImageFormat::Png),
            OutputFormat::Jpeg => Some(ImageFormat::Jpeg),
            OutputFormat::WebP => Some(ImageFormat::WebP),
            OutputFormat::Tiff => Some(ImageFormat::Tiff),
            OutputFormat::Rgba8 => None,
        }
    }

    /// Infer an output format from a file extension
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<OutputFormat> {
        match extension.to_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::WebP),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            "rgba" | "raw" => Some(OutputFormat::Rgba8),
            _ => None,
        }
    }

    /// Whether a format keeps an alpha channel
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jpeg)
    }

    /// Whether a format round-trips pixel values exactly
    ///
    /// WebP counts as lossless because the `image` encoder only writes lossless WebP.
    #[must_use]
    pub fn is_lossless(format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jpeg)
    }

    /// Warn when a transparent cutout is requested in a format without alpha
    pub fn validate_for_cutout(format: OutputFormat) {
        if !Self::supports_transparency(format) {
            log::warn!(
                "Output format {} does not support transparency; the cutout will be flattened",
                format
            );
        }
    }
}

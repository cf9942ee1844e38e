//! Image I/O operations service
//!
//! Keeps decoding, encoding and file handling out of the pipeline so the
//! stages only ever see pixel buffers.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
    services::OutputFormatHandler,
};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

/// Extensions accepted when scanning directories for input images
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff", "tif", "bmp"];

/// Service for handling image input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Tries extension-based detection first and falls back to sniffing the
    /// file content, so misnamed files still load.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use portrait_bgswap::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("portrait.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Content is not a decodable image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(BgRemovalError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    BgRemovalError::file_io_error("read image data", path_ref, &io_err)
                })?;

                Self::load_from_bytes(&data).map_err(|content_err| {
                    let extension = path_ref
                        .extension()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown");
                    BgRemovalError::processing_stage_error(
                        "image loading",
                        &format!(
                            "Failed with both extension-based ({}) and content-based detection. Extension error: {}. Content error: {}",
                            extension, e, content_err
                        ),
                        Some(&format!("path: {}, size: {} bytes", path_ref.display(), data.len())),
                    )
                })
            },
        }
    }

    /// Decode an image from memory, detecting the format from its content
    ///
    /// # Errors
    /// - Empty input
    /// - Unrecognized format (`UnsupportedFormat`)
    /// - Corrupt data of a recognized format (`Image`)
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(BgRemovalError::invalid_input("Image data is empty"));
        }
        let format = image::guess_format(bytes).map_err(|_| {
            BgRemovalError::unsupported_format(format!(
                "unrecognized image data ({} bytes)",
                bytes.len()
            ))
        })?;
        Ok(image::load_from_memory_with_format(bytes, format)?)
    }

    /// Short lowercase name of the encoded format, `"unknown"` if unrecognized
    #[must_use]
    pub fn detect_format_name(bytes: &[u8]) -> String {
        image::guess_format(bytes)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("unknown")
            .to_string()
    }

    /// Read an async stream to the end
    ///
    /// # Errors
    /// - Stream read failure
    pub async fn read_all<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            BgRemovalError::processing(format!("Failed to read from stream: {}", e))
        })?;
        Ok(buffer)
    }

    /// Load an image from an async reader
    ///
    /// # Examples
    /// ```rust,no_run
    /// use portrait_bgswap::services::ImageIOService;
    /// use tokio::fs::File;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let file = File::open("portrait.jpg").await?;
    /// let image = ImageIOService::load_from_reader(file).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - Stream read failure
    /// - Undecodable content
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(
        reader: R,
    ) -> Result<DynamicImage> {
        let buffer = Self::read_all(reader).await?;
        Self::load_from_bytes(&buffer)
    }

    /// Encode an image into memory
    ///
    /// # Errors
    /// - Encoder failure, or WebP requested without the `webp-support` feature
    pub fn encode_to_bytes(
        image: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        match format {
            OutputFormat::Rgba8 => return Ok(image.to_rgba8().into_raw()),
            OutputFormat::Jpeg => {
                let rgb_image = image.to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
                encoder.encode_image(&rgb_image)?;
            },
            OutputFormat::Png | OutputFormat::WebP | OutputFormat::Tiff => {
                let image_format =
                    OutputFormatHandler::image_format(format).unwrap_or(ImageFormat::Png);
                image
                    .write_to(&mut Cursor::new(&mut buffer), image_format)
                    .map_err(|e| {
                        BgRemovalError::processing_stage_error(
                            "image encoding",
                            &format!("Failed to encode as {}: {}", format, e),
                            Some(&format!("{}x{}", image.width(), image.height())),
                        )
                    })?;
            },
        }
        Ok(buffer)
    }

    /// Save an image to a file, creating parent directories as needed
    ///
    /// # Examples
    /// ```rust,no_run
    /// use portrait_bgswap::{services::ImageIOService, OutputFormat};
    /// use image::DynamicImage;
    ///
    /// # let image = DynamicImage::new_rgba8(100, 100);
    /// ImageIOService::save_image(&image, "out/result.png", OutputFormat::Png, 90)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - Directory creation or file write failure
    /// - Encoder failure
    pub fn save_image<P: AsRef<Path>>(
        image: &DynamicImage,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BgRemovalError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        let bytes = Self::encode_to_bytes(image, format, quality)?;
        std::fs::write(path_ref, &bytes)
            .map_err(|e| BgRemovalError::file_io_error("write output image", path_ref, &e))?;
        log::debug!(
            "Wrote {} bytes of {} to {}",
            bytes.len(),
            format,
            path_ref.display()
        );
        Ok(())
    }

    /// Encode an image and write it to an async writer
    ///
    /// # Errors
    /// - Encoder failure
    /// - Stream write or flush failure
    pub async fn save_to_writer<W: tokio::io::AsyncWrite + Unpin>(
        image: &DynamicImage,
        mut writer: W,
        format: OutputFormat,
        quality: u8,
    ) -> Result<u64> {
        use tokio::io::AsyncWriteExt;

        let bytes = Self::encode_to_bytes(image, format, quality)?;
        writer
            .write_all(&bytes)
            .await
            .map_err(|e| BgRemovalError::processing(format!("Failed to write to stream: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| BgRemovalError::processing(format!("Failed to flush stream: {}", e)))?;
        Ok(bytes.len() as u64)
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }
}

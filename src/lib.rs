#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Portrait Background Replacement
//!
//! Replaces the background of portrait-style photos with a flat color, using
//! no trained model. Each image goes through a fixed sequence of stages:
//!
//! 1. **Background estimation**: average the colors of the four corner squares
//! 2. **Classification**: mark pixels far from that color as foreground, with
//!    a protected center region and rules for bright, unsaturated backdrops
//! 3. **Component filtering**: keep only the largest 4-connected region
//! 4. **Refinement**: 3×3 morphological opening then closing
//! 5. **Feathering**: multi-pass separable box blur of the alpha mask
//! 6. **Compositing**: alpha-blend the subject over the backdrop color
//!
//! Results are deterministic: the same image and configuration always give the
//! same output bytes, with or without parallel execution.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use portrait_bgswap::{replace_background, BackgroundColor, RemovalConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .backdrop(BackgroundColor::new(240, 240, 240))
//!     .build()?;
//! let result = replace_background("portrait.jpg", &config)?;
//! result.save_png("portrait_swapped.png")?;
//!
//! for warning in &result.metadata.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Stage-Level Access
//!
//! The [`pipeline`] module exposes every stage as a free function over pixel
//! buffers and [`BinaryMask`], so stages can be run or tested in isolation.
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bars and tracing setup
//! - `webp-support` (default): WebP image format support
//! - `tracing-json`: JSON log output for the CLI
//! - `tracing-files`: log file output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! portrait-bgswap = { version = "0.1", default-features = false }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::path::Path;
use tokio::io::AsyncRead;

// Public API exports
pub use config::{
    BackgroundColor, ClassifierConfig, FeatherConfig, OutputFormat, RefinementConfig,
    RemovalConfig, RemovalConfigBuilder,
};
pub use error::{BgRemovalError, Result};
pub use pipeline::{
    run_pipeline, BackdropPipeline, BackgroundEstimate, BinaryMask, ComponentStats,
    PipelineOutput,
};
pub use processor::BackgroundRemovalProcessor;
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{
    MaskStatistics, ProcessingMetadata, ProcessingTimings, QualityWarning, RemovalResult,
    SegmentationMask, TimingBreakdown,
};
pub use utils::ColorParser;

#[cfg(feature = "cli")]
pub use tracing_config::{
    events, init_cli_tracing, new_session_id, spans, TracingConfig, TracingFormat, TracingGuard,
    TracingOutput,
};

/// Replace the background of a decoded image
///
/// # Examples
/// ```rust,no_run
/// use portrait_bgswap::{replace_background_from_image, RemovalConfig};
///
/// # fn example(img: image::DynamicImage) -> anyhow::Result<()> {
/// let result = replace_background_from_image(img, &RemovalConfig::default())?;
/// result.save_png("output.png")?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - Invalid configuration
/// - Zero-sized image
pub fn replace_background_from_image(
    image: image::DynamicImage,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_image(&image)
}

/// Replace the background of an encoded image held in memory
///
/// Suitable for servers receiving uploads; the format is detected from content.
///
/// # Examples
/// ```rust,no_run
/// use portrait_bgswap::{replace_background_from_bytes, OutputFormat, RemovalConfig};
///
/// # fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let config = RemovalConfig::default();
/// let result = replace_background_from_bytes(&upload_bytes, &config)?;
/// let jpeg = result.to_bytes(OutputFormat::Jpeg, config.jpeg_quality)?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - Invalid configuration
/// - Empty, unrecognized or corrupt image data
pub fn replace_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_bytes(image_bytes)
}

/// Replace the background of an image file
///
/// # Errors
/// - Invalid configuration
/// - File missing, unreadable or not an image
pub fn replace_background<P: AsRef<Path>>(
    input_path: P,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_file(input_path)
}

/// Replace the background of an image read from an async stream
///
/// The stream is read to the end, then the CPU-bound pipeline runs on tokio's
/// blocking pool so the calling runtime stays responsive.
///
/// # Examples
/// ```rust,no_run
/// use portrait_bgswap::{replace_background_from_reader, RemovalConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("portrait.jpg").await?;
/// let result = replace_background_from_reader(file, &RemovalConfig::default()).await?;
/// result.save_png("output.png")?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - Stream read failure
/// - Invalid configuration or undecodable data
pub async fn replace_background_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let buffer = ImageIOService::read_all(reader).await?;
    let config = config.clone();
    tokio::task::spawn_blocking(move || replace_background_from_bytes(&buffer, &config))
        .await
        .map_err(|e| BgRemovalError::internal(format!("Processing task failed: {}", e)))?
}

//! Error handling and edge case testing
//!
//! Covers invalid configuration, undecodable input, degenerate image sizes and
//! mismatched buffers across the public API.

use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use portrait_bgswap::{
    config::{BackgroundColor, OutputFormat, RemovalConfig},
    error::{BgRemovalError, Result},
    pipeline::{composite_with_mask, run_pipeline, BinaryMask},
    replace_background, replace_background_from_bytes, replace_background_from_image,
    types::SegmentationMask,
    BackdropPipeline, ColorParser, ImageIOService,
};
use tempfile::TempDir;

#[test]
fn test_config_validation_edge_cases() -> Result<()> {
    // Quality bounds
    let config = RemovalConfig::builder().jpeg_quality(0).build()?;
    assert_eq!(config.jpeg_quality, 0);
    let config = RemovalConfig::builder().jpeg_quality(150).build()?;
    assert_eq!(config.jpeg_quality, 100);

    let mut config = RemovalConfig::default();
    config.jpeg_quality = 101;
    assert!(matches!(
        config.validate(),
        Err(BgRemovalError::InvalidConfig(_))
    ));

    // Ratio and fraction bounds
    assert!(RemovalConfig::builder().protect_ratio(1.0).build().is_ok());
    assert!(RemovalConfig::builder().protect_ratio(-0.1).build().is_err());
    assert!(RemovalConfig::builder().sample_fraction(0.5).build().is_ok());
    assert!(RemovalConfig::builder().sample_fraction(0.0).build().is_err());
    assert!(RemovalConfig::builder().sample_fraction(0.6).build().is_err());

    // Threshold ordering
    assert!(RemovalConfig::builder()
        .similarity_thresholds(90.0, 40.0)
        .build()
        .is_err());
    assert!(RemovalConfig::builder()
        .similarity_thresholds(40.0, 40.0)
        .build()
        .is_ok());

    // Morphology and feathering limits
    assert!(RemovalConfig::builder().morph_iterations(32).build().is_ok());
    assert!(RemovalConfig::builder().morph_iterations(33).build().is_err());
    assert!(RemovalConfig::builder().blur_passes(0).build().is_ok());
    assert!(RemovalConfig::builder().blur_passes(17).build().is_err());
    assert!(RemovalConfig::builder().blur_radius(0).build().is_err());

    Ok(())
}

#[test]
fn test_invalid_config_errors_name_the_parameter() {
    let err = RemovalConfig::builder()
        .protect_ratio(2.5)
        .build()
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("protect ratio"), "{message}");
    assert!(message.contains("2.5"), "{message}");
}

#[test]
fn test_malformed_json_config() {
    assert!(matches!(
        RemovalConfig::from_json_str("{ not json"),
        Err(BgRemovalError::InvalidConfig(_))
    ));
    assert!(matches!(
        RemovalConfig::from_json_str(r#"{"jpeg_quality": "high"}"#),
        Err(BgRemovalError::InvalidConfig(_))
    ));
    // Parsed but out of range
    assert!(RemovalConfig::from_json_str(r#"{"classifier": {"protect_ratio": 3.0}}"#).is_err());
}

#[test]
fn test_zero_sized_images_are_rejected() {
    for (w, h) in [(0, 0), (0, 10), (10, 0)] {
        let result = run_pipeline(RgbaImage::new(w, h), &RemovalConfig::default());
        assert!(
            matches!(result, Err(BgRemovalError::InvalidInput(_))),
            "{w}x{h} should be rejected"
        );
    }

    let result = replace_background_from_image(DynamicImage::new_rgba8(0, 5), &RemovalConfig::default());
    assert!(result.is_err());
}

#[test]
fn test_single_pixel_image() -> Result<()> {
    let image = RgbaImage::from_pixel(1, 1, Rgba([200, 10, 10, 255]));
    let output = run_pipeline(image, &RemovalConfig::default())?;

    // Sole pixel is the center and the only corner sample
    assert_eq!(output.composite.dimensions(), (1, 1));
    assert_eq!(output.blur_radius, 1);
    assert_eq!(output.estimate.to_rgb8(), [200, 10, 10]);
    Ok(())
}

#[test]
fn test_thin_images_do_not_panic() -> Result<()> {
    let backdrop = BackgroundColor::new(1, 2, 3);
    for (w, h) in [(1, 50), (50, 1), (2, 3), (3, 2)] {
        let image = RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 5) as u8, (y * 5) as u8, 90, 255]));
        let config = RemovalConfig::builder().backdrop(backdrop).build()?;
        let output = run_pipeline(image, &config)?;
        assert_eq!(output.composite.dimensions(), (w, h));
        assert!(output.composite.pixels().all(|p| p[3] == 255));
    }
    Ok(())
}

#[test]
fn test_undecodable_bytes() {
    let config = RemovalConfig::default();
    assert!(matches!(
        replace_background_from_bytes(&[], &config),
        Err(BgRemovalError::InvalidInput(_))
    ));
    assert!(matches!(
        replace_background_from_bytes(b"plain text is not an image", &config),
        Err(BgRemovalError::UnsupportedFormat(_))
    ));

    // Valid PNG signature followed by garbage
    let mut truncated = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    truncated.extend_from_slice(&[0u8; 16]);
    assert!(matches!(
        replace_background_from_bytes(&truncated, &config),
        Err(BgRemovalError::Image(_))
    ));
}

#[test]
fn test_missing_and_non_image_files() -> Result<()> {
    let config = RemovalConfig::default();
    let err = replace_background("/nonexistent/dir/portrait.jpg", &config).unwrap_err();
    assert!(err.to_string().contains("portrait.jpg"));

    let temp = TempDir::new()?;
    let text_file = temp.path().join("notes.png");
    std::fs::write(&text_file, "not an image at all")?;
    assert!(replace_background(&text_file, &config).is_err());
    Ok(())
}

#[test]
fn test_mismatched_mask_dimensions() {
    let image = RgbaImage::new(8, 8);
    let mask = GrayImage::new(8, 7);
    let err = composite_with_mask(&image, &mask, BackgroundColor::white()).unwrap_err();
    assert!(matches!(err, BgRemovalError::InvalidInput(_)));
    assert!(err.to_string().contains("8x7"), "{err}");

    assert!(BinaryMask::from_raw(4, 4, vec![0; 15]).is_err());
    assert!(SegmentationMask::new(vec![0; 3], (2, 2)).to_image().is_err());
}

#[test]
fn test_invalid_backdrop_colors() {
    for input in ["", "#", "#12", "#12345", "#1234567", "#gggggg", "not-a-color"] {
        assert!(ColorParser::parse(input).is_err(), "{input:?} should be rejected");
    }
    assert!(ColorParser::parse("  WHITE ").is_ok());
}

#[test]
fn test_pipeline_rejects_invalid_config_up_front() {
    let mut config = RemovalConfig::default();
    config.refinement.candidate_threshold = 0;
    assert!(BackdropPipeline::new(config).is_err());
}

#[test]
fn test_rgba8_output_has_no_container() -> Result<()> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255])));
    let bytes = ImageIOService::encode_to_bytes(&image, OutputFormat::Rgba8, 90)?;
    assert_eq!(bytes.len(), 3 * 2 * 4);
    assert!(ImageIOService::load_from_bytes(&bytes).is_err());
    Ok(())
}

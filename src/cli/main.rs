//! Portrait background replacement CLI
//!
//! Command-line interface over [`BackgroundRemovalProcessor`].

use super::config::CliConfigBuilder;
use crate::{
    processor::BackgroundRemovalProcessor,
    services::{ConsoleProgressReporter, ImageIOService, OutputFormatHandler},
    tracing_config::{events, init_cli_tracing, new_session_id, spans},
    types::{QualityWarning, RemovalResult},
    OutputFormat, RemovalConfig,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Replace the background of portrait photos with a flat color
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "portrait-bgswap")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present = "print_config")]
    pub input: Vec<String>,

    /// Output file (single input) or directory (batch processing). Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format [default: png, or the value from --config]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// Backdrop color as hex (#RRGGBB, #RGB) or a name such as "white"
    #[arg(short, long, value_name = "COLOR")]
    pub backdrop: Option<String>,

    /// Write the subject with a feathered alpha channel instead of compositing
    #[arg(short, long)]
    pub transparent: bool,

    /// Also write the final alpha mask as a grayscale PNG next to each output (file outputs only)
    #[arg(long)]
    pub save_mask: bool,

    /// JSON configuration file; command-line flags override its values
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Corner sample square size as a fraction of the shorter side
    #[arg(long, value_name = "FRACTION")]
    pub sample_fraction: Option<f32>,

    /// Normalized center distance that is always kept as foreground
    #[arg(long, value_name = "RATIO")]
    pub protect_ratio: Option<f32>,

    /// Erode/dilate iterations for mask cleanup (0 disables)
    #[arg(long, value_name = "N")]
    pub morph_iterations: Option<u32>,

    /// Number of feathering blur passes (0 gives hard edges)
    #[arg(long, value_name = "N")]
    pub blur_passes: Option<u32>,

    /// Fixed feathering radius in pixels instead of the size-derived one
    #[arg(long, value_name = "PIXELS")]
    pub blur_radius: Option<u32>,

    /// JPEG quality (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub jpeg_quality: Option<u8>,

    /// Run every stage on a single thread
    #[arg(long)]
    pub sequential: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE with mask statistics)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for batch processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
    Tiff,
    Rgba8,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
            CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
        }
    }
}

/// Outcome counts for one CLI run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BatchSummary {
    processed: usize,
    failed: usize,
    degenerate: usize,
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = new_session_id();
    let _guard = init_cli_tracing(cli.verbose, &session_id).context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    if cli.print_config {
        println!("{}", config.to_json_string()?);
        return Ok(());
    }

    if cli.transparent {
        OutputFormatHandler::validate_for_cutout(config.output_format);
    }

    let backdrop = config.backdrop.to_string();
    let _session = spans::session(&session_id, &backdrop).entered();
    info!("Input(s): {}", cli.input.join(", "));
    debug!(config = ?config, "Effective configuration");

    let start_time = Instant::now();
    let summary = process_inputs(&cli, config)?;
    info!(
        "Processed {} image(s) in {:.2}s",
        summary.processed,
        start_time.elapsed().as_secs_f64()
    );

    if summary.failed > 0 {
        anyhow::bail!(
            "{} of {} input(s) failed to process",
            summary.failed,
            summary.processed + summary.failed
        );
    }
    Ok(())
}

fn build_processor(config: RemovalConfig, verbose: bool) -> Result<BackgroundRemovalProcessor> {
    let processor = BackgroundRemovalProcessor::new(config)
        .context("Failed to create background replacement processor")?;
    Ok(if verbose {
        processor.with_progress_reporter(Box::new(ConsoleProgressReporter::new(true)))
    } else {
        processor
    })
}

fn process_inputs(cli: &Cli, config: RemovalConfig) -> Result<BatchSummary> {
    check_output_flags(cli)?;

    if reads_stdin(cli) {
        let mut processor = build_processor(config, cli.verbose > 0)?;
        return process_stdin(cli, &mut processor);
    }

    let all_files = collect_input_files(cli)?;
    if all_files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(BatchSummary::default());
    }

    let file_count = all_files.len();
    let _batch = spans::batch_processing(file_count).entered();
    info!("Found {} image file(s) to process", file_count);

    // Per-stage console output would fight with the bar in batch mode
    let mut processor = build_processor(config, cli.verbose > 0 && file_count == 1)?;
    let output_format = processor.config().output_format;

    let output_dir = if file_count > 1 {
        prepare_output_dir(cli.output.as_deref())?
    } else {
        None
    };

    let progress = if file_count > 1 {
        let pb = ProgressBar::new(file_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let batch_start = Instant::now();
    let mut summary = BatchSummary::default();

    for input_file in &all_files {
        if let Some(pb) = &progress {
            pb.set_message(format!("{}", input_file.display()));
        }

        let output_path = match (&output_dir, file_count) {
            (_, 1) => cli.output.as_ref().map(PathBuf::from),
            (Some(dir), _) => Some(generate_output_path_with_dir(input_file, dir, output_format)),
            (None, _) => None,
        };

        match process_single_file(cli, &mut processor, input_file, output_path.as_deref()) {
            Ok(degenerate) => {
                summary.processed += 1;
                if degenerate {
                    summary.degenerate += 1;
                }
            },
            Err(e) => {
                events::error_with_context(
                    e.as_ref(),
                    &format!("processing {}", input_file.display()),
                );
                summary.failed += 1;
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Done: {} processed, {} failed",
            summary.processed, summary.failed
        ));
    }

    if file_count > 1 {
        let elapsed = batch_start.elapsed().as_secs_f64();
        info!(
            "Batch summary: {} processed, {} failed, {} without foreground, {:.2}s total, {:.2}s per file",
            summary.processed,
            summary.failed,
            summary.degenerate,
            elapsed,
            if summary.processed > 0 {
                elapsed / summary.processed as f64
            } else {
                0.0
            }
        );
    }

    Ok(summary)
}

fn reads_stdin(cli: &Cli) -> bool {
    cli.input.len() == 1 && cli.input.first().is_some_and(|s| s == "-")
}

/// Reject flag combinations that cannot be honored
fn check_output_flags(cli: &Cli) -> Result<()> {
    let to_stdout = match cli.output.as_deref() {
        Some(target) => target == "-",
        None => reads_stdin(cli),
    };
    if cli.save_mask && to_stdout {
        anyhow::bail!("--save-mask needs a file output; it cannot be combined with writing to stdout");
    }
    Ok(())
}

/// Expand CLI inputs into a sorted list of image files
fn collect_input_files(cli: &Cli) -> Result<Vec<PathBuf>> {
    let mut all_files = Vec::new();

    for input in &cli.input {
        let path = PathBuf::from(input);
        if path.is_file() {
            if ImageIOService::is_supported_format(&path) {
                all_files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            all_files.extend(find_image_files(&path, cli.recursive, cli.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    // Deterministic processing order
    all_files.sort();
    all_files.dedup();
    Ok(all_files)
}

fn prepare_output_dir(output: Option<&str>) -> Result<Option<PathBuf>> {
    let Some(output) = output else {
        return Ok(None);
    };
    if output == "-" {
        anyhow::bail!("Cannot use stdout (-) as output when processing multiple files");
    }
    let output_path = PathBuf::from(output);
    if output_path.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output_path.display()
        );
    }
    std::fs::create_dir_all(&output_path).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;
    Ok(Some(output_path))
}

fn process_stdin(cli: &Cli, processor: &mut BackgroundRemovalProcessor) -> Result<BatchSummary> {
    info!("Reading image from stdin");
    let image_data = read_stdin()?;

    let result = processor.process_bytes(&image_data).with_context(|| {
        format!(
            "Failed to process stdin data (detected format: {})",
            ImageIOService::detect_format_name(&image_data)
        )
    })?;
    let degenerate = report_warnings(&result, Path::new("<stdin>"));

    match cli.output.as_deref() {
        Some(target) if target != "-" => {
            let output_path = PathBuf::from(target);
            save_result(cli, processor.config(), result, &output_path)?;
        },
        _ => {
            let bytes = encode_result(cli.transparent, processor.config(), &result)?;
            write_stdout(&bytes)?;
            info!("Image written to stdout");
        },
    }

    Ok(BatchSummary {
        processed: 1,
        failed: 0,
        degenerate: usize::from(degenerate),
    })
}

/// Process one file; returns whether the result had no foreground
fn process_single_file(
    cli: &Cli,
    processor: &mut BackgroundRemovalProcessor,
    input_path: &Path,
    output_path: Option<&Path>,
) -> Result<bool> {
    let format = processor.config().output_format;
    let _span = spans::file_processing(input_path, &format.to_string()).entered();

    let result = processor
        .process_file(input_path)
        .context("Failed to replace background")?;
    let degenerate = report_warnings(&result, input_path);
    debug!("{}", result.timing_summary());

    match output_path {
        Some(target) if target == Path::new("-") => {
            let bytes = encode_result(cli.transparent, processor.config(), &result)?;
            write_stdout(&bytes)?;
        },
        Some(target) => save_result(cli, processor.config(), result, target)?,
        None => {
            let target = generate_output_path(input_path, format);
            save_result(cli, processor.config(), result, &target)?;
        },
    }

    Ok(degenerate)
}

fn encode_result(transparent: bool, config: &RemovalConfig, result: &RemovalResult) -> Result<Vec<u8>> {
    let bytes = if transparent {
        result.cutout_to_bytes(config.output_format, config.jpeg_quality)?
    } else {
        result.to_bytes(config.output_format, config.jpeg_quality)?
    };
    Ok(bytes)
}

fn save_result(
    cli: &Cli,
    config: &RemovalConfig,
    mut result: RemovalResult,
    output_path: &Path,
) -> Result<()> {
    let save_start = Instant::now();
    if cli.transparent {
        let cutout = image::DynamicImage::ImageRgba8(result.cutout.clone());
        ImageIOService::save_image(&cutout, output_path, config.output_format, config.jpeg_quality)
            .context("Failed to save cutout")?;
    } else {
        result
            .save_with_timing(output_path, config.output_format, config.jpeg_quality)
            .context("Failed to save result")?;
    }
    events::performance_metric("save", save_start.elapsed().as_millis() as u64);

    if cli.save_mask {
        let mask_path = mask_output_path(output_path);
        result
            .mask
            .save_png(&mask_path)
            .with_context(|| format!("Failed to save mask: {}", mask_path.display()))?;
        info!("Mask saved to: {}", mask_path.display());
    }
    Ok(())
}

/// Log quality warnings; returns whether the result had no foreground
fn report_warnings(result: &RemovalResult, input_path: &Path) -> bool {
    for warning in &result.metadata.warnings {
        let recommendation = match warning {
            QualityWarning::NoForeground => {
                "the subject may match the corner colors; try a larger --protect-ratio or a smaller --sample-fraction"
            },
            QualityWarning::BackdropMatchesBackground => {
                "pick a --backdrop that contrasts with the original background"
            },
        };
        events::warning_with_recommendation(
            &format!("{}: {}", input_path.display(), warning),
            recommendation,
        );
    }
    result.is_degenerate()
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read image data from stdin")?;

    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }

    Ok(buffer)
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file()
            && ImageIOService::is_supported_format(path)
            && matches_pattern(path, pattern)
        {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Check if the file name matches the given glob pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat).is_ok_and(|p| p.matches(filename))
            }),
        None => true,
    }
}

fn output_file_name(input_path: &Path, format: OutputFormat) -> String {
    let stem = input_path.file_stem().unwrap_or_default();
    format!(
        "{}_bgswap.{}",
        stem.to_string_lossy(),
        OutputFormatHandler::get_extension(format)
    )
}

/// Output path next to the input
fn generate_output_path(input_path: &Path, format: OutputFormat) -> PathBuf {
    let dir = input_path.parent().unwrap_or(Path::new("."));
    dir.join(output_file_name(input_path, format))
}

/// Output path inside a batch output directory
fn generate_output_path_with_dir(input_path: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    output_dir.join(output_file_name(input_path, format))
}

/// Mask path derived from an output path: `photo_bgswap.jpg` -> `photo_bgswap_mask.png`
fn mask_output_path(output_path: &Path) -> PathBuf {
    let stem = output_path.file_stem().unwrap_or_default();
    output_path.with_file_name(format!("{}_mask.png", stem.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_portrait(path: &Path) {
        let image = RgbaImage::from_fn(32, 32, |x, y| {
            if (8..24).contains(&x) && (8..24).contains(&y) {
                Rgba([190, 50, 40, 255])
            } else {
                Rgba([40, 110, 190, 255])
            }
        });
        ImageIOService::save_image(
            &DynamicImage::ImageRgba8(image),
            path,
            OutputFormat::Png,
            90,
        )
        .unwrap();
    }

    #[test]
    fn test_cli_parses_tuning_flags() {
        let cli = Cli::try_parse_from([
            "portrait-bgswap",
            "in.jpg",
            "--backdrop",
            "#00ff00",
            "--format",
            "jpeg",
            "--morph-iterations",
            "2",
            "--blur-passes",
            "0",
            "-vv",
            "--transparent",
        ])
        .unwrap();

        assert_eq!(cli.input, vec!["in.jpg".to_string()]);
        assert_eq!(cli.backdrop.as_deref(), Some("#00ff00"));
        assert_eq!(cli.format, Some(CliOutputFormat::Jpeg));
        assert_eq!(cli.morph_iterations, Some(2));
        assert_eq!(cli.blur_passes, Some(0));
        assert_eq!(cli.verbose, 2);
        assert!(cli.transparent);
        assert!(!cli.save_mask);
    }

    #[test]
    fn test_cli_requires_input_unless_printing_config() {
        assert!(Cli::try_parse_from(["portrait-bgswap"]).is_err());
        assert!(Cli::try_parse_from(["portrait-bgswap", "--print-config"]).is_ok());
    }

    #[test]
    fn test_cli_rejects_out_of_range_quality() {
        assert!(Cli::try_parse_from(["portrait-bgswap", "a.png", "--jpeg-quality", "101"]).is_err());
    }

    #[test]
    fn test_cli_output_format_conversion() {
        assert_eq!(OutputFormat::from(CliOutputFormat::Webp), OutputFormat::WebP);
        assert_eq!(OutputFormat::from(CliOutputFormat::Rgba8), OutputFormat::Rgba8);
    }

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern(Path::new("dir/photo.jpg"), Some("*.jpg")));
        assert!(!matches_pattern(Path::new("dir/photo.png"), Some("*.jpg")));
        assert!(matches_pattern(Path::new("photo.png"), None));
        assert!(!matches_pattern(Path::new("photo.png"), Some("[invalid")));
    }

    #[test]
    fn test_generate_output_paths() {
        assert_eq!(
            generate_output_path(Path::new("/photos/me.jpeg"), OutputFormat::Png),
            PathBuf::from("/photos/me_bgswap.png")
        );
        assert_eq!(
            generate_output_path_with_dir(Path::new("a/b/me.png"), Path::new("out"), OutputFormat::Jpeg),
            PathBuf::from("out/me_bgswap.jpg")
        );
        assert_eq!(
            mask_output_path(Path::new("out/me_bgswap.jpg")),
            PathBuf::from("out/me_bgswap_mask.png")
        );
    }

    #[test]
    fn test_find_image_files_respects_recursion_and_pattern() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write_portrait(&dir.path().join("b.png"));
        write_portrait(&dir.path().join("a.png"));
        write_portrait(&dir.path().join("nested/c.png"));
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut flat = find_image_files(dir.path(), false, None).unwrap();
        flat.sort();
        assert_eq!(flat.len(), 2);
        assert!(flat[0].ends_with("a.png"));

        assert_eq!(find_image_files(dir.path(), true, None).unwrap().len(), 3);
        assert_eq!(find_image_files(dir.path(), true, Some("c.*")).unwrap().len(), 1);
    }

    #[test]
    fn test_batch_writes_outputs_and_masks() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        write_portrait(&dir.path().join("one.png"));
        write_portrait(&dir.path().join("two.png"));

        let cli = Cli::try_parse_from([
            "portrait-bgswap",
            dir.path().to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
            "--save-mask",
        ])
        .unwrap();
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        let summary = process_inputs(&cli, config).unwrap();

        assert_eq!(summary, BatchSummary { processed: 2, failed: 0, degenerate: 0 });
        for name in ["one_bgswap.png", "one_bgswap_mask.png", "two_bgswap.png", "two_bgswap_mask.png"] {
            assert!(out.join(name).exists(), "missing {name}");
        }
    }

    #[test]
    fn test_transparent_output_keeps_alpha() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("cutout.png");
        write_portrait(&input);

        let cli = Cli::try_parse_from([
            "portrait-bgswap",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--transparent",
        ])
        .unwrap();
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        process_inputs(&cli, config).unwrap();

        let saved = ImageIOService::load_image(&output).unwrap().to_rgba8();
        assert_eq!(saved.get_pixel(0, 0)[3], 0);
        assert_eq!(saved.get_pixel(16, 16)[3], 255);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let cli = Cli::try_parse_from(["portrait-bgswap", "/nonexistent/input.png"]).unwrap();
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert!(process_inputs(&cli, config).is_err());
    }

    #[test]
    fn test_save_mask_rejected_when_writing_to_stdout() {
        for args in [
            vec!["portrait-bgswap", "-", "--save-mask"],
            vec!["portrait-bgswap", "-", "-o", "-", "--save-mask"],
            vec!["portrait-bgswap", "in.png", "-o", "-", "--save-mask"],
        ] {
            let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
            let err = check_output_flags(&cli).unwrap_err();
            assert!(err.to_string().contains("--save-mask"), "{args:?}");

            let config = CliConfigBuilder::from_cli(&cli).unwrap();
            assert!(process_inputs(&cli, config).is_err(), "{args:?}");
        }

        for args in [
            vec!["portrait-bgswap", "-", "-o", "out.png", "--save-mask"],
            vec!["portrait-bgswap", "in.png", "--save-mask"],
            vec!["portrait-bgswap", "-"],
        ] {
            let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
            assert!(check_output_flags(&cli).is_ok(), "{args:?}");
        }
    }

    #[test]
    fn test_failed_file_is_counted_and_batch_continues() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        write_portrait(&dir.path().join("good.png"));
        std::fs::write(dir.path().join("broken.png"), "not an image").unwrap();

        let cli = Cli::try_parse_from([
            "portrait-bgswap",
            dir.path().to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        let summary = process_inputs(&cli, config).unwrap();

        assert_eq!(summary, BatchSummary { processed: 1, failed: 1, degenerate: 0 });
        assert!(out.join("good_bgswap.png").exists());
        assert!(!out.join("broken_bgswap.png").exists());
    }

    #[test]
    fn test_stdout_target_rejected_for_batches() {
        assert!(prepare_output_dir(Some("-")).is_err());
        assert!(prepare_output_dir(None).unwrap().is_none());
    }
}

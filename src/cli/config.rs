//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{RemovalConfig, RemovalConfigBuilder},
    utils::ColorParser,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a validated `RemovalConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a `RemovalConfig` from CLI arguments
    ///
    /// Starts from `--config` when given (defaults otherwise), then applies
    /// each explicitly passed flag on top.
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalConfig> {
        let base = match &cli.config {
            Some(path) => RemovalConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => RemovalConfig::default(),
        };
        let mut builder = RemovalConfigBuilder::from_config(base);

        if let Some(format) = cli.format {
            builder = builder.output_format(format.into());
        }
        if let Some(spec) = &cli.backdrop {
            let color = ColorParser::parse(spec)
                .with_context(|| format!("Invalid --backdrop color '{}'", spec))?;
            builder = builder.backdrop(color);
        }
        if let Some(quality) = cli.jpeg_quality {
            builder = builder.jpeg_quality(quality);
        }
        if let Some(fraction) = cli.sample_fraction {
            builder = builder.sample_fraction(fraction);
        }
        if let Some(ratio) = cli.protect_ratio {
            builder = builder.protect_ratio(ratio);
        }
        if let Some(iterations) = cli.morph_iterations {
            builder = builder.morph_iterations(iterations);
        }
        if let Some(passes) = cli.blur_passes {
            builder = builder.blur_passes(passes);
        }
        if let Some(radius) = cli.blur_radius {
            builder = builder.blur_radius(radius);
        }
        if cli.sequential {
            builder = builder.parallel(false);
        }
        if cli.verbose >= 2 {
            builder = builder.debug(true);
        }

        builder.build().context("Invalid configuration")
    }
}

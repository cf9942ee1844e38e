//! Backdrop color parsing and formatting

use crate::{
    config::BackgroundColor,
    error::{BgRemovalError, Result},
};

/// Names accepted in place of a hex code
const NAMED_COLORS: &[(&str, BackgroundColor)] = &[
    ("white", BackgroundColor { r: 255, g: 255, b: 255 }),
    ("black", BackgroundColor { r: 0, g: 0, b: 0 }),
    ("lightgray", BackgroundColor { r: 240, g: 240, b: 240 }),
    ("gray", BackgroundColor { r: 128, g: 128, b: 128 }),
    ("navy", BackgroundColor { r: 0, g: 0, b: 128 }),
    ("blue", BackgroundColor { r: 0, g: 0, b: 255 }),
    ("red", BackgroundColor { r: 255, g: 0, b: 0 }),
    ("green", BackgroundColor { r: 0, g: 128, b: 0 }),
];

/// Utility for parsing and converting colors
pub struct ColorParser;

impl ColorParser {
    /// Parse a hex color string
    ///
    /// Supports `#RRGGBB` and `#RGB`, with or without the `#`.
    ///
    /// # Examples
    /// ```rust
    /// use portrait_bgswap::utils::ColorParser;
    ///
    /// let red = ColorParser::parse_hex("#f00")?;
    /// assert_eq!((red.r, red.g, red.b), (255, 0, 0));
    /// # Ok::<(), portrait_bgswap::BgRemovalError>(())
    /// ```
    ///
    /// # Errors
    /// - Wrong length or non-hex digits
    pub fn parse_hex(hex: &str) -> Result<BackgroundColor> {
        if !Self::is_valid_hex(hex) {
            return Err(BgRemovalError::invalid_config(format!(
                "Color '{}' must be in #RRGGBB or #RGB format",
                hex
            )));
        }

        let hex = hex.trim_start_matches('#');
        let channel = |s: &str| {
            u8::from_str_radix(s, 16).map_err(|_| {
                BgRemovalError::invalid_config(format!("Invalid hex component '{}'", s))
            })
        };

        if hex.len() == 6 {
            Ok(BackgroundColor::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            ))
        } else {
            Ok(BackgroundColor::new(
                channel(&hex[0..1])? * 17,
                channel(&hex[1..2])? * 17,
                channel(&hex[2..3])? * 17,
            ))
        }
    }

    /// Parse a hex code or one of the named colors (case-insensitive)
    ///
    /// # Errors
    /// - Neither a known name nor a valid hex code
    pub fn parse(value: &str) -> Result<BackgroundColor> {
        let lowered = value.trim().to_lowercase();
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lowered)
            .map(|(_, color)| Ok(*color))
            .unwrap_or_else(|| Self::parse_hex(value.trim()))
    }

    /// Convert a color to a hex string
    #[must_use]
    pub fn to_hex(color: &BackgroundColor, include_hash: bool) -> String {
        if include_hash {
            format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
        } else {
            format!("{:02x}{:02x}{:02x}", color.r, color.g, color.b)
        }
    }

    /// Validate hex color format without parsing
    #[must_use]
    fn is_valid_hex(hex: &str) -> bool {
        let hex = hex.trim_start_matches('#');
        (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Names accepted by [`ColorParser::parse`]
    pub fn named_colors() -> impl Iterator<Item = &'static str> {
        NAMED_COLORS.iter().map(|(name, _)| *name)
    }
}

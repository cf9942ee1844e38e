//! Alpha compositing onto a flat backdrop

use crate::config::BackgroundColor;
use crate::error::{BgRemovalError, Result};
use image::{GrayImage, Rgba, RgbaImage};

/// Integer form of `bg * (1 - a/255) + fg * (a/255)`, exact at `a = 0` and `a = 255`
#[inline]
#[must_use]
pub fn blend_channel(background: u8, foreground: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let value = (u32::from(background) * (255 - a) + u32::from(foreground) * a + 127) / 255;
    value as u8
}

/// Paint `backdrop` and draw `foreground` over it using its own alpha channel
///
/// The result is fully opaque and has the same dimensions as `foreground`.
#[must_use]
pub fn composite(foreground: &RgbaImage, backdrop: BackgroundColor) -> RgbaImage {
    let (width, height) = foreground.dimensions();
    let mut output = RgbaImage::from_pixel(width, height, backdrop.to_rgba());

    for (out, src) in output.pixels_mut().zip(foreground.pixels()) {
        let alpha = src[3];
        *out = Rgba([
            blend_channel(backdrop.r, src[0], alpha),
            blend_channel(backdrop.g, src[1], alpha),
            blend_channel(backdrop.b, src[2], alpha),
            255,
        ]);
    }
    output
}

/// Composite using a separate alpha mask instead of the image's alpha channel
///
/// # Errors
/// - Mask dimensions differ from the image dimensions
pub fn composite_with_mask(
    foreground: &RgbaImage,
    alpha: &GrayImage,
    backdrop: BackgroundColor,
) -> Result<RgbaImage> {
    if foreground.dimensions() != alpha.dimensions() {
        return Err(BgRemovalError::dimension_mismatch(
            "alpha mask",
            foreground.dimensions(),
            alpha.dimensions(),
        ));
    }

    let mut cutout = foreground.clone();
    for (pixel, mask) in cutout.pixels_mut().zip(alpha.pixels()) {
        pixel[3] = mask[0];
    }
    Ok(composite(&cutout, backdrop))
}

//! Background color estimation from the four image corners
//!
//! Corners are the region least likely to contain subject pixels in a centered
//! portrait, so averaging them gives a background sample with little skin or
//! hair contamination.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Averaged RGB of the corner sampling squares
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundEstimate {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    /// Number of pixel samples that went into the average
    pub samples: u64,
}

impl BackgroundEstimate {
    /// Euclidean distance in RGB space
    #[inline]
    #[must_use]
    pub fn distance(&self, r: u8, g: u8, b: u8) -> f32 {
        let dr = f32::from(r) - self.r;
        let dg = f32::from(g) - self.g;
        let db = f32::from(b) - self.b;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// Estimate rounded to 8-bit channels
    #[must_use]
    pub fn to_rgb8(&self) -> [u8; 3] {
        [
            self.r.round().clamp(0.0, 255.0) as u8,
            self.g.round().clamp(0.0, 255.0) as u8,
            self.b.round().clamp(0.0, 255.0) as u8,
        ]
    }
}

/// Side length of each corner square: `floor(fraction * min(w, h))`, at least 1
#[must_use]
pub fn corner_window(width: u32, height: u32, fraction: f32) -> u32 {
    let short_side = width.min(height);
    let side = (fraction * short_side as f32).floor() as u32;
    side.clamp(1, short_side.max(1))
}

/// Average the RGB channels over four corner squares
///
/// Squares overlap on very small images; each square is sampled on its own,
/// so shared pixels are counted once per square. Zero-sized images return a
/// zero estimate with `samples == 0`; callers validate dimensions first.
#[must_use]
pub fn estimate_background(image: &RgbaImage, fraction: f32) -> BackgroundEstimate {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return BackgroundEstimate {
            r: 0.0,
            g: 0.0,
            b: 0.0,
            samples: 0,
        };
    }

    let side = corner_window(width, height, fraction);
    let far_x = width - side;
    let far_y = height - side;
    let origins = [(0, 0), (far_x, 0), (0, far_y), (far_x, far_y)];

    let mut sum = [0_u64; 3];
    let mut samples = 0_u64;
    for (ox, oy) in origins {
        for y in oy..oy + side {
            for x in ox..ox + side {
                let pixel = image.get_pixel(x, y);
                sum[0] += u64::from(pixel[0]);
                sum[1] += u64::from(pixel[1]);
                sum[2] += u64::from(pixel[2]);
                samples += 1;
            }
        }
    }

    let n = samples as f64;
    BackgroundEstimate {
        r: (sum[0] as f64 / n) as f32,
        g: (sum[1] as f64 / n) as f32,
        b: (sum[2] as f64 / n) as f32,
        samples,
    }
}

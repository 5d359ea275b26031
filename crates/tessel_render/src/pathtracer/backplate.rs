//! Background image shown behind camera rays that escape the scene.

use std::path::Path;

use image::DynamicImage;
use tessel_core::{Color, Vec2};

use crate::RenderResult;

/// Linear RGB image sampled in screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct Backplate {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

impl Backplate {
    /// Load an image file. 8-bit sources are treated as sRGB encoded, float
    /// sources as linear.
    pub fn from_image(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let image = image::open(path)?;
        let plate = Self::from_dynamic(&image);
        log::info!(
            "Loaded backplate {} ({}x{})",
            path.display(),
            plate.width,
            plate.height
        );
        Ok(plate)
    }

    /// Convert a decoded image, linearizing 8-bit sRGB sources.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        let linear = matches!(
            image,
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)
        );
        let rgb = image.to_rgb32f();
        let pixels = rgb
            .pixels()
            .map(|p| {
                let c = Color::new(p[0], p[1], p[2]);
                if linear {
                    c
                } else {
                    Color::new(srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z))
                }
            })
            .collect();
        Self {
            width: rgb.width(),
            height: rgb.height(),
            pixels,
        }
    }

    /// Single-color backplate.
    pub fn solid(color: Color) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![color],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest pixel at a normalized screen position, `(0, 0)` top-left.
    pub fn sample(&self, screen: Vec2) -> Color {
        if self.pixels.is_empty() {
            return Color::ZERO;
        }
        let x = ((screen.x.clamp(0.0, 1.0) * self.width as f32) as u32).min(self.width - 1);
        let y = ((screen.y.clamp(0.0, 1.0) * self.height as f32) as u32).min(self.height - 1);
        self.pixels[(y * self.width + x) as usize]
    }
}

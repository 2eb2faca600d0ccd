//! The per-image transform chain.
//!
//! A chain is an ordered list of [`Stage`] values dispatched through a single
//! [`Stage::apply`]. Each stage takes the image by value and hands back the
//! image for the next stage, so nothing is copied between stages unless the
//! underlying operation itself allocates a new buffer.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImage, GenericImageView, ImageBuffer, Pixel};
use thiserror::Error;

use crate::config::TransformConfig;

/// A stage rejected its input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage}: {message}")]
pub struct StageError {
    /// Name of the failing stage
    pub stage: &'static str,
    pub message: String,
}

/// 3x3 convolution kernels used by the stress pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Emboss,
    FindEdges,
    Contour,
    EdgeEnhance,
    Smooth,
}

impl Kernel {
    /// All kernels in the order the stress pipeline applies them.
    pub const ALL: [Kernel; 5] = [
        Kernel::Emboss,
        Kernel::FindEdges,
        Kernel::Contour,
        Kernel::EdgeEnhance,
        Kernel::Smooth,
    ];

    fn name(self) -> &'static str {
        match self {
            Kernel::Emboss => "emboss",
            Kernel::FindEdges => "find_edges",
            Kernel::Contour => "contour",
            Kernel::EdgeEnhance => "edge_enhance",
            Kernel::Smooth => "smooth",
        }
    }

    // filter3x3 normalizes by the weight sum (1 when the sum is 0).
    fn weights(self) -> [f32; 9] {
        match self {
            Kernel::Emboss => [-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            Kernel::FindEdges | Kernel::Contour => {
                [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0]
            }
            Kernel::EdgeEnhance => [-1.0, -1.0, -1.0, -1.0, 10.0, -1.0, -1.0, -1.0, -1.0],
            Kernel::Smooth => SMOOTH,
        }
    }
}

const SMOOTH: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];
const SMOOTH_SUM: f32 = 13.0;

/// One step of the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    Resize { width: u32, height: u32 },
    Blur { radius: f32 },
    Sharpen { factor: f32 },
    Contrast { factor: f32 },
    Brightness { factor: f32 },
    Filter(Kernel),
}

impl Stage {
    /// Stage name used in logs and failure records.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Resize { .. } => "resize",
            Stage::Blur { .. } => "blur",
            Stage::Sharpen { .. } => "sharpen",
            Stage::Contrast { .. } => "contrast",
            Stage::Brightness { .. } => "brightness",
            Stage::Filter(kernel) => kernel.name(),
        }
    }

    /// Apply this stage, consuming the input image.
    pub fn apply(&self, image: DynamicImage) -> Result<DynamicImage, StageError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(self.reject("input image has no pixels"));
        }

        match *self {
            Stage::Resize { width, height } => {
                if width == 0 || height == 0 {
                    return Err(self.reject(format!("invalid target size {width}x{height}")));
                }
                if image.width() == width && image.height() == height {
                    return Ok(image);
                }
                Ok(image.resize_exact(width, height, FilterType::Lanczos3))
            }
            Stage::Blur { radius } => {
                self.check_factor(radius)?;
                if radius == 0.0 {
                    return Ok(image);
                }
                Ok(image.blur(radius))
            }
            Stage::Sharpen { factor } => {
                self.check_factor(factor)?;
                if factor == 1.0 {
                    return Ok(image);
                }
                // Blend between the smoothed image and the original:
                // factor * identity + (1 - factor) * smooth, as one kernel.
                let mut kernel = SMOOTH.map(|w| (1.0 - factor) * w / SMOOTH_SUM);
                kernel[4] += factor;
                let mut out = image.filter3x3(&kernel);
                restore_border(&image, &mut out);
                Ok(out)
            }
            Stage::Contrast { factor } => {
                self.check_factor(factor)?;
                if factor == 1.0 {
                    return Ok(image);
                }
                // adjust_contrast scales by ((100 + c) / 100)^2
                Ok(image.adjust_contrast((factor.sqrt() - 1.0) * 100.0))
            }
            Stage::Brightness { factor } => {
                self.check_factor(factor)?;
                if factor == 1.0 {
                    return Ok(image);
                }
                Ok(scale_brightness(image, factor))
            }
            Stage::Filter(kernel) => {
                // Convolving alpha would erase it under edge kernels
                let image = if image.color().has_alpha() {
                    DynamicImage::ImageRgb8(image.into_rgb8())
                } else {
                    image
                };
                let mut out = image.filter3x3(&kernel.weights());
                restore_border(&image, &mut out);
                match kernel {
                    Kernel::Emboss => out = out.brighten(128),
                    Kernel::Contour => out.invert(),
                    _ => {}
                }
                Ok(out)
            }
        }
    }

    fn check_factor(&self, value: f32) -> Result<(), StageError> {
        if !value.is_finite() || value < 0.0 {
            return Err(self.reject(format!("parameter must be finite and >= 0, got {value}")));
        }
        Ok(())
    }

    fn reject(&self, message: impl Into<String>) -> StageError {
        StageError {
            stage: self.name(),
            message: message.into(),
        }
    }
}

/// Multiply every color channel by `factor`, saturating at the channel
/// maximum. Alpha is left alone.
fn scale_brightness(image: DynamicImage, factor: f32) -> DynamicImage {
    let scale_u8 = |c: u8| (f32::from(c) * factor).round().min(255.0) as u8;
    let scale_u16 = |c: u16| (f32::from(c) * factor).round().min(65535.0) as u16;
    let scale_f32 = |c: f32| c * factor;

    match image {
        DynamicImage::ImageLuma8(mut buf) => {
            scale_channels(&mut buf, scale_u8);
            buf.into()
        }
        DynamicImage::ImageLumaA8(mut buf) => {
            scale_channels(&mut buf, scale_u8);
            buf.into()
        }
        DynamicImage::ImageRgb8(mut buf) => {
            scale_channels(&mut buf, scale_u8);
            buf.into()
        }
        DynamicImage::ImageRgba8(mut buf) => {
            scale_channels(&mut buf, scale_u8);
            buf.into()
        }
        DynamicImage::ImageLuma16(mut buf) => {
            scale_channels(&mut buf, scale_u16);
            buf.into()
        }
        DynamicImage::ImageLumaA16(mut buf) => {
            scale_channels(&mut buf, scale_u16);
            buf.into()
        }
        DynamicImage::ImageRgb16(mut buf) => {
            scale_channels(&mut buf, scale_u16);
            buf.into()
        }
        DynamicImage::ImageRgba16(mut buf) => {
            scale_channels(&mut buf, scale_u16);
            buf.into()
        }
        DynamicImage::ImageRgb32F(mut buf) => {
            scale_channels(&mut buf, scale_f32);
            buf.into()
        }
        DynamicImage::ImageRgba32F(mut buf) => {
            scale_channels(&mut buf, scale_f32);
            buf.into()
        }
        other => {
            let mut buf = other.into_rgba8();
            scale_channels(&mut buf, scale_u8);
            buf.into()
        }
    }
}

fn scale_channels<P: Pixel>(
    buffer: &mut ImageBuffer<P, Vec<P::Subpixel>>,
    scale: impl Fn(P::Subpixel) -> P::Subpixel,
) {
    for pixel in buffer.pixels_mut() {
        pixel.apply_without_alpha(&scale);
    }
}

/// filter3x3 leaves the outermost pixel ring zeroed; carry it over from the
/// stage input instead.
fn restore_border(input: &DynamicImage, out: &mut DynamicImage) {
    let (width, height) = input.dimensions();
    for x in 0..width {
        out.put_pixel(x, 0, input.get_pixel(x, 0));
        out.put_pixel(x, height - 1, input.get_pixel(x, height - 1));
    }
    for y in 0..height {
        out.put_pixel(0, y, input.get_pixel(0, y));
        out.put_pixel(width - 1, y, input.get_pixel(width - 1, y));
    }
}

/// Ordered stages plus a repeat count.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformChain {
    stages: Vec<Stage>,
    iterations: u32,
}

impl TransformChain {
    /// Build a chain from explicit stages.
    pub fn new(stages: Vec<Stage>, iterations: u32) -> Self {
        Self {
            stages,
            iterations: iterations.max(1),
        }
    }

    /// Resize, Blur, Sharpen, Contrast, Brightness.
    pub fn standard(config: &TransformConfig) -> Self {
        let (width, height) = config.resize;
        Self::new(
            vec![
                Stage::Resize { width, height },
                Stage::Blur {
                    radius: config.blur_radius,
                },
                Stage::Sharpen {
                    factor: config.sharpen_factor,
                },
                Stage::Contrast {
                    factor: config.contrast_factor,
                },
                Stage::Brightness {
                    factor: config.brightness_factor,
                },
            ],
            config.iteration_count,
        )
    }

    /// The standard chain, optionally followed by every convolution filter.
    pub fn stress(config: &TransformConfig, extra_filters: bool) -> Self {
        let mut chain = Self::standard(config);
        if extra_filters {
            chain
                .stages
                .extend(Kernel::ALL.iter().map(|k| Stage::Filter(*k)));
        }
        chain
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Run every stage in order, `iterations` times over.
    ///
    /// The first failing stage aborts the chain; later stages never run.
    pub fn apply(&self, mut image: DynamicImage) -> Result<DynamicImage, StageError> {
        for round in 0..self.iterations {
            for stage in &self.stages {
                image = stage.apply(image)?;
            }
            tracing::trace!("  Chain round {} done", round + 1);
        }
        Ok(image)
    }
}

//! Depth visualization: replaces color with the normalized depth buffer.

use rayon::prelude::*;
use tessel_core::{CameraModel, Vec3};

use super::{require_channel, FrameOp, LiveFrameOp};
use crate::framebuffer::{ColorView, FrameBufferView, FrameLayout};
use crate::RenderResult;

/// Replaces the color data with a grayscale image of the normalized depth.
///
/// Depth is normalized over the finite values of the buffer only, so the
/// background (infinite depth) does not flatten the range. Background pixels
/// are written as 1.0.
#[derive(Debug, Default, Clone, Copy)]
pub struct DepthFrameOp;

impl DepthFrameOp {
    pub const NAME: &'static str = "frame_depth";
}

impl FrameOp for DepthFrameOp {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attach(&self, view: &FrameBufferView<'_>) -> RenderResult<Box<dyn LiveFrameOp>> {
        let layout = view.layout();
        require_channel(Self::NAME, layout.channels.depth, "depth")?;
        Ok(Box::new(LiveDepthFrameOp { layout }))
    }
}

#[derive(Debug)]
pub struct LiveDepthFrameOp {
    layout: FrameLayout,
}

/// Mapping from raw depth to `[0, 1]` for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DepthRange {
    /// No finite depth at all: everything is background
    Background,
    /// All finite depths are equal
    Flat,
    Span { min: f32, scale: f32 },
}

impl DepthRange {
    /// Reduction pass: min/max over finite depths.
    fn scan(depth: &[f32]) -> Self {
        let (min, max) = depth
            .par_iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), d| (lo.min(d), hi.max(d)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );

        if min > max {
            DepthRange::Background
        } else if max > min {
            DepthRange::Span {
                min,
                scale: 1.0 / (max - min),
            }
        } else {
            DepthRange::Flat
        }
    }

    #[inline]
    fn normalize(&self, depth: f32) -> f32 {
        if !depth.is_finite() {
            return 1.0;
        }
        match *self {
            DepthRange::Background => 1.0,
            DepthRange::Flat => 0.0,
            DepthRange::Span { min, scale } => ((depth - min) * scale).min(1.0),
        }
    }
}

impl LiveFrameOp for LiveDepthFrameOp {
    fn layout(&self) -> FrameLayout {
        self.layout
    }

    fn process(&mut self, view: &mut FrameBufferView<'_>, _camera: Option<&dyn CameraModel>) {
        debug_assert_eq!(view.layout(), self.layout, "frame layout changed without re-attach");
        let depth: &[f32] = match &view.depth {
            Some(depth) => depth,
            // attach refuses buffers without depth
            None => return,
        };

        // The map pass only starts once the whole reduction has finished
        let range = DepthRange::scan(depth);
        log::debug!("Depth frame op range: {:?}", range);

        match &mut view.color {
            ColorView::Bytes(px) => {
                px.par_iter_mut().zip(depth.par_iter()).for_each(|(c, &d)| {
                    let z = (range.normalize(d) * 255.0) as u8;
                    c[0] = z;
                    c[1] = z;
                    c[2] = z;
                });
            }
            ColorView::Float(px) => {
                px.par_iter_mut().zip(depth.par_iter()).for_each(|(c, &d)| {
                    let z = range.normalize(d);
                    c[0] = z;
                    c[1] = z;
                    c[2] = z;
                });
            }
        }

        if let Some(albedo) = view.albedo.as_deref_mut() {
            albedo
                .par_iter_mut()
                .zip(depth.par_iter())
                .for_each(|(a, &d)| *a = Vec3::splat(range.normalize(d)));
        }
    }
}

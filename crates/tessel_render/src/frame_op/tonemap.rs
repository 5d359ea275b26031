//! Exposure + filmic tone mapping for float frame buffers.

use rayon::prelude::*;
use tessel_core::{CameraModel, ParamSet};

use super::{FrameOp, LiveFrameOp};
use crate::framebuffer::{ColorView, FrameBufferView, FrameLayout, PixelFormat};
use crate::{RenderError, RenderResult};

/// Maps HDR radiance into `[0, 1]` with an ACES-style filmic curve.
///
/// Only float color buffers carry HDR values, so attaching to an 8-bit
/// buffer is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMapFrameOp {
    /// Linear exposure multiplier applied before the curve
    pub exposure: f32,
}

impl ToneMapFrameOp {
    pub const NAME: &'static str = "frame_tonemap";

    /// Create a tone map with the given exposure multiplier.
    pub fn new(exposure: f32) -> Self {
        Self { exposure }
    }

    /// Reads `"exposure"` (default 1.0).
    pub fn from_params(params: &ParamSet) -> RenderResult<Self> {
        Ok(Self::new(params.get_float("exposure", 1.0)?))
    }
}

impl Default for ToneMapFrameOp {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl FrameOp for ToneMapFrameOp {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attach(&self, view: &FrameBufferView<'_>) -> RenderResult<Box<dyn LiveFrameOp>> {
        if view.format != PixelFormat::Rgba32f {
            return Err(RenderError::UnsupportedFormat {
                op: Self::NAME.to_string(),
                format: view.format,
            });
        }
        Ok(Box::new(LiveToneMapFrameOp {
            layout: view.layout(),
            exposure: self.exposure,
        }))
    }
}

#[derive(Debug)]
pub struct LiveToneMapFrameOp {
    layout: FrameLayout,
    exposure: f32,
}

/// Narkowicz fit of the ACES reference curve.
#[inline]
fn filmic(x: f32) -> f32 {
    let x = x.max(0.0);
    ((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14)).clamp(0.0, 1.0)
}

impl LiveFrameOp for LiveToneMapFrameOp {
    fn layout(&self) -> FrameLayout {
        self.layout
    }

    fn process(&mut self, view: &mut FrameBufferView<'_>, _camera: Option<&dyn CameraModel>) {
        let exposure = self.exposure;
        if let ColorView::Float(px) = &mut view.color {
            px.par_iter_mut().for_each(|c| {
                for v in &mut c[..3] {
                    *v = filmic(*v * exposure);
                }
            });
        }
    }
}

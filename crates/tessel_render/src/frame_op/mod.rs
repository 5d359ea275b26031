//! Frame operations: post-processing run on a completed frame.
//!
//! A [`FrameOp`] is a stateless descriptor. Attaching it to a frame buffer
//! view checks that the buffer has the channels the operation needs and
//! yields a [`LiveFrameOp`] bound to that buffer's layout. The frame buffer
//! runs its live operations in attach order once every tile of a frame has
//! been written.

mod depth;
mod tonemap;

pub use depth::{DepthFrameOp, LiveDepthFrameOp};
pub use tonemap::{LiveToneMapFrameOp, ToneMapFrameOp};

use std::sync::Arc;

use tessel_core::{CameraModel, ParamSet};

use crate::framebuffer::{FrameBufferView, FrameLayout};
use crate::registry::Registry;
use crate::{RenderError, RenderResult};

/// Stateless frame operation descriptor.
pub trait FrameOp: Send + Sync {
    /// Registered name of the operation.
    fn name(&self) -> &str;

    /// Bind the operation to a buffer layout, rejecting buffers that lack a
    /// required channel.
    fn attach(&self, view: &FrameBufferView<'_>) -> RenderResult<Box<dyn LiveFrameOp>>;
}

/// A frame operation bound to one frame buffer layout.
pub trait LiveFrameOp: Send {
    /// The layout this instance was attached to.
    fn layout(&self) -> FrameLayout;

    /// Transform the completed frame in place.
    fn process(&mut self, view: &mut FrameBufferView<'_>, camera: Option<&dyn CameraModel>);
}

/// Fail attachment with a missing-channel error.
pub(crate) fn require_channel(op: &str, present: bool, channel: &'static str) -> RenderResult<()> {
    if present {
        Ok(())
    } else {
        Err(RenderError::MissingChannel {
            op: op.to_string(),
            channel,
        })
    }
}

/// Register the built-in frame operations.
pub fn register(registry: &mut Registry) {
    registry.register_frame_op(DepthFrameOp::NAME, |_params: &ParamSet| {
        Ok(Arc::new(DepthFrameOp) as Arc<dyn FrameOp>)
    });
    registry.register_frame_op(ToneMapFrameOp::NAME, |params: &ParamSet| {
        Ok(Arc::new(ToneMapFrameOp::from_params(params)?) as Arc<dyn FrameOp>)
    });
}

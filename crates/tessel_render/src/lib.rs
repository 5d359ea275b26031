//! Tessel Render - tile-based render jobs and frame post-processing.
//!
//! A [`Renderer`] is committed against a [`tessel_core::World`] and a camera,
//! then produces one [`RenderJob`] per frame. The job renders the tiles of a
//! [`FrameBuffer`] independently (see [`render_frame`]); once every tile is
//! written the buffer runs its attached [`FrameOp`]s, e.g. [`DepthFrameOp`].
//!
//! Built-in renderers, frame operations and materials are reached by name
//! through a [`Registry`].

mod error;
mod frame;
pub mod frame_op;
mod framebuffer;
pub mod kernel;
pub mod pathtracer;
pub mod registry;
mod renderer;
mod tile;

pub use error::{ErrorKind, RenderError, RenderResult};
pub use frame::{render_frame, render_frame_sequential, FrameStats};
pub use frame_op::{DepthFrameOp, FrameOp, LiveFrameOp, ToneMapFrameOp};
pub use framebuffer::{linear_to_srgb, Channels, ColorView, FrameBuffer, FrameBufferView, FrameLayout, PixelFormat};
pub use kernel::{CpuPathKernel, FrameState, KernelContext, TracingKernel};
pub use pathtracer::{Backplate, PathTracer, PathTracerSettings, RenderTask};
pub use registry::{MaterialRegistry, Registry};
pub use renderer::{next_generation, RenderJob, Renderer, SceneBinding, CAMERA_KEY, WORLD_KEYS};
pub use tile::{generate_tiles, Tile, TileRegion, DEFAULT_TILE_SIZE};

//! Render pipeline errors.

use tessel_core::SceneError;
use thiserror::Error;

use crate::PixelFormat;

/// Broad category of a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing binding, unknown type name or other setup mistake
    Configuration,
    /// A frame operation attached to a buffer lacking what it needs
    CapabilityMismatch,
    /// The scene itself failed validation
    Scene,
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{renderer} doesn't have a world (looked for {keys:?})")]
    MissingWorld {
        renderer: String,
        keys: &'static [&'static str],
    },

    #[error("{0} doesn't have a camera")]
    MissingCamera(String),

    #[error("the world bound to {0} has not been committed")]
    UncommittedWorld(String),

    #[error("{0} has not been committed")]
    NotCommitted(String),

    #[error("invalid {renderer} material '{type_name}'")]
    UnknownMaterial { renderer: String, type_name: String },

    #[error("unknown renderer type '{0}'")]
    UnknownRenderer(String),

    #[error("unknown frame operation '{0}'")]
    UnknownFrameOp(String),

    #[error("{op} requires {channel} data but the framebuffer does not have this channel")]
    MissingChannel { op: String, channel: &'static str },

    #[error("{op} does not support {format:?} color buffers")]
    UnsupportedFormat { op: String, format: PixelFormat },

    #[error("invalid frame buffer size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("failed to load backplate: {0}")]
    Backplate(#[from] image::ImageError),
}

impl RenderError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::MissingChannel { .. } | RenderError::UnsupportedFormat { .. } => {
                ErrorKind::CapabilityMismatch
            }
            RenderError::Scene(SceneError::InvalidInstance { .. }) => ErrorKind::Scene,
            _ => ErrorKind::Configuration,
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

//! Scene errors.

use thiserror::Error;

/// Errors raised while validating or committing scene objects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("instance {index} ('{name}') is invalid: {reason}")]
    InvalidInstance {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("parameter '{key}' has the wrong type, expected {expected}")]
    ParamType { key: String, expected: &'static str },

    #[error("acceleration structure build failed: {0}")]
    Build(String),
}

pub type SceneResult<T> = Result<T, SceneError>;

//! Render settings loaded from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tessel_core::{Param, ParamSet};
use tessel_render::{DepthFrameOp, PixelFormat, ToneMapFrameOp, DEFAULT_TILE_SIZE};

/// Everything needed to render a frame. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub format: PixelFormat,
    /// Progressive passes; each adds `samples_per_pixel` samples
    pub passes: u32,

    pub renderer: String,
    pub max_depth: u32,
    pub min_contribution: f32,
    pub epsilon: f32,
    pub samples_per_pixel: u32,
    pub backplate: Option<PathBuf>,

    /// Frame operations by registered name, in processing order
    pub frame_ops: Vec<String>,
    pub exposure: f32,

    pub output: PathBuf,
    /// Keep coverage in the alpha channel instead of writing opaque pixels
    pub transparent_background: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            tile_size: DEFAULT_TILE_SIZE,
            format: PixelFormat::Rgba32f,
            passes: 1,
            renderer: "pathtracer".to_string(),
            max_depth: 20,
            min_contribution: 0.01,
            epsilon: 1e-3,
            samples_per_pixel: 16,
            backplate: None,
            frame_ops: vec![ToneMapFrameOp::NAME.to_string()],
            exposure: 1.0,
            output: PathBuf::from("tessel.png"),
            transparent_background: false,
        }
    }
}

impl RenderConfig {
    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: RenderConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Add the depth visualization unless it is already in the pipeline.
    pub fn enable_depth(&mut self) {
        if !self.frame_ops.iter().any(|name| name == DepthFrameOp::NAME) {
            self.frame_ops.push(DepthFrameOp::NAME.to_string());
        }
    }

    /// Whether the depth frame operation is requested.
    pub fn needs_depth(&self) -> bool {
        self.frame_ops.iter().any(|name| name == DepthFrameOp::NAME)
    }

    /// Construction parameters for the renderer.
    pub fn renderer_params(&self) -> ParamSet {
        let mut params = ParamSet::new()
            .with("max_depth", Param::Int(self.max_depth as i64))
            .with("min_contribution", Param::Float(self.min_contribution))
            .with("epsilon", Param::Float(self.epsilon))
            .with("spp", Param::Int(self.samples_per_pixel as i64));
        if let Some(path) = &self.backplate {
            params.set("backplate", Param::Text(path.display().to_string()));
        }
        params
    }

    /// Construction parameters for frame operations.
    pub fn frame_op_params(&self) -> ParamSet {
        ParamSet::new().with("exposure", Param::Float(self.exposure))
    }
}

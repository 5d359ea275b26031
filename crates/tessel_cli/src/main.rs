//! `tessel`: render the demo scene progressively and save the result.

mod config;
mod scene;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tessel_core::Param;
use tessel_render::{render_frame, Channels, FrameBuffer, Registry};

use crate::config::RenderConfig;

#[derive(Parser, Debug)]
#[command(name = "tessel", version, about = "Tile-based path tracer")]
struct Args {
    /// JSON render configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output image (format from the extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Progressive passes to accumulate
    #[arg(short, long)]
    passes: Option<u32>,

    /// Replace color with normalized depth
    #[arg(long)]
    depth: bool,
}

impl Args {
    fn into_config(self) -> Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load(path)?,
            None => RenderConfig::default(),
        };
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(passes) = self.passes {
            config.passes = passes;
        }
        if self.depth {
            config.enable_depth();
        }
        Ok(config)
    }
}

fn run(config: &RenderConfig) -> Result<()> {
    let registry = Registry::with_builtins();
    let mut renderer = registry
        .create_renderer(&config.renderer, &config.renderer_params())
        .with_context(|| format!("Failed to create renderer '{}'", config.renderer))?;

    let channels = if config.needs_depth() {
        Channels::COLOR_ONLY.with_depth().with_albedo()
    } else {
        Channels::COLOR_ONLY
    };
    let mut framebuffer =
        FrameBuffer::with_tile_size(config.width, config.height, config.format, channels, config.tile_size)?;
    for name in &config.frame_ops {
        let op = registry.create_frame_op(name, &config.frame_op_params())?;
        // A stage the buffer layout cannot support is skipped, not fatal
        if framebuffer.add_frame_op(op).is_err() {
            log::warn!("Rendering without frame operation '{}'", name);
        }
    }

    let world = scene::build_world(renderer.as_ref())?;
    let camera = scene::camera(config.width as f32 / config.height as f32);
    renderer.set_param("world", Param::World(Arc::new(world)));
    renderer.set_param("camera", Param::Camera(Arc::new(camera)));
    renderer.commit()?;

    for _ in 0..config.passes.max(1) {
        render_frame(renderer.as_ref(), &mut framebuffer)?;
    }

    let mut pixels = framebuffer.to_rgba8();
    if !config.transparent_background {
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
    }
    let image = image::RgbaImage::from_raw(config.width, config.height, pixels)
        .context("Frame buffer size does not match the image size")?;
    image
        .save(&config.output)
        .with_context(|| format!("Failed to write {}", config.output.display()))?;
    log::info!("Saved {}", config.output.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = Args::parse().into_config()?;
    log::info!(
        "Rendering {}x{}, {} passes of {} spp",
        config.width,
        config.height,
        config.passes,
        config.samples_per_pixel
    );
    run(&config)
}

//! Frame driver: runs one render job over every tile of a frame buffer and
//! then the buffer's frame operations.

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::renderer::Renderer;
use crate::{FrameBuffer, RenderResult};

/// Summary of one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Frame number within the buffer, starting at 1
    pub frame: u64,
    pub tiles: usize,
    /// Samples per pixel accumulated so far
    pub samples_per_pixel: u32,
    pub elapsed: Duration,
}

/// Render one frame with tiles distributed over the rayon pool.
///
/// All tiles finish before any frame operation runs.
pub fn render_frame(renderer: &dyn Renderer, framebuffer: &mut FrameBuffer) -> RenderResult<FrameStats> {
    let start = Instant::now();
    let job = renderer.create_render_job(framebuffer)?;

    framebuffer
        .tiles_mut()
        .par_iter_mut()
        .for_each(|tile| job.render_tile(tile));

    Ok(finish(renderer, framebuffer, start))
}

/// Same as [`render_frame`] but renders tiles one by one in grid order.
pub fn render_frame_sequential(
    renderer: &dyn Renderer,
    framebuffer: &mut FrameBuffer,
) -> RenderResult<FrameStats> {
    let start = Instant::now();
    let job = renderer.create_render_job(framebuffer)?;

    let tiles = framebuffer.tiles_mut();
    let mut order: Vec<usize> = (0..tiles.len()).collect();
    order.sort_by_key(|&i| (tiles[i].region.y, tiles[i].region.x));
    for i in order {
        job.render_tile(&mut tiles[i]);
    }

    Ok(finish(renderer, framebuffer, start))
}

fn finish(renderer: &dyn Renderer, framebuffer: &mut FrameBuffer, start: Instant) -> FrameStats {
    framebuffer.write_tiles();
    let camera = renderer.camera();
    framebuffer.end_frame(camera.as_deref());

    let stats = FrameStats {
        frame: framebuffer.frame_count(),
        tiles: framebuffer.tiles().len(),
        samples_per_pixel: framebuffer
            .tiles()
            .iter()
            .map(|t| t.accumulated_samples())
            .min()
            .unwrap_or(0),
        elapsed: start.elapsed(),
    };
    log::info!(
        "Frame {} done: {} tiles, {} spp in {:.2?}",
        stats.frame,
        stats.tiles,
        stats.samples_per_pixel,
        stats.elapsed
    );
    stats
}

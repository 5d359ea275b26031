//! Tiles: the unit of parallel tracing work.
//!
//! The image is divided into a grid of tiles that can be rendered
//! independently. Each tile owns its own output and accumulation buffers, so
//! tiles of the same frame never share mutable state.

use tessel_core::{Vec3, Vec4};

/// Default tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// A rectangular region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRegion {
    /// X coordinate of the top-left corner
    pub x: u32,
    /// Y coordinate of the top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position in the render order
    pub index: usize,
}

impl TileRegion {
    /// Create a new tile region.
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    /// Get the total number of pixels in this region.
    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }
}

/// Generate tiles covering a `width` x `height` image, ordered center-out.
///
/// Tiles on the right and bottom edges are clipped so that the set exactly
/// partitions the image.
pub fn generate_tiles(width: u32, height: u32, tile_size: u32) -> Vec<TileRegion> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let tw = tile_size.min(width - x);
            let th = tile_size.min(height - y);
            tiles.push(TileRegion::new(x, y, tw, th, tiles.len()));
            x += tile_size;
        }
        y += tile_size;
    }

    sort_spiral(&mut tiles, width, height);
    for (i, tile) in tiles.iter_mut().enumerate() {
        tile.index = i;
    }
    tiles
}

/// Sort tiles by distance from the image center so the middle of the frame
/// shows up first.
fn sort_spiral(tiles: &mut [TileRegion], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let dist = |t: &TileRegion| {
        let cx = t.x as f32 + t.width as f32 / 2.0;
        let cy = t.y as f32 + t.height as f32 / 2.0;
        (cx - center_x).powi(2) + (cy - center_y).powi(2)
    };

    // Stable sort keeps grid order for equidistant tiles
    tiles.sort_by(|a, b| {
        dist(a)
            .partial_cmp(&dist(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// A tile together with its output and accumulation buffers.
///
/// Output buffers are in row-major order within the tile.
#[derive(Debug, Clone)]
pub struct Tile {
    pub region: TileRegion,
    /// Averaged radiance (rgb) and coverage (a)
    pub color: Vec<Vec4>,
    /// Distance to the first hit, `+inf` where nothing was hit
    pub depth: Vec<f32>,
    pub albedo: Vec<Vec3>,
    pub normal: Vec<Vec3>,

    accum: Vec<Vec4>,
    accum_samples: u32,
    accum_passes: u32,
    generation: u64,
}

impl Tile {
    /// Create an empty tile for `region`.
    pub fn new(region: TileRegion) -> Self {
        let n = region.pixel_count();
        Self {
            region,
            color: vec![Vec4::ZERO; n],
            depth: vec![f32::INFINITY; n],
            albedo: vec![Vec3::ZERO; n],
            normal: vec![Vec3::ZERO; n],
            accum: vec![Vec4::ZERO; n],
            accum_samples: 0,
            accum_passes: 0,
            generation: 0,
        }
    }

    /// Get the total number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.region.pixel_count()
    }

    /// Samples per pixel accumulated so far.
    pub fn accumulated_samples(&self) -> u32 {
        self.accum_samples
    }

    /// Progressive passes accumulated so far.
    pub fn accumulated_passes(&self) -> u32 {
        self.accum_passes
    }

    /// Drop all accumulated samples.
    pub fn reset(&mut self) {
        self.accum.fill(Vec4::ZERO);
        self.accum_samples = 0;
        self.accum_passes = 0;
    }

    /// Start a progressive pass for the given renderer generation.
    ///
    /// Accumulation restarts whenever the generation changes. Returns the
    /// index of the pass about to be rendered.
    pub fn begin_pass(&mut self, generation: u64) -> u32 {
        if self.generation != generation {
            self.reset();
            self.generation = generation;
        }
        self.accum_passes
    }

    /// Add the summed samples of one pixel (local index `i`) for this pass.
    pub fn record(&mut self, i: usize, sample_sum: Vec4, depth: f32, albedo: Vec3, normal: Vec3) {
        self.accum[i] += sample_sum;
        self.depth[i] = depth;
        self.albedo[i] = albedo;
        self.normal[i] = normal;
    }

    /// Close a pass that added `samples` samples to every pixel and refresh
    /// the averaged color.
    pub fn end_pass(&mut self, samples: u32) {
        self.accum_samples += samples;
        self.accum_passes += 1;
        if self.accum_samples == 0 {
            return;
        }
        let inv = 1.0 / self.accum_samples as f32;
        for (color, sum) in self.color.iter_mut().zip(&self.accum) {
            *color = *sum * inv;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_tiles_exact_fit() {
        let tiles = generate_tiles(128, 128, 64);
        assert_eq!(tiles.len(), 4);
        let total: usize = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total, 128 * 128);
    }

    #[test]
    fn test_generate_tiles_partial_fit() {
        let tiles = generate_tiles(100, 70, 64);
        assert_eq!(tiles.len(), 4);
        let total: usize = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total, 100 * 70);
    }

    #[test]
    fn test_tiles_do_not_overlap() {
        let (w, h) = (37, 23);
        let mut covered = vec![0u8; (w * h) as usize];
        for t in generate_tiles(w, h, 8) {
            for y in t.y..t.y + t.height {
                for x in t.x..t.x + t.width {
                    covered[(y * w + x) as usize] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_spiral_order() {
        let tiles = generate_tiles(192, 192, 64);
        assert_eq!(tiles.len(), 9);
        assert_eq!((tiles[0].x, tiles[0].y), (64, 64));
        assert!(tiles.iter().enumerate().all(|(i, t)| t.index == i));
    }

    #[test]
    fn test_accumulation_averages_passes() {
        let mut tile = Tile::new(TileRegion::new(0, 0, 1, 1, 0));
        tile.begin_pass(1);
        tile.record(0, Vec4::new(2.0, 0.0, 0.0, 2.0), 1.0, Vec3::ONE, Vec3::Z);
        tile.end_pass(2);
        assert_eq!(tile.color[0], Vec4::new(1.0, 0.0, 0.0, 1.0));

        assert_eq!(tile.begin_pass(1), 1);
        tile.record(0, Vec4::new(0.0, 0.0, 0.0, 2.0), 1.0, Vec3::ONE, Vec3::Z);
        tile.end_pass(2);
        assert_eq!(tile.color[0], Vec4::new(0.5, 0.0, 0.0, 1.0));
        assert_eq!(tile.accumulated_samples(), 4);
    }

    #[test]
    fn test_new_generation_restarts_accumulation() {
        let mut tile = Tile::new(TileRegion::new(0, 0, 1, 1, 0));
        tile.begin_pass(1);
        tile.record(0, Vec4::ONE, 1.0, Vec3::ONE, Vec3::Z);
        tile.end_pass(1);

        assert_eq!(tile.begin_pass(2), 0);
        assert_eq!(tile.accumulated_samples(), 0);
    }
}

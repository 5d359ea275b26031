//! Frame buffer storage, views and the attached frame-operation pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessel_core::{CameraModel, Vec3, Vec4};

use crate::frame_op::{FrameOp, LiveFrameOp};
use crate::tile::{generate_tiles, Tile, DEFAULT_TILE_SIZE};
use crate::{RenderError, RenderResult};

/// Storage format of the color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit linear RGBA
    Rgba8,
    /// 8-bit sRGB-encoded RGBA
    Srgba,
    /// 32-bit float linear RGBA
    Rgba32f,
}

/// Optional per-pixel channels beyond color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Channels {
    pub depth: bool,
    pub albedo: bool,
    pub normal: bool,
}

impl Channels {
    pub const COLOR_ONLY: Channels = Channels {
        depth: false,
        albedo: false,
        normal: false,
    };

    pub const ALL: Channels = Channels {
        depth: true,
        albedo: true,
        normal: true,
    };

    /// Add a depth channel.
    pub fn with_depth(mut self) -> Self {
        self.depth = true;
        self
    }

    /// Add an albedo channel.
    pub fn with_albedo(mut self) -> Self {
        self.albedo = true;
        self
    }

    /// Add a normal channel.
    pub fn with_normal(mut self) -> Self {
        self.normal = true;
        self
    }
}

/// Dimensions, format and channel set of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub channels: Channels,
}

impl FrameLayout {
    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Mutable access to the color channel in its storage format.
#[derive(Debug)]
pub enum ColorView<'a> {
    /// `Rgba8` and `Srgba`
    Bytes(&'a mut [[u8; 4]]),
    Float(&'a mut [[f32; 4]]),
}

/// Non-owning view of a frame's pixel buffers.
///
/// Every present slice holds exactly `width * height` pixels.
#[derive(Debug)]
pub struct FrameBufferView<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub color: ColorView<'a>,
    pub depth: Option<&'a mut [f32]>,
    pub albedo: Option<&'a mut [Vec3]>,
    pub normal: Option<&'a mut [Vec3]>,
}

impl FrameBufferView<'_> {
    /// Layout described by this view.
    pub fn layout(&self) -> FrameLayout {
        FrameLayout {
            width: self.width,
            height: self.height,
            format: self.format,
            channels: Channels {
                depth: self.depth.is_some(),
                albedo: self.albedo.is_some(),
                normal: self.normal.is_some(),
            },
        }
    }

    /// Number of pixels in the view.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[derive(Debug)]
enum ColorBuffer {
    Bytes(Vec<[u8; 4]>),
    Float(Vec<[f32; 4]>),
}

/// Owned channel storage.
#[derive(Debug)]
struct Storage {
    color: ColorBuffer,
    depth: Option<Vec<f32>>,
    albedo: Option<Vec<Vec3>>,
    normal: Option<Vec<Vec3>>,
}

impl Storage {
    fn new(layout: &FrameLayout) -> Self {
        let n = layout.pixel_count();
        let color = match layout.format {
            PixelFormat::Rgba8 | PixelFormat::Srgba => ColorBuffer::Bytes(vec![[0; 4]; n]),
            PixelFormat::Rgba32f => ColorBuffer::Float(vec![[0.0; 4]; n]),
        };
        Self {
            color,
            depth: layout.channels.depth.then(|| vec![f32::INFINITY; n]),
            albedo: layout.channels.albedo.then(|| vec![Vec3::ZERO; n]),
            normal: layout.channels.normal.then(|| vec![Vec3::ZERO; n]),
        }
    }

    fn view(&mut self, layout: &FrameLayout) -> FrameBufferView<'_> {
        FrameBufferView {
            width: layout.width,
            height: layout.height,
            format: layout.format,
            color: match &mut self.color {
                ColorBuffer::Bytes(px) => ColorView::Bytes(px.as_mut_slice()),
                ColorBuffer::Float(px) => ColorView::Float(px.as_mut_slice()),
            },
            depth: self.depth.as_deref_mut(),
            albedo: self.albedo.as_deref_mut(),
            normal: self.normal.as_deref_mut(),
        }
    }

    /// Copy a finished tile into the channels it covers.
    fn write_tile(&mut self, layout: &FrameLayout, tile: &Tile) {
        let r = tile.region;
        let width = layout.width as usize;
        for ly in 0..r.height as usize {
            for lx in 0..r.width as usize {
                let src = ly * r.width as usize + lx;
                let dst = (r.y as usize + ly) * width + r.x as usize + lx;

                match &mut self.color {
                    ColorBuffer::Float(px) => px[dst] = tile.color[src].to_array(),
                    ColorBuffer::Bytes(px) => px[dst] = encode_rgba8(tile.color[src], layout.format),
                }
                if let Some(depth) = &mut self.depth {
                    depth[dst] = tile.depth[src];
                }
                if let Some(albedo) = &mut self.albedo {
                    albedo[dst] = tile.albedo[src];
                }
                if let Some(normal) = &mut self.normal {
                    normal[dst] = tile.normal[src];
                }
            }
        }
    }
}

/// Linear to sRGB transfer function.
pub fn linear_to_srgb(linear: f32) -> f32 {
    let c = linear.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn to_byte(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn encode_rgba8(color: Vec4, format: PixelFormat) -> [u8; 4] {
    match format {
        PixelFormat::Srgba => [
            to_byte(linear_to_srgb(color.x)),
            to_byte(linear_to_srgb(color.y)),
            to_byte(linear_to_srgb(color.z)),
            to_byte(color.w),
        ],
        _ => [to_byte(color.x), to_byte(color.y), to_byte(color.z), to_byte(color.w)],
    }
}

/// A frame-op descriptor and the live instance attached to the current layout.
struct Stage {
    op: Arc<dyn FrameOp>,
    live: Box<dyn LiveFrameOp>,
}

/// Owns the pixel channels of a frame, the tiles covering it and the
/// post-processing pipeline run when a frame completes.
pub struct FrameBuffer {
    layout: FrameLayout,
    storage: Storage,
    tile_size: u32,
    tiles: Vec<Tile>,
    stages: Vec<Stage>,
    frames: u64,
}

impl FrameBuffer {
    /// Create a frame buffer with the default tile size.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        channels: Channels,
    ) -> RenderResult<Self> {
        Self::with_tile_size(width, height, format, channels, DEFAULT_TILE_SIZE)
    }

    /// Create a frame buffer split into `tile_size` square tiles.
    pub fn with_tile_size(
        width: u32,
        height: u32,
        format: PixelFormat,
        channels: Channels,
        tile_size: u32,
    ) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        let layout = FrameLayout {
            width,
            height,
            format,
            channels,
        };
        let tile_size = tile_size.max(1);
        Ok(Self {
            storage: Storage::new(&layout),
            tiles: make_tiles(&layout, tile_size),
            layout,
            tile_size,
            stages: Vec::new(),
            frames: 0,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.layout.height
    }

    /// Storage format of the color channel.
    pub fn format(&self) -> PixelFormat {
        self.layout.format
    }

    /// Current dimensions, format and channels.
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Edge length of the tiles.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Number of frames completed since creation.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Tiles covering the frame.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Mutable tiles, handed to render jobs.
    pub fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    /// Mutable view of every channel.
    pub fn view(&mut self) -> FrameBufferView<'_> {
        self.storage.view(&self.layout)
    }

    /// Drop accumulated samples in every tile.
    pub fn reset_accumulation(&mut self) {
        for tile in &mut self.tiles {
            tile.reset();
        }
    }

    /// Change dimensions. Storage, tiles and accumulation are rebuilt and
    /// every frame operation is attached again.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        if (width, height) == (self.layout.width, self.layout.height) {
            return Ok(());
        }
        self.layout.width = width;
        self.layout.height = height;
        self.rebuild();
        Ok(())
    }

    /// Change the color format, re-attaching frame operations.
    pub fn set_format(&mut self, format: PixelFormat) {
        if format != self.layout.format {
            self.layout.format = format;
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        self.storage = Storage::new(&self.layout);
        self.tiles = make_tiles(&self.layout, self.tile_size);

        let ops: Vec<Arc<dyn FrameOp>> = self.stages.drain(..).map(|s| s.op).collect();
        for op in ops {
            if let Err(err) = self.add_frame_op(op) {
                log::warn!("Dropping frame operation after layout change: {}", err);
            }
        }
    }

    /// Attach a frame operation at the end of the pipeline.
    ///
    /// On failure the pipeline is left without this stage.
    pub fn add_frame_op(&mut self, op: Arc<dyn FrameOp>) -> RenderResult<()> {
        let view = self.storage.view(&self.layout);
        match op.attach(&view) {
            Ok(live) => {
                log::info!("Attached frame operation {}", op.name());
                self.stages.push(Stage { op, live });
                Ok(())
            }
            Err(err) => {
                log::warn!("Could not attach {}: {}", op.name(), err);
                Err(err)
            }
        }
    }

    /// Detach every frame operation.
    pub fn clear_frame_ops(&mut self) {
        self.stages.clear();
    }

    /// Names of the attached frame operations in processing order.
    pub fn frame_op_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.op.name()).collect()
    }

    /// Copy every tile's output into the frame channels.
    pub fn write_tiles(&mut self) {
        for tile in &self.tiles {
            self.storage.write_tile(&self.layout, tile);
        }
    }

    /// Finish a frame: run every attached frame operation in order.
    ///
    /// Must only be called once all tiles of the frame have been written.
    pub fn end_frame(&mut self, camera: Option<&dyn CameraModel>) {
        for stage in &mut self.stages {
            let mut view = self.storage.view(&self.layout);
            debug_assert_eq!(stage.live.layout(), view.layout());
            stage.live.process(&mut view, camera);
        }
        self.frames += 1;
    }

    /// Float color pixels, if the buffer stores floats.
    pub fn color_f32(&self) -> Option<&[[f32; 4]]> {
        match &self.storage.color {
            ColorBuffer::Float(px) => Some(px),
            ColorBuffer::Bytes(_) => None,
        }
    }

    /// 8-bit color pixels, if the buffer stores bytes.
    pub fn color_u8(&self) -> Option<&[[u8; 4]]> {
        match &self.storage.color {
            ColorBuffer::Bytes(px) => Some(px),
            ColorBuffer::Float(_) => None,
        }
    }

    /// Depth channel, if present.
    pub fn depth(&self) -> Option<&[f32]> {
        self.storage.depth.as_deref()
    }

    /// Albedo channel, if present.
    pub fn albedo(&self) -> Option<&[Vec3]> {
        self.storage.albedo.as_deref()
    }

    /// Normal channel, if present.
    pub fn normal(&self) -> Option<&[Vec3]> {
        self.storage.normal.as_deref()
    }

    /// Color as tightly packed 8-bit RGBA, sRGB-encoding float buffers.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match &self.storage.color {
            ColorBuffer::Bytes(px) => bytemuck::cast_slice::<[u8; 4], u8>(px).to_vec(),
            ColorBuffer::Float(px) => px
                .iter()
                .flat_map(|c| {
                    [
                        to_byte(linear_to_srgb(c[0])),
                        to_byte(linear_to_srgb(c[1])),
                        to_byte(linear_to_srgb(c[2])),
                        to_byte(c[3]),
                    ]
                })
                .collect(),
        }
    }
}

fn make_tiles(layout: &FrameLayout, tile_size: u32) -> Vec<Tile> {
    generate_tiles(layout.width, layout.height, tile_size)
        .into_iter()
        .map(Tile::new)
        .collect()
}

//! Tracing kernels: the per-tile computation a path-tracing render job
//! delegates to.
//!
//! A [`KernelContext`] carries everything a kernel needs to trace a frame
//! (settings, bound world and camera). It is built once per renderer commit
//! and shared read-only by every job created from that commit.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessel_core::{
    CameraModel, Color, Interval, Material, Ray, Vec2, Vec3, Vec4, World,
};

use crate::pathtracer::materials::{random_unit_vector, Lambertian};
use crate::pathtracer::PathTracerSettings;
use crate::tile::Tile;

/// Settings plus the scene and camera a kernel traces against.
#[derive(Debug, Clone)]
pub struct KernelContext {
    settings: PathTracerSettings,
    world: Option<Arc<World>>,
    camera: Option<Arc<dyn CameraModel>>,
}

impl KernelContext {
    /// Create an unbound context. Bind a world and a camera before tracing.
    pub fn new(settings: PathTracerSettings) -> Self {
        Self {
            settings,
            world: None,
            camera: None,
        }
    }

    /// Bind the world to trace against.
    pub fn bind_scene(&mut self, world: Arc<World>) {
        self.world = Some(world);
    }

    /// Bind the camera primary rays are generated from.
    pub fn bind_camera(&mut self, camera: Arc<dyn CameraModel>) {
        self.camera = Some(camera);
    }

    /// Settings fixed at renderer construction.
    pub fn settings(&self) -> &PathTracerSettings {
        &self.settings
    }

    /// Bound world, if any.
    pub fn world(&self) -> Option<&Arc<World>> {
        self.world.as_ref()
    }

    /// Bound camera, if any.
    pub fn camera(&self) -> Option<&Arc<dyn CameraModel>> {
        self.camera.as_ref()
    }

    /// True once both a world and a camera are bound.
    pub fn is_bound(&self) -> bool {
        self.world.is_some() && self.camera.is_some()
    }
}

/// Per-frame values computed once by [`TracingKernel::init_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    /// Accumulation generation of the committed renderer state
    pub generation: u64,
    pub width: u32,
    pub height: u32,
}

/// Tile computation backend.
pub trait TracingKernel: Send + Sync {
    fn init_frame(&self, ctx: &KernelContext, generation: u64, width: u32, height: u32) -> FrameState {
        let _ = ctx;
        FrameState {
            generation,
            width,
            height,
        }
    }

    /// Render one accumulation pass into `tile`.
    fn render_tile(&self, ctx: &KernelContext, frame: &FrameState, tile: &mut Tile);
}

/// First-hit values written to the auxiliary channels.
#[derive(Debug, Clone, Copy)]
struct PrimaryHit {
    depth: f32,
    albedo: Vec3,
    normal: Vec3,
}

impl PrimaryHit {
    const MISS: PrimaryHit = PrimaryHit {
        depth: f32::INFINITY,
        albedo: Vec3::ZERO,
        normal: Vec3::ZERO,
    };
}

/// Result of tracing one camera sample.
#[derive(Debug, Clone, Copy)]
struct PathSample {
    radiance: Color,
    alpha: f32,
    primary: PrimaryHit,
}

/// Escaped secondary rays pick up this gradient.
fn sky_gradient(ray: &Ray) -> Color {
    let unit_direction = ray.direction.normalize();
    let a = 0.5 * (unit_direction.y + 1.0);
    Color::ONE * (1.0 - a) + Color::new(0.5, 0.7, 1.0) * a
}

/// Seed for one pixel and accumulation pass (splitmix64 finalizer).
fn pixel_seed(x: u32, y: u32, pass: u32) -> u64 {
    let mut z = (((y as u64) << 32) | x as u64) ^ (pass as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// CPU unidirectional path tracer with homogeneous volumes.
#[derive(Debug, Clone)]
pub struct CpuPathKernel {
    /// Used for geometry instances without a material
    fallback: Lambertian,
}

impl CpuPathKernel {
    /// Create a new CPU kernel.
    pub fn new() -> Self {
        Self {
            fallback: Lambertian::new(Vec3::splat(0.5)),
        }
    }

    fn trace_path(
        &self,
        settings: &PathTracerSettings,
        world: &World,
        primary: Ray,
        screen: Vec2,
        rng: &mut StdRng,
    ) -> PathSample {
        let mut ray = primary;
        let mut throughput = Color::ONE;
        let mut radiance = Color::ZERO;
        let mut sample = PathSample {
            radiance: Color::ZERO,
            alpha: 0.0,
            primary: PrimaryHit::MISS,
        };

        for bounce in 0..settings.max_depth {
            let ray_t = Interval::from_epsilon(settings.epsilon);
            let surface = world.trace(&ray, ray_t);
            let t_surface = surface.map_or(f32::INFINITY, |hit| hit.t);

            // Free-flight sampling through the nearest medium in front of the surface
            if let Some(entry) = world.trace_volume(&ray, ray_t.clip_max(t_surface)) {
                if let Some(medium) = world.volume(entry.instance) {
                    let speed = ray.direction.length();
                    let distance = -(1.0 - rng.gen::<f32>()).ln() / medium.density;
                    let t = entry.t + distance / speed;
                    if medium.density > 0.0 && t < entry.t_exit {
                        if bounce == 0 {
                            sample.alpha = 1.0;
                            sample.primary = PrimaryHit {
                                depth: t * speed,
                                albedo: medium.albedo,
                                normal: -ray.direction / speed,
                            };
                        }
                        throughput *= medium.albedo;
                        if throughput.max_element() < settings.min_contribution {
                            break;
                        }
                        ray = Ray::new(ray.at(t), random_unit_vector(rng));
                        continue;
                    }
                }
            }

            let hit = match surface {
                Some(hit) => hit,
                None => {
                    let background = match (&settings.backplate, bounce) {
                        (Some(plate), 0) => {
                            sample.alpha = 1.0;
                            plate.sample(screen)
                        }
                        _ => sky_gradient(&ray),
                    };
                    radiance += throughput * background;
                    break;
                }
            };

            let material: &dyn Material = match world.material(hit.instance) {
                Some(material) => &**material,
                None => &self.fallback,
            };

            if bounce == 0 {
                sample.alpha = 1.0;
                sample.primary = PrimaryHit {
                    depth: hit.t * ray.direction.length(),
                    albedo: material.albedo(),
                    normal: hit.normal,
                };
            }

            radiance += throughput * material.emitted(&hit);

            let scatter = match material.scatter(&ray, &hit, rng) {
                Some(scatter) => scatter,
                None => break,
            };
            throughput *= scatter.attenuation;
            if throughput.max_element() < settings.min_contribution {
                break;
            }
            ray = Ray::new(hit.point, scatter.direction);
        }

        sample.radiance = radiance;
        sample
    }
}

impl Default for CpuPathKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingKernel for CpuPathKernel {
    fn render_tile(&self, ctx: &KernelContext, frame: &FrameState, tile: &mut Tile) {
        let (world, camera) = match (ctx.world(), ctx.camera()) {
            (Some(world), Some(camera)) => (world, camera),
            _ => {
                log::warn!(
                    "Skipping tile {}: kernel context has no {} bound",
                    tile.region.index,
                    if ctx.world().is_none() { "world" } else { "camera" }
                );
                return;
            }
        };
        let settings = ctx.settings();
        let spp = settings.samples_per_pixel.max(1);
        let pass = tile.begin_pass(frame.generation);
        let region = tile.region;
        let inv_width = 1.0 / frame.width as f32;
        let inv_height = 1.0 / frame.height as f32;

        for ly in 0..region.height {
            for lx in 0..region.width {
                let (px, py) = (region.x + lx, region.y + ly);
                let mut rng = StdRng::seed_from_u64(pixel_seed(px, py, pass));
                let mut sum = Vec4::ZERO;
                let mut primary = PrimaryHit::MISS;

                for s in 0..spp {
                    let screen = Vec2::new(
                        (px as f32 + rng.gen::<f32>()) * inv_width,
                        (py as f32 + rng.gen::<f32>()) * inv_height,
                    );
                    let lens = Vec2::new(rng.gen(), rng.gen());
                    let ray = camera.primary_ray(screen, lens);
                    let sample = self.trace_path(settings, world, ray, screen, &mut rng);

                    sum += sample.radiance.extend(sample.alpha);
                    if s == 0 {
                        primary = sample.primary;
                    }
                }

                let i = (ly * region.width + lx) as usize;
                tile.record(i, sum, primary.depth, primary.albedo, primary.normal);
            }
        }

        tile.end_pass(spp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathtracer::Backplate;
    use crate::tile::TileRegion;
    use tessel_core::{Aabb, Instance, PerspectiveCamera, Shape, VolumetricModel};

    fn context(instances: Vec<Instance>, settings: PathTracerSettings) -> KernelContext {
        let mut world = World::new();
        world.set_instances(instances.into_iter().map(Arc::new).collect());
        world.commit().unwrap();

        let camera = PerspectiveCamera::new().with_position(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
        let mut ctx = KernelContext::new(settings);
        ctx.bind_scene(Arc::new(world));
        ctx.bind_camera(Arc::new(camera));
        ctx
    }

    fn render(ctx: &KernelContext, size: u32, generation: u64) -> Tile {
        let kernel = CpuPathKernel::new();
        let frame = kernel.init_frame(ctx, generation, size, size);
        let mut tile = Tile::new(TileRegion::new(0, 0, size, size, 0));
        kernel.render_tile(ctx, &frame, &mut tile);
        tile
    }

    fn small_settings() -> PathTracerSettings {
        PathTracerSettings {
            samples_per_pixel: 2,
            max_depth: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_pixel_seed_varies() {
        assert_ne!(pixel_seed(0, 0, 0), pixel_seed(1, 0, 0));
        assert_ne!(pixel_seed(0, 0, 0), pixel_seed(0, 1, 0));
        assert_ne!(pixel_seed(0, 0, 0), pixel_seed(0, 0, 1));
    }

    #[test]
    fn test_sky_gradient() {
        let up = sky_gradient(&Ray::new(Vec3::ZERO, Vec3::Y));
        assert!((up - Color::new(0.5, 0.7, 1.0)).length() < 1e-5);
        let down = sky_gradient(&Ray::new(Vec3::ZERO, -Vec3::Y));
        assert!((down - Color::ONE).length() < 1e-5);
    }

    #[test]
    fn test_unbound_context_leaves_tile_untouched() {
        let ctx = KernelContext::new(PathTracerSettings::default());
        assert!(!ctx.is_bound());
        let tile = render(&ctx, 4, 1);
        assert_eq!(tile.accumulated_samples(), 0);
        assert!(tile.color.iter().all(|c| *c == Vec4::ZERO));
    }

    #[test]
    fn test_context_needs_world_and_camera() {
        let mut ctx = KernelContext::new(small_settings());
        ctx.bind_scene(Arc::new(World::new()));
        assert!(!ctx.is_bound());
        let tile = render(&ctx, 2, 1);
        assert_eq!(tile.accumulated_passes(), 0);

        assert!(context(Vec::new(), small_settings()).is_bound());
    }

    #[test]
    fn test_empty_scene_has_infinite_depth() {
        let ctx = context(Vec::new(), small_settings());
        let tile = render(&ctx, 4, 1);
        assert!(tile.depth.iter().all(|d| d.is_infinite()));
        assert!(tile.color.iter().all(|c| c.w == 0.0 && c.z > 0.0));
    }

    #[test]
    fn test_sphere_depth_at_center() {
        let sphere = Instance::geometry("ball", Shape::sphere(Vec3::ZERO, 1.0));
        let ctx = context(vec![sphere], small_settings());
        let tile = render(&ctx, 9, 1);

        // Center pixel looks straight at the sphere, 2 units away
        let center = tile.depth[4 * 9 + 4];
        assert!((center - 2.0).abs() < 0.15, "depth {}", center);
        assert_eq!(tile.color[4 * 9 + 4].w, 1.0);
        assert!(tile.depth[0].is_infinite());
        assert!(tile.normal[4 * 9 + 4].z > 0.8);
    }

    #[test]
    fn test_backplate_fills_primary_misses() {
        let settings = PathTracerSettings {
            backplate: Some(Arc::new(Backplate::solid(Color::new(0.25, 0.5, 0.75)))),
            ..small_settings()
        };
        let ctx = context(Vec::new(), settings);
        let tile = render(&ctx, 2, 1);
        for c in &tile.color {
            assert!((*c - Vec4::new(0.25, 0.5, 0.75, 1.0)).length() < 1e-5);
        }
    }

    #[test]
    fn test_dense_volume_is_hit_first() {
        let fog = Instance::volume(
            "fog",
            VolumetricModel {
                bounds: Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0)),
                density: 1.0e4,
                albedo: Vec3::splat(0.5),
            },
        );
        let ctx = context(vec![fog], small_settings());
        let tile = render(&ctx, 9, 1);
        let center = tile.depth[4 * 9 + 4];
        assert!(center.is_finite() && (center - 2.0).abs() < 0.15, "depth {}", center);
        assert_eq!(tile.albedo[4 * 9 + 4], Vec3::splat(0.5));
    }

    #[test]
    fn test_render_is_deterministic() {
        let sphere = Instance::geometry("ball", Shape::sphere(Vec3::ZERO, 1.0));
        let ctx = context(vec![sphere], small_settings());
        let a = render(&ctx, 8, 1);
        let b = render(&ctx, 8, 1);
        assert_eq!(a.color, b.color);
    }

    #[test]
    fn test_passes_accumulate() {
        let ctx = context(Vec::new(), small_settings());
        let kernel = CpuPathKernel::new();
        let frame = kernel.init_frame(&ctx, 3, 2, 2);
        let mut tile = Tile::new(TileRegion::new(0, 0, 2, 2, 0));
        kernel.render_tile(&ctx, &frame, &mut tile);
        kernel.render_tile(&ctx, &frame, &mut tile);
        assert_eq!(tile.accumulated_samples(), 4);
        assert_eq!(tile.accumulated_passes(), 2);
    }
}

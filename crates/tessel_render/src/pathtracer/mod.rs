//! Path-tracing renderer.
//!
//! The renderer resolves its world and camera on `commit()`, packs them with
//! its construction-time settings into a [`KernelContext`], and hands that
//! context to every [`RenderTask`] it creates. Tile computation itself is
//! delegated to a [`TracingKernel`].

mod backplate;
pub(crate) mod materials;

pub use backplate::Backplate;
pub use materials::{Glass, Lambertian, Luminous, Metal};

use std::sync::Arc;

use tessel_core::{CameraModel, Material, ParamSet, World};

use crate::kernel::{CpuPathKernel, FrameState, KernelContext, TracingKernel};
use crate::registry::{MaterialRegistry, Registry};
use crate::renderer::{next_generation, RenderJob, Renderer, SceneBinding};
use crate::tile::Tile;
use crate::{FrameBuffer, RenderError, RenderResult};

/// Registered renderer type name.
pub const RENDERER_NAME: &str = "pathtracer";

/// Prefix under which path-tracer materials are registered.
pub const MATERIAL_PREFIX: &str = "pathtracer_";

/// Construction-time tunables. Immutable for the lifetime of a renderer.
#[derive(Debug, Clone)]
pub struct PathTracerSettings {
    /// Maximum number of path segments
    pub max_depth: u32,
    /// Paths whose throughput falls below this are terminated
    pub min_contribution: f32,
    /// Start of every ray interval
    pub epsilon: f32,
    /// Samples per pixel added by each accumulation pass
    pub samples_per_pixel: u32,
    /// Shown behind camera rays that escape the scene
    pub backplate: Option<Arc<Backplate>>,
}

impl Default for PathTracerSettings {
    fn default() -> Self {
        Self {
            max_depth: 20,
            min_contribution: 0.01,
            epsilon: 1e-3,
            samples_per_pixel: 16,
            backplate: None,
        }
    }
}

impl PathTracerSettings {
    /// Read construction parameters, falling back to the defaults:
    /// `"max_depth"`, `"min_contribution"`, `"epsilon"`, `"spp"` and
    /// `"backplate"` (image path).
    pub fn from_params(params: &ParamSet) -> RenderResult<Self> {
        let defaults = Self::default();
        let backplate = match params.get_text("backplate")? {
            Some(path) => Some(Arc::new(Backplate::from_image(path)?)),
            None => None,
        };
        Ok(Self {
            max_depth: params.get_int("max_depth", defaults.max_depth as i64)?.max(0) as u32,
            min_contribution: params.get_float("min_contribution", defaults.min_contribution)?,
            epsilon: params.get_float("epsilon", defaults.epsilon)?,
            samples_per_pixel: params
                .get_int("spp", defaults.samples_per_pixel as i64)?
                .max(1) as u32,
            backplate,
        })
    }
}

/// Renderer-specific name of a material type.
pub fn material_name(type_name: &str) -> String {
    format!("{}{}", MATERIAL_PREFIX, type_name)
}

/// State published by a successful commit.
#[derive(Debug, Clone)]
struct Committed {
    context: Arc<KernelContext>,
    generation: u64,
}

pub struct PathTracer<K: TracingKernel = CpuPathKernel> {
    settings: PathTracerSettings,
    kernel: Arc<K>,
    materials: Arc<MaterialRegistry>,
    params: ParamSet,
    committed: Option<Committed>,
}

impl PathTracer<CpuPathKernel> {
    /// Create a path tracer using the CPU kernel.
    pub fn new(settings: PathTracerSettings, materials: Arc<MaterialRegistry>) -> Self {
        Self::with_kernel(settings, materials, CpuPathKernel::new())
    }
}

impl<K: TracingKernel> PathTracer<K> {
    /// Create a path tracer that delegates tiles to `kernel`.
    pub fn with_kernel(settings: PathTracerSettings, materials: Arc<MaterialRegistry>, kernel: K) -> Self {
        Self {
            settings,
            kernel: Arc::new(kernel),
            materials,
            params: ParamSet::new(),
            committed: None,
        }
    }

    /// Settings fixed at construction.
    pub fn settings(&self) -> &PathTracerSettings {
        &self.settings
    }

    /// Whether a commit has succeeded.
    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// Accumulation generation of the committed state.
    pub fn generation(&self) -> Option<u64> {
        self.committed.as_ref().map(|c| c.generation)
    }

    fn context(&self) -> Option<&Arc<KernelContext>> {
        self.committed.as_ref().map(|c| &c.context)
    }
}

impl<K: TracingKernel + 'static> Renderer for PathTracer<K> {
    fn name(&self) -> &str {
        RENDERER_NAME
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn commit(&mut self) -> RenderResult<()> {
        let binding = SceneBinding::resolve(&self.params, RENDERER_NAME)?;

        let mut context = KernelContext::new(self.settings.clone());
        context.bind_scene(binding.world);
        context.bind_camera(binding.camera);

        let generation = next_generation();
        log::info!(
            "Committed {} (generation {}, {} spp, max depth {})",
            RENDERER_NAME,
            generation,
            self.settings.samples_per_pixel,
            self.settings.max_depth
        );
        self.committed = Some(Committed {
            context: Arc::new(context),
            generation,
        });
        Ok(())
    }

    fn create_material_with(&self, type_name: &str, params: &ParamSet) -> RenderResult<Arc<dyn Material>> {
        let factory = self
            .materials
            .lookup(&material_name(type_name))
            .ok_or_else(|| RenderError::UnknownMaterial {
                renderer: RENDERER_NAME.to_string(),
                type_name: type_name.to_string(),
            })?;
        factory(params)
    }

    fn create_render_job(&self, framebuffer: &FrameBuffer) -> RenderResult<Box<dyn RenderJob>> {
        let committed = self
            .committed
            .as_ref()
            .ok_or_else(|| RenderError::NotCommitted(RENDERER_NAME.to_string()))?;

        let frame = self.kernel.init_frame(
            &committed.context,
            committed.generation,
            framebuffer.width(),
            framebuffer.height(),
        );
        log::debug!(
            "New {} job: {}x{} in {} tiles",
            RENDERER_NAME,
            frame.width,
            frame.height,
            framebuffer.tiles().len()
        );
        Ok(Box::new(RenderTask {
            kernel: Arc::clone(&self.kernel),
            context: Arc::clone(&committed.context),
            frame,
        }))
    }

    fn camera(&self) -> Option<Arc<dyn CameraModel>> {
        self.context()?.camera().cloned()
    }

    fn world(&self) -> Option<Arc<World>> {
        self.context()?.world().cloned()
    }
}

/// Render job of a [`PathTracer`]. Shares only immutable state.
pub struct RenderTask<K: TracingKernel = CpuPathKernel> {
    kernel: Arc<K>,
    context: Arc<KernelContext>,
    frame: FrameState,
}

impl<K: TracingKernel> RenderTask<K> {
    /// Per-frame state the job was created with.
    pub fn frame(&self) -> &FrameState {
        &self.frame
    }
}

impl<K: TracingKernel> RenderJob for RenderTask<K> {
    fn render_tile(&self, tile: &mut Tile) {
        self.kernel.render_tile(&self.context, &self.frame, tile);
    }
}

/// Register the path tracer and its materials.
pub fn register(registry: &mut Registry) {
    registry.register_renderer(RENDERER_NAME, |params, materials| {
        let settings = PathTracerSettings::from_params(params)?;
        Ok(Box::new(PathTracer::new(settings, materials)) as Box<dyn Renderer>)
    });

    registry.register_material(&material_name(Lambertian::TYPE), |params| {
        Ok(Arc::new(Lambertian::from_params(params)?) as Arc<dyn Material>)
    });
    registry.register_material(&material_name(Metal::TYPE), |params| {
        Ok(Arc::new(Metal::from_params(params)?) as Arc<dyn Material>)
    });
    registry.register_material(&material_name(Glass::TYPE), |params| {
        Ok(Arc::new(Glass::from_params(params)?) as Arc<dyn Material>)
    });
    registry.register_material(&material_name(Luminous::TYPE), |params| {
        Ok(Arc::new(Luminous::from_params(params)?) as Arc<dyn Material>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::{Channels, PixelFormat};
    use crate::tile::TileRegion;
    use crate::ErrorKind;
    use tessel_core::{Instance, Param, PerspectiveCamera, Shape, Vec3};

    fn tracer() -> PathTracer {
        let registry = Registry::with_builtins();
        let settings = PathTracerSettings {
            samples_per_pixel: 1,
            max_depth: 3,
            ..Default::default()
        };
        PathTracer::new(settings, registry.materials())
    }

    fn committed_world() -> Arc<World> {
        let mut world = World::new();
        world.set_instances(vec![Arc::new(Instance::geometry(
            "ball",
            Shape::sphere(Vec3::new(0.0, 0.0, -2.0), 1.0),
        ))]);
        world.commit().unwrap();
        Arc::new(world)
    }

    fn camera() -> Param {
        Param::Camera(Arc::new(PerspectiveCamera::new()))
    }

    #[test]
    fn test_default_settings() {
        let settings = PathTracerSettings::default();
        assert_eq!(settings.max_depth, 20);
        assert_eq!(settings.min_contribution, 0.01);
        assert_eq!(settings.epsilon, 1e-3);
        assert_eq!(settings.samples_per_pixel, 16);
        assert!(settings.backplate.is_none());
    }

    #[test]
    fn test_settings_from_params() {
        let params = ParamSet::new()
            .with("max_depth", Param::Int(5))
            .with("spp", Param::Int(0))
            .with("epsilon", Param::Float(1e-4));
        let settings = PathTracerSettings::from_params(&params).unwrap();
        assert_eq!(settings.max_depth, 5);
        assert_eq!(settings.samples_per_pixel, 1);
        assert_eq!(settings.epsilon, 1e-4);
        assert_eq!(settings.min_contribution, 0.01);

        let missing = ParamSet::new().with("backplate", Param::Text("/nonexistent/plate.png".into()));
        assert!(PathTracerSettings::from_params(&missing).is_err());
    }

    #[test]
    fn test_commit_without_world_fails() {
        let mut pt = tracer();
        pt.set_param("camera", camera());
        let err = pt.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!pt.is_committed());
        assert!(pt.world().is_none());
    }

    #[test]
    fn test_commit_without_camera_fails() {
        let mut pt = tracer();
        pt.set_param("world", Param::World(committed_world()));
        assert!(matches!(pt.commit(), Err(RenderError::MissingCamera(_))));
        assert!(pt.camera().is_none());
    }

    #[test]
    fn test_failed_commit_keeps_previous_binding() {
        let mut pt = tracer();
        let world = committed_world();
        pt.set_param("world", Param::World(Arc::clone(&world)));
        pt.set_param("camera", camera());
        pt.commit().unwrap();
        let generation = pt.generation();

        pt.params_mut().remove("camera");
        assert!(pt.commit().is_err());
        assert!(Arc::ptr_eq(&pt.world().unwrap(), &world));
        assert!(pt.camera().is_some());
        assert_eq!(pt.generation(), generation);
    }

    #[test]
    fn test_model_key_fallback() {
        let mut pt = tracer();
        let world = committed_world();
        pt.set_param("model", Param::World(Arc::clone(&world)));
        pt.set_param("camera", camera());
        pt.commit().unwrap();
        assert!(Arc::ptr_eq(&pt.world().unwrap(), &world));
    }

    #[test]
    fn test_recommit_starts_new_generation() {
        let mut pt = tracer();
        pt.set_param("world", Param::World(committed_world()));
        pt.set_param("camera", camera());
        pt.commit().unwrap();
        let first = pt.generation().unwrap();
        pt.commit().unwrap();
        assert!(pt.generation().unwrap() > first);
    }

    #[test]
    fn test_create_material() {
        let pt = tracer();
        let material = pt.create_material("lambertian").unwrap();
        assert_eq!(material.type_name(), "lambertian");

        let params = ParamSet::new().with("intensity", Param::Float(5.0));
        let light = pt.create_material_with("luminous", &params).unwrap();
        assert_eq!(light.type_name(), "luminous");
    }

    #[test]
    fn test_unknown_material_is_an_error() {
        let pt = tracer();
        let err = pt.create_material("velvet").unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnknownMaterial { ref type_name, .. } if type_name == "velvet"
        ));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_job_requires_commit() {
        let pt = tracer();
        let fb = FrameBuffer::new(4, 4, PixelFormat::Rgba32f, Channels::COLOR_ONLY).unwrap();
        assert!(matches!(pt.create_render_job(&fb), Err(RenderError::NotCommitted(_))));
    }

    #[test]
    fn test_job_renders_tile() {
        let mut pt = tracer();
        pt.set_param("world", Param::World(committed_world()));
        pt.set_param("camera", camera());
        pt.commit().unwrap();

        let fb = FrameBuffer::new(8, 8, PixelFormat::Rgba32f, Channels::ALL).unwrap();
        let job = pt.create_render_job(&fb).unwrap();
        let mut tile = Tile::new(TileRegion::new(0, 0, 8, 8, 0));
        job.render_tile(&mut tile);

        assert_eq!(tile.accumulated_samples(), 1);
        // The sphere covers the middle of the image
        assert!(tile.depth[4 * 8 + 4].is_finite());
        assert!(tile.depth[0].is_infinite());
    }
}

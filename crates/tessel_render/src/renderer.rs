//! Renderer and render-job contracts.
//!
//! A renderer is configured through named parameters, validated by
//! `commit()`, and then produces one [`RenderJob`] per frame. Jobs render
//! tiles independently and may be driven from many threads at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tessel_core::{CameraModel, Material, Param, ParamSet, World};

use crate::tile::Tile;
use crate::{FrameBuffer, RenderError, RenderResult};

/// Keys a renderer looks for its world under, in priority order.
/// `"model"` is the legacy name.
pub const WORLD_KEYS: &[&str] = &["world", "model"];

/// Key a renderer looks for its camera under.
pub const CAMERA_KEY: &str = "camera";

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Process-unique number identifying one successful renderer commit.
pub fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Unit of work that renders the tiles of one frame.
pub trait RenderJob: Send + Sync {
    /// Compute every pixel of `tile`.
    ///
    /// Safe to call concurrently for different tiles. Repeated calls on the
    /// same tile accumulate samples.
    fn render_tile(&self, tile: &mut Tile);
}

pub trait Renderer: Send + Sync {
    /// Registered type name.
    fn name(&self) -> &str;

    fn params(&self) -> &ParamSet;

    fn params_mut(&mut self) -> &mut ParamSet;

    fn set_param(&mut self, key: &str, value: Param) {
        self.params_mut().set(key, value);
    }

    /// Bind world and camera from the current parameters.
    ///
    /// Either the renderer ends up fully bound or an error is returned and
    /// the previously committed state stays in effect.
    fn commit(&mut self) -> RenderResult<()>;

    /// Create a renderer-specific material with default parameters.
    fn create_material(&self, type_name: &str) -> RenderResult<Arc<dyn Material>> {
        self.create_material_with(type_name, &ParamSet::new())
    }

    fn create_material_with(
        &self,
        type_name: &str,
        params: &ParamSet,
    ) -> RenderResult<Arc<dyn Material>>;

    /// Prepare a new frame for `framebuffer` and return its job.
    fn create_render_job(&self, framebuffer: &FrameBuffer) -> RenderResult<Box<dyn RenderJob>>;

    /// Camera bound by the last successful commit.
    fn camera(&self) -> Option<Arc<dyn CameraModel>>;

    /// World bound by the last successful commit.
    fn world(&self) -> Option<Arc<World>>;
}

/// World and camera resolved from renderer parameters.
#[derive(Debug, Clone)]
pub struct SceneBinding {
    pub world: Arc<World>,
    pub camera: Arc<dyn CameraModel>,
}

impl SceneBinding {
    /// Resolve the binding, failing on a missing or uncommitted world or a
    /// missing camera.
    pub fn resolve(params: &ParamSet, renderer: &str) -> RenderResult<Self> {
        let world = params
            .find_world(WORLD_KEYS)?
            .ok_or_else(|| RenderError::MissingWorld {
                renderer: renderer.to_string(),
                keys: WORLD_KEYS,
            })?;
        if !world.is_committed() {
            return Err(RenderError::UncommittedWorld(renderer.to_string()));
        }

        let camera = params
            .get_camera(CAMERA_KEY)?
            .ok_or_else(|| RenderError::MissingCamera(renderer.to_string()))?;

        Ok(Self { world, camera })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use tessel_core::PerspectiveCamera;

    fn committed_world() -> Arc<World> {
        let mut world = World::new();
        world.commit().unwrap();
        Arc::new(world)
    }

    #[test]
    fn test_generations_are_unique() {
        let a = next_generation();
        let b = next_generation();
        assert!(b > a);
    }

    #[test]
    fn test_missing_world() {
        let params = ParamSet::new().with(CAMERA_KEY, Param::Camera(Arc::new(PerspectiveCamera::new())));
        let err = SceneBinding::resolve(&params, "pathtracer").unwrap_err();
        assert!(matches!(err, RenderError::MissingWorld { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_missing_camera() {
        let params = ParamSet::new().with("world", Param::World(committed_world()));
        let err = SceneBinding::resolve(&params, "pathtracer").unwrap_err();
        assert!(matches!(err, RenderError::MissingCamera(_)));
    }

    #[test]
    fn test_uncommitted_world_is_rejected() {
        let params = ParamSet::new()
            .with("world", Param::World(Arc::new(World::new())))
            .with(CAMERA_KEY, Param::Camera(Arc::new(PerspectiveCamera::new())));
        let err = SceneBinding::resolve(&params, "pathtracer").unwrap_err();
        assert!(matches!(err, RenderError::UncommittedWorld(_)));
    }

    #[test]
    fn test_legacy_model_key() {
        let world = committed_world();
        let params = ParamSet::new()
            .with("model", Param::World(Arc::clone(&world)))
            .with(CAMERA_KEY, Param::Camera(Arc::new(PerspectiveCamera::new())));
        let binding = SceneBinding::resolve(&params, "pathtracer").unwrap();
        assert!(Arc::ptr_eq(&binding.world, &world));
    }
}

//! Name-keyed factories for renderers, frame operations and materials.
//!
//! Nothing registers itself: the application builds a [`Registry`] at
//! startup, usually through [`Registry::with_builtins`], and adds its own
//! types with the `register_*` calls.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tessel_core::{Material, ParamSet};

use crate::frame_op::{self, FrameOp};
use crate::pathtracer;
use crate::renderer::Renderer;
use crate::{RenderError, RenderResult};

pub type MaterialFactory = fn(&ParamSet) -> RenderResult<Arc<dyn Material>>;

/// Builds a renderer from construction parameters. Renderers get the
/// material table so they can resolve their own material names.
pub type RendererFactory = fn(&ParamSet, Arc<MaterialRegistry>) -> RenderResult<Box<dyn Renderer>>;

pub type FrameOpFactory = fn(&ParamSet) -> RenderResult<Arc<dyn FrameOp>>;

/// Material factories keyed by their full (renderer-prefixed) name.
#[derive(Clone, Default)]
pub struct MaterialRegistry {
    factories: HashMap<String, MaterialFactory>,
}

impl MaterialRegistry {
    /// Create an empty material table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one of the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: MaterialFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Factory registered under the full material name.
    pub fn lookup(&self, name: &str) -> Option<MaterialFactory> {
        self.factories.get(name).copied()
    }

    /// Number of registered materials.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no material is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for MaterialRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort_unstable();
        f.debug_struct("MaterialRegistry").field("materials", &names).finish()
    }
}

#[derive(Default)]
pub struct Registry {
    renderers: HashMap<String, RendererFactory>,
    frame_ops: HashMap<String, FrameOpFactory>,
    materials: Arc<MaterialRegistry>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the path tracer, its materials and the built-in
    /// frame operations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        pathtracer::register(&mut registry);
        frame_op::register(&mut registry);
        log::debug!(
            "Registered {} renderers, {} frame operations, {} materials",
            registry.renderers.len(),
            registry.frame_ops.len(),
            registry.materials.len()
        );
        registry
    }

    /// Register a renderer factory, replacing any previous one of the same name.
    pub fn register_renderer(&mut self, name: impl Into<String>, factory: RendererFactory) {
        self.renderers.insert(name.into(), factory);
    }

    /// Register a frame operation factory, replacing any previous one of the same name.
    pub fn register_frame_op(&mut self, name: impl Into<String>, factory: FrameOpFactory) {
        self.frame_ops.insert(name.into(), factory);
    }

    /// Register a material factory under its full name.
    ///
    /// Renderers created earlier keep the material table they were created
    /// with.
    pub fn register_material(&mut self, name: impl Into<String>, factory: MaterialFactory) {
        Arc::make_mut(&mut self.materials).register(name, factory);
    }

    /// Shared handle to the material table.
    pub fn materials(&self) -> Arc<MaterialRegistry> {
        Arc::clone(&self.materials)
    }

    /// Build the renderer registered under `name`.
    pub fn create_renderer(&self, name: &str, params: &ParamSet) -> RenderResult<Box<dyn Renderer>> {
        let factory = self
            .renderers
            .get(name)
            .ok_or_else(|| RenderError::UnknownRenderer(name.to_string()))?;
        factory(params, self.materials())
    }

    /// Build the frame operation registered under `name`.
    pub fn create_frame_op(&self, name: &str, params: &ParamSet) -> RenderResult<Arc<dyn FrameOp>> {
        let factory = self
            .frame_ops
            .get(name)
            .ok_or_else(|| RenderError::UnknownFrameOp(name.to_string()))?;
        factory(params)
    }

    /// Registered renderer names, sorted.
    pub fn renderer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.renderers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered frame operation names, sorted.
    pub fn frame_op_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.frame_ops.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_op::DepthFrameOp;
    use crate::ErrorKind;
    use tessel_core::Param;

    #[test]
    fn test_builtins() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.renderer_names(), vec!["pathtracer"]);
        assert_eq!(registry.frame_op_names(), vec!["frame_depth", "frame_tonemap"]);
        for name in ["lambertian", "metal", "glass", "luminous"] {
            assert!(registry.materials().lookup(&format!("pathtracer_{}", name)).is_some());
        }
    }

    #[test]
    fn test_unknown_names_are_errors() {
        let registry = Registry::with_builtins();
        let err = registry.create_renderer("raycaster", &ParamSet::new()).err().unwrap();
        assert!(matches!(err, RenderError::UnknownRenderer(ref n) if n == "raycaster"));
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = registry.create_frame_op("frame_blur", &ParamSet::new()).err().unwrap();
        assert!(matches!(err, RenderError::UnknownFrameOp(_)));
    }

    #[test]
    fn test_lookup_misses_unprefixed_names() {
        let registry = Registry::with_builtins();
        assert!(registry.materials().lookup("lambertian").is_none());
    }

    #[test]
    fn test_create_renderer_with_params() {
        let registry = Registry::with_builtins();
        let params = ParamSet::new().with("spp", Param::Int(2));
        let renderer = registry.create_renderer("pathtracer", &params).unwrap();
        assert_eq!(renderer.name(), "pathtracer");
        assert!(renderer.create_material("metal").is_ok());
    }

    #[test]
    fn test_custom_frame_op() {
        let mut registry = Registry::new();
        registry.register_frame_op("my_depth", |_| Ok(Arc::new(DepthFrameOp) as Arc<dyn FrameOp>));
        let op = registry.create_frame_op("my_depth", &ParamSet::new()).unwrap();
        assert_eq!(op.name(), "frame_depth");
    }

    #[test]
    fn test_material_registration_does_not_leak_into_existing_handles() {
        let mut registry = Registry::new();
        let before = registry.materials();
        registry.register_material("pathtracer_lambertian", |params| {
            Ok(Arc::new(pathtracer::Lambertian::from_params(params)?) as Arc<dyn Material>)
        });
        assert!(before.lookup("pathtracer_lambertian").is_none());
        assert!(registry.materials().lookup("pathtracer_lambertian").is_some());
    }
}

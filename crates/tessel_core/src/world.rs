//! The World: the set of instances a renderer traces against.
//!
//! A world is a generalization of a scene in the acceleration library: a
//! collection of geometries and volumes that rays can be traced against, and
//! that can afterwards be queried for the material or medium belonging to a
//! hit.

use std::fmt;
use std::sync::Arc;

use crate::{
    BvhBuilder, Instance, Interval, Material, Param, ParamSet, Primitive, Ray, SceneBuilder,
    SceneError, SceneResult, SurfaceHit, TraceableScene, VolumetricModel,
};

/// Parameter key holding the instance list.
pub const INSTANCES_PARAM: &str = "instances";

pub struct World {
    params: ParamSet,
    builder: Arc<dyn SceneBuilder>,

    instances: Vec<Arc<Instance>>,
    num_geometries: usize,
    num_volumes: usize,

    // Either both None (uncommitted) or both Some and built from `instances`
    geometry_scene: Option<Arc<dyn TraceableScene>>,
    volume_scene: Option<Arc<dyn TraceableScene>>,
}

impl World {
    /// Empty world using the default BVH builder.
    pub fn new() -> Self {
        Self::with_builder(Arc::new(BvhBuilder))
    }

    /// Create an empty world that builds its handles with `builder`.
    pub fn with_builder(builder: Arc<dyn SceneBuilder>) -> Self {
        Self {
            params: ParamSet::new(),
            builder,
            instances: Vec::new(),
            num_geometries: 0,
            num_volumes: 0,
            geometry_scene: None,
            volume_scene: None,
        }
    }

    /// Parameters set on this world.
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// Set a parameter. Takes effect at the next commit.
    pub fn set_param(&mut self, key: impl Into<String>, value: Param) {
        self.params.set(key, value);
    }

    /// Shorthand for setting the `"instances"` parameter.
    pub fn set_instances(&mut self, instances: Vec<Arc<Instance>>) {
        self.params.set(INSTANCES_PARAM, Param::Instances(instances));
    }

    /// Validate the instance parameter and rebuild both acceleration handles.
    ///
    /// Fails on the first invalid instance. On failure the previously
    /// committed state is left as it was.
    pub fn commit(&mut self) -> SceneResult<()> {
        let instances: Vec<Arc<Instance>> = self
            .params
            .get_instances(INSTANCES_PARAM)?
            .map(<[Arc<Instance>]>::to_vec)
            .unwrap_or_default();

        for (index, instance) in instances.iter().enumerate() {
            instance
                .validate()
                .map_err(|reason| SceneError::InvalidInstance {
                    index,
                    name: instance.name.clone(),
                    reason,
                })?;
        }

        let mut geometry: Vec<Primitive> = Vec::new();
        let mut volumes: Vec<Primitive> = Vec::new();
        for (index, instance) in instances.iter().enumerate() {
            if instance.is_volume() {
                volumes.extend(instance.primitives(index));
            } else {
                geometry.extend(instance.primitives(index));
            }
        }

        let num_volumes = instances.iter().filter(|i| i.is_volume()).count();
        let num_geometries = instances.len() - num_volumes;

        let geometry_scene = self.builder.build(geometry)?;
        let volume_scene = self.builder.build(volumes)?;

        log::info!(
            "World committed: {} geometries ({} primitives), {} volumes",
            num_geometries,
            geometry_scene.primitive_count(),
            num_volumes
        );

        self.instances = instances;
        self.num_geometries = num_geometries;
        self.num_volumes = num_volumes;
        self.geometry_scene = Some(geometry_scene);
        self.volume_scene = Some(volume_scene);
        Ok(())
    }

    /// Whether both acceleration handles are built.
    pub fn is_committed(&self) -> bool {
        self.geometry_scene.is_some() && self.volume_scene.is_some()
    }

    /// Instances in insertion order.
    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    /// Number of geometry instances at the last commit.
    pub fn num_geometries(&self) -> usize {
        self.num_geometries
    }

    /// Number of volume instances at the last commit.
    pub fn num_volumes(&self) -> usize {
        self.num_volumes
    }

    /// Committed geometry handle.
    pub fn geometry_scene(&self) -> Option<&Arc<dyn TraceableScene>> {
        self.geometry_scene.as_ref()
    }

    /// Committed volume handle.
    pub fn volume_scene(&self) -> Option<&Arc<dyn TraceableScene>> {
        self.volume_scene.as_ref()
    }

    /// Nearest surface hit among committed geometry instances.
    pub fn trace(&self, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit> {
        self.geometry_scene.as_ref()?.intersect(ray, ray_t)
    }

    /// Nearest volume entry among committed volume instances.
    pub fn trace_volume(&self, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit> {
        self.volume_scene.as_ref()?.intersect(ray, ray_t)
    }

    /// Material of the committed instance at `index`.
    pub fn material(&self, index: usize) -> Option<&Arc<dyn Material>> {
        self.instances.get(index)?.material()
    }

    /// Medium of the committed volume instance at `index`.
    pub fn volume(&self, index: usize) -> Option<&VolumetricModel> {
        self.instances.get(index)?.volume_model()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("instances", &self.instances.len())
            .field("num_geometries", &self.num_geometries)
            .field("num_volumes", &self.num_volumes)
            .field("committed", &self.is_committed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Aabb, Shape, TriangleMesh};
    use glam::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ball(name: &str, z: f32) -> Arc<Instance> {
        Arc::new(Instance::geometry(name, Shape::sphere(Vec3::new(0.0, 0.0, z), 0.5)))
    }

    fn fog() -> Arc<Instance> {
        Arc::new(Instance::volume(
            "fog",
            VolumetricModel {
                bounds: Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0)),
                density: 0.2,
                albedo: Vec3::ONE,
            },
        ))
    }

    #[test]
    fn test_new_world_is_uncommitted() {
        let world = World::new();
        assert!(!world.is_committed());
        assert!(world.geometry_scene().is_none());
        assert!(world.volume_scene().is_none());
        assert!(world.trace(&Ray::new(Vec3::ZERO, -Vec3::Z), Interval::from_epsilon(1e-3)).is_none());
    }

    #[test]
    fn test_two_geometries_no_volumes() {
        let mut world = World::new();
        world.set_instances(vec![ball("a", -2.0), ball("b", -4.0)]);
        world.commit().unwrap();

        assert_eq!(world.num_geometries(), 2);
        assert_eq!(world.num_volumes(), 0);
        assert!(world.is_committed());
        assert_eq!(world.geometry_scene().unwrap().primitive_count(), 2);
        // Volume handle is empty but valid
        assert_eq!(world.volume_scene().unwrap().primitive_count(), 0);
    }

    #[test]
    fn test_counts_match_instance_kinds() {
        let mut world = World::new();
        let quad = Arc::new(Instance::geometry(
            "floor",
            Shape::mesh(TriangleMesh::quad(Vec3::new(-5.0, -1.0, 5.0), Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -10.0))),
        ));
        world.set_instances(vec![ball("a", -2.0), fog(), quad]);
        world.commit().unwrap();

        assert_eq!(world.num_geometries() + world.num_volumes(), 3);
        assert_eq!(world.num_geometries(), 2);
        assert_eq!(world.num_volumes(), 1);
        assert!(world.volume(1).is_some());
        assert!(world.material(1).is_none());
    }

    #[test]
    fn test_commit_is_idempotent() {
        let mut world = World::new();
        world.set_instances(vec![ball("a", -2.0)]);
        world.commit().unwrap();
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let first = world.trace(&ray, Interval::from_epsilon(1e-3)).unwrap();

        world.commit().unwrap();
        let second = world.trace(&ray, Interval::from_epsilon(1e-3)).unwrap();
        assert_eq!(world.num_geometries(), 1);
        assert_eq!(first.t, second.t);
        assert_eq!(first.instance, second.instance);
    }

    #[test]
    fn test_invalid_instance_fails_and_keeps_previous_state() {
        let mut world = World::new();
        world.set_instances(vec![ball("a", -2.0)]);
        world.commit().unwrap();

        let broken = Arc::new(Instance::geometry("broken", Shape::sphere(Vec3::ZERO, -1.0)));
        world.set_instances(vec![ball("a", -2.0), ball("b", -3.0), broken]);
        let err = world.commit().unwrap_err();

        match err {
            SceneError::InvalidInstance { index, name, .. } => {
                assert_eq!(index, 2);
                assert_eq!(name, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(world.num_geometries(), 1);
        assert!(world.is_committed());
    }

    #[test]
    fn test_volume_trace() {
        let mut world = World::new();
        world.set_instances(vec![fog()]);
        world.commit().unwrap();

        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z);
        let hit = world.trace_volume(&ray, Interval::from_epsilon(1e-3)).unwrap();
        assert!((hit.t - 4.0).abs() < 1e-4);
        assert!((hit.t_exit - 6.0).abs() < 1e-4);
        assert!(world.trace(&ray, Interval::from_epsilon(1e-3)).is_none());
    }

    struct CountingBuilder(AtomicUsize);

    impl SceneBuilder for CountingBuilder {
        fn build(&self, primitives: Vec<Primitive>) -> SceneResult<Arc<dyn TraceableScene>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            BvhBuilder.build(primitives)
        }
    }

    #[test]
    fn test_commit_builds_both_handles_through_builder() {
        let builder = Arc::new(CountingBuilder(AtomicUsize::new(0)));
        let mut world = World::with_builder(builder.clone());
        world.set_instances(vec![ball("a", -2.0)]);
        world.commit().unwrap();
        world.commit().unwrap();
        assert_eq!(builder.0.load(Ordering::SeqCst), 4);
    }
}

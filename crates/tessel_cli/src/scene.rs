//! Built-in demo scene.

use std::sync::Arc;

use anyhow::{Context, Result};
use tessel_core::{
    Aabb, Instance, Mat4, Param, ParamSet, PerspectiveCamera, Shape, TriangleMesh, Vec3, VolumetricModel,
    World,
};
use tessel_render::Renderer;

fn color(r: f32, g: f32, b: f32) -> ParamSet {
    ParamSet::new().with("color", Param::Vec3(Vec3::new(r, g, b)))
}

/// Ground plane, three spheres, a small light and a patch of fog.
///
/// Materials come from `renderer` so the scene works with whatever
/// material namespace it uses.
pub fn build_world(renderer: &dyn Renderer) -> Result<World> {
    let ground = renderer.create_material_with("lambertian", &color(0.5, 0.5, 0.5))?;
    let diffuse = renderer.create_material_with("lambertian", &color(0.4, 0.2, 0.1))?;
    let metal = renderer.create_material_with(
        "metal",
        &color(0.7, 0.6, 0.5).with("roughness", Param::Float(0.05)),
    )?;
    let glass = renderer.create_material_with("glass", &ParamSet::new().with("eta", Param::Float(1.5)))?;
    let light = renderer.create_material_with(
        "luminous",
        &color(1.0, 0.9, 0.8).with("intensity", Param::Float(8.0)),
    )?;

    let floor = TriangleMesh::quad(
        Vec3::new(-20.0, 0.0, 20.0),
        Vec3::new(40.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, -40.0),
    );
    let fog = VolumetricModel {
        bounds: Aabb::from_points(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
        density: 0.6,
        albedo: Vec3::new(0.8, 0.85, 0.9),
    };

    let instances = vec![
        Instance::geometry("ground", Shape::mesh(floor)).with_material(ground),
        Instance::geometry("glass_ball", Shape::sphere(Vec3::ZERO, 1.0))
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)))
            .with_material(glass),
        Instance::geometry("clay_ball", Shape::sphere(Vec3::new(-4.0, 1.0, 0.0), 1.0)).with_material(diffuse),
        Instance::geometry("metal_ball", Shape::sphere(Vec3::new(4.0, 1.0, 0.0), 1.0)).with_material(metal),
        Instance::geometry("lamp", Shape::sphere(Vec3::new(0.0, 4.0, 2.0), 0.5)).with_material(light),
        Instance::volume("fog", fog).with_transform(Mat4::from_translation(Vec3::new(2.0, 0.0, 2.0))),
    ];

    let mut world = World::new();
    world.set_instances(instances.into_iter().map(Arc::new).collect());
    world.commit().context("Failed to commit demo world")?;
    Ok(world)
}

/// Camera looking at the demo scene from the front right.
pub fn camera(aspect: f32) -> PerspectiveCamera {
    PerspectiveCamera::new()
        .with_position(Vec3::new(13.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y)
        .with_lens(20.0, 0.3, 10.0)
        .with_aspect(aspect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_render::Registry;

    #[test]
    fn test_demo_world_commits() {
        let registry = Registry::with_builtins();
        let renderer = registry.create_renderer("pathtracer", &ParamSet::new()).unwrap();
        let world = build_world(renderer.as_ref()).unwrap();
        assert!(world.is_committed());
        assert_eq!(world.num_geometries(), 5);
        assert_eq!(world.num_volumes(), 1);
    }
}

//! Scene instances: transformed geometric or volumetric models.
//!
//! An instance is what a `World` is committed from. Geometry instances carry a
//! shape and an optional material; volume instances carry a homogeneous
//! participating medium bounded by a box.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::{Aabb, Material, Primitive};

/// Indexed triangle mesh in local space.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,
    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Create a new indexed triangle mesh.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    /// Two-triangle quad spanning `corner`, `corner + u` and `corner + v`.
    pub fn quad(corner: Vec3, u: Vec3, v: Vec3) -> Self {
        Self::new(
            vec![corner, corner + u, corner + u + v, corner + v],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// Get the number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn validate(&self) -> Result<(), String> {
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(format!(
                "mesh needs a non-empty index list in multiples of 3, got {}",
                self.indices.len()
            ));
        }
        if let Some(bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(format!(
                "index {} out of range for {} vertices",
                bad,
                self.positions.len()
            ));
        }
        if !self.positions.iter().all(|p| p.is_finite()) {
            return Err("mesh has non-finite vertex positions".to_string());
        }
        Ok(())
    }
}

/// Surface shape of a geometry instance.
#[derive(Debug, Clone)]
pub enum Shape {
    Sphere { center: Vec3, radius: f32 },
    Mesh(Arc<TriangleMesh>),
}

impl Shape {
    /// Create a sphere shape.
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Shape::Sphere { center, radius }
    }

    /// Create a mesh shape.
    pub fn mesh(mesh: TriangleMesh) -> Self {
        Shape::Mesh(Arc::new(mesh))
    }
}

/// A shape with the material it is shaded with.
#[derive(Debug, Clone)]
pub struct GeometricModel {
    pub shape: Shape,
    pub material: Option<Arc<dyn Material>>,
}

/// Homogeneous medium filling an axis-aligned box (in local space).
#[derive(Debug, Clone, Copy)]
pub struct VolumetricModel {
    pub bounds: Aabb,
    /// Extinction coefficient per unit distance
    pub density: f32,
    /// Single-scattering albedo
    pub albedo: Vec3,
}

#[derive(Debug, Clone)]
pub enum InstanceContent {
    Geometry(GeometricModel),
    Volume(VolumetricModel),
}

/// A named, transformed model placed in a world.
#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    /// Local-to-world transform
    pub transform: Mat4,
    pub content: InstanceContent,
}

impl Instance {
    /// Geometry instance with an identity transform and no material.
    pub fn geometry(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            content: InstanceContent::Geometry(GeometricModel {
                shape,
                material: None,
            }),
        }
    }

    /// Volume instance with an identity transform.
    pub fn volume(name: impl Into<String>, model: VolumetricModel) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            content: InstanceContent::Volume(model),
        }
    }

    /// Set the object-to-world transform.
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Attach a material. Has no effect on volume instances.
    pub fn with_material(mut self, material: Arc<dyn Material>) -> Self {
        if let InstanceContent::Geometry(model) = &mut self.content {
            model.material = Some(material);
        }
        self
    }

    /// Whether this instance holds geometry.
    pub fn is_geometry(&self) -> bool {
        matches!(self.content, InstanceContent::Geometry(_))
    }

    /// Whether this instance holds a volume.
    pub fn is_volume(&self) -> bool {
        matches!(self.content, InstanceContent::Volume(_))
    }

    /// Material of a geometry instance.
    pub fn material(&self) -> Option<&Arc<dyn Material>> {
        match &self.content {
            InstanceContent::Geometry(model) => model.material.as_ref(),
            InstanceContent::Volume(_) => None,
        }
    }

    /// Medium of a volume instance.
    pub fn volume_model(&self) -> Option<&VolumetricModel> {
        match &self.content {
            InstanceContent::Volume(model) => Some(model),
            InstanceContent::Geometry(_) => None,
        }
    }

    /// Check that the instance can be committed into a world.
    ///
    /// Returns a human readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if !self.transform.is_finite() {
            return Err("transform has non-finite entries".to_string());
        }
        if self.transform.determinant().abs() < f32::EPSILON {
            return Err("transform is singular".to_string());
        }

        match &self.content {
            InstanceContent::Geometry(model) => match &model.shape {
                Shape::Sphere { center, radius } => {
                    if !center.is_finite() {
                        return Err("sphere center is not finite".to_string());
                    }
                    if !(radius.is_finite() && *radius > 0.0) {
                        return Err(format!("sphere radius must be positive, got {}", radius));
                    }
                    Ok(())
                }
                Shape::Mesh(mesh) => mesh.validate(),
            },
            InstanceContent::Volume(model) => {
                if model.bounds.is_empty() || !model.bounds.is_finite() {
                    return Err("volume bounds are empty or unbounded".to_string());
                }
                if !(model.density.is_finite() && model.density >= 0.0) {
                    return Err(format!("volume density must be >= 0, got {}", model.density));
                }
                Ok(())
            }
        }
    }

    /// World-space primitives for this instance, tagged with `index`.
    ///
    /// Spheres take the largest scale axis of the transform as their radius
    /// scale.
    pub fn primitives(&self, index: usize) -> Vec<Primitive> {
        match &self.content {
            InstanceContent::Geometry(model) => match &model.shape {
                Shape::Sphere { center, radius } => {
                    let (scale, _, _) = self.transform.to_scale_rotation_translation();
                    vec![Primitive::Sphere {
                        center: self.transform.transform_point3(*center),
                        radius: radius * scale.abs().max_element(),
                        instance: index,
                    }]
                }
                Shape::Mesh(mesh) => mesh
                    .indices
                    .chunks_exact(3)
                    .map(|tri| {
                        let p = |i: u32| {
                            self.transform
                                .transform_point3(mesh.positions[i as usize])
                        };
                        Primitive::Triangle {
                            v0: p(tri[0]),
                            v1: p(tri[1]),
                            v2: p(tri[2]),
                            instance: index,
                        }
                    })
                    .collect(),
            },
            InstanceContent::Volume(model) => vec![Primitive::Box {
                bounds: model.bounds.transformed(&self.transform),
                instance: index,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sphere() {
        let inst = Instance::geometry("ball", Shape::sphere(Vec3::ZERO, 1.0));
        assert!(inst.validate().is_ok());
        assert!(inst.is_geometry());
    }

    #[test]
    fn test_rejects_bad_sphere_radius() {
        let inst = Instance::geometry("ball", Shape::sphere(Vec3::ZERO, 0.0));
        assert!(inst.validate().unwrap_err().contains("radius"));
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let mesh = TriangleMesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 3]);
        let inst = Instance::geometry("tri", Shape::mesh(mesh));
        assert!(inst.validate().unwrap_err().contains("out of range"));
    }

    #[test]
    fn test_rejects_singular_transform() {
        let inst = Instance::geometry("flat", Shape::sphere(Vec3::ZERO, 1.0))
            .with_transform(Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)));
        assert!(inst.validate().is_err());
    }

    #[test]
    fn test_quad_primitives_are_transformed() {
        let quad = TriangleMesh::quad(Vec3::ZERO, Vec3::X, Vec3::Y);
        let inst = Instance::geometry("quad", Shape::mesh(quad))
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0)));
        let prims = inst.primitives(7);
        assert_eq!(prims.len(), 2);
        for prim in &prims {
            assert_eq!(prim.instance(), 7);
            assert!((prim.bounds().centroid().z + 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_volume_validation() {
        let good = VolumetricModel {
            bounds: Aabb::from_points(Vec3::ZERO, Vec3::ONE),
            density: 0.5,
            albedo: Vec3::ONE,
        };
        assert!(Instance::volume("fog", good).validate().is_ok());

        let bad = VolumetricModel {
            density: -1.0,
            ..good
        };
        assert!(Instance::volume("fog", bad).validate().is_err());
    }
}

//! Acceleration structure interface and the default BVH implementation.
//!
//! A `World` never touches a concrete acceleration layout. It flattens its
//! instances into [`Primitive`]s, hands them to a [`SceneBuilder`] and keeps
//! the returned [`TraceableScene`] handle for tracing.

use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::{Aabb, Interval, Ray, SceneResult};

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// Intersection record returned by a traceable scene.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHit {
    /// Ray parameter of the hit
    pub t: f32,
    /// Ray parameter where the ray leaves the primitive. Equal to `t` for
    /// surfaces; the exit distance for volume boxes.
    pub t_exit: f32,
    pub point: Vec3,
    /// Unit normal, always facing against the ray
    pub normal: Vec3,
    pub front_face: bool,
    pub uv: Vec2,
    /// Index of the owning instance in the world's instance list
    pub instance: usize,
}

impl SurfaceHit {
    fn facing(ray: &Ray, t: f32, t_exit: f32, outward: Vec3, uv: Vec2, instance: usize) -> Self {
        let front_face = ray.direction.dot(outward) < 0.0;
        Self {
            t,
            t_exit,
            point: ray.at(t),
            normal: if front_face { outward } else { -outward },
            front_face,
            uv,
            instance,
        }
    }
}

/// World-space primitive produced from an instance.
#[derive(Debug, Clone, Copy)]
pub enum Primitive {
    Sphere {
        center: Vec3,
        radius: f32,
        instance: usize,
    },
    Triangle {
        v0: Vec3,
        v1: Vec3,
        v2: Vec3,
        instance: usize,
    },
    /// Volume bounds
    Box { bounds: Aabb, instance: usize },
}

impl Primitive {
    /// Index of the owning instance.
    pub fn instance(&self) -> usize {
        match self {
            Primitive::Sphere { instance, .. }
            | Primitive::Triangle { instance, .. }
            | Primitive::Box { instance, .. } => *instance,
        }
    }

    /// Get the world-space bounding box.
    pub fn bounds(&self) -> Aabb {
        match self {
            Primitive::Sphere { center, radius, .. } => {
                let r = Vec3::splat(*radius);
                Aabb::from_points(*center - r, *center + r)
            }
            Primitive::Triangle { v0, v1, v2, .. } => {
                // Pad thin dimensions to avoid degenerate boxes
                let pad = Vec3::splat(1e-4);
                Aabb::from_points(v0.min(*v1).min(*v2) - pad, v0.max(*v1).max(*v2) + pad)
            }
            Primitive::Box { bounds, .. } => *bounds,
        }
    }

    /// Intersect the ray with this primitive.
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit> {
        match *self {
            Primitive::Sphere {
                center,
                radius,
                instance,
            } => {
                let oc = center - ray.origin;
                let a = ray.direction.length_squared();
                let h = ray.direction.dot(oc);
                let c = oc.length_squared() - radius * radius;

                let discriminant = h * h - a * c;
                if discriminant < 0.0 {
                    return None;
                }
                let sqrtd = discriminant.sqrt();

                // Nearest root in the acceptable range
                let mut root = (h - sqrtd) / a;
                if !ray_t.surrounds(root) {
                    root = (h + sqrtd) / a;
                    if !ray_t.surrounds(root) {
                        return None;
                    }
                }

                let outward = (ray.at(root) - center) / radius;
                let theta = (-outward.y).acos();
                let phi = (-outward.z).atan2(outward.x) + std::f32::consts::PI;
                let uv = Vec2::new(
                    phi / (2.0 * std::f32::consts::PI),
                    theta / std::f32::consts::PI,
                );
                Some(SurfaceHit::facing(ray, root, root, outward, uv, instance))
            }

            // Möller-Trumbore
            Primitive::Triangle {
                v0,
                v1,
                v2,
                instance,
            } => {
                let edge1 = v1 - v0;
                let edge2 = v2 - v0;
                let h = ray.direction.cross(edge2);
                let a = edge1.dot(h);
                if a.abs() < 1e-8 {
                    return None;
                }

                let f = 1.0 / a;
                let s = ray.origin - v0;
                let u = f * s.dot(h);
                if !(0.0..=1.0).contains(&u) {
                    return None;
                }

                let q = s.cross(edge1);
                let v = f * ray.direction.dot(q);
                if v < 0.0 || u + v > 1.0 {
                    return None;
                }

                let t = f * edge2.dot(q);
                if !ray_t.surrounds(t) {
                    return None;
                }

                let outward = edge1.cross(edge2).normalize();
                Some(SurfaceHit::facing(ray, t, t, outward, Vec2::new(u, v), instance))
            }

            Primitive::Box { bounds, instance } => {
                let (t_enter, t_exit) = bounds.intersect(ray, ray_t)?;
                if t_exit <= t_enter {
                    return None;
                }
                let outward = -ray.direction.normalize();
                Some(SurfaceHit::facing(ray, t_enter, t_exit, outward, Vec2::ZERO, instance))
            }
        }
    }
}

/// Opaque handle to a built acceleration structure.
pub trait TraceableScene: Send + Sync {
    /// Nearest hit within `ray_t`.
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit>;

    fn bounds(&self) -> Aabb;

    fn primitive_count(&self) -> usize;
}

/// Builds acceleration structures over a primitive list.
pub trait SceneBuilder: Send + Sync {
    /// Build a scene handle. An empty list must yield a valid, empty scene.
    fn build(&self, primitives: Vec<Primitive>) -> SceneResult<Arc<dyn TraceableScene>>;
}

/// Builder for the default median-split [`Bvh`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BvhBuilder;

impl SceneBuilder for BvhBuilder {
    fn build(&self, primitives: Vec<Primitive>) -> SceneResult<Arc<dyn TraceableScene>> {
        Ok(Arc::new(Bvh::new(primitives)))
    }
}

/// BVH node - either a branch with two children or a leaf with primitives.
enum BvhNode {
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    Leaf {
        primitives: Vec<Primitive>,
        bbox: Aabb,
    },
    Empty,
}

/// Bounding volume hierarchy over world-space primitives.
pub struct Bvh {
    root: BvhNode,
    count: usize,
}

impl Bvh {
    /// Build a BVH over `primitives`.
    pub fn new(primitives: Vec<Primitive>) -> Self {
        let count = primitives.len();
        let root = if primitives.is_empty() {
            BvhNode::Empty
        } else {
            BvhNode::build(primitives)
        };
        Self { root, count }
    }

    /// Whether the BVH holds no primitive.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl BvhNode {
    /// Sort by centroid on the longest centroid axis, split in half, recurse.
    fn build(mut primitives: Vec<Primitive>) -> Self {
        let bbox = primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, p| Aabb::surrounding(&acc, &p.bounds()));

        if primitives.len() <= LEAF_MAX_SIZE {
            return BvhNode::Leaf { primitives, bbox };
        }

        let mut centroid_bounds = Aabb::EMPTY;
        for p in &primitives {
            centroid_bounds.include(p.bounds().centroid());
        }
        let axis = centroid_bounds.longest_axis();

        primitives.sort_unstable_by(|a, b| {
            let a_val = a.bounds().centroid()[axis];
            let b_val = b.bounds().centroid()[axis];
            a_val
                .partial_cmp(&b_val)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let right = primitives.split_off(primitives.len() / 2);
        BvhNode::Branch {
            left: Box::new(Self::build(primitives)),
            right: Box::new(Self::build(right)),
            bbox,
        }
    }

    fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit> {
        match self {
            BvhNode::Empty => None,

            BvhNode::Leaf { primitives, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return None;
                }
                let mut closest: Option<SurfaceHit> = None;
                for prim in primitives {
                    let window = closest.map_or(ray_t, |h| ray_t.clip_max(h.t));
                    if let Some(hit) = prim.intersect(ray, window) {
                        closest = Some(hit);
                    }
                }
                closest
            }

            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return None;
                }
                let hit_left = left.intersect(ray, ray_t);
                // Only check right up to the closest hit
                let window = hit_left.map_or(ray_t, |h| ray_t.clip_max(h.t));
                right.intersect(ray, window).or(hit_left)
            }
        }
    }
}

impl TraceableScene for Bvh {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<SurfaceHit> {
        self.root.intersect(ray, ray_t)
    }

    fn bounds(&self) -> Aabb {
        self.root.bbox()
    }

    fn primitive_count(&self) -> usize {
        self.count
    }
}

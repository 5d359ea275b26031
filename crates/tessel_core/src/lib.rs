//! Tessel Core - Scene container and collaborator interfaces.
//!
//! This crate provides:
//!
//! - **Math types**: `Ray`, `Interval`, `Aabb` on top of glam
//! - **Parameters**: `ParamSet`, the named values objects are committed from
//! - **Scene types**: `Instance`, `World` and the acceleration interfaces
//!   (`SceneBuilder`, `TraceableScene`) with a BVH implementation
//! - **Camera and material traits** consumed by tracing kernels
//!
//! # Example
//!
//! ```ignore
//! use tessel_core::{Instance, Shape, World};
//!
//! let mut world = World::new();
//! world.set_instances(vec![Arc::new(Instance::geometry("ball", Shape::sphere(Vec3::ZERO, 1.0)))]);
//! world.commit()?;
//! println!("{} geometries, {} volumes", world.num_geometries(), world.num_volumes());
//! ```

pub mod accel;
pub mod camera;
pub mod error;
pub mod instance;
pub mod material;
pub mod math;
pub mod params;
pub mod world;

// Re-export commonly used types
pub use accel::{BvhBuilder, Primitive, SceneBuilder, SurfaceHit, TraceableScene};
pub use camera::{CameraModel, PerspectiveCamera};
pub use error::{SceneError, SceneResult};
pub use instance::{GeometricModel, Instance, InstanceContent, Shape, TriangleMesh, VolumetricModel};
pub use material::{Color, Material, Scatter};
pub use math::{Aabb, Interval, Ray};
pub use params::{Param, ParamSet};
pub use world::World;

/// Re-export glam so downstream crates use the same math types
pub use glam::{Mat4, Vec2, Vec3, Vec4};

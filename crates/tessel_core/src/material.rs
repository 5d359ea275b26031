//! Material trait for surface scattering.
//!
//! Concrete materials belong to a renderer and are created through its
//! material registry; the scene only stores them behind this trait.

use std::fmt;

use glam::Vec3;
use rand::RngCore;

use crate::{Ray, SurfaceHit};

/// Color type alias (linear RGB)
pub type Color = Vec3;

/// Result of a successful scatter event.
#[derive(Debug, Clone, Copy)]
pub struct Scatter {
    /// Throughput multiplier for the scattered path
    pub attenuation: Color,
    /// Outgoing direction (not necessarily normalized)
    pub direction: Vec3,
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync + fmt::Debug {
    /// Registered type name without the renderer prefix.
    fn type_name(&self) -> &str;

    /// Scatter an incoming ray. `None` means the path is absorbed.
    fn scatter(&self, incoming: &Ray, hit: &SurfaceHit, rng: &mut dyn RngCore) -> Option<Scatter>;

    /// Light emitted at the hit point. Most materials emit nothing.
    fn emitted(&self, _hit: &SurfaceHit) -> Color {
        Color::ZERO
    }

    /// Base color written to the albedo channel of the frame buffer.
    fn albedo(&self) -> Color;
}

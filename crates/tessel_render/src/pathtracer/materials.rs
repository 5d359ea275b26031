//! Surface materials understood by the path tracer.

use rand::{Rng, RngCore};
use tessel_core::{Color, Material, ParamSet, Ray, Scatter, SurfaceHit, Vec3};

use crate::RenderResult;

/// Uniformly distributed direction on the unit sphere (rejection sampling).
pub(crate) fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Schlick's approximation.
fn reflectance(cosine: f32, eta: f32) -> f32 {
    let r0 = ((1.0 - eta) / (1.0 + eta)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

/// Ideal diffuse surface.
#[derive(Debug, Clone, Copy)]
pub struct Lambertian {
    pub color: Color,
}

impl Lambertian {
    pub const TYPE: &'static str = "lambertian";

    /// Create a new Lambertian material.
    pub fn new(color: Color) -> Self {
        Self { color }
    }

    /// Reads `"color"` (default 0.8 grey).
    pub fn from_params(params: &ParamSet) -> RenderResult<Self> {
        Ok(Self::new(params.get_vec3("color", Vec3::splat(0.8))?))
    }
}

impl Material for Lambertian {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn scatter(&self, _incoming: &Ray, hit: &SurfaceHit, rng: &mut dyn RngCore) -> Option<Scatter> {
        let mut direction = hit.normal + random_unit_vector(rng);
        // Catch degenerate scatter direction
        if direction.length_squared() < 1e-8 {
            direction = hit.normal;
        }
        Some(Scatter {
            attenuation: self.color,
            direction,
        })
    }

    fn albedo(&self) -> Color {
        self.color
    }
}

/// Reflective metal with optional roughness.
#[derive(Debug, Clone, Copy)]
pub struct Metal {
    pub color: Color,
    /// Fuzz radius in `[0, 1]`
    pub roughness: f32,
}

impl Metal {
    pub const TYPE: &'static str = "metal";

    /// Create a new metal material. Roughness is clamped to `[0, 1]`.
    pub fn new(color: Color, roughness: f32) -> Self {
        Self {
            color,
            roughness: roughness.clamp(0.0, 1.0),
        }
    }

    /// Reads `"color"` (default 0.9 grey) and `"roughness"` (default 0).
    pub fn from_params(params: &ParamSet) -> RenderResult<Self> {
        Ok(Self::new(
            params.get_vec3("color", Vec3::splat(0.9))?,
            params.get_float("roughness", 0.0)?,
        ))
    }
}

impl Material for Metal {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn scatter(&self, incoming: &Ray, hit: &SurfaceHit, rng: &mut dyn RngCore) -> Option<Scatter> {
        let reflected = reflect(incoming.direction.normalize(), hit.normal);
        let direction = reflected + self.roughness * random_unit_vector(rng);
        // Fuzzed below the surface: absorb
        if direction.dot(hit.normal) <= 0.0 {
            return None;
        }
        Some(Scatter {
            attenuation: self.color,
            direction,
        })
    }

    fn albedo(&self) -> Color {
        self.color
    }
}

/// Clear dielectric (glass, water).
#[derive(Debug, Clone, Copy)]
pub struct Glass {
    /// Index of refraction
    pub eta: f32,
}

impl Glass {
    pub const TYPE: &'static str = "glass";

    /// Create a new glass material with refractive index `eta`.
    pub fn new(eta: f32) -> Self {
        Self { eta }
    }

    /// Reads `"eta"` (default 1.5).
    pub fn from_params(params: &ParamSet) -> RenderResult<Self> {
        Ok(Self::new(params.get_float("eta", 1.5)?))
    }
}

impl Material for Glass {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn scatter(&self, incoming: &Ray, hit: &SurfaceHit, rng: &mut dyn RngCore) -> Option<Scatter> {
        let ri = if hit.front_face {
            1.0 / self.eta
        } else {
            self.eta
        };

        let unit = incoming.direction.normalize();
        let cos_theta = (-unit).dot(hit.normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

        let cannot_refract = ri * sin_theta > 1.0;
        let direction = if cannot_refract || reflectance(cos_theta, ri) > rng.gen::<f32>() {
            reflect(unit, hit.normal)
        } else {
            refract(unit, hit.normal, ri)
        };

        Some(Scatter {
            attenuation: Color::ONE,
            direction,
        })
    }

    fn albedo(&self) -> Color {
        Color::ONE
    }
}

/// Emitter that absorbs everything it is hit with.
#[derive(Debug, Clone, Copy)]
pub struct Luminous {
    pub color: Color,
    pub intensity: f32,
}

impl Luminous {
    pub const TYPE: &'static str = "luminous";

    /// Create a new emitter.
    pub fn new(color: Color, intensity: f32) -> Self {
        Self { color, intensity }
    }

    /// Reads `"color"` (default white) and `"intensity"` (default 1).
    pub fn from_params(params: &ParamSet) -> RenderResult<Self> {
        Ok(Self::new(
            params.get_vec3("color", Vec3::ONE)?,
            params.get_float("intensity", 1.0)?,
        ))
    }
}

impl Material for Luminous {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn scatter(&self, _incoming: &Ray, _hit: &SurfaceHit, _rng: &mut dyn RngCore) -> Option<Scatter> {
        None
    }

    fn emitted(&self, hit: &SurfaceHit) -> Color {
        if hit.front_face {
            self.color * self.intensity
        } else {
            Color::ZERO
        }
    }

    fn albedo(&self) -> Color {
        self.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tessel_core::{Param, Vec2};

    fn hit_facing_up() -> SurfaceHit {
        SurfaceHit {
            t: 1.0,
            t_exit: 1.0,
            point: Vec3::ZERO,
            normal: Vec3::Y,
            front_face: true,
            uv: Vec2::ZERO,
            instance: 0,
        }
    }

    #[test]
    fn test_random_unit_vector_is_unit() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let v = random_unit_vector(&mut rng);
            assert!((v.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_lambertian_scatters_into_hemisphere() {
        let mut rng = StdRng::seed_from_u64(1);
        let material = Lambertian::new(Vec3::new(0.5, 0.2, 0.1));
        let ray = Ray::new(Vec3::Y, -Vec3::Y);
        for _ in 0..50 {
            let s = material.scatter(&ray, &hit_facing_up(), &mut rng).unwrap();
            assert!(s.direction.dot(Vec3::Y) >= 0.0);
            assert_eq!(s.attenuation, Vec3::new(0.5, 0.2, 0.1));
        }
    }

    #[test]
    fn test_smooth_metal_mirrors() {
        let mut rng = StdRng::seed_from_u64(1);
        let ray = Ray::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0));
        let s = Metal::new(Vec3::ONE, 0.0).scatter(&ray, &hit_facing_up(), &mut rng).unwrap();
        let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!((s.direction - expected).length() < 1e-5);
    }

    #[test]
    fn test_glass_passes_straight_through_at_normal_incidence() {
        // At normal incidence reflectance is 4%, so most draws refract
        let mut rng = StdRng::seed_from_u64(3);
        let ray = Ray::new(Vec3::Y, -Vec3::Y);
        let refracted = (0..100)
            .filter(|_| {
                let s = Glass::new(1.5).scatter(&ray, &hit_facing_up(), &mut rng).unwrap();
                s.direction.y < 0.0
            })
            .count();
        assert!(refracted > 80);
    }

    #[test]
    fn test_luminous_emits_from_front_only() {
        let light = Luminous::new(Vec3::ONE, 4.0);
        assert_eq!(light.emitted(&hit_facing_up()), Vec3::splat(4.0));
        let back = SurfaceHit {
            front_face: false,
            ..hit_facing_up()
        };
        assert_eq!(light.emitted(&back), Vec3::ZERO);
    }

    #[test]
    fn test_from_params() {
        let params = ParamSet::new()
            .with("color", Param::Vec3(Vec3::X))
            .with("roughness", Param::Float(3.0));
        let metal = Metal::from_params(&params).unwrap();
        assert_eq!(metal.color, Vec3::X);
        assert_eq!(metal.roughness, 1.0);

        let bad = ParamSet::new().with("eta", Param::Text("thick".into()));
        assert!(Glass::from_params(&bad).is_err());
    }
}

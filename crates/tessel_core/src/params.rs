//! Named parameters that scene objects and renderers are committed from.
//!
//! Objects collect parameters between commits and only read them when
//! `commit()` runs, so a parameter change has no effect until the next
//! commit.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;

use crate::{CameraModel, Instance, Material, SceneError, SceneResult, World};

/// A single parameter value.
#[derive(Debug, Clone)]
pub enum Param {
    Bool(bool),
    Int(i64),
    Float(f32),
    Vec3(Vec3),
    Text(String),
    Instances(Vec<Arc<Instance>>),
    World(Arc<World>),
    Camera(Arc<dyn CameraModel>),
    Material(Arc<dyn Material>),
}

impl Param {
    fn kind(&self) -> &'static str {
        match self {
            Param::Bool(_) => "bool",
            Param::Int(_) => "int",
            Param::Float(_) => "float",
            Param::Vec3(_) => "vec3",
            Param::Text(_) => "text",
            Param::Instances(_) => "instances",
            Param::World(_) => "world",
            Param::Camera(_) => "camera",
            Param::Material(_) => "material",
        }
    }
}

/// Parameter map keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    values: HashMap<String, Param>,
}

impl ParamSet {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: Param) -> Self {
        self.set(key, value);
        self
    }

    /// Set a parameter, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Param) {
        self.values.insert(key.into(), value);
    }

    /// Remove a parameter.
    pub fn remove(&mut self, key: &str) -> Option<Param> {
        self.values.remove(key)
    }

    /// Get a raw parameter.
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.values.get(key)
    }

    /// Whether `key` is set.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn mismatch(key: &str, expected: &'static str) -> SceneError {
        SceneError::ParamType {
            key: key.to_string(),
            expected,
        }
    }

    /// Float parameter, accepting ints. Absent keys yield `default`.
    pub fn get_float(&self, key: &str, default: f32) -> SceneResult<f32> {
        match self.get(key) {
            None => Ok(default),
            Some(Param::Float(v)) => Ok(*v),
            Some(Param::Int(v)) => Ok(*v as f32),
            Some(_) => Err(Self::mismatch(key, "float")),
        }
    }

    /// Get an integer, or `default` when unset.
    pub fn get_int(&self, key: &str, default: i64) -> SceneResult<i64> {
        match self.get(key) {
            None => Ok(default),
            Some(Param::Int(v)) => Ok(*v),
            Some(_) => Err(Self::mismatch(key, "int")),
        }
    }

    /// Get a vector, or `default` when unset.
    pub fn get_vec3(&self, key: &str, default: Vec3) -> SceneResult<Vec3> {
        match self.get(key) {
            None => Ok(default),
            Some(Param::Vec3(v)) => Ok(*v),
            Some(Param::Float(v)) => Ok(Vec3::splat(*v)),
            Some(_) => Err(Self::mismatch(key, "vec3")),
        }
    }

    /// Get a string, if set.
    pub fn get_text(&self, key: &str) -> SceneResult<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Param::Text(text)) => Ok(Some(text.as_str())),
            Some(_) => Err(Self::mismatch(key, "text")),
        }
    }

    /// Get an instance list, if set.
    pub fn get_instances(&self, key: &str) -> SceneResult<Option<&[Arc<Instance>]>> {
        match self.get(key) {
            None => Ok(None),
            Some(Param::Instances(list)) => Ok(Some(list.as_slice())),
            Some(_) => Err(Self::mismatch(key, "instances")),
        }
    }

    /// Get a camera, if set.
    pub fn get_camera(&self, key: &str) -> SceneResult<Option<Arc<dyn CameraModel>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Param::Camera(camera)) => Ok(Some(Arc::clone(camera))),
            Some(_) => Err(Self::mismatch(key, "camera")),
        }
    }

    /// Resolve a world from an ordered list of candidate keys.
    ///
    /// The first key that is present wins; later keys are only consulted
    /// when earlier ones are absent.
    pub fn find_world(&self, keys: &[&str]) -> SceneResult<Option<Arc<World>>> {
        for key in keys {
            match self.get(key) {
                None => continue,
                Some(Param::World(world)) => return Ok(Some(Arc::clone(world))),
                Some(other) => {
                    log::debug!("parameter '{}' holds a {}, not a world", key, other.kind());
                    return Err(Self::mismatch(key, "world"));
                }
            }
        }
        Ok(None)
    }
}

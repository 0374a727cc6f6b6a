//! Basic types for stl2scad

use nalgebra::Vector3;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Vertex position. STL carries no other per-vertex data worth keeping.
pub type Vertex = Vector3<f64>;

/// Face as three indices into the point list
pub type Face = [u32; 3];

/// Triangle as read from an STL file, vertices in file order
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    /// Create a new triangle
    pub fn new(a: Vertex, b: Vertex, c: Vertex) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Widen single-precision coordinates, as stored in binary STL
    pub fn from_f32(coords: [[f32; 3]; 3]) -> Self {
        let widen = |c: [f32; 3]| Vector3::new(f64::from(c[0]), f64::from(c[1]), f64::from(c[2]));
        Self::new(widen(coords[0]), widen(coords[1]), widen(coords[2]))
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BBox3 {
    min: Vertex,
    max: Vertex,
}

impl BBox3 {
    /// Create an empty bounding box
    pub fn empty() -> Self {
        Self {
            min: Vector3::repeat(f64::INFINITY),
            max: Vector3::repeat(f64::NEG_INFINITY),
        }
    }

    /// Get minimum corner
    pub fn min(&self) -> Vertex {
        self.min
    }

    /// Get maximum corner
    pub fn max(&self) -> Vertex {
        self.max
    }

    /// Expand the bounding box to include a point. NaN components are skipped.
    pub fn include_point(&mut self, point: Vertex) {
        self.min = self.min.zip_map(&point, f64::min);
        self.max = self.max.zip_map(&point, f64::max);
    }

    /// Commutative merge, usable as a parallel reduction.
    ///
    /// Works per axis: an axis that never saw a comparable value stays at
    /// its empty bounds without hiding the other two.
    pub fn merged(self, other: BBox3) -> BBox3 {
        BBox3 {
            min: self.min.zip_map(&other.min, f64::min),
            max: self.max.zip_map(&other.max, f64::max),
        }
    }
}

impl Default for BBox3 {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for BBox3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Min: <{:.2}, {:.2}, {:.2}> | Max: <{:.2}, {:.2}, {:.2}>>",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}

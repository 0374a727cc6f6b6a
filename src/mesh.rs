//! Aggregated triangle mesh

use crate::{BBox3, Error, Face, Result, Triangle, Vertex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether aggregation saw the whole triangle stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Completeness {
    Complete,
    /// A deadline stopped aggregation; only the first `processed` triangles are present
    Partial { processed: usize },
}

/// Indexed triangle mesh ready for code generation.
///
/// Vertices are not shared between faces: triangle `i` owns points
/// `3i`, `3i + 1` and `3i + 2`, and face `i` is exactly those indices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mesh {
    points: Vec<Vertex>,
    faces: Vec<Face>,
    bbox: BBox3,
    completeness: Completeness,
}

impl Mesh {
    pub(crate) fn from_parts(
        points: Vec<Vertex>,
        faces: Vec<Face>,
        bbox: BBox3,
        completeness: Completeness,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyMesh);
        }
        debug_assert_eq!(points.len(), faces.len() * 3);
        Ok(Self {
            points,
            faces,
            bbox,
            completeness,
        })
    }

    /// Points in first-seen order
    pub fn points(&self) -> &[Vertex] {
        &self.points
    }

    /// Faces in input triangle order
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Get a triangle by index
    pub fn triangle_at(&self, index: usize) -> Option<Triangle> {
        let face = self.faces.get(index)?;
        Some(Triangle::new(
            self.points[face[0] as usize],
            self.points[face[1] as usize],
            self.points[face[2] as usize],
        ))
    }

    /// Get the bounding box of the mesh
    pub fn bounding_box(&self) -> BBox3 {
        self.bbox
    }

    pub fn completeness(&self) -> Completeness {
        self.completeness
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.completeness, Completeness::Partial { .. })
    }

    /// Reject a partial mesh with [`Error::DeadlineExceeded`]
    pub fn require_complete(self) -> Result<Self> {
        match self.completeness {
            Completeness::Complete => Ok(self),
            Completeness::Partial { processed } => Err(Error::DeadlineExceeded { processed }),
        }
    }
}

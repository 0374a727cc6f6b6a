//! # stl2scad
//!
//! Converts STL triangle meshes (ASCII or binary) into OpenSCAD source: a
//! `polyhedron` wrapped in a scalable module, plus two functions returning
//! the mesh bounding box.
//!
//! ## Pipeline
//!
//! 1. [`stl::sniff`] classifies the input as text or binary from its first bytes.
//! 2. [`StlDecoder`] streams triangles in file order.
//! 3. [`Aggregator`] lays them out as points and faces, on the calling thread
//!    or across a worker pool, optionally bounded by a deadline.
//! 4. [`ScadEmitter`] renders the result with a fixed decimal precision.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stl2scad::{convert_file, output_path_for, ConvertOptions};
//!
//! let options = ConvertOptions::new().with_decimal_places(6);
//! let conversion = convert_file("bracket.stl", &options)?.into_complete()?;
//! std::fs::write(output_path_for("bracket.stl"), conversion.text())?;
//! # Ok::<(), stl2scad::Error>(())
//! ```

pub mod aggregate;
pub mod convert;
pub mod error;
pub mod log;
pub mod mesh;
pub mod scad;
pub mod stl;
pub mod types;
pub mod utils;

// Re-exports
pub use aggregate::{Aggregator, Policy};
pub use convert::{convert_bytes, convert_file, Conversion, ConvertOptions};
pub use error::{Error, Result, Stage};
pub use log::RunLog;
pub use mesh::{Completeness, Mesh};
pub use scad::{sanitize_identifier, NumberFormat, ScadEmitter};
pub use stl::{StlDecoder, StlFormat, TriangleSource};
pub use types::{BBox3, Face, Triangle, Vertex};
pub use utils::{identifier_from_path, output_path_for, TempFolder};

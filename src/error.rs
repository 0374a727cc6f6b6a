//! Error types for stl2scad

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage in which a conversion failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    /// Format detection
    Sniff,
    /// STL decoding
    Decode,
    /// Vertex/face aggregation
    Aggregate,
    /// OpenSCAD code generation
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Sniff => "sniff",
            Stage::Decode => "decode",
            Stage::Aggregate => "aggregate",
            Stage::Emit => "emit",
        };
        f.write_str(name)
    }
}

/// stl2scad error types
#[derive(Error, Debug)]
pub enum Error {
    /// Not enough bytes for the format marker or the binary header/count
    #[error("Truncated file: needed {needed} bytes, only {available} available")]
    TruncatedFile { needed: u64, available: u64 },

    /// Declared triangle count runs past the end of the data
    #[error(
        "Corrupt file: header declares {declared} triangles, data ends at byte {available} \
         (expected {expected} bytes)"
    )]
    CorruptFile {
        declared: u32,
        expected: u64,
        available: u64,
    },

    /// A `vertex` line that is not exactly three numbers
    #[error("Malformed vertex line {line}: {content:?}")]
    MalformedVertexLine { line: usize, content: String },

    /// A facet that did not supply three vertices
    #[error("Incomplete facet ending at line {line}: {vertices} of 3 vertices")]
    IncompleteFacet { line: usize, vertices: usize },

    /// Nothing to emit
    #[error("Mesh is empty: no triangles were decoded")]
    EmptyMesh,

    /// Module name that cannot be turned into an OpenSCAD identifier
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// NaN or infinite coordinate, which OpenSCAD cannot represent
    #[error("Point {point} has a non-finite coordinate")]
    NonFiniteCoordinate { point: usize },

    /// Deadline hit before every triangle was aggregated
    #[error("Deadline exceeded after {processed} triangles")]
    DeadlineExceeded { processed: usize },

    /// More triangles than 32-bit face indices can address
    #[error("Too many triangles: {0}")]
    TooManyTriangles(usize),

    /// Invalid parameter provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Worker pool could not be started
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any of the above, tagged with the file and stage it came from
    #[error("{path}: {stage} failed: {source}")]
    InFile {
        path: PathBuf,
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach file and stage context
    pub fn in_file(self, path: impl Into<PathBuf>, stage: Stage) -> Self {
        Error::InFile {
            path: path.into(),
            stage,
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping file/stage wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::InFile { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stage the error was tagged with, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::InFile { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias for stl2scad operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedVertexLine {
            line: 4,
            content: "vertex 1 2".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed vertex line 4: \"vertex 1 2\"");
    }

    #[test]
    fn test_root_unwraps_context() {
        let err = Error::EmptyMesh
            .in_file("a.stl", Stage::Aggregate)
            .in_file("outer.stl", Stage::Emit);
        assert!(matches!(err.root(), Error::EmptyMesh));
        assert_eq!(err.stage(), Some(Stage::Emit));
        assert!(err.to_string().starts_with("outer.stl: emit failed"));
    }
}

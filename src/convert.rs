//! One-file conversion pipeline

use crate::aggregate::Aggregator;
use crate::mesh::Completeness;
use crate::scad::{NumberFormat, ScadEmitter};
use crate::stl::{self, StlDecoder, StlFormat};
use crate::utils::identifier_from_path;
use crate::{BBox3, Error, Result, Stage};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Conversion settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConvertOptions {
    /// Digits kept after the decimal point
    pub max_decimal_places: usize,
    /// Budget for decoding plus aggregation, measured from the start of the call
    pub deadline: Option<Duration>,
    /// Module name; defaults to the input file stem
    pub identifier: Option<String>,
    /// Skip format sniffing
    pub force_format: Option<StlFormat>,
    /// `None` or `Some(1)` aggregates on the calling thread; `Some(0)` uses
    /// every available core
    pub workers: Option<usize>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_decimal_places: NumberFormat::DEFAULT_DECIMAL_PLACES,
            deadline: None,
            identifier: None,
            force_format: None,
            workers: None,
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decimal_places(mut self, places: usize) -> Self {
        self.max_decimal_places = places;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_format(mut self, format: StlFormat) -> Self {
        self.force_format = Some(format);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Check the options without touching any file. Every worker count is
    /// accepted; `0` means every available core.
    pub fn validate(&self) -> Result<()> {
        NumberFormat::new(self.max_decimal_places)?;
        Ok(())
    }

    fn aggregator(&self, started: Instant) -> Aggregator {
        let aggregator = match self.workers {
            None | Some(1) => Aggregator::sequential(),
            Some(n) => Aggregator::parallel(n),
        };
        match self.deadline.and_then(|budget| started.checked_add(budget)) {
            Some(deadline) => aggregator.with_deadline(deadline),
            None => aggregator,
        }
    }
}

/// Generated source plus a summary of the mesh it came from
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Conversion {
    text: String,
    identifier: String,
    format: StlFormat,
    triangle_count: usize,
    bbox: BBox3,
    completeness: Completeness,
}

impl Conversion {
    /// OpenSCAD source
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Module name used in the source
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Encoding the input was decoded as
    pub fn format(&self) -> StlFormat {
        self.format
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn bounding_box(&self) -> BBox3 {
        self.bbox
    }

    pub fn completeness(&self) -> Completeness {
        self.completeness
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.completeness, Completeness::Partial { .. })
    }

    /// Reject a partial result with [`Error::DeadlineExceeded`]
    pub fn into_complete(self) -> Result<Self> {
        match self.completeness {
            Completeness::Complete => Ok(self),
            Completeness::Partial { processed } => Err(Error::DeadlineExceeded { processed }),
        }
    }
}

/// Convert the STL file at `path`.
///
/// Every failure is wrapped in [`Error::InFile`] with the path and the stage
/// that failed. Nothing is written to disk.
pub fn convert_file<P: AsRef<Path>>(path: P, options: &ConvertOptions) -> Result<Conversion> {
    let path = path.as_ref();
    let started = Instant::now();
    options.validate().map_err(|e| e.in_file(path, Stage::Emit))?;

    let identifier = match &options.identifier {
        Some(identifier) => identifier.clone(),
        None => identifier_from_path(path)
            .ok_or_else(|| Error::InvalidIdentifier(path.display().to_string()))
            .map_err(|e| e.in_file(path, Stage::Emit))?,
    };

    let mut file = File::open(path).map_err(|e| Error::from(e).in_file(path, Stage::Sniff))?;
    let length = file
        .metadata()
        .map_err(|e| Error::from(e).in_file(path, Stage::Sniff))?
        .len();

    let format = match options.force_format {
        Some(format) => format,
        None => {
            let format = stl::sniff(&mut file).map_err(|e| e.in_file(path, Stage::Sniff))?;
            file.seek(SeekFrom::Start(0))
                .map_err(|e| Error::from(e).in_file(path, Stage::Sniff))?;
            format
        }
    };
    debug!(path = %path.display(), %format, length, "decoding");

    let conversion = convert_source(
        BufReader::new(file),
        Some(length),
        format,
        &identifier,
        options,
        started,
    )
    .map_err(|(stage, e)| e.in_file(path, stage))?;

    info!(
        path = %path.display(),
        format = %conversion.format,
        triangles = conversion.triangle_count,
        bbox = %conversion.bbox,
        partial = conversion.is_partial(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "converted"
    );
    Ok(conversion)
}

/// Convert an STL file already in memory. `options.identifier` is required.
pub fn convert_bytes(bytes: &[u8], options: &ConvertOptions) -> Result<Conversion> {
    let started = Instant::now();
    options.validate()?;
    let identifier = options
        .identifier
        .as_deref()
        .ok_or_else(|| Error::InvalidParameter("an identifier is required".to_string()))?;
    let format = match options.force_format {
        Some(format) => format,
        None => stl::sniff_bytes(bytes)?,
    };
    convert_source(
        bytes,
        Some(bytes.len() as u64),
        format,
        identifier,
        options,
        started,
    )
    .map_err(|(_, e)| e)
}

fn convert_source<R: BufRead>(
    reader: R,
    length: Option<u64>,
    format: StlFormat,
    identifier: &str,
    options: &ConvertOptions,
    started: Instant,
) -> std::result::Result<Conversion, (Stage, Error)> {
    let numbers = NumberFormat::new(options.max_decimal_places).map_err(|e| (Stage::Emit, e))?;
    let emitter = ScadEmitter::new(identifier, numbers).map_err(|e| (Stage::Emit, e))?;

    let decoder = StlDecoder::new(reader, format, length).map_err(|e| (Stage::Decode, e))?;
    let mesh = options
        .aggregator(started)
        .aggregate(decoder)
        .map_err(|e| (aggregate_stage(&e), e))?;

    let text = emitter.emit(&mesh).map_err(|e| (Stage::Emit, e))?;
    Ok(Conversion {
        text,
        identifier: emitter.identifier().to_string(),
        format,
        triangle_count: mesh.triangle_count(),
        bbox: mesh.bounding_box(),
        completeness: mesh.completeness(),
    })
}

/// Decoder failures surface while aggregating; attribute them to decoding
fn aggregate_stage(err: &Error) -> Stage {
    match err {
        Error::TruncatedFile { .. }
        | Error::CorruptFile { .. }
        | Error::MalformedVertexLine { .. }
        | Error::IncompleteFacet { .. }
        | Error::Io(_) => Stage::Decode,
        _ => Stage::Aggregate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stl::tests::{binary_stl, UNIT_TRIANGLE, UNIT_TRIANGLE_ASCII};

    #[test]
    fn test_convert_bytes_requires_identifier() {
        let err = convert_bytes(UNIT_TRIANGLE_ASCII.as_bytes(), &ConvertOptions::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_encodings_produce_same_text() {
        let options = ConvertOptions::new().with_identifier("unit");
        let text = convert_bytes(UNIT_TRIANGLE_ASCII.as_bytes(), &options).unwrap();
        let binary = convert_bytes(&binary_stl(&[UNIT_TRIANGLE]), &options).unwrap();
        assert_eq!(text.format(), StlFormat::Ascii);
        assert_eq!(binary.format(), StlFormat::Binary);
        assert_eq!(text.text(), binary.text());
        assert!(!binary.is_partial());
    }

    #[test]
    fn test_invalid_decimal_places() {
        let options = ConvertOptions::new()
            .with_identifier("unit")
            .with_decimal_places(40);
        assert!(options.validate().is_err());
        assert!(convert_bytes(UNIT_TRIANGLE_ASCII.as_bytes(), &options).is_err());
    }

    #[test]
    fn test_any_worker_count_is_valid() {
        let bytes = binary_stl(&[UNIT_TRIANGLE, UNIT_TRIANGLE]);
        let expected = convert_bytes(&bytes, &ConvertOptions::new().with_identifier("unit")).unwrap();
        for workers in [0usize, 1, 2, 64] {
            let options = ConvertOptions::new()
                .with_identifier("unit")
                .with_workers(workers);
            assert!(options.validate().is_ok());
            let conversion = convert_bytes(&bytes, &options).unwrap();
            assert_eq!(conversion.text(), expected.text(), "{workers} workers");
        }
    }

    #[test]
    fn test_aggregate_stage() {
        assert_eq!(aggregate_stage(&Error::EmptyMesh), Stage::Aggregate);
        assert_eq!(
            aggregate_stage(&Error::IncompleteFacet {
                line: 1,
                vertices: 1
            }),
            Stage::Decode
        );
    }
}

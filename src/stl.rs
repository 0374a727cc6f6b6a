//! STL decoding
//!
//! Binary layout:
//!
//! ```text
//! UINT8[80]    header (ignored)
//! UINT32       triangle count, little-endian
//! foreach triangle
//!     REAL32[3] normal (ignored)
//!     REAL32[3] vertex 1
//!     REAL32[3] vertex 2
//!     REAL32[3] vertex 3
//!     UINT16    attribute byte count (ignored)
//! end
//! ```
//!
//! Text files are scanned line by line for `facet` and `vertex` keywords.

use crate::{Error, Result, Triangle};
use std::fmt;
use std::io::{BufRead, Read};
use std::str::FromStr;

mod ascii;
mod binary;

pub use ascii::AsciiDecoder;
pub use binary::BinaryDecoder;

/// Marker that classifies a file as text STL
const ASCII_MARKER: &[u8; 5] = b"solid";

/// STL encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StlFormat {
    Ascii,
    Binary,
}

impl fmt::Display for StlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StlFormat::Ascii => f.write_str("ascii"),
            StlFormat::Binary => f.write_str("binary"),
        }
    }
}

impl FromStr for StlFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("ascii") {
            Ok(StlFormat::Ascii)
        } else if s.eq_ignore_ascii_case("binary") {
            Ok(StlFormat::Binary)
        } else {
            Err(Error::InvalidParameter(format!(
                "unknown STL format {:?} (expected \"ascii\" or \"binary\")",
                s
            )))
        }
    }
}

/// Classify a byte source by its first five bytes.
///
/// Anything starting with `solid` is treated as text, even a binary file
/// whose free-form header happens to begin that way. The reader is left
/// positioned after the bytes consumed.
pub fn sniff<R: Read>(reader: &mut R) -> Result<StlFormat> {
    let mut marker = [0u8; 5];
    let got = read_up_to(reader, &mut marker)?;
    sniff_bytes(&marker[..got])
}

/// Same as [`sniff`] for data already in memory
pub fn sniff_bytes(bytes: &[u8]) -> Result<StlFormat> {
    if bytes.len() < ASCII_MARKER.len() {
        return Err(Error::TruncatedFile {
            needed: ASCII_MARKER.len() as u64,
            available: bytes.len() as u64,
        });
    }
    if &bytes[..ASCII_MARKER.len()] == ASCII_MARKER {
        Ok(StlFormat::Ascii)
    } else {
        Ok(StlFormat::Binary)
    }
}

/// Ordered stream of decoded triangles
pub trait TriangleSource: Iterator<Item = Result<Triangle>> {
    /// Triangle count announced by the file, if the encoding has one
    fn declared_count(&self) -> Option<usize>;
}

/// Decoder for either encoding
pub enum StlDecoder<R> {
    Ascii(AsciiDecoder<R>),
    Binary(BinaryDecoder<R>),
}

impl<R: BufRead> StlDecoder<R> {
    /// Start decoding `reader` (positioned at the start of the file) as `format`.
    ///
    /// `length` is the total byte length when known; binary decoding then
    /// rejects a short file before producing any triangle.
    pub fn new(reader: R, format: StlFormat, length: Option<u64>) -> Result<Self> {
        match format {
            StlFormat::Ascii => Ok(StlDecoder::Ascii(AsciiDecoder::new(reader))),
            StlFormat::Binary => {
                let decoder = match length {
                    Some(len) => BinaryDecoder::with_length(reader, len)?,
                    None => BinaryDecoder::new(reader)?,
                };
                Ok(StlDecoder::Binary(decoder))
            }
        }
    }

    pub fn format(&self) -> StlFormat {
        match self {
            StlDecoder::Ascii(_) => StlFormat::Ascii,
            StlDecoder::Binary(_) => StlFormat::Binary,
        }
    }
}

impl<R: BufRead> Iterator for StlDecoder<R> {
    type Item = Result<Triangle>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            StlDecoder::Ascii(d) => d.next(),
            StlDecoder::Binary(d) => d.next(),
        }
    }
}

impl<R: BufRead> TriangleSource for StlDecoder<R> {
    fn declared_count(&self) -> Option<usize> {
        match self {
            StlDecoder::Ascii(d) => d.declared_count(),
            StlDecoder::Binary(d) => d.declared_count(),
        }
    }
}

/// Decode an in-memory STL file, sniffing the encoding unless `force` is given
pub fn decode_bytes(bytes: &[u8], force: Option<StlFormat>) -> Result<Vec<Triangle>> {
    let format = match force {
        Some(format) => format,
        None => sniff_bytes(bytes)?,
    };
    StlDecoder::new(bytes, format, Some(bytes.len() as u64))?.collect()
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read
pub(crate) fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use nalgebra::Vector3;

    pub(crate) const UNIT_TRIANGLE_ASCII: &str = "solid s\nfacet normal 0 0 0\n outer loop\n vertex 0 0 0\n vertex 1 0 0\n vertex 0 1 0\n endloop\nendfacet\nendsolid s\n";

    /// Binary STL with an all-zero header
    pub(crate) fn binary_stl(triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for tri in triangles {
            bytes.extend_from_slice(&[0u8; 12]);
            for v in tri {
                for c in v {
                    bytes.extend_from_slice(&c.to_le_bytes());
                }
            }
            bytes.extend_from_slice(&[0u8; 2]);
        }
        bytes
    }

    pub(crate) const UNIT_TRIANGLE: [[f32; 3]; 3] =
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

    #[test]
    fn test_sniff() {
        assert_eq!(sniff_bytes(b"solid cube").unwrap(), StlFormat::Ascii);
        assert_eq!(sniff_bytes(&binary_stl(&[])).unwrap(), StlFormat::Binary);
        // case-sensitive, no whitespace skipping
        assert_eq!(sniff_bytes(b"SOLID x").unwrap(), StlFormat::Binary);
        assert_eq!(sniff_bytes(b"  solid").unwrap(), StlFormat::Binary);
    }

    #[test]
    fn test_sniff_truncated() {
        let err = sniff(&mut &b"sol"[..]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedFile {
                needed: 5,
                available: 3
            }
        ));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("ASCII".parse::<StlFormat>().unwrap(), StlFormat::Ascii);
        assert_eq!("binary".parse::<StlFormat>().unwrap(), StlFormat::Binary);
        assert!("obj".parse::<StlFormat>().is_err());
        assert_eq!(StlFormat::Binary.to_string(), "binary");
    }

    #[test]
    fn test_both_encodings_agree() {
        let from_text = decode_bytes(UNIT_TRIANGLE_ASCII.as_bytes(), None).unwrap();
        let from_binary = decode_bytes(&binary_stl(&[UNIT_TRIANGLE]), None).unwrap();
        assert_eq!(from_text, from_binary);
        assert_eq!(from_text[0].vertices[1], Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_forced_format_overrides_sniff() {
        let mut bytes = binary_stl(&[UNIT_TRIANGLE]);
        bytes[..5].copy_from_slice(b"solid");
        let triangles = decode_bytes(&bytes, Some(StlFormat::Binary)).unwrap();
        assert_eq!(triangles.len(), 1);
    }
}

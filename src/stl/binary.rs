//! Binary STL decoder

use super::{read_up_to, TriangleSource};
use crate::{Error, Result, Triangle};
use std::io::Read;
use tracing::debug;

/// Free-form header preceding the triangle count
pub(crate) const HEADER_SIZE: usize = 80;

/// Header plus the little-endian triangle count
pub(crate) const PREAMBLE_SIZE: usize = HEADER_SIZE + 4;

/// Normal, three vertices, attribute
pub(crate) const RECORD_SIZE: usize = 50;

/// Bytes a file declaring `count` triangles must have
pub fn expected_length(count: u32) -> u64 {
    PREAMBLE_SIZE as u64 + RECORD_SIZE as u64 * u64::from(count)
}

/// Streaming decoder over 50-byte triangle records
pub struct BinaryDecoder<R> {
    reader: R,
    declared: u32,
    next_index: u32,
    failed: bool,
}

impl<R: Read> BinaryDecoder<R> {
    /// Read the triangle count; the header bytes are skipped. A record cut
    /// short later on is reported when it is reached.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut preamble = [0u8; PREAMBLE_SIZE];
        let got = read_up_to(&mut reader, &mut preamble)?;
        if got < PREAMBLE_SIZE {
            return Err(Error::TruncatedFile {
                needed: PREAMBLE_SIZE as u64,
                available: got as u64,
            });
        }

        let declared = u32::from_le_bytes([
            preamble[HEADER_SIZE],
            preamble[HEADER_SIZE + 1],
            preamble[HEADER_SIZE + 2],
            preamble[HEADER_SIZE + 3],
        ]);
        debug!(declared, "binary STL preamble read");

        Ok(Self {
            reader,
            declared,
            next_index: 0,
            failed: false,
        })
    }

    /// Like [`BinaryDecoder::new`], but rejects the file up front when
    /// `length` bytes cannot hold the declared triangles.
    pub fn with_length(reader: R, length: u64) -> Result<Self> {
        if length < PREAMBLE_SIZE as u64 {
            return Err(Error::TruncatedFile {
                needed: PREAMBLE_SIZE as u64,
                available: length,
            });
        }
        let decoder = Self::new(reader)?;
        let expected = expected_length(decoder.declared);
        if expected > length {
            return Err(Error::CorruptFile {
                declared: decoder.declared,
                expected,
                available: length,
            });
        }
        Ok(decoder)
    }

    pub fn triangle_count(&self) -> u32 {
        self.declared
    }

    fn read_record(&mut self) -> Result<Triangle> {
        let mut record = [0u8; RECORD_SIZE];
        let got = read_up_to(&mut self.reader, &mut record)?;
        if got < RECORD_SIZE {
            return Err(Error::CorruptFile {
                declared: self.declared,
                expected: expected_length(self.declared),
                available: expected_length(self.next_index) + got as u64,
            });
        }

        // Skip normal (12 bytes), then 3 vertices of 12 bytes each
        let mut coords = [[0f32; 3]; 3];
        for (v, vertex) in coords.iter_mut().enumerate() {
            let base = 12 + v * 12;
            for (c, coord) in vertex.iter_mut().enumerate() {
                let at = base + c * 4;
                *coord = f32::from_le_bytes([
                    record[at],
                    record[at + 1],
                    record[at + 2],
                    record[at + 3],
                ]);
            }
        }
        Ok(Triangle::from_f32(coords))
    }
}

impl<R: Read> Iterator for BinaryDecoder<R> {
    type Item = Result<Triangle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_index >= self.declared {
            return None;
        }
        let result = self.read_record();
        match result {
            Ok(_) => self.next_index += 1,
            Err(_) => self.failed = true,
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = (self.declared - self.next_index) as usize;
        (0, Some(remaining))
    }
}

impl<R: Read> TriangleSource for BinaryDecoder<R> {
    fn declared_count(&self) -> Option<usize> {
        Some(self.declared as usize)
    }
}

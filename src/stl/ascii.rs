//! Text STL decoder

use super::TriangleSource;
use crate::{Error, Result, Triangle, Vertex};
use nalgebra::Vector3;
use std::io::BufRead;

/// Longest excerpt of an offending line kept in an error
const MAX_EXCERPT: usize = 80;

/// Line scanner grouping `vertex` lines into triangles, three per facet.
///
/// Lines are decoded lossily, so non-UTF-8 input (typically a binary file
/// whose header starts with `solid`) surfaces as a parse error rather than
/// an I/O failure.
pub struct AsciiDecoder<R> {
    reader: R,
    line: Vec<u8>,
    line_no: usize,
    pending: Vec<Vertex>,
    solid_name: Option<String>,
    done: bool,
}

impl<R: BufRead> AsciiDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            line_no: 0,
            pending: Vec::with_capacity(3),
            solid_name: None,
            done: false,
        }
    }

    /// Name following `solid` on the first line, once that line has been read
    pub fn solid_name(&self) -> Option<&str> {
        self.solid_name.as_deref()
    }

    /// Lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_no
    }

    fn advance(&mut self) -> Result<Option<Triangle>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                if !self.pending.is_empty() {
                    return Err(Error::IncompleteFacet {
                        line: self.line_no,
                        vertices: self.pending.len(),
                    });
                }
                return Ok(None);
            }
            self.line_no += 1;

            let text = String::from_utf8_lossy(&self.line);
            let mut tokens = text.split_whitespace();
            let keyword = match tokens.next() {
                Some(keyword) => keyword,
                None => continue,
            };

            if keyword.eq_ignore_ascii_case("vertex") {
                let vertex = parse_vertex(tokens).ok_or_else(|| Error::MalformedVertexLine {
                    line: self.line_no,
                    content: text.trim().chars().take(MAX_EXCERPT).collect(),
                })?;
                self.pending.push(vertex);
                if self.pending.len() == 3 {
                    let triangle = Triangle::new(self.pending[0], self.pending[1], self.pending[2]);
                    self.pending.clear();
                    return Ok(Some(triangle));
                }
            } else if keyword.eq_ignore_ascii_case("facet") {
                if !self.pending.is_empty() {
                    return Err(Error::IncompleteFacet {
                        line: self.line_no,
                        vertices: self.pending.len(),
                    });
                }
            } else if keyword.eq_ignore_ascii_case("solid") && self.line_no == 1 {
                let name = tokens.collect::<Vec<_>>().join(" ");
                if !name.is_empty() {
                    self.solid_name = Some(name);
                }
            }
        }
    }
}

/// Exactly three floating-point tokens
fn parse_vertex<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<Vertex> {
    let x = tokens.next()?.parse::<f64>().ok()?;
    let y = tokens.next()?.parse::<f64>().ok()?;
    let z = tokens.next()?.parse::<f64>().ok()?;
    if tokens.next().is_some() {
        return None;
    }
    Some(Vector3::new(x, y, z))
}

impl<R: BufRead> Iterator for AsciiDecoder<R> {
    type Item = Result<Triangle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(triangle)) => Some(Ok(triangle)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> TriangleSource for AsciiDecoder<R> {
    fn declared_count(&self) -> Option<usize> {
        None
    }
}

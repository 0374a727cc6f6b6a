//! OpenSCAD polyhedron source generation

use crate::{Error, Mesh, Result, Vertex};
use std::io::Write;

/// Words OpenSCAD will not accept as a module or function name
const RESERVED: &[&str] = &[
    "module", "function", "include", "use", "if", "else", "for", "let", "each", "assert", "echo",
    "true", "false", "undef",
    // called from the generated module body
    "scale", "polyhedron",
];

/// Fixed-decimal number rendering.
///
/// Values are rounded to at most `decimal_places` digits after the point;
/// trailing zeros and a bare trailing point are dropped, so `1.0` prints as
/// `1` and `0.25` as `0.25`. Output never depends on the process locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NumberFormat {
    decimal_places: usize,
}

impl NumberFormat {
    pub const DEFAULT_DECIMAL_PLACES: usize = 14;

    /// Enough to round-trip any `f64`
    pub const MAX_DECIMAL_PLACES: usize = 17;

    pub fn new(decimal_places: usize) -> Result<Self> {
        if decimal_places > Self::MAX_DECIMAL_PLACES {
            return Err(Error::InvalidParameter(format!(
                "decimal places must be at most {}, got {}",
                Self::MAX_DECIMAL_PLACES,
                decimal_places
            )));
        }
        Ok(Self { decimal_places })
    }

    pub fn decimal_places(&self) -> usize {
        self.decimal_places
    }

    /// Render one finite value
    pub fn format(&self, value: f64) -> String {
        let mut text = format!("{:.*}", self.decimal_places, value);
        if text.contains('.') {
            let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
            text.truncate(trimmed);
        }
        if text == "-0" {
            text.remove(0);
        }
        text
    }

    fn vector(&self, v: &Vertex) -> String {
        format!("[{}, {}, {}]", self.format(v.x), self.format(v.y), self.format(v.z))
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_places: Self::DEFAULT_DECIMAL_PLACES,
        }
    }
}

/// Turn a file stem (or any name) into a usable OpenSCAD identifier.
///
/// ASCII letters, digits and `_` are kept, everything else becomes `_`, and
/// a leading digit gets a `_` prefix. Names with nothing alphanumeric left,
/// or that collide with a keyword, are rejected.
pub fn sanitize_identifier(raw: &str) -> Result<String> {
    let mut ident: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if !ident.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidIdentifier(raw.to_string()));
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED.contains(&ident.as_str()) {
        return Err(Error::InvalidIdentifier(raw.to_string()));
    }
    Ok(ident)
}

/// Renders a [`Mesh`] as an OpenSCAD module.
///
/// The output holds two bounding-box functions, `<name>_bbox_min()` and
/// `<name>_bbox_max()`, and a module `<name>(scale = 1)` wrapping a
/// `polyhedron` with every point and face in mesh order.
#[derive(Debug, Clone)]
pub struct ScadEmitter {
    identifier: String,
    numbers: NumberFormat,
}

impl ScadEmitter {
    /// `identifier` is sanitized with [`sanitize_identifier`]
    pub fn new(identifier: &str, numbers: NumberFormat) -> Result<Self> {
        Ok(Self {
            identifier: sanitize_identifier(identifier)?,
            numbers,
        })
    }

    /// Sanitized module name
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn number_format(&self) -> NumberFormat {
        self.numbers
    }

    /// Generate the source text
    pub fn emit(&self, mesh: &Mesh) -> Result<String> {
        let mut buf = Vec::with_capacity(mesh.vertex_count() * 48 + mesh.triangle_count() * 24);
        self.write(mesh, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Stream the source text into `out`
    pub fn write<W: Write>(&self, mesh: &Mesh, out: &mut W) -> Result<()> {
        if mesh.points().is_empty() || mesh.faces().is_empty() {
            return Err(Error::EmptyMesh);
        }
        if let Some(point) = mesh.points().iter().position(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(Error::NonFiniteCoordinate { point });
        }

        let id = &self.identifier;
        let bbox = mesh.bounding_box();

        writeln!(
            out,
            "// {}: {} points, {} faces",
            id,
            mesh.vertex_count(),
            mesh.triangle_count()
        )?;
        if mesh.is_partial() {
            writeln!(
                out,
                "// partial mesh: conversion stopped after {} triangles",
                mesh.triangle_count()
            )?;
        }
        writeln!(out, "function {}_bbox_min() = {};", id, self.numbers.vector(&bbox.min()))?;
        writeln!(out, "function {}_bbox_max() = {};", id, self.numbers.vector(&bbox.max()))?;
        writeln!(out)?;
        writeln!(out, "module {}(scale = 1) {{", id)?;
        writeln!(out, "    scale([scale, scale, scale]) polyhedron(")?;

        writeln!(out, "        points = [")?;
        let last = mesh.vertex_count() - 1;
        for (i, p) in mesh.points().iter().enumerate() {
            let sep = if i < last { "," } else { "" };
            writeln!(out, "            {}{}", self.numbers.vector(p), sep)?;
        }
        writeln!(out, "        ],")?;

        writeln!(out, "        faces = [")?;
        let last = mesh.triangle_count() - 1;
        for (i, f) in mesh.faces().iter().enumerate() {
            let sep = if i < last { "," } else { "" };
            writeln!(out, "            [{}, {}, {}]{}", f[0], f[1], f[2], sep)?;
        }
        writeln!(out, "        ]")?;

        writeln!(out, "    );")?;
        writeln!(out, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Aggregator, Triangle};
    use nalgebra::Vector3;

    fn unit_mesh() -> Mesh {
        let tri = Triangle::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        Aggregator::sequential().aggregate_slice(&[tri]).unwrap()
    }

    #[test]
    fn test_number_format() {
        let n = NumberFormat::default();
        assert_eq!(n.format(0.0), "0");
        assert_eq!(n.format(-0.0), "0");
        assert_eq!(n.format(1.0), "1");
        assert_eq!(n.format(-2.5), "-2.5");
        assert_eq!(n.format(100.0), "100");
        assert_eq!(n.format(0.1f32 as f64), "0.10000000149012");
        assert_eq!(n.format(1e-15), "0");
        assert_eq!(n.format(-1e-15), "0");
    }

    #[test]
    fn test_number_format_places() {
        let two = NumberFormat::new(2).unwrap();
        assert_eq!(two.format(1.005e3), "1005");
        assert_eq!(two.format(3.14159), "3.14");
        assert_eq!(two.format(2.999), "3");
        let zero = NumberFormat::new(0).unwrap();
        assert_eq!(zero.format(10.4), "10");
        assert!(NumberFormat::new(18).is_err());
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("bracket").unwrap(), "bracket");
        assert_eq!(sanitize_identifier("my part-v2.1").unwrap(), "my_part_v2_1");
        assert_eq!(sanitize_identifier("3DBenchy").unwrap(), "_3DBenchy");
        assert_eq!(sanitize_identifier("$fn").unwrap(), "_fn");
        assert_eq!(sanitize_identifier("caf\u{e9}").unwrap(), "caf_");
    }

    #[test]
    fn test_invalid_identifier() {
        for raw in [
            "",
            "   ",
            "---",
            "\u{6a21}\u{578b}",
            "module",
            "undef",
            "scale",
            "polyhedron",
        ] {
            assert!(
                matches!(sanitize_identifier(raw), Err(Error::InvalidIdentifier(_))),
                "{raw:?} should be rejected"
            );
        }
        assert!(ScadEmitter::new("for", NumberFormat::default()).is_err());
        // would recurse into itself instead of the builtin
        assert!(ScadEmitter::new("scale", NumberFormat::default()).is_err());
        assert!(ScadEmitter::new("polyhedron", NumberFormat::default()).is_err());
        assert_eq!(
            ScadEmitter::new("scale_part", NumberFormat::default())
                .unwrap()
                .identifier(),
            "scale_part"
        );
    }

    #[test]
    fn test_emit_unit_triangle() {
        let emitter = ScadEmitter::new("unit", NumberFormat::default()).unwrap();
        let text = emitter.emit(&unit_mesh()).unwrap();
        let expected = "\
// unit: 3 points, 1 faces
function unit_bbox_min() = [0, 0, 0];
function unit_bbox_max() = [1, 1, 0];

module unit(scale = 1) {
    scale([scale, scale, scale]) polyhedron(
        points = [
            [0, 0, 0],
            [1, 0, 0],
            [0, 1, 0]
        ],
        faces = [
            [0, 1, 2]
        ]
    );
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_emit_is_deterministic() {
        let emitter = ScadEmitter::new("unit", NumberFormat::default()).unwrap();
        let mesh = unit_mesh();
        assert_eq!(emitter.emit(&mesh).unwrap(), emitter.emit(&mesh).unwrap());
    }

    #[test]
    fn test_non_finite_rejected() {
        let tri = Triangle::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(f64::NAN, 0.0, 0.0),
            Vector3::new(0.0, f64::INFINITY, 0.0),
        );
        let mesh = Aggregator::sequential().aggregate_slice(&[tri]).unwrap();
        let emitter = ScadEmitter::new("bad", NumberFormat::default()).unwrap();
        assert!(matches!(
            emitter.emit(&mesh),
            Err(Error::NonFiniteCoordinate { point: 1 })
        ));
    }
}

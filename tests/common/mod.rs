#![allow(dead_code)]

/// Binary STL with an all-zero header
pub fn binary_stl(triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
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

/// Text STL with one facet per triangle
pub fn ascii_stl(name: &str, triangles: &[[[f32; 3]; 3]]) -> String {
    let mut text = format!("solid {}\n", name);
    for tri in triangles {
        text.push_str("  facet normal 0 0 0\n    outer loop\n");
        for v in tri {
            text.push_str(&format!("      vertex {} {} {}\n", v[0], v[1], v[2]));
        }
        text.push_str("    endloop\n  endfacet\n");
    }
    text.push_str(&format!("endsolid {}\n", name));
    text
}

/// Deterministic, irregular triangles
pub fn scattered_triangles(n: usize) -> Vec<[[f32; 3]; 3]> {
    let mut state = 0x2545_f491u32;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state % 200_000) as f32 / 1000.0 - 100.0
    };
    (0..n)
        .map(|_| {
            [
                [next(), next(), next()],
                [next(), next(), next()],
                [next(), next(), next()],
            ]
        })
        .collect()
}

/// Points and faces read back out of generated OpenSCAD source
pub struct ParsedScad {
    pub bbox_min: [f64; 3],
    pub bbox_max: [f64; 3],
    pub points: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
}

fn parse_triple<T: std::str::FromStr>(text: &str) -> [T; 3]
where
    T::Err: std::fmt::Debug,
{
    let inner = text
        .trim()
        .trim_end_matches(';')
        .trim_end_matches(',')
        .trim_start_matches('[')
        .trim_end_matches(']');
    let values: Vec<T> = inner
        .split(',')
        .map(|t| t.trim().parse().expect("bad number"))
        .collect();
    let mut iter = values.into_iter();
    let triple = [
        iter.next().expect("missing value"),
        iter.next().expect("missing value"),
        iter.next().expect("missing value"),
    ];
    assert!(iter.next().is_none(), "more than three values in {text:?}");
    triple
}

pub fn parse_scad(text: &str) -> ParsedScad {
    let mut bbox_min = None;
    let mut bbox_max = None;
    let mut points = Vec::new();
    let mut faces = Vec::new();
    let mut section = "";

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("function ") && line.contains("_bbox_min()") {
            bbox_min = Some(parse_triple(line.split('=').nth(1).expect("no value")));
        } else if line.starts_with("function ") && line.contains("_bbox_max()") {
            bbox_max = Some(parse_triple(line.split('=').nth(1).expect("no value")));
        } else if line == "points = [" {
            section = "points";
        } else if line == "faces = [" {
            section = "faces";
        } else if line.starts_with(']') {
            section = "";
        } else if section == "points" {
            points.push(parse_triple(line));
        } else if section == "faces" {
            faces.push(parse_triple(line));
        }
    }

    ParsedScad {
        bbox_min: bbox_min.expect("no bbox_min function"),
        bbox_max: bbox_max.expect("no bbox_max function"),
        points,
        faces,
    }
}

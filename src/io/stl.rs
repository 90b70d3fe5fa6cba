//! Binary STL export of the closed body surface.

use crate::body::{Body, BodyKind};
use crate::common::linear_space;
use crate::common::points::{is_same, mirror_y, mirror_y_vec, normalize_or_zero};
use crate::{Point3, Result, Vector3};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, instrument};

const HEADER: &str = "binary STL file";

/// Vertices closer than this are considered the same when skipping collapsed triangles.
const SAME_POINT: f64 = 1.0e-10;

struct Facet {
    normal: Vector3,
    vertices: [Point3; 3],
}

impl Facet {
    fn new(normal: Vector3, a: Point3, b: Point3, c: Point3) -> Self {
        Self {
            normal,
            vertices: [a, b, c],
        }
    }

    fn mirrored(normal: &Vector3, a: &Point3, b: &Point3, c: &Point3) -> Self {
        Self::new(mirror_y_vec(normal), mirror_y(a), mirror_y(b), mirror_y(c))
    }

    fn is_collapsed(&self) -> bool {
        let [a, b, c] = &self.vertices;
        is_same(a, b, SAME_POINT) || is_same(b, c, SAME_POINT) || is_same(a, c, SAME_POINT)
    }
}

/// Triangulate a smooth body on a regular grid of `nx` by `nh` intervals per half. Every quad
/// gives two triangles on each side, collapsed or not. All right-half facets come first, followed
/// by their mirrors in the same order. A zero interval count gives no facets.
fn smooth_facets(body: &Body, nx: usize, nh: usize) -> Vec<Facet> {
    let us = linear_space(0.0, 1.0, nx + 1);
    let vs = linear_space(0.0, 1.0, nh + 1);
    let grid = body.surface().sample_grid(&us, &vs);

    let mut right = Vec::with_capacity(nx * nh * 4);
    let mut left = Vec::with_capacity(nx * nh * 2);
    for (row0, row1) in grid.iter().zip(grid.iter().skip(1)) {
        for l in 0..nh {
            let p00 = row0[l];
            let p01 = row0[l + 1];
            let p10 = row1[l];
            let p11 = row1[l + 1];
            let n = normalize_or_zero(&(p11 - p00).cross(&(p01 - p10)), 1.0e-14);

            right.push(Facet::new(n, p00, p10, p01));
            right.push(Facet::new(n, p10, p11, p01));
            left.push(Facet::mirrored(&n, &p00, &p01, &p10));
            left.push(Facet::mirrored(&n, &p10, &p01, &p11));
        }
    }
    right.append(&mut left);
    right
}

/// Triangulate a flat-panel body with one quad per frame interval and side-line interval,
/// skipping triangles that have coincident vertices. Right-half facets come first.
fn flat_facets(body: &Body) -> Vec<Facet> {
    let frames = body.frames();
    let mut right = Vec::new();
    let mut left = Vec::new();
    for k in 0..body.side_line_count() - 1 {
        for (f0, f1) in frames.iter().zip(frames.iter().skip(1)) {
            let p1 = f0.points()[k];
            let p2 = f1.points()[k];
            let p3 = f1.points()[k + 1];
            let p4 = f0.points()[k + 1];
            let n = normalize_or_zero(&(p3 - p1).cross(&(p4 - p2)), 1.0e-14);

            let near = [Facet::new(n, p1, p2, p4), Facet::new(n, p4, p2, p3)];
            let far = [
                Facet::mirrored(&n, &p2, &p1, &p4),
                Facet::mirrored(&n, &p2, &p4, &p3),
            ];
            right.extend(near.into_iter().filter(|f| !f.is_collapsed()));
            left.extend(far.into_iter().filter(|f| !f.is_collapsed()));
        }
    }
    right.append(&mut left);
    right
}

/// Write the closed surface of both halves of a body as a binary STL stream.
///
/// # Arguments
///
/// * `body`: the body to export
/// * `writer`: the destination stream
/// * `nx`: longitudinal intervals for a smooth body, ignored for flat panels; 0 writes no facets
/// * `nh`: hoop intervals for a smooth body, ignored for flat panels; 0 writes no facets
/// * `unit`: factor applied to every coordinate, meters to the file unit
///
/// returns: Result<(), Box<dyn Error, Global>>
#[instrument(skip(body, writer))]
pub fn write_stl_binary<W: Write>(
    body: &Body,
    writer: &mut W,
    nx: usize,
    nh: usize,
    unit: f64,
) -> Result<()> {
    let facets = match body.kind() {
        BodyKind::Smooth => smooth_facets(body, nx, nh),
        BodyKind::FlatPanels => flat_facets(body),
    };
    debug!("writing {} triangles for body '{}'", facets.len(), body.name);

    let header = format!("{:<80}", HEADER);
    writer.write_all(header.as_bytes())?;
    writer.write_all(&(facets.len() as u32).to_le_bytes())?;

    for facet in facets.iter() {
        for c in facet.normal.iter() {
            writer.write_all(&(*c as f32).to_le_bytes())?;
        }
        for v in facet.vertices.iter() {
            for c in v.coords.iter() {
                writer.write_all(&((c * unit) as f32).to_le_bytes())?;
            }
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a body to a binary STL file, see `write_stl_binary`.
pub fn save_stl(path: &Path, body: &Body, nx: usize, nh: usize, unit: f64) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_stl_binary(body, &mut writer, nx, nh, unit)
}

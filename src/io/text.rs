//! The plain text body definition format and the surface point listing.
//!
//! A definition starts with the body name, followed by keyword blocks in any order:
//!
//! ```text
//! My Pod
//!
//! BODYTYPE
//!  2        # Flat Panels (1) or NURBS (2)
//!
//! OFFSET
//! 0.0     0.0     0.0     #Total body offset (Y-coord is ignored)
//!
//! FRAME
//!      0.0000000          0.0000000       0.0500000
//!      0.0000000          0.0500000       0.0000000
//!      0.0000000          0.0000000      -0.0500000
//! ```
//!
//! Everything after a `#` or a `!` is a comment. A frame block ends at the first blank or
//! non-numeric line. The name is written on a single line; a definition whose first line is
//! already a keyword has an empty name.

use crate::body::{Body, BodyKind};
use crate::surface::Frame;
use crate::{Point3, Result};
use std::io::{BufRead, Write};
use tracing::{debug, instrument, warn};

const HEADER: [&str; 6] = [
    "# This file defines a body geometry",
    "# The frames are defined from nose to tail",
    "# The number of sidelines is defined by the number of points of the first frame",
    "# Each of the next frames should have the same number of points as the first",
    "# For each frame, the points are defined for the right half of the body, ",
    "# in the clockwise direction aft looking forward",
];

/// Panel density assigned to every frame and side-line of an imported body.
const IMPORT_X_PANELS: usize = 3;
const IMPORT_H_PANELS: usize = 7;

const KEYWORDS: [&str; 3] = ["BODYTYPE", "OFFSET", "FRAME"];

/// Write the text definition of a body.
///
/// # Arguments
///
/// * `body`: the body to export
/// * `writer`: the destination stream
/// * `m_to_unit`: factor converting meters to the file unit
///
/// returns: Result<(), Box<dyn Error, Global>>
#[instrument(skip(body, writer))]
pub fn write_definition<W: Write>(body: &Body, writer: &mut W, m_to_unit: f64) -> Result<()> {
    writeln!(writer)?;
    for line in HEADER.iter() {
        writeln!(writer, "{}", line)?;
    }
    writeln!(writer)?;

    let name = body.name.replace(['\r', '\n'], " ");
    writeln!(writer, "{}\n", name.trim())?;
    writeln!(writer, "BODYTYPE")?;
    let code = match body.kind() {
        BodyKind::FlatPanels => 1,
        BodyKind::Smooth => 2,
    };
    writeln!(writer, " {}        # Flat Panels (1) or NURBS (2)\n", code)?;

    writeln!(writer, "OFFSET")?;
    writeln!(
        writer,
        "0.0     0.0     0.0     #Total body offset (Y-coord is ignored)\n"
    )?;

    for frame in body.frames() {
        writeln!(writer, "FRAME")?;
        for p in frame.points() {
            writeln!(
                writer,
                "{:14.7}     {:14.7}    {:14.7}",
                frame.position() * m_to_unit,
                p.y * m_to_unit,
                p.z * m_to_unit
            )?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Strip the comment from a line and trim it.
fn clean(line: &str) -> &str {
    let end = line.find(['#', '!']).unwrap_or(line.len());
    line[..end].trim()
}

/// Parse a line holding exactly three numbers, separated by whitespace or commas.
fn parse_xyz(line: &str) -> Option<[f64; 3]> {
    let values = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .ok()?;
    values.try_into().ok()
}

/// The next non-empty line at or after the cursor, leaving the cursor just past it.
fn next_content(lines: &[String], cursor: &mut usize) -> Option<String> {
    while *cursor < lines.len() {
        let line = &lines[*cursor];
        *cursor += 1;
        if !line.is_empty() {
            return Some(line.clone());
        }
    }
    None
}

/// Read a body from its text definition. A new body is built from the stream contents, with a
/// panel density of 3 per frame interval and 7 per side-line interval.
///
/// # Arguments
///
/// * `reader`: the source stream
/// * `m_to_unit`: factor converting meters to the file unit, every value read is divided by it
///
/// returns: Result<Body, Box<dyn Error, Global>>
#[instrument(skip(reader))]
pub fn read_definition<R: BufRead>(reader: R, m_to_unit: f64) -> Result<Body> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(clean(&line?).to_string());
    }

    let mut cursor = 0;
    let mut name = next_content(&lines, &mut cursor).ok_or("the body definition is empty")?;
    if KEYWORDS.contains(&name.as_str()) {
        name.clear();
        cursor -= 1;
    }
    let mut kind = BodyKind::Smooth;
    let (mut xo, mut zo) = (0.0, 0.0);
    let mut sections: Vec<Vec<Point3>> = Vec::new();

    while let Some(line) = next_content(&lines, &mut cursor) {
        if line.contains("BODYTYPE") {
            let Some(value) = next_content(&lines, &mut cursor) else {
                break;
            };
            if let Ok(code) = value.parse::<i32>() {
                kind = if code == 1 {
                    BodyKind::FlatPanels
                } else {
                    BodyKind::Smooth
                };
            }
        } else if line.contains("OFFSET") {
            let Some(value) = next_content(&lines, &mut cursor) else {
                break;
            };
            // The y offset is ignored, bodies are centered on the x-z plane
            if let Some([x, _, z]) = parse_xyz(&value) {
                xo = x / m_to_unit;
                zo = z / m_to_unit;
            }
        } else if line.contains("FRAME") {
            let mut points = Vec::new();
            while cursor < lines.len() {
                let Some([x, y, z]) = parse_xyz(&lines[cursor]) else {
                    break;
                };
                points.push(Point3::new(x / m_to_unit, y / m_to_unit, z / m_to_unit));
                cursor += 1;
            }
            if !points.is_empty() {
                sections.push(points);
            }
        }
    }

    let frames = sections
        .into_iter()
        .map(|points| {
            let position = points[0].x + xo;
            let points = points
                .into_iter()
                .map(|p| Point3::new(position, p.y, p.z + zo))
                .collect();
            Frame::new(position, points)
        })
        .collect::<Vec<_>>();

    let frame_count = frames.len();
    let mut body = Body::from_frames(&name, kind, frames).inspect_err(|e| {
        warn!("rejected body definition '{}': {}", name, e);
    })?;

    let side_lines = body.side_line_count();
    body.set_panel_tables(
        vec![IMPORT_X_PANELS; frame_count],
        vec![IMPORT_H_PANELS; side_lines],
    );
    debug!(
        "read body '{}' with {} frames of {} side-lines",
        name, frame_count, side_lines
    );
    Ok(body)
}

/// Write a listing of points on the right half of the body surface, `nx` cross-sections of `nh`
/// points each, evenly spaced in the surface parameters.
///
/// # Arguments
///
/// * `body`: the body to sample
/// * `writer`: the destination stream
/// * `m_to_unit`: factor converting meters to the file unit
/// * `nx`: number of cross-sections, at least 2
/// * `nh`: number of points per cross-section, at least 2
/// * `csv`: separate the values with commas instead of spaces
///
/// returns: Result<(), Box<dyn Error, Global>>
#[instrument(skip(body, writer))]
pub fn write_surface_points<W: Write>(
    body: &Body,
    writer: &mut W,
    m_to_unit: f64,
    nx: usize,
    nh: usize,
    csv: bool,
) -> Result<()> {
    let nx = nx.max(2);
    let nh = nh.max(2);
    let sep = if csv { ", " } else { "" };

    let name = body.name.replace(['\r', '\n'], " ");
    writeln!(writer, "{}\n", name.trim())?;
    writeln!(writer, "Right Surface Points")?;
    if csv {
        writeln!(writer, " x,y,z")?;
    } else {
        writeln!(writer, "        x          y          z")?;
    }

    for k in 0..nx {
        writeln!(writer, "  Cross Section {}{:3}", sep, k + 1)?;
        let u = k as f64 / (nx - 1) as f64;
        for l in 0..nh {
            let v = l as f64 / (nh - 1) as f64;
            let p = body.point(u, v, true) * m_to_unit;
            writeln!(
                writer,
                " {:16.8}{} {:16.8}{} {:16.8}",
                p.x, sep, p.y, sep, p.z
            )?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::tests::square_tube;
    use crate::errors::BodyError;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn round_trip(body: &Body, unit: f64) -> Body {
        let mut bytes = Vec::new();
        write_definition(body, &mut bytes, unit).unwrap();
        read_definition(Cursor::new(bytes), unit).unwrap()
    }

    #[test]
    fn default_body_round_trip_in_millimeters() {
        let body = Body::default();
        let read = round_trip(&body, 1000.0);

        assert_eq!(read.name, body.name);
        assert_eq!(read.kind(), BodyKind::Smooth);
        assert_eq!(read.frame_count(), body.frame_count());
        assert_eq!(read.side_line_count(), body.side_line_count());

        for (a, b) in read.frames().iter().zip(body.frames()) {
            assert_relative_eq!(a.position(), b.position(), epsilon = 1e-9);
            for (p, q) in a.points().iter().zip(b.points()) {
                assert_relative_eq!(*p, *q, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn flat_kind_and_panel_density() {
        let body = square_tube(BodyKind::FlatPanels);
        let read = round_trip(&body, 1.0);
        assert_eq!(read.kind(), BodyKind::FlatPanels);
        assert_eq!(read.x_panels(), &[3, 3]);
        assert_eq!(read.h_panels(), &[7, 7, 7, 7]);
    }

    #[test]
    fn unnamed_body_keeps_its_kind() {
        let mut body = square_tube(BodyKind::FlatPanels);
        body.name.clear();
        let read = round_trip(&body, 1.0);
        assert_eq!(read.name, "");
        assert_eq!(read.kind(), BodyKind::FlatPanels);
        assert_eq!(read.frame_count(), 2);
    }

    #[test]
    fn multi_line_name_written_on_one_line() {
        let mut body = square_tube(BodyKind::FlatPanels);
        body.name = "two\nlines\r\n".to_string();
        let read = round_trip(&body, 1.0);
        assert_eq!(read.name, "two lines");
        assert_eq!(read.kind(), BodyKind::FlatPanels);
        assert_eq!(read.side_line_count(), 4);
    }

    #[test]
    fn comments_offset_and_unmarked_frame_ends() {
        let text = "\
! a pod made in a text editor
Pod   # name

OFFSET
1.0  5.0  0.5
BODYTYPE
1
FRAME
0.0 0.0 1.0
0.0 1.0 0.0
0.0 0.0 -1.0
FRAME
2.0, 0.0, 1.0
2.0, 1.0, 0.0
2.0, 0.0, -1.0
";
        let body = read_definition(Cursor::new(text), 1.0).unwrap();
        assert_eq!(body.name, "Pod");
        assert_eq!(body.kind(), BodyKind::FlatPanels);
        assert_eq!(body.frame_count(), 2);
        assert_relative_eq!(body.frame_position(0), 1.0);
        assert_relative_eq!(body.frame_position(1), 3.0);

        let p = body.frames()[1].points()[2];
        assert_relative_eq!(p, Point3::new(3.0, 0.0, -0.5));
    }

    #[test]
    fn mismatched_frames_rejected() {
        let text = "Bad\nFRAME\n0 0 1\n0 1 0\n0 0 -1\n\nFRAME\n1 0 1\n1 0 -1\n";
        let err = read_definition(Cursor::new(text), 1.0).unwrap_err();
        let err = err.downcast_ref::<BodyError>().unwrap();
        assert_eq!(
            err,
            &BodyError::MismatchedSideLines {
                frame: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn single_frame_rejected() {
        let text = "Lonely\nFRAME\n0 0 1\n0 1 0\n";
        let err = read_definition(Cursor::new(text), 1.0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BodyError>(),
            Some(&BodyError::NotEnoughFrames)
        );
    }

    #[test]
    fn empty_stream_rejected() {
        assert!(read_definition(Cursor::new("# nothing\n\n"), 1.0).is_err());
    }

    #[test]
    fn surface_point_listing() {
        let body = square_tube(BodyKind::FlatPanels);
        let mut bytes = Vec::new();
        write_surface_points(&body, &mut bytes, 1.0, 3, 4, true).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let sections = text.lines().filter(|l| l.contains("Cross Section")).count();
        assert_eq!(sections, 3);

        let points: Vec<[f64; 3]> = text.lines().filter_map(parse_xyz).collect();
        assert_eq!(points.len(), 12);

        // first point of the last section is the top of the tail frame
        let p = points[8];
        assert_relative_eq!(p[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(p[1], 0.0, epsilon = 1e-8);
        assert_relative_eq!(p[2], 0.5, epsilon = 1e-8);
    }
}

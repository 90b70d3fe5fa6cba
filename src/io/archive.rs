//! The versioned binary body archive.
//!
//! Every archive starts with an `i32` format version. Versions from 100000 to 200000 use the
//! current layout, which is the one written by `write_body`. Versions from 1000 to 1100 are the
//! legacy layout, which can still be read. All values are little-endian and strings are stored as
//! a `u32` byte length followed by UTF-8 bytes.

use crate::body::{Body, BodyKind, PointMass};
use crate::errors::BodyError;
use crate::surface::Frame;
use crate::{Point3, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// The format version emitted by `write_body`
pub const CURRENT_VERSION: i32 = 100_006;

const CURRENT_BAND: RangeInclusive<i32> = 100_000..=200_000;
const LEGACY_BAND: RangeInclusive<i32> = 1000..=1100;

/// Slots written as zero after the known fields of the current layout
const RESERVED_INTS: usize = 17;
const RESERVED_FLOATS: usize = 50;

const DEFAULT_DEGREE: usize = 3;

struct ArchiveWriter<W: Write> {
    inner: W,
}

impl<W: Write> ArchiveWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_count(&mut self, value: usize) -> Result<()> {
        let value = i32::try_from(value)?;
        self.write_i32(value)
    }

    #[cfg(test)]
    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_str(&mut self, value: &str) -> Result<()> {
        let length = u32::try_from(value.len())?;
        self.inner.write_all(&length.to_le_bytes())?;
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_point(&mut self, p: &Point3) -> Result<()> {
        self.write_f64(p.x)?;
        self.write_f64(p.y)?;
        self.write_f64(p.z)
    }
}

struct ArchiveReader<R: Read> {
    inner: R,
}

impl<R: Read> ArchiveReader<R> {
    fn new(inner: R) -> Self {
        Self { inner }
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_bytes()?))
    }

    /// Read an `i32` which must be a valid count or index.
    fn read_count(&mut self, field: &'static str) -> Result<usize> {
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| BodyError::InvalidField(field).into())
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_bytes()?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_bytes()?))
    }

    fn read_string(&mut self) -> Result<String> {
        let length = u32::from_le_bytes(self.read_bytes()?) as u64;
        let mut bytes = Vec::new();
        (&mut self.inner).take(length).read_to_end(&mut bytes)?;
        if bytes.len() as u64 != length {
            return Err("archive ended inside a string".into());
        }
        Ok(String::from_utf8(bytes)?)
    }

    fn read_point(&mut self) -> Result<Point3> {
        Ok(Point3::new(self.read_f64()?, self.read_f64()?, self.read_f64()?))
    }

    fn read_point_f32(&mut self) -> Result<Point3> {
        Ok(Point3::new(
            self.read_f32()? as f64,
            self.read_f32()? as f64,
            self.read_f32()? as f64,
        ))
    }

    fn skip_i32(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.read_i32()?;
        }
        Ok(())
    }

    fn skip_f64(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.read_f64()?;
        }
        Ok(())
    }
}

fn kind_code(kind: BodyKind) -> i32 {
    match kind {
        BodyKind::FlatPanels => 1,
        BodyKind::Smooth => 2,
    }
}

fn kind_from_code(code: i32) -> BodyKind {
    if code == 1 {
        BodyKind::FlatPanels
    } else {
        BodyKind::Smooth
    }
}

fn channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Write a body to a stream in the current archive format.
///
/// # Arguments
///
/// * `body`: the body to store
/// * `writer`: the destination stream
///
/// returns: Result<(), Box<dyn Error, Global>>
#[instrument(skip(body, writer))]
pub fn write_body<W: Write>(body: &Body, writer: W) -> Result<()> {
    let mut ar = ArchiveWriter::new(writer);
    ar.write_i32(CURRENT_VERSION)?;

    ar.write_str(&body.name)?;
    ar.write_str(&body.description)?;
    for c in body.color.iter() {
        ar.write_i32(*c as i32)?;
    }

    ar.write_i32(kind_code(body.kind()))?;
    ar.write_i32(0)?;
    let (nx, nh) = body.mesh_resolution();
    ar.write_count(nx)?;
    ar.write_count(nh)?;
    ar.write_f64(body.bunch())?;

    ar.write_count(body.side_line_count())?;
    for n in body.h_panels() {
        ar.write_count(*n)?;
    }

    ar.write_count(body.frame_count())?;
    for (frame, n) in body.frames().iter().zip(body.x_panels()) {
        ar.write_count(*n)?;
        ar.write_f64(frame.position())?;
        ar.write_count(frame.len())?;
        for p in frame.points() {
            ar.write_point(p)?;
        }
    }

    ar.write_f64(body.shell_mass())?;
    ar.write_count(body.point_masses.len())?;
    for pm in body.point_masses.iter() {
        ar.write_f64(pm.mass)?;
        ar.write_point(&pm.position)?;
        ar.write_str(&pm.tag)?;
    }

    ar.write_i32(body.textures as i32)?;
    for _ in 0..RESERVED_INTS {
        ar.write_i32(0)?;
    }
    ar.write_count(body.surface().u_degree())?;
    ar.write_count(body.surface().v_degree())?;
    for _ in 0..RESERVED_FLOATS {
        ar.write_f64(0.0)?;
    }

    ar.inner.flush()?;
    debug!("wrote body '{}' at version {}", body.name, CURRENT_VERSION);
    Ok(())
}

/// Read a body from an archive stream of either the current or the legacy format. A version tag
/// outside of both bands is rejected before anything else is read.
///
/// # Arguments
///
/// * `reader`: the source stream, positioned at the version tag
///
/// returns: Result<Body, Box<dyn Error, Global>>
#[instrument(skip(reader))]
pub fn read_body<R: Read>(reader: R) -> Result<Body> {
    let mut ar = ArchiveReader::new(reader);
    let version = ar.read_i32()?;

    let body = if CURRENT_BAND.contains(&version) {
        read_current(&mut ar)
    } else if LEGACY_BAND.contains(&version) {
        read_legacy(&mut ar, version)
    } else {
        Err(BodyError::UnsupportedVersion(version).into())
    };

    match &body {
        Ok(b) => debug!("read body '{}' at version {}", b.name, version),
        Err(e) => warn!("could not read body archive at version {}: {}", version, e),
    }
    body
}

fn read_current<R: Read>(ar: &mut ArchiveReader<R>) -> Result<Body> {
    let name = ar.read_string()?;
    let description = ar.read_string()?;
    let mut color = [0u8; 4];
    for c in color.iter_mut() {
        *c = channel(ar.read_i32()?);
    }

    let kind = kind_from_code(ar.read_i32()?);
    ar.read_i32()?;
    let nx = ar.read_count("longitudinal mesh resolution")?;
    let nh = ar.read_count("hoop mesh resolution")?;
    let bunch = ar.read_f64()?;

    let side_lines = ar.read_count("side-line count")?;
    let h_panels = (0..side_lines)
        .map(|_| ar.read_count("hoop panel count"))
        .collect::<Result<Vec<_>>>()?;

    let frame_count = ar.read_count("frame count")?;
    let mut x_panels = Vec::new();
    let mut frames = Vec::new();
    for _ in 0..frame_count {
        x_panels.push(ar.read_count("longitudinal panel count")?);
        let position = ar.read_f64()?;
        let n = ar.read_count("frame point count")?;
        let points = (0..n)
            .map(|_| ar.read_point())
            .collect::<Result<Vec<_>>>()?;
        frames.push(Frame::new(position, points));
    }

    let shell_mass = ar.read_f64()?;
    let mass_count = ar.read_count("point mass count")?;
    let mut point_masses = Vec::new();
    for _ in 0..mass_count {
        let mass = ar.read_f64()?;
        let position = ar.read_point()?;
        let tag = ar.read_string()?;
        point_masses.push(PointMass::new(mass, position, &tag));
    }

    let textures = ar.read_i32()? != 0;
    ar.skip_i32(RESERVED_INTS)?;
    let u_degree = ar.read_count("u degree")?;
    let v_degree = ar.read_count("v degree")?;
    ar.skip_f64(RESERVED_FLOATS)?;

    let mut body = Body::from_frames(&name, kind, frames)?;
    body.description = description;
    body.color = color;
    body.textures = textures;
    body.point_masses = point_masses;
    body.set_panel_tables(x_panels, h_panels);
    body.set_mesh_resolution(nx, nh);
    body.set_bunch(bunch);
    body.set_shell_mass(shell_mass);

    // Archives written before the degrees were stored hold zeros in these slots
    let degree = |d: usize| if d == 0 { DEFAULT_DEGREE } else { d };
    body.set_degrees(degree(u_degree), degree(v_degree));
    Ok(body)
}

fn read_legacy<R: Read>(ar: &mut ArchiveReader<R>, version: i32) -> Result<Body> {
    let name = ar.read_string()?;
    let description = if version >= 1003 {
        ar.read_string()?
    } else {
        String::new()
    };

    let r = channel(ar.read_i32()?);
    let g = channel(ar.read_i32()?);
    let b = channel(ar.read_i32()?);

    let kind = kind_from_code(ar.read_i32()?);
    let side_lines = ar.read_count("side-line count")?;
    let stations = ar.read_count("frame count")?;

    // resolution and the unused degree pair
    ar.skip_i32(3)?;
    let nx = ar.read_count("longitudinal mesh resolution")?;
    let nh = ar.read_count("hoop mesh resolution")?;

    let bunch = if version >= 1001 {
        ar.read_f32()? as f64
    } else {
        0.0
    };

    let (x_panels, h_panels) = if version >= 1002 {
        let x = (0..stations)
            .map(|_| ar.read_count("longitudinal panel count"))
            .collect::<Result<Vec<_>>>()?;
        let h = (0..side_lines)
            .map(|_| ar.read_count("hoop panel count"))
            .collect::<Result<Vec<_>>>()?;
        (x, h)
    } else {
        (Vec::new(), Vec::new())
    };

    let closed = ar.read_i32()?;
    if closed != 0 && closed != 1 {
        return Err(BodyError::InvalidField("closed surface flag").into());
    }

    let mut sections = Vec::new();
    for _ in 0..stations {
        let n = ar.read_count("frame point count")?;
        let points = (0..n)
            .map(|_| ar.read_point_f32())
            .collect::<Result<Vec<_>>>()?;
        sections.push(points);
    }

    ar.read_i32()?;
    let mut frames = Vec::new();
    for points in sections {
        let position = ar.read_f32()? as f64;
        ar.read_f32()?;
        frames.push(Frame::new(position, points));
    }

    let mut shell_mass = 0.0;
    let mut point_masses = Vec::new();
    if version >= 1004 {
        shell_mass = ar.read_f32()? as f64;
        let n = ar.read_count("point mass count")?;
        let masses = (0..n)
            .map(|_| ar.read_f32())
            .collect::<Result<Vec<_>>>()?;
        let positions = (0..n)
            .map(|_| ar.read_point_f32())
            .collect::<Result<Vec<_>>>()?;
        for (m, p) in masses.into_iter().zip(positions) {
            let tag = ar.read_string()?;
            point_masses.push(PointMass::new(m as f64, p, &tag));
        }
    }

    let alpha = ar.read_f32()?;
    let a = if version >= 1005 {
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
    } else {
        255
    };

    // leading edge position, no longer used
    if version >= 1006 {
        ar.skip_f64(3)?;
    }
    ar.read_f32()?;

    let mut body = Body::from_frames(&name, kind, frames)?;
    body.description = description;
    body.color = [r, g, b, a];
    body.point_masses = point_masses;
    body.set_panel_tables(x_panels, h_panels);
    body.set_mesh_resolution(nx, nh);
    body.set_bunch(bunch);
    body.set_shell_mass(shell_mass);
    Ok(body)
}

/// Write a body to an archive file, see `write_body`.
pub fn save_body(path: &Path, body: &Body) -> Result<()> {
    let file = File::create(path)?;
    write_body(body, BufWriter::new(file))
}

/// Read a body from an archive file, see `read_body`.
pub fn load_body(path: &Path) -> Result<Body> {
    let file = File::open(path)?;
    read_body(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::tests::square_tube;
    use std::io::Cursor;
    use test_case::test_case;

    fn round_trip(body: &Body) -> Body {
        let mut bytes = Vec::new();
        write_body(body, &mut bytes).unwrap();
        read_body(Cursor::new(bytes)).unwrap()
    }

    fn stored_body() -> Body {
        let mut body = Body::default();
        body.description = "demo fuselage".to_string();
        body.color = [10, 200, 30, 128];
        body.textures = true;
        body.point_masses
            .push(PointMass::new(0.2, Point3::new(0.05, 0.0, -0.01), "battery"));
        body.point_masses
            .push(PointMass::new(0.05, Point3::new(-0.1, 0.0, 0.02), "caméra"));
        body.set_shell_mass(0.35);
        body.set_bunch(0.4);
        body.set_mesh_resolution(25, 13);
        body.set_x_panels(2, 5).unwrap();
        body.set_h_panels(1, 4).unwrap();
        body.set_degrees(2, 2);
        body
    }

    #[test]
    fn current_format_round_trip() {
        let body = stored_body();
        let read = round_trip(&body);

        assert_eq!(read.name, body.name);
        assert_eq!(read.description, body.description);
        assert_eq!(read.color, body.color);
        assert!(read.textures);
        assert_eq!(read.kind(), body.kind());
        assert_eq!(read.frames(), body.frames());
        assert_eq!(read.x_panels(), body.x_panels());
        assert_eq!(read.h_panels(), body.h_panels());
        assert_eq!(read.mesh_resolution(), (25, 13));
        assert_eq!(read.bunch(), 0.4);
        assert_eq!(read.shell_mass(), 0.35);
        assert_eq!(read.point_masses, body.point_masses);
        assert_eq!(read.surface().u_degree(), 2);
        assert_eq!(read.surface().v_degree(), 2);
    }

    #[test]
    fn flat_kind_round_trip() {
        let body = square_tube(BodyKind::FlatPanels);
        let read = round_trip(&body);
        assert_eq!(read.kind(), BodyKind::FlatPanels);
        assert_eq!(read.frames(), body.frames());
    }

    #[test]
    fn version_tag_leads_the_stream() {
        let mut bytes = Vec::new();
        write_body(&Body::default(), &mut bytes).unwrap();
        assert_eq!(bytes[..4], CURRENT_VERSION.to_le_bytes());
    }

    #[test_case(0)]
    #[test_case(999)]
    #[test_case(1101)]
    #[test_case(99_999)]
    #[test_case(200_001)]
    #[test_case(-100_006)]
    fn unsupported_versions_rejected(version: i32) {
        // nothing follows the tag, so any attempt to read further would fail differently
        let bytes = version.to_le_bytes().to_vec();
        let err = read_body(Cursor::new(bytes)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BodyError>(),
            Some(&BodyError::UnsupportedVersion(version))
        );
    }

    #[test]
    fn truncated_archive_is_an_error() {
        let mut bytes = Vec::new();
        write_body(&Body::default(), &mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(read_body(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn zero_degrees_fall_back_to_cubic() {
        let mut bytes = Vec::new();
        write_body(&square_tube(BodyKind::Smooth), &mut bytes).unwrap();

        // the degree pair sits right before the trailing reserved floats
        let at = bytes.len() - RESERVED_FLOATS * 8 - 8;
        bytes[at..at + 8].fill(0);
        let read = read_body(Cursor::new(bytes)).unwrap();
        assert_eq!(read.surface().u_degree(), 3);
        assert_eq!(read.surface().v_degree(), 3);
    }

    fn legacy_bytes(version: i32, closed: i32) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut w = ArchiveWriter::new(&mut bytes);
        w.write_i32(version).unwrap();
        w.write_str("Old pod").unwrap();
        if version >= 1003 {
            w.write_str("from an old project").unwrap();
        }
        for c in [200, 10, 20] {
            w.write_i32(c).unwrap();
        }
        w.write_i32(1).unwrap();
        w.write_i32(3).unwrap();
        w.write_i32(2).unwrap();
        for v in [0, 3, 3, 12, 8] {
            w.write_i32(v).unwrap();
        }
        if version >= 1001 {
            w.write_f32(0.25).unwrap();
        }
        if version >= 1002 {
            for v in [4, 5, 6, 6, 6] {
                w.write_i32(v).unwrap();
            }
        }
        w.write_i32(closed).unwrap();

        let stations = [0.0f32, 2.0];
        for x in stations {
            w.write_i32(3).unwrap();
            for (y, z) in [(0.0f32, 1.0f32), (1.0, 0.0), (0.0, -1.0)] {
                w.write_f32(x).unwrap();
                w.write_f32(y).unwrap();
                w.write_f32(z).unwrap();
            }
        }
        w.write_i32(2).unwrap();
        for x in stations {
            w.write_f32(x).unwrap();
            w.write_f32(0.0).unwrap();
        }

        if version >= 1004 {
            w.write_f32(1.5).unwrap();
            w.write_i32(1).unwrap();
            w.write_f32(0.25).unwrap();
            for c in [0.5f32, 0.0, -0.125] {
                w.write_f32(c).unwrap();
            }
            w.write_str("battery").unwrap();
        }
        w.write_f32(0.5).unwrap();
        if version >= 1006 {
            for _ in 0..3 {
                w.write_f64(0.0).unwrap();
            }
        }
        w.write_f32(0.0).unwrap();
        bytes
    }

    #[test_case(1000)]
    #[test_case(1001)]
    #[test_case(1002)]
    #[test_case(1003)]
    #[test_case(1004)]
    #[test_case(1005)]
    #[test_case(1006)]
    fn legacy_field_gating(version: i32) {
        let body = read_body(Cursor::new(legacy_bytes(version, 1))).unwrap();

        assert_eq!(body.name, "Old pod");
        assert_eq!(body.kind(), BodyKind::FlatPanels);
        assert_eq!(body.frame_count(), 2);
        assert_eq!(body.side_line_count(), 3);
        assert_eq!(body.frame_position(1), 2.0);
        assert_eq!(body.frames()[1].points()[1], Point3::new(2.0, 1.0, 0.0));
        assert_eq!(body.mesh_resolution(), (12, 8));

        let bunch = if version >= 1001 { 0.25 } else { 0.0 };
        assert_eq!(body.bunch(), bunch);

        if version >= 1002 {
            assert_eq!(body.x_panels(), &[4, 5]);
            assert_eq!(body.h_panels(), &[6, 6, 6]);
        } else {
            assert_eq!(body.x_panels(), &[1, 1]);
        }

        assert_eq!(body.description.is_empty(), version < 1003);

        if version >= 1004 {
            assert_eq!(body.shell_mass(), 1.5);
            assert_eq!(body.point_masses.len(), 1);
            assert_eq!(body.point_masses[0].tag, "battery");
            assert_eq!(body.point_masses[0].position, Point3::new(0.5, 0.0, -0.125));
        } else {
            assert!(body.point_masses.is_empty());
        }

        let alpha = if version >= 1005 { 128 } else { 255 };
        assert_eq!(body.color, [200, 10, 20, alpha]);
    }

    #[test]
    fn legacy_closed_flag_validated() {
        let err = read_body(Cursor::new(legacy_bytes(1006, 7))).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BodyError>(),
            Some(&BodyError::InvalidField("closed surface flag"))
        );
    }
}

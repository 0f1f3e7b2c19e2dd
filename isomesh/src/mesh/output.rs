//! PLY and STL writers
use super::Mesh;
use crate::Error;
use nalgebra::Vector3;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Encoding used when writing PLY files
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum PlyFormat {
    /// Compact binary encoding
    #[default]
    BinaryLittleEndian,
    /// Human-readable text encoding
    Ascii,
}

impl Mesh {
    /// Writes a PLY file with per-vertex colors to the given output
    ///
    /// Returns [`Error::ColorCountMismatch`] if the mesh does not have exactly
    /// one color per vertex.
    pub fn write_ply<W: Write>(
        &self,
        out: &mut W,
        format: PlyFormat,
    ) -> Result<(), Error> {
        self.check_colors()?;
        write_ply(out, &self.vertices, &self.triangles, &self.colors, format)
    }

    /// Writes a binary STL to the given output
    ///
    /// Colors are not included.
    pub fn write_stl<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        self.check_indices()?;

        let mut out = BufWriter::new(out);
        const HEADER: &[u8] = b"isomesh binary STL";
        static_assertions::const_assert!(HEADER.len() <= 80);
        let mut header = [0u8; 80];
        header[..HEADER.len()].copy_from_slice(HEADER);
        out.write_all(&header)?;
        let count = self.triangles.len() as u32;
        out.write_all(&count.to_le_bytes())?;

        // Each facet is a normal, three corners, and a zero attribute word
        let mut facet = [0u8; 50];
        for t in &self.triangles {
            let [a, b, c] = [t.x, t.y, t.z].map(|i| self.vertices[i]);
            let normal = (b - a).cross(&(c - a));
            let coords = [normal, a, b, c];
            let floats = coords.iter().flat_map(|v| v.iter());
            for (chunk, f) in facet.chunks_exact_mut(4).zip(floats) {
                chunk.copy_from_slice(&f.to_le_bytes());
            }
            out.write_all(&facet)?;
        }
        out.flush()?;
        Ok(())
    }
}

fn write_ply<W: Write>(
    out: &mut W,
    vertices: &[Vector3<f32>],
    triangles: &[Vector3<usize>],
    colors: &[[u8; 3]],
    format: PlyFormat,
) -> Result<(), Error> {
    debug_assert_eq!(vertices.len(), colors.len());

    // PLY face indices are signed 32-bit values
    let count = vertices.len().min(i32::MAX as usize + 1);
    if let Some(&index) = triangles.iter().flatten().find(|&&i| i >= count) {
        return Err(Error::BadIndex {
            index,
            count: vertices.len(),
        });
    }

    let mut out = BufWriter::new(out);
    writeln!(out, "ply")?;
    writeln!(out, "format {format} 1.0")?;
    writeln!(out, "comment exported by isomesh")?;
    writeln!(out, "element vertex {}", vertices.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(out, "property float {axis}")?;
    }
    for channel in ["red", "green", "blue"] {
        writeln!(out, "property uchar {channel}")?;
    }
    writeln!(out, "element face {}", triangles.len())?;
    writeln!(out, "property list uchar int vertex_indices")?;
    writeln!(out, "end_header")?;

    match format {
        PlyFormat::Ascii => {
            for (v, c) in vertices.iter().zip(colors) {
                writeln!(
                    out,
                    "{} {} {} {} {} {}",
                    v.x, v.y, v.z, c[0], c[1], c[2]
                )?;
            }
            for t in triangles {
                writeln!(out, "3 {} {} {}", t.x, t.y, t.z)?;
            }
        }
        PlyFormat::BinaryLittleEndian => {
            for (v, c) in vertices.iter().zip(colors) {
                for p in v {
                    out.write_all(&p.to_le_bytes())?;
                }
                out.write_all(c)?;
            }
            for t in triangles {
                out.write_all(&[3u8])?;
                for &i in t {
                    out.write_all(&(i as i32).to_le_bytes())?;
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Writes a colored mesh to a PLY file
///
/// Returns [`Error::ColorCountMismatch`] if the mesh is missing colors.
pub fn export<P: AsRef<Path>>(
    mesh: &Mesh,
    path: P,
    format: PlyFormat,
) -> Result<(), Error> {
    mesh.check_colors()?;
    let mut f = std::fs::File::create(path)?;
    mesh.write_ply(&mut f, format)
}

/// Writes a mesh to a PLY file, with the same color on every vertex
///
/// The mesh's own colors (if any) are ignored.  This is a sanity-check
/// artifact: if the debug mesh looks right but the colored mesh doesn't, the
/// problem is in colorization rather than extraction.
pub fn export_debug<P: AsRef<Path>>(
    mesh: &Mesh,
    color: [u8; 3],
    path: P,
    format: PlyFormat,
) -> Result<(), Error> {
    let colors = vec![color; mesh.vertices.len()];
    let mut f = std::fs::File::create(path)?;
    write_ply(&mut f, &mesh.vertices, &mesh.triangles, &colors, format)
}

#[cfg(test)]
mod test {
    use super::*;

    fn triangle() -> Mesh {
        Mesh {
            vertices: vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.5, 0.0),
            ],
            triangles: vec![Vector3::new(0, 1, 2)],
            colors: vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]],
        }
    }

    #[test]
    fn test_ascii_ply() {
        let mut buf = vec![];
        triangle().write_ply(&mut buf, PlyFormat::Ascii).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let expected = "\
ply
format ascii 1.0
comment exported by isomesh
element vertex 3
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
element face 1
property list uchar int vertex_indices
end_header
0 0 0 255 0 0
1 0 0 0 255 0
0 1.5 0 0 0 255
3 0 1 2
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_binary_ply_size() {
        let mut buf = vec![];
        triangle()
            .write_ply(&mut buf, PlyFormat::BinaryLittleEndian)
            .unwrap();
        let header_end = b"end_header\n";
        let pos = buf
            .windows(header_end.len())
            .position(|w| w == header_end)
            .unwrap();
        let body = buf.len() - pos - header_end.len();
        assert_eq!(body, 3 * (3 * 4 + 3) + (1 + 3 * 4));
        assert!(buf.starts_with(b"ply\nformat binary_little_endian 1.0\n"));
    }

    #[test]
    fn test_missing_colors() {
        let mut mesh = triangle();
        mesh.colors.pop();
        let mut buf = vec![];
        assert!(matches!(
            mesh.write_ply(&mut buf, PlyFormat::Ascii),
            Err(Error::ColorCountMismatch {
                colors: 2,
                vertices: 3
            })
        ));
    }

    #[test]
    fn test_bad_index() {
        let mut mesh = triangle();
        mesh.triangles[0].z = 7;
        let mut buf = vec![];
        assert!(matches!(
            mesh.write_ply(&mut buf, PlyFormat::Ascii),
            Err(Error::BadIndex { index: 7, count: 3 })
        ));
        assert!(matches!(
            mesh.write_stl(&mut buf),
            Err(Error::BadIndex { index: 7, count: 3 })
        ));
    }

    #[test]
    fn test_stl_size() {
        let mut buf = vec![];
        triangle().write_stl(&mut buf).unwrap();
        assert_eq!(buf.len(), 80 + 4 + 50);
        assert_eq!(&buf[80..84], &1u32.to_le_bytes());
    }

    #[test]
    fn test_format_names() {
        assert_eq!(PlyFormat::Ascii.to_string(), "ascii");
        assert_eq!(
            PlyFormat::BinaryLittleEndian.to_string(),
            "binary_little_endian"
        );
        assert_eq!("ascii".parse::<PlyFormat>().unwrap(), PlyFormat::Ascii);
    }
}

//! PLY input
//!
//! This reads back the files written by [`Mesh::write_ply`], along with other
//! triangle-only PLY files in either ASCII or binary little-endian encoding.
//! Elements other than `vertex` and `face` are parsed and ignored.
use super::Mesh;
use crate::Error;
use arrayvec::ArrayVec;
use nalgebra::Vector3;
use std::io::{BufRead, Read};

/// Upper bound on up-front allocation, since element counts come from the
/// (untrusted) header
const MAX_RESERVE: usize = 1 << 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(s: &str) -> Result<Self, Error> {
        let out = match s {
            "char" | "int8" => Scalar::I8,
            "uchar" | "uint8" => Scalar::U8,
            "short" | "int16" => Scalar::I16,
            "ushort" | "uint16" => Scalar::U16,
            "int" | "int32" => Scalar::I32,
            "uint" | "uint32" => Scalar::U32,
            "float" | "float32" => Scalar::F32,
            "double" | "float64" => Scalar::F64,
            _ => return Err(Error::BadPly(format!("unknown type '{s}'"))),
        };
        Ok(out)
    }

    fn size(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::F64 => 8,
        }
    }
}

#[derive(Clone, Debug)]
enum Property {
    Scalar(String, Scalar),
    List(String, Scalar, Scalar),
}

impl Property {
    fn name(&self) -> &str {
        match self {
            Property::Scalar(name, _) | Property::List(name, _, _) => name,
        }
    }
}

#[derive(Clone, Debug)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Encoding {
    Ascii,
    BinaryLittleEndian,
}

/// Reads header lines up to and including `end_header`
fn parse_header<R: BufRead>(
    r: &mut R,
) -> Result<(Encoding, Vec<Element>), Error> {
    let mut line = String::new();
    let mut next_line = |line: &mut String| -> Result<(), Error> {
        line.clear();
        if r.read_line(line)? == 0 {
            return Err(Error::BadPly("unexpected end of header".to_owned()));
        }
        Ok(())
    };

    next_line(&mut line)?;
    if line.trim_end() != "ply" {
        return Err(Error::BadPly("missing 'ply' magic".to_owned()));
    }

    let mut encoding = None;
    let mut elements: Vec<Element> = vec![];
    loop {
        next_line(&mut line)?;
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["end_header"] => break,
            ["comment", ..] | ["obj_info", ..] | [] => (),
            ["format", f, "1.0"] => {
                encoding = Some(match *f {
                    "ascii" => Encoding::Ascii,
                    "binary_little_endian" => Encoding::BinaryLittleEndian,
                    _ => {
                        return Err(Error::BadPly(format!(
                            "unsupported format '{f}'"
                        )));
                    }
                });
            }
            ["element", name, count] => {
                let count = count.parse().map_err(|_| {
                    Error::BadPly(format!("bad element count '{count}'"))
                })?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: vec![],
                });
            }
            ["property", "list", count, item, name] => {
                let p = Property::List(
                    name.to_string(),
                    Scalar::parse(count)?,
                    Scalar::parse(item)?,
                );
                elements
                    .last_mut()
                    .ok_or_else(|| {
                        Error::BadPly("property before element".to_owned())
                    })?
                    .properties
                    .push(p);
            }
            ["property", ty, name] => {
                let p = Property::Scalar(name.to_string(), Scalar::parse(ty)?);
                elements
                    .last_mut()
                    .ok_or_else(|| {
                        Error::BadPly("property before element".to_owned())
                    })?
                    .properties
                    .push(p);
            }
            _ => {
                return Err(Error::BadPly(format!(
                    "bad header line '{}'",
                    line.trim_end()
                )));
            }
        }
    }
    let encoding =
        encoding.ok_or_else(|| Error::BadPly("missing format".to_owned()))?;
    Ok((encoding, elements))
}

/// Source of scalar values from the body of a PLY file
trait Body {
    fn scalar(&mut self, ty: Scalar) -> Result<f64, Error>;

    fn index(&mut self, ty: Scalar) -> Result<usize, Error> {
        let v = self.scalar(ty)?;
        if v < 0.0 || v.fract() != 0.0 {
            return Err(Error::BadPly(format!("bad index {v}")));
        }
        Ok(v as usize)
    }
}

struct Binary<R>(R);

impl<R: BufRead> Body for Binary<R> {
    fn scalar(&mut self, ty: Scalar) -> Result<f64, Error> {
        let mut buf = [0u8; 8];
        let buf = &mut buf[..ty.size()];
        self.0.read_exact(buf)?;
        let v = match ty {
            Scalar::I8 => i8::from_le_bytes([buf[0]]) as f64,
            Scalar::U8 => buf[0] as f64,
            Scalar::I16 => i16::from_le_bytes([buf[0], buf[1]]) as f64,
            Scalar::U16 => u16::from_le_bytes([buf[0], buf[1]]) as f64,
            Scalar::I32 => i32::from_le_bytes(bytes(buf)) as f64,
            Scalar::U32 => u32::from_le_bytes(bytes(buf)) as f64,
            Scalar::F32 => f32::from_le_bytes(bytes(buf)) as f64,
            Scalar::F64 => f64::from_le_bytes(bytes(buf)),
        };
        Ok(v)
    }
}

fn bytes<const N: usize>(buf: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(buf);
    out
}

struct Ascii<I> {
    words: I,
}

impl<'a, I: Iterator<Item = &'a str>> Body for Ascii<I> {
    fn scalar(&mut self, ty: Scalar) -> Result<f64, Error> {
        let w = self.words.next().ok_or_else(|| {
            Error::BadPly("unexpected end of file".to_owned())
        })?;
        let bad = || Error::BadPly(format!("bad {ty:?} value '{w}'"));
        // Parse single-precision values directly, so that they round-trip
        // exactly through their shortest decimal representation
        match ty {
            Scalar::F32 => w.parse::<f32>().map(f64::from).map_err(|_| bad()),
            Scalar::F64 => w.parse::<f64>().map_err(|_| bad()),
            _ => w.parse::<i64>().map(|v| v as f64).map_err(|_| bad()),
        }
    }
}

/// Reads the body of a PLY file, given its header
fn parse_body<B: Body>(
    body: &mut B,
    elements: &[Element],
) -> Result<Mesh, Error> {
    let mut mesh = Mesh::new();
    for e in elements {
        match e.name.as_str() {
            "vertex" => read_vertices(body, e, &mut mesh)?,
            "face" => read_faces(body, e, &mut mesh)?,
            _ => {
                for _ in 0..e.count {
                    for p in &e.properties {
                        skip(body, p)?;
                    }
                }
            }
        }
    }
    mesh.check_indices()?;
    Ok(mesh)
}

fn skip<B: Body>(body: &mut B, p: &Property) -> Result<(), Error> {
    match p {
        Property::Scalar(_, ty) => {
            body.scalar(*ty)?;
        }
        Property::List(_, count, item) => {
            for _ in 0..body.index(*count)? {
                body.scalar(*item)?;
            }
        }
    }
    Ok(())
}

fn read_vertices<B: Body>(
    body: &mut B,
    e: &Element,
    mesh: &mut Mesh,
) -> Result<(), Error> {
    let slot = |name: &str| e.properties.iter().position(|p| p.name() == name);
    let pos = ["x", "y", "z"].map(slot);
    let rgb = ["red", "green", "blue"].map(slot);
    if pos.iter().any(Option::is_none) {
        return Err(Error::BadPly("vertex is missing x, y, or z".to_owned()));
    }
    let has_color = rgb.iter().all(Option::is_some);

    let mut values = vec![0.0; e.properties.len()];
    mesh.vertices.reserve(e.count.min(MAX_RESERVE));
    for _ in 0..e.count {
        for (v, p) in values.iter_mut().zip(&e.properties) {
            match p {
                Property::Scalar(_, ty) => *v = body.scalar(*ty)?,
                Property::List(..) => skip(body, p)?,
            }
        }
        let get = |i: Option<usize>| i.map(|i| values[i]).unwrap_or(0.0);
        mesh.vertices.push(Vector3::from(pos.map(|i| get(i) as f32)));
        if has_color {
            mesh.colors.push(rgb.map(|i| get(i).clamp(0.0, 255.0) as u8));
        }
    }
    Ok(())
}

fn read_faces<B: Body>(
    body: &mut B,
    e: &Element,
    mesh: &mut Mesh,
) -> Result<(), Error> {
    if !e.properties.iter().any(|p| {
        matches!(p, Property::List(..))
            && matches!(p.name(), "vertex_indices" | "vertex_index")
    }) {
        return Err(Error::BadPly("face is missing vertex indices".to_owned()));
    }

    mesh.triangles.reserve(e.count.min(MAX_RESERVE));
    for _ in 0..e.count {
        let mut tri: Option<ArrayVec<usize, 3>> = None;
        for p in &e.properties {
            match p {
                Property::List(name, count, item)
                    if matches!(
                        name.as_str(),
                        "vertex_indices" | "vertex_index"
                    ) =>
                {
                    let n = body.index(*count)?;
                    let mut t = ArrayVec::new();
                    for _ in 0..n {
                        t.try_push(body.index(*item)?).map_err(|_| {
                            Error::BadPly(format!(
                                "face with {n} vertices is not a triangle"
                            ))
                        })?;
                    }
                    tri = Some(t);
                }
                _ => skip(body, p)?,
            }
        }
        let t = tri
            .and_then(|t| t.into_inner().ok())
            .ok_or_else(|| Error::BadPly("face is not a triangle".to_owned()))?;
        mesh.triangles.push(Vector3::from(t));
    }
    Ok(())
}

impl Mesh {
    /// Reads a PLY file
    ///
    /// Both ASCII and binary little-endian encodings are supported.  Faces
    /// must be triangles.  If the vertices have `red`, `green`, and `blue`
    /// properties, then they are loaded as colors; otherwise, the returned
    /// mesh has no colors.
    pub fn read_ply<R: BufRead>(r: &mut R) -> Result<Self, Error> {
        let (encoding, elements) = parse_header(r)?;
        match encoding {
            Encoding::BinaryLittleEndian => {
                parse_body(&mut Binary(r), &elements)
            }
            Encoding::Ascii => {
                let mut text = String::new();
                r.read_to_string(&mut text)?;
                let mut body = Ascii {
                    words: text.split_whitespace(),
                };
                parse_body(&mut body, &elements)
            }
        }
    }
}

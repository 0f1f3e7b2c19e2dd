use std::io::Write;

// Same axes as in `isomesh::mesh::types`, but available at build time.
const X: usize = 1;
const Y: usize = 2;
const Z: usize = 4;

fn next(axis: usize) -> usize {
    match axis {
        X => Y,
        Y => Z,
        Z => X,
        _ => panic!("invalid axis {axis}"),
    }
}

/// Packs the edge between two adjacent corners
///
/// With `(t, u, v)` as a right-handed coordinate system and `t` being the
/// varying axis of the edge, this is `4 * t + 2 * v + 1 * u`, matching
/// `Edge` in `mesh::types`.
#[allow(clippy::identity_op)]
fn edge_index(a: usize, b: usize) -> usize {
    let t = a ^ b;
    assert_eq!(t.count_ones(), 1);
    assert!(t < 8);

    let start = a.min(b);
    let u = next(t);
    let v = next(u);

    (t.trailing_zeros() as usize * 4)
        + (((start & v) != 0) as usize) * 2
        + (((start & u) != 0) as usize) * 1
}

/// Returns the two faces `(axis, upper)` which contain the given edge
fn edge_faces(e: usize) -> [(usize, bool); 2] {
    let u = next(1 << (e / 4));
    let v = next(u);
    [(u, e & 1 != 0), (v, e & 2 != 0)]
}

/// Checks whether a segment between crossings on edges `a` and `b` would lie
/// on a cell face
fn on_face(a: usize, b: usize) -> bool {
    let fb = edge_faces(b);
    edge_faces(a).iter().any(|f| fb.contains(f))
}

/// Triangulates a ring of crossed edges without adding any diagonal that
/// lies on a cell face
///
/// The closing segment `ring[n - 1] -> ring[0]` is paired with an apex, and
/// the two remaining sub-rings are triangulated recursively.  A face
/// diagonal would be shared with the neighboring cell, which could use the
/// same segment in its own triangulation.
fn triangulate(ring: &[usize]) -> Option<Vec<[usize; 3]>> {
    let n = ring.len();
    if n == 2 {
        return Some(vec![]);
    }
    let (first, last) = (ring[0], ring[n - 1]);
    for k in 1..n - 1 {
        let apex = ring[k];
        if (k > 1 && on_face(first, apex)) || (k < n - 2 && on_face(apex, last))
        {
            continue;
        }
        let (Some(mut tris), Some(rest)) =
            (triangulate(&ring[..=k]), triangulate(&ring[k..]))
        else {
            continue;
        };
        tris.push([first, apex, last]);
        tris.extend(rest);
        return Some(tris);
    }
    None
}

/// Returns the corners of a cell face in counter-clockwise order, as seen
/// from outside the cell
fn face(axis: usize, upper: bool) -> [usize; 4] {
    let u = next(axis);
    let v = next(u);
    if upper {
        [axis, axis | u, axis | u | v, axis | v]
    } else {
        [0, v, u | v, u]
    }
}

/// Builds the marching cubes triangle table.
///
/// Rather than transcribing the classic 256-case table, the triangulation is
/// worked out from face connectivity:
///
/// - On every face, crossings are paired so that inside corners are kept
///   apart.  Each pair becomes a directed segment with the outside region on
///   its left when viewed from outside the cell.
/// - Every crossed edge starts exactly one segment and ends exactly one, so
///   the segments form closed rings.
/// - Rings are triangulated with diagonals through the cell's interior only.
///
/// Since the pairing on a face only depends on that face's corners, adjacent
/// cells always agree on their shared face and the surface is crack-free.
/// Face segments belong to one triangle on either side and interior
/// diagonals to two triangles within the cell, so the surface is manifold.
/// Triangles are wound so that `(b - a) x (c - a)` points to the outside.
fn main() -> Result<(), std::io::Error> {
    // The build script stands alone; ignore other changes (e.g. edits to
    // benchmarks in the benches subfolder).
    println!("cargo:rerun-if-changed=build.rs");

    let mut tri_table: Vec<Vec<[usize; 3]>> = vec![];
    for mask in 0..256usize {
        let inside = |c: usize| (mask & (1 << c)) != 0;

        // links[e] is the edge where the surface leaves a face, given the
        // edge `e` where it entered that face
        let mut links: [Option<usize>; 12] = [None; 12];
        for axis in [X, Y, Z] {
            for upper in [false, true] {
                let cs = face(axis, upper);

                // Crossings in counter-clockwise order, tagged with `true` if
                // walking the face boundary goes from outside to inside
                let mut crossings = vec![];
                for k in 0..4 {
                    let a = cs[k];
                    let b = cs[(k + 1) % 4];
                    if inside(a) != inside(b) {
                        crossings.push((edge_index(a, b), inside(b)));
                    }
                }
                assert_eq!(crossings.len() % 2, 0);

                let n = crossings.len();
                for (k, &(e, enter)) in crossings.iter().enumerate() {
                    if enter {
                        let (exit, also_enter) = crossings[(k + 1) % n];
                        assert!(!also_enter);
                        assert!(links[e].is_none());
                        links[e] = Some(exit);
                    }
                }
            }
        }

        let mut tris = vec![];
        let mut seen = [false; 12];
        for start in 0..12 {
            if seen[start] || links[start].is_none() {
                continue;
            }
            let mut ring = vec![];
            let mut e = start;
            loop {
                assert!(!seen[e]);
                seen[e] = true;
                ring.push(e);
                e = links[e].expect("every crossed edge must be linked");
                if e == start {
                    break;
                }
            }
            assert!(ring.len() >= 3);
            tris.extend(
                triangulate(&ring)
                    .expect("every ring has an interior triangulation"),
            );
        }
        if mask == 0 || mask == 255 {
            assert!(tris.is_empty());
        }
        tri_table.push(tris);
    }

    let out_dir = std::env::var_os("OUT_DIR").unwrap();
    let dest_path = std::path::Path::new(&out_dir).join("mc_tables.rs");
    let mut file =
        std::fs::File::create(dest_path).expect("could not make output file");

    writeln!(
        &mut file,
        "
/// Lookup table to find triangles for a particular cell configuration
///
/// Given a cell mask `i` (as an 8-bit value, with a bit set for each corner
/// that is inside the surface), returns a list of triangles.  Each triangle
/// is given as three edges, which are replaced by the interpolated crossing
/// point on that edge.
pub const CELL_TO_TRIANGLES: [&[[Edge; 3]]; 256] = ["
    )?;
    for tris in tri_table {
        writeln!(&mut file, "    &[")?;
        for [a, b, c] in tris {
            writeln!(
                &mut file,
                "        [Edge::new({a}), Edge::new({b}), Edge::new({c})],"
            )?;
        }
        writeln!(&mut file, "    ],")?;
    }
    writeln!(&mut file, "];")?;

    Ok(())
}

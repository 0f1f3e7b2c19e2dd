use isomesh::{
    ThreadPool,
    bounds::BoundingVolume,
    field::{
        Field,
        shapes::{Cuboid, Sphere, Torus, Union},
    },
    mesh::{Mesh, Settings, extract},
    types::Value,
};
use nalgebra::Vector3;
use std::collections::HashMap;

fn sphere_mesh(resolution: usize) -> Mesh {
    let sphere = Sphere::new(Vector3::zeros(), 0.5);
    let settings = Settings {
        resolution,
        ..Default::default()
    };
    extract(&sphere, &BoundingVolume::default(), &settings).unwrap()
}

/// Counts how many triangles use each undirected edge
fn edge_counts(mesh: &Mesh) -> HashMap<(usize, usize), usize> {
    let mut out = HashMap::new();
    for t in &mesh.triangles {
        for (a, b) in [(t.x, t.y), (t.y, t.z), (t.z, t.x)] {
            *out.entry((a.min(b), a.max(b))).or_default() += 1;
        }
    }
    out
}

/// Checks that the mesh is closed and returns its Euler characteristic
fn closed_euler(mesh: &Mesh) -> i64 {
    let edges = edge_counts(mesh);
    for (e, n) in &edges {
        assert_eq!(*n, 2, "edge {e:?} is used by {n} triangles");
    }
    mesh.vertices.len() as i64 - edges.len() as i64
        + mesh.triangles.len() as i64
}

fn signed_volume(mesh: &Mesh) -> f32 {
    mesh.triangles
        .iter()
        .map(|t| {
            let [a, b, c] = [t.x, t.y, t.z].map(|i| mesh.vertices[i]);
            a.dot(&b.cross(&c)) / 6.0
        })
        .sum()
}

#[test]
fn test_sphere_octahedron() {
    // With 5 points per axis, the only inside point is the center and its six
    // neighbors lie exactly on the surface.
    let mesh = sphere_mesh(5);
    assert_eq!(mesh.vertices.len(), 6);
    assert_eq!(mesh.triangles.len(), 8);
    for v in &mesh.vertices {
        assert_eq!(v.norm(), 0.5, "bad vertex {v:?}");
    }
    assert_eq!(closed_euler(&mesh), 2);
    assert!(mesh.colors.is_empty());
}

#[test]
fn test_sphere_too_coarse() {
    // With 4 points per axis, the nearest lattice points are at ±1/3, all
    // of which are outside a sphere of radius 0.5.
    let mesh = sphere_mesh(4);
    assert!(mesh.is_empty());
    assert!(mesh.triangles.is_empty());
}

#[test]
fn test_sphere_vertices() {
    let mesh = sphere_mesh(16);
    assert!(!mesh.is_empty());
    mesh.check_indices().unwrap();

    let half_cell = 1.0 / 15.0;
    for v in &mesh.vertices {
        let n = v.norm();
        assert!((n - 0.5).abs() < half_cell, "bad vertex {v:?}: {n}");
    }
    assert_eq!(closed_euler(&mesh), 2);
}

#[test]
fn test_sphere_winding() {
    let mesh = sphere_mesh(16);
    for t in &mesh.triangles {
        let [a, b, c] = [t.x, t.y, t.z].map(|i| mesh.vertices[i]);
        let n = (b - a).cross(&(c - a));
        if n.norm() < 1e-6 {
            continue;
        }
        let center = (a + b + c) / 3.0;
        assert!(n.dot(&center) > 0.0, "inward triangle {t:?}");
    }
    let expected = 4.0 / 3.0 * std::f32::consts::PI * 0.125;
    let v = signed_volume(&mesh);
    assert!((v - expected).abs() < expected * 0.1, "bad volume {v}");
}

#[test]
fn test_deterministic() {
    let sphere = Sphere::new(Vector3::new(0.1, -0.2, 0.05), 0.6);
    let bounds = BoundingVolume::default();
    let pool = ThreadPool::with_threads(3).unwrap();
    let mut prev = None;
    for threads in [None, Some(&pool), Some(&ThreadPool::Global)] {
        let settings = Settings {
            resolution: 24,
            threads,
            ..Default::default()
        };
        let mesh = extract(&sphere, &bounds, &settings).unwrap();
        if let Some(prev) = &prev {
            assert_eq!(prev, &mesh);
        }
        prev = Some(mesh);
    }
}

#[test]
fn test_torus() {
    let torus = Torus::new(Vector3::zeros(), 0.5, 0.2);
    let settings = Settings {
        resolution: 32,
        ..Default::default()
    };
    let mesh = extract(&torus, &BoundingVolume::default(), &settings).unwrap();
    assert_eq!(closed_euler(&mesh), 0);
    for v in &mesh.vertices {
        let ring = (v.x.powi(2) + v.y.powi(2)).sqrt() - 0.5;
        let d = (ring.powi(2) + v.z.powi(2)).sqrt();
        assert!((d - 0.2).abs() < 0.05, "bad vertex {v:?}: {d}");
    }
    assert!(signed_volume(&mesh) > 0.0);
}

#[test]
fn test_cuboid() {
    let min = Vector3::new(-0.5, -0.3, -0.4);
    let max = Vector3::new(0.5, 0.3, 0.4);
    let cube = Cuboid::new(min, max);
    let settings = Settings {
        resolution: 16,
        ..Default::default()
    };
    let mesh = extract(&cube, &BoundingVolume::default(), &settings).unwrap();
    assert_eq!(closed_euler(&mesh), 2);
    for v in &mesh.vertices {
        for i in 0..3 {
            assert!(v[i] >= min[i] - 1e-5 && v[i] <= max[i] + 1e-5);
        }
    }
    let hi = mesh.vertices.iter().map(|v| v.x).fold(f32::MIN, f32::max);
    approx::assert_relative_eq!(hi, 0.5, epsilon = 1e-5);
}

#[test]
fn test_disjoint_union() {
    let a = Sphere::new(Vector3::new(-0.5, 0.0, 0.0), 0.3);
    let b = Sphere::new(Vector3::new(0.5, 0.0, 0.0), 0.3);
    let settings = Settings {
        resolution: 24,
        ..Default::default()
    };
    let both =
        extract(&Union(a, b), &BoundingVolume::default(), &settings).unwrap();

    // Two separate spheres: each one contributes a shell of Euler
    // characteristic 2
    assert_eq!(closed_euler(&both), 4);
    assert!(both.vertices.iter().any(|v| v.x < 0.0));
    assert!(both.vertices.iter().any(|v| v.x > 0.0));
}

#[test]
fn test_offset_bounds() {
    // The surface only partially fits in the volume, so the mesh is open
    let sphere = Sphere::new(Vector3::zeros(), 0.5);
    let bounds =
        BoundingVolume::new(Vector3::new(0.0, -1.0, -1.0), Vector3::repeat(1.0))
            .unwrap();
    let settings = Settings {
        resolution: 16,
        ..Default::default()
    };
    let mesh = extract(&sphere, &bounds, &settings).unwrap();
    assert!(!mesh.is_empty());
    assert!(mesh.vertices.iter().all(|v| bounds.contains(*v)));
    assert!(edge_counts(&mesh).values().any(|n| *n == 1));
}

/// Hashed lattice noise in `[-1, 1]`, positive on the outer layer of the
/// lattice so that every component of the surface is closed
struct LatticeNoise {
    seed: u32,
    resolution: usize,
}

impl Field for LatticeNoise {
    fn eval<T: Value>(&self, p: [T; 3], _features: &mut [T]) -> T {
        let n = self.resolution as i64;
        let scale = (n - 1) as f32 * 0.5;
        let idx = p.map(|c| ((c.value() + 1.0) * scale).round() as i64);
        if idx.iter().any(|&i| i <= 0 || i >= n - 1) {
            return T::constant(1.0);
        }
        let mut h = self.seed.wrapping_mul(0x9E37_79B9);
        for i in idx {
            h = (h ^ i as u32).wrapping_mul(0x85EB_CA6B);
            h ^= h >> 13;
        }
        T::constant(h as f32 / u32::MAX as f32 * 2.0 - 1.0)
    }
}

#[test]
fn test_noise_is_manifold() {
    // Noise hits every ambiguous face configuration; each edge must still
    // be shared by exactly two triangles across cell boundaries
    let settings = Settings {
        resolution: 12,
        ..Default::default()
    };
    for seed in 0..8 {
        let noise = LatticeNoise {
            seed,
            resolution: settings.resolution,
        };
        let mesh =
            extract(&noise, &BoundingVolume::default(), &settings).unwrap();
        assert!(!mesh.is_empty());
        for ((a, b), n) in edge_counts(&mesh) {
            assert_eq!(n, 2, "seed {seed}: edge {a}-{b} used {n} times");
        }
    }
}

//! Cell axes, corners, and edges
//!
//! These are public because the generated marching cubes table is written in
//! terms of them; most users will never need them directly.

/// Lattice axis
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Axis {
    /// First axis, varying fastest in the lattice
    X,
    /// Second axis
    Y,
    /// Third axis, varying slowest in the lattice
    Z,
}

impl Axis {
    /// All axes, in order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Returns the axis as an index in `[0, 3)`
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the bit which marks this axis in a [`Corner`]
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Returns the next axis, cycling X, Y, Z
    ///
    /// `(a, a.next(), a.next().next())` is always right-handed.
    pub fn next(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::Z,
            Axis::Z => Axis::X,
        }
    }
}

/// Cell corner, in the `[0, 8)` range
///
/// Bit `1 << axis` is set if the corner lies at the upper end of that axis:
///
/// ```text
///         6 -------- 7
///        /          /       Z
///       / |        / |      ^  _ Y
///      4----------5  |      | /
///      |  |       |  |      |/
///      |  2-------|--3      ---> X
///      | /        | /
///      |/         |/
///      0----------1
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Corner(u8);

impl Corner {
    /// Builds a new corner
    ///
    /// # Panics
    /// If `i >= 8`
    ///
    /// ```compile_fail
    /// # use isomesh::mesh::types::Corner;
    /// const C: Corner = Corner::new(8);
    /// ```
    pub const fn new(i: u8) -> Self {
        assert!(i < 8);
        Self(i)
    }

    /// Returns the corner as an index, which is also its mask bit position
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterates over all 8 corners
    pub fn iter() -> impl Iterator<Item = Self> {
        (0..8).map(Corner)
    }

    /// Checks whether the corner is at the upper end of the given axis
    pub fn is_upper(self, axis: Axis) -> bool {
        self.0 & axis.bit() != 0
    }

    /// Returns the lattice offset of this corner from the cell's minimum
    pub fn offset(self) -> [usize; 3] {
        Axis::ALL.map(|a| self.is_upper(a) as usize)
    }
}

/// Undirected edge within a cell, in the `[0, 12)` range
///
/// With `t` as the edge's axis, `u = t.next()` and `v = u.next()`, edges are
/// packed as `4 * t + 2 * v + u`, where `u` and `v` are 1 if the edge lies on
/// the upper side of that axis.  This must agree with `build.rs`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Edge(u8);

impl Edge {
    /// Builds a new edge
    ///
    /// # Panics
    /// If `i >= 12`
    ///
    /// ```compile_fail
    /// # use isomesh::mesh::types::Edge;
    /// const E: Edge = Edge::new(12);
    /// ```
    pub const fn new(i: u8) -> Self {
        assert!(i < 12);
        Self(i)
    }

    /// Returns the edge as an index
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the axis along which this edge runs
    pub fn axis(self) -> Axis {
        Axis::ALL[(self.0 / 4) as usize]
    }

    /// Returns the edge's `(lower, upper)` corners along its axis
    pub fn corners(self) -> (Corner, Corner) {
        let t = self.axis();
        let u = t.next();
        let v = u.next();
        let mut start = 0;
        if self.0 & 1 != 0 {
            start |= u.bit();
        }
        if self.0 & 2 != 0 {
            start |= v.bit();
        }
        (Corner(start), Corner(start | t.bit()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_axis_next() {
        assert_eq!(Axis::X.next(), Axis::Y);
        assert_eq!(Axis::Y.next(), Axis::Z);
        assert_eq!(Axis::Z.next(), Axis::X);
        assert_eq!(Axis::Z.bit(), 4);
    }

    #[test]
    fn test_edge_corners() {
        for i in 0..12 {
            let e = Edge::new(i);
            let (start, end) = e.corners();
            let t = e.axis();
            assert!(!start.is_upper(t), "edge {i} starts on the upper side");
            assert!(end.is_upper(t), "edge {i} ends on the lower side");
            assert_eq!((start.0 ^ end.0).count_ones(), 1);
        }
        assert_eq!(Edge::new(0).corners(), (Corner(0), Corner(1)));
        assert_eq!(Edge::new(1).corners(), (Corner(2), Corner(3)));
        assert_eq!(Edge::new(2).corners(), (Corner(4), Corner(5)));
        assert_eq!(Edge::new(5).corners(), (Corner(4), Corner(6)));
        assert_eq!(Edge::new(8).corners(), (Corner(0), Corner(4)));
        assert_eq!(Edge::new(9).corners(), (Corner(1), Corner(5)));
    }

    #[test]
    fn test_corner_offset() {
        assert_eq!(Corner::new(0).offset(), [0, 0, 0]);
        assert_eq!(Corner::new(5).offset(), [1, 0, 1]);
        assert_eq!(Corner::new(7).offset(), [1, 1, 1]);
    }
}

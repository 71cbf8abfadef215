use crate::error::{Error, Result};
use crate::structure::{Coordinate, Positioned};

/// Largest absolute coordinate the grid accepts, in Angstrom. Keeps every
/// fixed-point value and cell index far from `i64` limits.
pub const MAX_COORDINATE: f64 = 1.0e12;

/// Reject non-finite or out-of-range positions
pub(crate) fn check_position(c: &Coordinate, set: &'static str, index: usize) -> Result<()> {
    if !c.is_finite() {
        return Err(Error::NonFiniteCoordinate { set, index });
    }
    if c.x.abs() > MAX_COORDINATE || c.y.abs() > MAX_COORDINATE || c.z.abs() > MAX_COORDINATE {
        return Err(Error::CoordinateOutOfRange { set, index });
    }
    Ok(())
}

/// Axis-aligned extent of a set of atoms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub zmin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub zmax: f64,
}

impl BoundingBox {
    /// Compute the componentwise min/max over `atoms`.
    ///
    /// Fails on an empty slice or on any non-finite coordinate or one beyond
    /// [`MAX_COORDINATE`].
    pub fn new<A: Positioned>(atoms: &[A]) -> Result<Self> {
        Self::for_set(atoms, "i")
    }

    /// As [`BoundingBox::new`], naming `set` in any error
    pub(crate) fn for_set<A: Positioned>(atoms: &[A], set: &'static str) -> Result<Self> {
        let first = atoms.first().ok_or(Error::EmptyAtomSet(set))?.position();
        check_position(&first, set, 0)?;

        let mut bb = BoundingBox {
            xmin: first.x,
            ymin: first.y,
            zmin: first.z,
            xmax: first.x,
            ymax: first.y,
            zmax: first.z,
        };
        for (index, atom) in atoms.iter().enumerate().skip(1) {
            let c = atom.position();
            check_position(&c, set, index)?;
            bb.xmin = bb.xmin.min(c.x);
            bb.ymin = bb.ymin.min(c.y);
            bb.zmin = bb.zmin.min(c.z);
            bb.xmax = bb.xmax.max(c.x);
            bb.ymax = bb.ymax.max(c.y);
            bb.zmax = bb.zmax.max(c.z);
        }
        Ok(bb)
    }

    /// True iff the two boxes intersect on all three axes once each is widened
    /// by `tolerance`. Touching extents count as overlapping.
    pub fn overlaps(&self, other: &BoundingBox, tolerance: f64) -> bool {
        fn axis(amin: f64, amax: f64, bmin: f64, bmax: f64, tol: f64) -> bool {
            amin - tol <= bmax && bmin <= amax + tol
        }
        axis(self.xmin, self.xmax, other.xmin, other.xmax, tolerance)
            && axis(self.ymin, self.ymax, other.ymin, other.ymax, tolerance)
            && axis(self.zmin, self.zmax, other.zmin, other.zmax, tolerance)
    }

    pub fn contains<P: Positioned>(&self, p: &P) -> bool {
        let c = p.position();
        (self.xmin..=self.xmax).contains(&c.x)
            && (self.ymin..=self.ymax).contains(&c.y)
            && (self.zmin..=self.zmax).contains(&c.z)
    }
}

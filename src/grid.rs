//! Geometric hashing for atom contacts.
//!
//! Atoms are bucketed into cubic cells whose edge is at least the cutoff, so
//! any two atoms within the cutoff sit in the same cell or in one of its 26
//! neighbours. Distances are only computed for those pairs; everything else
//! is left out of the result as "too far, unknown".
//!
//! Cell assignment is done on a fixed-point copy of each coordinate
//! (`SCALE` units per Angstrom) so that bucketing never depends on comparing
//! a float against a cell wall.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::bounding_box::{check_position, BoundingBox};
use crate::error::{Error, Result};
use crate::structure::{Coordinate, Positioned};

/// Fixed-point units per Angstrom (cell edges have 0.01 Å resolution)
pub const SCALE: f64 = 100.0;

/// Largest cutoff whose fixed-point cell edge still fits comfortably in `i64`
const MAX_CUTOFF: f64 = 1.0e12;

/// Floor of `v` in fixed-point units
pub fn to_fixed(v: f64) -> i64 {
    (v * SCALE).floor() as i64
}

/// Integer cell coordinate. Kept apart from [`Coordinate`] so the float to
/// integer boundary happens in exactly one place ([`GridCoord::of`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl GridCoord {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Cell owning `c` when cells are `cell_size` fixed-point units wide
    pub fn of(c: Coordinate, cell_size: i64) -> Self {
        Self {
            x: to_fixed(c.x).div_euclid(cell_size),
            y: to_fixed(c.y).div_euclid(cell_size),
            z: to_fixed(c.z).div_euclid(cell_size),
        }
    }

    pub fn offset(self, dx: i64, dy: i64, dz: i64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The 26 cells sharing a face, edge or corner with this one
    pub fn neighbours(self) -> impl Iterator<Item = GridCoord> {
        (-1..=1)
            .flat_map(|dx| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dz| (dx, dy, dz))))
            .filter(|&d| d != (0, 0, 0))
            .map(move |(dx, dy, dz)| self.offset(dx, dy, dz))
    }
}

/// Local indices of the i- and j-atoms falling in one cell
#[derive(Debug, Clone, Default)]
pub struct GridCell {
    pub i_indices: Vec<usize>,
    pub j_indices: Vec<usize>,
}

impl GridCell {
    /// Distances from this cell's i-atoms to `other`'s j-atoms.
    ///
    /// Passing the cell itself as `other` gives the within-cell distances.
    /// Non-crossed queries only keep `j > i`, which drops self pairs and
    /// makes every unordered pair land exactly once over a full sweep.
    fn distances_to<A: Positioned>(
        &self,
        other: &GridCell,
        dist: &mut DistanceMap,
        i_atoms: &[A],
        j_atoms: &[A],
        crossed: bool,
    ) {
        for &i in &self.i_indices {
            let ci = i_atoms[i].position();
            for &j in &other.j_indices {
                if !crossed && j <= i {
                    continue;
                }
                dist.insert(i, j, ci.distance_to(&j_atoms[j].position()));
            }
        }
    }
}

/// Sparse i×j distance matrix.
///
/// Only pairs whose cells are identical or adjacent have an entry. A missing
/// entry means "not computed, farther than one cell", never zero distance.
/// For non-crossed matrices entries are stored with `i < j` and [`get`]
/// answers in both orders.
///
/// [`get`]: DistanceMap::get
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMap {
    n_i: usize,
    n_j: usize,
    crossed: bool,
    distances: BTreeMap<(usize, usize), f64>,
}

impl DistanceMap {
    fn new(n_i: usize, n_j: usize, crossed: bool) -> Self {
        Self {
            n_i,
            n_j,
            crossed,
            distances: BTreeMap::new(),
        }
    }

    fn insert(&mut self, i: usize, j: usize, d: f64) {
        self.distances.insert((i, j), d);
    }

    /// Computed distance between i-atom `i` and j-atom `j`, if any
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if self.crossed || i < j {
            self.distances.get(&(i, j)).copied()
        } else {
            self.distances.get(&(j, i)).copied()
        }
    }

    /// Matrix dimensions (i-atoms, j-atoms)
    pub fn dims(&self) -> (usize, usize) {
        (self.n_i, self.n_j)
    }

    pub fn is_crossed(&self) -> bool {
        self.crossed
    }

    /// Number of computed entries
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// All computed entries in (i, j) order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.distances.iter().map(|(&(i, j), &d)| (i, j, d))
    }

    /// Entries with `distance <= cutoff`
    pub fn within(&self, cutoff: f64) -> Vec<(usize, usize, f64)> {
        self.iter().filter(|&(_, _, d)| d <= cutoff).collect()
    }
}

/// Histogram of cell-neighbour counts: number of non-empty neighbouring
/// cells → how many non-empty cells have that many
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DensityHistogram {
    counts: BTreeMap<usize, usize>,
}

impl DensityHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, neighbours: usize) {
        *self.counts.entry(neighbours).or_insert(0) += 1;
    }

    pub fn get(&self, neighbours: usize) -> usize {
        self.counts.get(&neighbours).copied().unwrap_or(0)
    }

    /// Sum over all buckets, i.e. the number of cells counted
    pub fn total_cells(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn merge(&mut self, other: &DensityHistogram) {
        for (&n, &c) in &other.counts {
            *self.counts.entry(n).or_insert(0) += c;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.counts.iter().map(|(&n, &c)| (n, c))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

struct AtomSets<'a, A> {
    i_atoms: &'a [A],
    j_atoms: &'a [A],
    symmetric: bool,
}

/// Cell grid over an i-atom set and a j-atom set.
///
/// Usage is strictly sequential: [`add_atoms`](SpatialGrid::add_atoms) (or
/// [`add_atoms_with_bounds`](SpatialGrid::add_atoms_with_bounds)) first, then
/// any number of [`dist_matrix`](SpatialGrid::dist_matrix) and
/// [`count_density`](SpatialGrid::count_density) calls. Each call returns
/// its own freshly built result; the grid keeps no shared buffers, so
/// independent grids can run on separate threads.
pub struct SpatialGrid<'a, A> {
    cutoff: f64,
    cell_size: i64,
    sets: Option<AtomSets<'a, A>>,
    cells: HashMap<GridCoord, GridCell>,
    bounds: Option<(GridCoord, GridCoord)>,
    no_overlap: bool,
}

impl<'a, A: Positioned> SpatialGrid<'a, A> {
    /// New empty grid for the given inclusive distance cutoff
    pub fn new(cutoff: f64) -> Result<Self> {
        if !cutoff.is_finite() || cutoff <= 0.0 || cutoff > MAX_CUTOFF {
            return Err(Error::InvalidCutoff(cutoff));
        }
        // Both ends of a pair are floored after a rounded multiply, so their
        // fixed-point gap can reach ceil(cutoff * SCALE) + 1. The cell edge
        // must cover that for any pair within the cutoff to stay adjacent.
        let cell_size = (cutoff * SCALE).ceil() as i64 + 1;
        Ok(Self {
            cutoff,
            cell_size,
            sets: None,
            cells: HashMap::new(),
            bounds: None,
            no_overlap: false,
        })
    }

    /// Add both atom sets, computing their bounding boxes.
    ///
    /// Passing the same slice for `i_atoms` and `j_atoms` makes this a
    /// symmetric grid (one box, non-crossed queries allowed).
    pub fn add_atoms(&mut self, i_atoms: &'a [A], j_atoms: &'a [A]) -> Result<()> {
        self.add_atoms_with_bounds(i_atoms, None, j_atoms, None)
    }

    /// Add both atom sets, reusing precomputed bounding boxes where given.
    ///
    /// A hint must enclose every atom of its set; a stale one is rejected.
    /// For a symmetric grid the i hint (or i box) is used for both sets.
    pub fn add_atoms_with_bounds(
        &mut self,
        i_atoms: &'a [A],
        i_bounds: Option<BoundingBox>,
        j_atoms: &'a [A],
        j_bounds: Option<BoundingBox>,
    ) -> Result<()> {
        self.sets = None;
        self.cells.clear();
        self.bounds = None;
        self.no_overlap = false;

        let symmetric = std::ptr::eq(i_atoms, j_atoms);

        let i_box = resolve_bounds(i_atoms, i_bounds, "i")?;
        let j_box = if symmetric {
            i_box
        } else {
            resolve_bounds(j_atoms, j_bounds, "j")?
        };

        self.sets = Some(AtomSets {
            i_atoms,
            j_atoms,
            symmetric,
        });

        if !i_box.overlaps(&j_box, self.cutoff) {
            debug!(
                "bounding boxes more than {} apart, skipping grid ({} x {} atoms)",
                self.cutoff,
                i_atoms.len(),
                j_atoms.len()
            );
            self.no_overlap = true;
            return Ok(());
        }

        self.bounds = Some(self.int_bounds(&i_box, &j_box));
        self.fill(i_atoms, j_atoms);

        debug!(
            "grid filled: cutoff {}, cell size {} units, {} non-empty cells, bounds {:?}",
            self.cutoff,
            self.cell_size,
            self.cells.len(),
            self.bounds
        );
        Ok(())
    }

    /// Union of both boxes in cell coordinates
    fn int_bounds(&self, i_box: &BoundingBox, j_box: &BoundingBox) -> (GridCoord, GridCoord) {
        let lo = |b: &BoundingBox| GridCoord::of(Coordinate::new(b.xmin, b.ymin, b.zmin), self.cell_size);
        let hi = |b: &BoundingBox| GridCoord::of(Coordinate::new(b.xmax, b.ymax, b.zmax), self.cell_size);
        let (ilo, ihi, jlo, jhi) = (lo(i_box), hi(i_box), lo(j_box), hi(j_box));
        (
            GridCoord::new(ilo.x.min(jlo.x), ilo.y.min(jlo.y), ilo.z.min(jlo.z)),
            GridCoord::new(ihi.x.max(jhi.x), ihi.y.max(jhi.y), ihi.z.max(jhi.z)),
        )
    }

    fn fill(&mut self, i_atoms: &[A], j_atoms: &[A]) {
        for (i, atom) in i_atoms.iter().enumerate() {
            let key = GridCoord::of(atom.position(), self.cell_size);
            self.cells.entry(key).or_default().i_indices.push(i);
        }
        for (j, atom) in j_atoms.iter().enumerate() {
            let key = GridCoord::of(atom.position(), self.cell_size);
            self.cells.entry(key).or_default().j_indices.push(j);
        }
    }

    /// Distances for every i/j pair in the same or adjacent cells.
    ///
    /// `crossed = false` needs a symmetric grid and yields each unordered pair
    /// once with no self pairs. `crossed = true` treats the two sets as
    /// distinct index spaces and yields every (i, j) combination, even when
    /// the sets share atoms.
    pub fn dist_matrix(&self, crossed: bool) -> Result<DistanceMap> {
        let sets = self.sets.as_ref().ok_or(Error::NoAtoms)?;
        if !crossed && !sets.symmetric {
            return Err(Error::NotSymmetric);
        }

        let mut dist = DistanceMap::new(sets.i_atoms.len(), sets.j_atoms.len(), crossed);
        if self.no_overlap {
            return Ok(dist);
        }

        for (&coord, cell) in &self.cells {
            cell.distances_to(cell, &mut dist, sets.i_atoms, sets.j_atoms, crossed);
            for nb in coord.neighbours() {
                if let Some(other) = self.cells.get(&nb) {
                    cell.distances_to(other, &mut dist, sets.i_atoms, sets.j_atoms, crossed);
                }
            }
        }
        Ok(dist)
    }

    /// Pairs within the cutoff (inclusive), as (i, j, distance) in (i, j) order
    pub fn contacts(&self, crossed: bool) -> Result<Vec<(usize, usize, f64)>> {
        Ok(self.dist_matrix(crossed)?.within(self.cutoff))
    }

    /// Accumulate, for each non-empty cell, how many of its 26 neighbours
    /// are non-empty. A grid rejected by the overlap pre-filter has no cells
    /// and adds nothing.
    pub fn count_density(&self, histogram: &mut DensityHistogram) -> Result<()> {
        if self.sets.is_none() {
            return Err(Error::NoAtoms);
        }
        for coord in self.cells.keys() {
            let n = coord.neighbours().filter(|nb| self.cells.contains_key(nb)).count();
            histogram.add(n);
        }
        Ok(())
    }

    pub fn density_histogram(&self) -> Result<DensityHistogram> {
        let mut histogram = DensityHistogram::new();
        self.count_density(&mut histogram)?;
        Ok(histogram)
    }

    /// Whether the bounding-box pre-filter rejected the two sets outright
    pub fn is_no_overlap(&self) -> bool {
        self.no_overlap
    }

    /// True when i- and j-sets are distinct slices
    pub fn is_crossed(&self) -> bool {
        self.sets.as_ref().map_or(false, |s| !s.symmetric)
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Cell edge in fixed-point units
    pub fn cell_size(&self) -> i64 {
        self.cell_size
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Lowest and highest occupied-range cell coordinates
    pub fn bounds(&self) -> Option<(GridCoord, GridCoord)> {
        self.bounds
    }
}

fn resolve_bounds<A: Positioned>(
    atoms: &[A],
    hint: Option<BoundingBox>,
    set: &'static str,
) -> Result<BoundingBox> {
    match hint {
        None => BoundingBox::for_set(atoms, set),
        Some(bb) => {
            if atoms.is_empty() {
                return Err(Error::EmptyAtomSet(set));
            }
            for (index, atom) in atoms.iter().enumerate() {
                let c = atom.position();
                check_position(&c, set, index)?;
                if !bb.contains(&c) {
                    return Err(Error::StaleBoundingBox { set, index });
                }
            }
            Ok(bb)
        }
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// 3D coordinate vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Calculate Euclidean distance to another coordinate
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Coordinate {
    fn from(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// Anything the grid can place in space.
///
/// The grid only ever reads positions; callers keep whatever identity and
/// metadata they need on their own type and map local indices back to it.
pub trait Positioned {
    fn position(&self) -> Coordinate;
}

impl Positioned for Coordinate {
    fn position(&self) -> Coordinate {
        *self
    }
}

impl Positioned for [f64; 3] {
    fn position(&self) -> Coordinate {
        Coordinate::from(*self)
    }
}

impl<T: Positioned + ?Sized> Positioned for &T {
    fn position(&self) -> Coordinate {
        (**self).position()
    }
}

/// Residue identity within a model.
///
/// Residues 52 and 52A are distinct: the insertion code is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueId {
    pub chain: char,
    pub serial: i32,
    pub ins_code: Option<char>,
}

impl ResidueId {
    pub fn new(chain: char, serial: i32, ins_code: Option<char>) -> Self {
        Self {
            chain,
            serial,
            ins_code,
        }
    }
}

/// `A52`, `A52B`, or just `52` for a blank chain
impl fmt::Display for ResidueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chain != ' ' {
            write!(f, "{}", self.chain)?;
        }
        write!(f, "{}", self.serial)?;
        if let Some(ins) = self.ins_code {
            write!(f, "{}", ins)?;
        }
        Ok(())
    }
}

/// A single atom record
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub serial: i32,
    pub name: String,
    pub res_name: String,
    pub res_serial: i32,
    /// Residue insertion code, `None` when blank
    pub ins_code: Option<char>,
    pub chain: char,
    pub coords: Coordinate,
}

impl Atom {
    pub fn residue_id(&self) -> ResidueId {
        ResidueId::new(self.chain, self.res_serial, self.ins_code)
    }
}

impl Positioned for Atom {
    fn position(&self) -> Coordinate {
        self.coords
    }
}

/// One model's worth of atoms, in file order
#[derive(Debug, Clone, Default)]
pub struct Structure {
    pub atoms: Vec<Atom>,
}

impl Structure {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Atoms passing `keep`, ordered by atom serial
    pub fn select<F>(&self, keep: F) -> Vec<&Atom>
    where
        F: Fn(&Atom) -> bool,
    {
        let mut selected: Vec<&Atom> = self.atoms.iter().filter(|a| keep(a)).collect();
        selected.sort_by_key(|a| a.serial);
        selected
    }
}

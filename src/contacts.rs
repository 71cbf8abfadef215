use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::{DensityHistogram, SpatialGrid};
use crate::structure::{Atom, ResidueId, Structure};

const BACKBONE: [&str; 5] = ["N", "CA", "C", "O", "OXT"];

const STANDARD_RESIDUES: [&str; 20] = [
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS", "MET", "PHE",
    "PRO", "SER", "THR", "TRP", "TYR", "VAL",
];

/// Which atoms of each residue take part in a contact definition.
///
/// Only the twenty standard amino acids are selected; waters, ligands and
/// other hetero groups never take part in a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomSelection {
    /// Every heavy atom
    All,
    /// N, CA, C, O and the terminal OXT
    Backbone,
    /// Every heavy atom not in the backbone
    SideChain,
    Ca,
    /// CB, or CA for glycine
    Cb,
    C,
    N,
    O,
}

impl AtomSelection {
    pub fn matches(&self, atom: &Atom) -> bool {
        let name = atom.name.as_str();
        if is_hydrogen(name) || !STANDARD_RESIDUES.contains(&atom.res_name.as_str()) {
            return false;
        }
        match self {
            AtomSelection::All => true,
            AtomSelection::Backbone => BACKBONE.contains(&name),
            AtomSelection::SideChain => !BACKBONE.contains(&name),
            AtomSelection::Ca => name == "CA",
            AtomSelection::Cb => name == "CB" || (atom.res_name == "GLY" && name == "CA"),
            AtomSelection::C => name == "C",
            AtomSelection::N => name == "N",
            AtomSelection::O => name == "O",
        }
    }

    /// Whether some atom can be selected by both `self` and `other`
    pub fn can_share_atoms(&self, other: &AtomSelection) -> bool {
        use AtomSelection::*;
        if self == other {
            return true;
        }
        matches!(
            (self, other),
            (All, _)
                | (_, All)
                | (Backbone, Ca | Cb | C | N | O)
                | (Ca | Cb | C | N | O, Backbone)
                | (SideChain, Cb)
                | (Cb, SideChain)
                | (Ca, Cb)
                | (Cb, Ca)
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            AtomSelection::All => "ALL",
            AtomSelection::Backbone => "BB",
            AtomSelection::SideChain => "SC",
            AtomSelection::Ca => "Ca",
            AtomSelection::Cb => "Cb",
            AtomSelection::C => "C",
            AtomSelection::N => "N",
            AtomSelection::O => "O",
        }
    }
}

impl FromStr for AtomSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ALL" => Ok(AtomSelection::All),
            "BB" => Ok(AtomSelection::Backbone),
            "SC" => Ok(AtomSelection::SideChain),
            "Ca" => Ok(AtomSelection::Ca),
            "Cb" => Ok(AtomSelection::Cb),
            "C" => Ok(AtomSelection::C),
            "N" => Ok(AtomSelection::N),
            "O" => Ok(AtomSelection::O),
            other => Err(Error::InvalidContactType(format!("unknown atom selection '{}'", other))),
        }
    }
}

fn is_hydrogen(name: &str) -> bool {
    name.trim_start_matches(|c: char| c.is_ascii_digit()).starts_with('H')
}

/// One term of a contact type: a single atom set, or an `I/J` crossed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Single(AtomSelection),
    Crossed(AtomSelection, AtomSelection),
}

/// A contact type such as `Ca`, `BB/SC` or `Ca+BB/SC`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactType {
    parts: Vec<ContactKind>,
}

impl ContactType {
    pub fn parts(&self) -> &[ContactKind] {
        &self.parts
    }

    pub fn is_crossed(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, ContactKind::Crossed(..)))
    }

    /// True if a crossed term can pick the same atom on both sides
    pub fn is_overlapping(&self) -> bool {
        self.parts.iter().any(|p| match p {
            ContactKind::Crossed(i, j) => i.can_share_atoms(j),
            ContactKind::Single(_) => false,
        })
    }
}

impl FromStr for ContactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = Vec::new();
        for term in s.split('+') {
            let term = term.trim();
            let kind = match term.split_once('/') {
                None => ContactKind::Single(term.parse()?),
                Some((i, j)) => ContactKind::Crossed(i.trim().parse()?, j.trim().parse()?),
            };
            parts.push(kind);
        }
        Ok(Self { parts })
    }
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .parts
            .iter()
            .map(|p| match p {
                ContactKind::Single(s) => s.as_str().to_string(),
                ContactKind::Crossed(i, j) => format!("{}/{}", i.as_str(), j.as_str()),
            })
            .collect();
        write!(f, "{}", terms.join("+"))
    }
}

/// Atom-atom contact, keyed by atom serials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomContact {
    pub i: i32,
    pub j: i32,
    pub distance: f64,
}

/// Residue-residue contact with the shortest atomic distance behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueContact {
    pub i_chain: char,
    pub i_res: i32,
    pub i_ins: Option<char>,
    pub j_chain: char,
    pub j_res: i32,
    pub j_ins: Option<char>,
    pub distance: f64,
    pub atom_contacts: usize,
}

impl ResidueContact {
    pub fn i_residue(&self) -> ResidueId {
        ResidueId::new(self.i_chain, self.i_res, self.i_ins)
    }

    pub fn j_residue(&self) -> ResidueId {
        ResidueId::new(self.j_chain, self.j_res, self.j_ins)
    }
}

/// Atom edge oriented i-set → j-set
struct AtomEdge<'s> {
    i: &'s Atom,
    j: &'s Atom,
    distance: f64,
}

/// All atomic edges of `contact_type` within `cutoff`, one per unordered
/// atom pair. Crossed terms never pair an atom with itself.
fn atom_edges<'s>(
    structure: &'s Structure,
    contact_type: &ContactType,
    cutoff: f64,
) -> Result<BTreeMap<(i32, i32), AtomEdge<'s>>> {
    let mut edges: BTreeMap<(i32, i32), AtomEdge<'s>> = BTreeMap::new();

    for part in contact_type.parts() {
        match *part {
            ContactKind::Single(sel) => {
                let atoms = structure.select(|a| sel.matches(a));
                if atoms.is_empty() {
                    debug!("no atoms for {}, skipping", sel.as_str());
                    continue;
                }
                let mut grid = SpatialGrid::new(cutoff)?;
                grid.add_atoms(&atoms, &atoms)?;
                for (i, j, distance) in grid.contacts(false)? {
                    let (a, b) = (atoms[i], atoms[j]);
                    edges
                        .entry(pair_key(a.serial, b.serial))
                        .or_insert(AtomEdge { i: a, j: b, distance });
                }
            }
            ContactKind::Crossed(isel, jsel) => {
                let i_atoms = structure.select(|a| isel.matches(a));
                let j_atoms = structure.select(|a| jsel.matches(a));
                if i_atoms.is_empty() || j_atoms.is_empty() {
                    debug!("no atoms for {}/{}, skipping", isel.as_str(), jsel.as_str());
                    continue;
                }
                let mut grid = SpatialGrid::new(cutoff)?;
                grid.add_atoms(&i_atoms, &j_atoms)?;
                if grid.is_no_overlap() {
                    continue;
                }
                for (i, j, distance) in grid.contacts(true)? {
                    let (a, b) = (i_atoms[i], j_atoms[j]);
                    if a.serial == b.serial {
                        continue;
                    }
                    edges
                        .entry(pair_key(a.serial, b.serial))
                        .or_insert(AtomEdge { i: a, j: b, distance });
                }
            }
        }
    }
    Ok(edges)
}

fn pair_key<T: Ord>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Atom contacts of `contact_type` with `distance <= cutoff`, sorted by serials
/// with `i < j`
pub fn atom_contacts(
    structure: &Structure,
    contact_type: &ContactType,
    cutoff: f64,
) -> Result<Vec<AtomContact>> {
    Ok(atom_edges(structure, contact_type, cutoff)?
        .into_iter()
        .map(|((i, j), e)| AtomContact {
            i,
            j,
            distance: e.distance,
        })
        .collect())
}

/// Residue interaction edges for `contact_type`.
///
/// Each edge carries the minimum atomic distance between the two residues and
/// the number of atom contacts it collapses. Contacts inside one residue are
/// dropped. Directed edges point from the residue of the i-set atom.
pub fn residue_contacts(
    structure: &Structure,
    contact_type: &ContactType,
    cutoff: f64,
    directed: bool,
) -> Result<Vec<ResidueContact>> {
    if directed && contact_type.is_overlapping() {
        return Err(Error::InvalidContactType(format!(
            "{} is overlapping, directed residue graphs are unsupported for it",
            contact_type
        )));
    }

    let mut residues: BTreeMap<(ResidueId, ResidueId), (f64, usize)> = BTreeMap::new();
    for edge in atom_edges(structure, contact_type, cutoff)?.values() {
        let ri = edge.i.residue_id();
        let rj = edge.j.residue_id();
        if ri == rj {
            continue;
        }
        let key = if directed { (ri, rj) } else { pair_key(ri, rj) };
        let entry = residues.entry(key).or_insert((f64::INFINITY, 0));
        entry.0 = entry.0.min(edge.distance);
        entry.1 += 1;
    }

    Ok(residues
        .into_iter()
        .map(|((ri, rj), (distance, atom_contacts))| ResidueContact {
            i_chain: ri.chain,
            i_res: ri.serial,
            i_ins: ri.ins_code,
            j_chain: rj.chain,
            j_res: rj.serial,
            j_ins: rj.ins_code,
            distance,
            atom_contacts,
        })
        .collect())
}

/// Cell-neighbour density histogram of the atoms selected by `contact_type`,
/// summed over its terms
pub fn grid_density(
    structure: &Structure,
    contact_type: &ContactType,
    cutoff: f64,
) -> Result<DensityHistogram> {
    let mut histogram = DensityHistogram::new();
    for part in contact_type.parts() {
        let (isel, jsel) = match *part {
            ContactKind::Single(s) => (s, s),
            ContactKind::Crossed(i, j) => (i, j),
        };
        let i_atoms = structure.select(|a| isel.matches(a));
        let j_atoms = match part {
            ContactKind::Single(_) => Vec::new(),
            ContactKind::Crossed(..) => structure.select(|a| jsel.matches(a)),
        };
        if i_atoms.is_empty() || (matches!(part, ContactKind::Crossed(..)) && j_atoms.is_empty()) {
            continue;
        }
        let mut grid = SpatialGrid::new(cutoff)?;
        if j_atoms.is_empty() {
            grid.add_atoms(&i_atoms, &i_atoms)?;
        } else {
            grid.add_atoms(&i_atoms, &j_atoms)?;
        }
        grid.count_density(&mut histogram)?;
    }
    Ok(histogram)
}

fn save_rows_to_csv<T: Serialize>(rows: &[T], output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn load_rows_from_csv<T: DeserializeOwned>(csv_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Save atom contacts (columns `i,j,distance`)
pub fn save_contacts_to_csv(contacts: &[AtomContact], output_path: &Path) -> Result<()> {
    save_rows_to_csv(contacts, output_path)
}

/// Load atom contacts from CSV file
pub fn load_contacts_from_csv(csv_path: &Path) -> Result<Vec<AtomContact>> {
    load_rows_from_csv(csv_path)
}

pub fn save_residue_contacts_to_csv(contacts: &[ResidueContact], output_path: &Path) -> Result<()> {
    save_rows_to_csv(contacts, output_path)
}

pub fn load_residue_contacts_from_csv(csv_path: &Path) -> Result<Vec<ResidueContact>> {
    load_rows_from_csv(csv_path)
}

/// Save a density histogram (columns `neighbours,cells`)
pub fn save_density_to_csv(histogram: &DensityHistogram, output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)?;
    writer.write_record(["neighbours", "cells"])?;
    for (neighbours, cells) in histogram.iter() {
        writer.write_record([neighbours.to_string(), cells.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

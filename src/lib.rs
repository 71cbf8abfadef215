pub mod bounding_box;
pub mod contacts;
pub mod error;
pub mod grid;
pub mod structure;
pub mod trajectory;

#[cfg(feature = "python")]
pub mod python_bindings;

// Re-export commonly used types and traits
pub use bounding_box::{BoundingBox, MAX_COORDINATE};
pub use contacts::{
    atom_contacts, grid_density, load_contacts_from_csv, load_residue_contacts_from_csv,
    residue_contacts, save_contacts_to_csv, save_density_to_csv, save_residue_contacts_to_csv,
    AtomContact, AtomSelection, ContactKind, ContactType, ResidueContact,
};
pub use error::{Error, Result};
pub use grid::{DensityHistogram, DistanceMap, GridCell, GridCoord, SpatialGrid, SCALE};
pub use structure::{Atom, Coordinate, Positioned, ResidueId, Structure};
pub use trajectory::{ContactRun, ModelContacts, ModelData, PdbTrajectory, Trajectory};

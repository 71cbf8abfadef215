use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList, PyTuple};
use std::path::PathBuf;

use crate::contacts::ContactType;
use crate::grid::SpatialGrid;
use crate::trajectory::{ContactRun, PdbTrajectory, Trajectory};

fn value_error(e: crate::error::Error) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string())
}

/// Pairs within `cutoff` as (i, j, distance).
///
/// Without `j_coords` this is a symmetric query over `coords` (i < j, no self
/// pairs); with it, a crossed query from `coords` to `j_coords`.
#[pyfunction]
#[pyo3(signature = (coords, cutoff, j_coords=None))]
fn find_contacts(
    py: Python<'_>,
    coords: Vec<[f64; 3]>,
    cutoff: f64,
    j_coords: Option<Vec<[f64; 3]>>,
) -> PyResult<PyObject> {
    let mut grid = SpatialGrid::new(cutoff).map_err(value_error)?;
    let contacts = match &j_coords {
        None => {
            grid.add_atoms(&coords, &coords).map_err(value_error)?;
            grid.contacts(false)
        }
        Some(j) => {
            grid.add_atoms(&coords, j).map_err(value_error)?;
            grid.contacts(true)
        }
    }
    .map_err(value_error)?;

    let py_contacts = PyList::empty_bound(py);
    for (i, j, d) in contacts {
        let py_tuple = PyTuple::new_bound(py, &[i.into_py(py), j.into_py(py), d.into_py(py)]);
        py_contacts.append(py_tuple)?;
    }
    Ok(py_contacts.into())
}

/// Cell-neighbour density histogram as {neighbour_count: cells}
#[pyfunction]
fn density(py: Python<'_>, coords: Vec<[f64; 3]>, cutoff: f64) -> PyResult<PyObject> {
    let mut grid = SpatialGrid::new(cutoff).map_err(value_error)?;
    grid.add_atoms(&coords, &coords).map_err(value_error)?;
    let histogram = grid.density_histogram().map_err(value_error)?;

    let py_hist = PyDict::new_bound(py);
    for (neighbours, cells) in histogram.iter() {
        py_hist.set_item(neighbours, cells)?;
    }
    Ok(py_hist.into())
}

/// Contacts for every model of a PDB file.
///
/// `contact_list` holds atom serials as strings, or residue labels such as
/// `"A52A"` when `residues` is set.
#[pyfunction]
#[pyo3(signature = (pdb_file, contact_type="Ca", cutoff=8.0, residues=false, max_models=None, output_csv=None))]
fn pdb_contacts(
    py: Python<'_>,
    pdb_file: &str,
    contact_type: &str,
    cutoff: f64,
    residues: bool,
    max_models: Option<usize>,
    output_csv: Option<&str>,
) -> PyResult<PyObject> {
    let contact_type: ContactType = contact_type.parse().map_err(value_error)?;
    let run = ContactRun {
        contact_type,
        cutoff,
        residues,
        directed: false,
    };
    let output_path = output_csv.map(PathBuf::from);

    let trajectory = PdbTrajectory::new(pdb_file);
    let results = trajectory
        .contacts_per_model(&run, max_models, output_path.as_deref())
        .map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("Failed to compute contacts: {}", e))
        })?;

    let py_results = PyList::empty_bound(py);
    for result in results {
        let py_dict = PyDict::new_bound(py);

        let py_contact_list = PyList::empty_bound(py);
        for (i, j) in &result.contact_list {
            let py_tuple = PyTuple::new_bound(py, &[i.as_str().into_py(py), j.as_str().into_py(py)]);
            py_contact_list.append(py_tuple)?;
        }

        py_dict.set_item("model", result.model)?;
        py_dict.set_item("atoms", result.atoms)?;
        py_dict.set_item("contacts", result.contacts)?;
        py_dict.set_item("contact_list", py_contact_list)?;

        py_results.append(py_dict)?;
    }

    Ok(py_results.into())
}

/// Python module definition
#[pymodule]
fn contact_grid_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(find_contacts, m)?)?;
    m.add_function(wrap_pyfunction!(density, m)?)?;
    m.add_function(wrap_pyfunction!(pdb_contacts, m)?)?;
    m.add("__doc__", "Grid-based atom contact detection with Python bindings")?;
    Ok(())
}

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::contacts::{atom_contacts, grid_density, residue_contacts, save_density_to_csv, ContactType};
use crate::error::{Error, Result};
use crate::grid::DensityHistogram;
use crate::structure::{Atom, Coordinate, ResidueId, Structure};

/// Model number → atoms of that model
pub type ModelData = BTreeMap<i32, Structure>;

/// Contacts found in a single model
#[derive(Debug, Clone)]
pub struct ModelContacts {
    pub model: i32,
    pub atoms: usize,
    pub contacts: usize,
    /// Atom serial pairs, or residue labels such as `A52A` when run at
    /// residue level
    pub contact_list: Vec<(String, String)>,
}

/// Options for a per-model contact run
#[derive(Debug, Clone)]
pub struct ContactRun {
    pub contact_type: ContactType,
    pub cutoff: f64,
    /// Collapse atom contacts to residue contacts
    pub residues: bool,
    /// Orient residue contacts from the i-set residue (crossed types only)
    pub directed: bool,
}

/// Trait for reading multi-model coordinate files and running the grid over
/// every model
pub trait Trajectory {
    /// Read all atom records, grouped by model
    ///
    /// # Arguments
    /// * `max_models` - Maximum number of models to read (None for all models)
    fn read_pdb(&self, max_models: Option<usize>) -> Result<ModelData>;

    /// Compute contacts for every model.
    ///
    /// Models are independent, so each gets its own grid and they are
    /// processed in parallel.
    ///
    /// # Arguments
    /// * `run` - Contact type, cutoff and output level
    /// * `max_models` - Maximum number of models to process (None for all models)
    /// * `output_csv_path` - Optional path to save one summary row per model
    fn contacts_per_model(
        &self,
        run: &ContactRun,
        max_models: Option<usize>,
        output_csv_path: Option<&Path>,
    ) -> Result<Vec<ModelContacts>>;

    /// Sum the cell-neighbour density histograms of every model
    fn density_per_model(
        &self,
        contact_type: &ContactType,
        cutoff: f64,
        max_models: Option<usize>,
        output_csv_path: Option<&Path>,
    ) -> Result<DensityHistogram>;
}

/// Implementation of Trajectory trait for PDB files
pub struct PdbTrajectory {
    file_path: String,
}

impl PdbTrajectory {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// Default CSV path next to the input: `<stem><suffix>`
    pub fn default_output(&self, suffix: &str) -> std::path::PathBuf {
        let path = Path::new(&self.file_path);
        let base_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("structure");
        path.parent()
            .unwrap_or(Path::new("."))
            .join(format!("{}{}", base_name, suffix))
    }
}

impl Trajectory for PdbTrajectory {
    fn read_pdb(&self, max_models: Option<usize>) -> Result<ModelData> {
        let file = File::open(&self.file_path)?;
        let reader = BufReader::new(file);
        let mut models = ModelData::new();

        let mut current_model: Option<i32> = None;
        let mut current_atoms: Vec<Atom> = Vec::new();
        // atoms already holding an alternate location in the current model
        let mut alt_seen: HashSet<(ResidueId, String)> = HashSet::new();
        let mut model_found = false;

        for (line_no, line_result) in reader.lines().enumerate() {
            let line = line_result?;

            if line.starts_with("MODEL") {
                model_found = true;
                if let Some(model_num) = current_model.take() {
                    models.insert(model_num, Structure::new(std::mem::take(&mut current_atoms)));
                }
                if max_models.map_or(false, |max| models.len() >= max) {
                    break;
                }
                alt_seen.clear();
                let number = line
                    .split_whitespace()
                    .nth(1)
                    .ok_or_else(|| Error::Parse(format!("invalid MODEL line {}: {}", line_no + 1, line)))?;
                current_model = Some(number.parse::<i32>().map_err(|e| {
                    Error::Parse(format!("failed to parse model number on line {}: {}", line_no + 1, e))
                })?);
                current_atoms.clear();
            } else if line.starts_with("ATOM") || line.starts_with("HETATM") {
                match parse_atom_line(&line) {
                    Some((atom, None)) => current_atoms.push(atom),
                    Some((atom, Some(alt_loc))) => {
                        // first alternate location of each atom wins
                        if alt_seen.insert((atom.residue_id(), atom.name.clone())) {
                            current_atoms.push(atom);
                        } else {
                            debug!("skipping alternate location {} on line {}", alt_loc, line_no + 1);
                        }
                    }
                    None => warn!("skipping malformed atom record on line {}", line_no + 1),
                }
            } else if line.starts_with("ENDMDL") {
                if let Some(model_num) = current_model.take() {
                    models.insert(model_num, Structure::new(std::mem::take(&mut current_atoms)));
                }
                alt_seen.clear();
                if max_models.map_or(false, |max| models.len() >= max) {
                    break;
                }
            }
        }

        // Trailing model without ENDMDL
        if let Some(model_num) = current_model {
            if max_models.map_or(true, |max| models.len() < max) {
                models.insert(model_num, Structure::new(current_atoms));
            }
        } else if !model_found && !current_atoms.is_empty() {
            // Single-model files without MODEL/ENDMDL markers
            models.insert(1, Structure::new(current_atoms));
        }

        models.retain(|_, s| !s.is_empty());
        Ok(models)
    }

    fn contacts_per_model(
        &self,
        run: &ContactRun,
        max_models: Option<usize>,
        output_csv_path: Option<&Path>,
    ) -> Result<Vec<ModelContacts>> {
        let models = self.read_pdb(max_models)?;
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let pb = progress_bar(models.len(), "models");
        let mut results = models
            .par_iter()
            .map(|(&model, structure)| -> Result<ModelContacts> {
                let contact_list: Vec<(String, String)> = if run.residues {
                    residue_contacts(structure, &run.contact_type, run.cutoff, run.directed)?
                        .into_iter()
                        .map(|c| (c.i_residue().to_string(), c.j_residue().to_string()))
                        .collect()
                } else {
                    atom_contacts(structure, &run.contact_type, run.cutoff)?
                        .into_iter()
                        .map(|c| (c.i.to_string(), c.j.to_string()))
                        .collect()
                };
                pb.inc(1);
                Ok(ModelContacts {
                    model,
                    atoms: structure.len(),
                    contacts: contact_list.len(),
                    contact_list,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        pb.finish_with_message("Processing complete");
        results.sort_by_key(|r| r.model);

        info!(
            "{}: {} models, {} contacts ({} at {} Å)",
            self.file_path,
            results.len(),
            results.iter().map(|r| r.contacts).sum::<usize>(),
            run.contact_type,
            run.cutoff
        );

        if let Some(output_path) = output_csv_path {
            save_model_contacts_to_csv(&results, output_path)?;
        }
        Ok(results)
    }

    fn density_per_model(
        &self,
        contact_type: &ContactType,
        cutoff: f64,
        max_models: Option<usize>,
        output_csv_path: Option<&Path>,
    ) -> Result<DensityHistogram> {
        let models = self.read_pdb(max_models)?;

        let pb = progress_bar(models.len(), "models");
        let histograms = models
            .par_iter()
            .map(|(_, structure)| {
                let h = grid_density(structure, contact_type, cutoff);
                pb.inc(1);
                h
            })
            .collect::<Result<Vec<_>>>()?;
        pb.finish_with_message("Density complete");

        let mut total = DensityHistogram::new();
        for h in &histograms {
            total.merge(h);
        }
        info!("{}: {} cells over {} models", self.file_path, total.total_cells(), histograms.len());

        if let Some(output_path) = output_csv_path {
            save_density_to_csv(&total, output_path)?;
        }
        Ok(total)
    }
}

fn progress_bar(len: usize, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{wide_bar:.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) | ETA: {{eta}}",
        unit
    );
    pb.set_style(
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Non-blank character in a single fixed column
fn column_char(line: &str, col: usize) -> Option<char> {
    line.get(col..col + 1)
        .and_then(|s| s.chars().next())
        .filter(|c| *c != ' ')
}

/// Parse one fixed-column ATOM/HETATM record, returning the atom and its
/// alternate location indicator
fn parse_atom_line(line: &str) -> Option<(Atom, Option<char>)> {
    if line.len() < 54 {
        return None;
    }
    let serial = line.get(6..11)?.trim().parse::<i32>().ok()?;
    let name = line.get(12..16)?.trim().to_string();
    let alt_loc = column_char(line, 16);
    let res_name = line.get(17..20)?.trim().to_string();
    let chain = line.get(21..22)?.chars().next().unwrap_or(' ');
    let res_serial = line.get(22..26)?.trim().parse::<i32>().ok()?;
    let ins_code = column_char(line, 26);
    let x = line.get(30..38)?.trim().parse::<f64>().ok()?;
    let y = line.get(38..46)?.trim().parse::<f64>().ok()?;
    let z = line.get(46..54)?.trim().parse::<f64>().ok()?;
    if name.is_empty() {
        return None;
    }
    let atom = Atom {
        serial,
        name,
        res_name,
        res_serial,
        ins_code,
        chain,
        coords: Coordinate::new(x, y, z),
    };
    Some((atom, alt_loc))
}

/// Save per-model contact summaries to CSV file
pub fn save_model_contacts_to_csv(results: &[ModelContacts], output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)?;
    writer.write_record(["model", "atoms", "contacts", "contact_list"])?;
    for result in results {
        let contact_list = result
            .contact_list
            .iter()
            .map(|(i, j)| format!("{}:{}", i, j))
            .collect::<Vec<_>>()
            .join(";");
        writer.write_record([
            result.model.to_string(),
            result.atoms.to_string(),
            result.contacts.to_string(),
            contact_list,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[allow(clippy::too_many_arguments)]
    fn record(
        serial: i32,
        name: &str,
        alt_loc: char,
        res: &str,
        chain: char,
        res_serial: i32,
        ins_code: char,
        x: f64,
        y: f64,
        z: f64,
    ) -> String {
        format!(
            "ATOM  {:>5} {:<4}{}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}  1.00  0.00           C",
            serial, name, alt_loc, res, chain, res_serial, ins_code, x, y, z
        )
    }

    fn atom_line(serial: i32, name: &str, res: &str, res_serial: i32, x: f64, y: f64, z: f64) -> String {
        record(serial, name, ' ', res, 'A', res_serial, ' ', x, y, z)
    }

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(i, j)| (i.to_string(), j.to_string())).collect()
    }

    fn write_two_models() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for (model, spacing) in [(1, 3.8), (2, 6.0)] {
            writeln!(file, "MODEL        {}", model).unwrap();
            for k in 0..4 {
                let x = k as f64 * spacing;
                writeln!(file, "{}", atom_line(2 * k + 1, "N", "ALA", k + 1, x - 1.2, 0.5, 0.0)).unwrap();
                writeln!(file, "{}", atom_line(2 * k + 2, "CA", "ALA", k + 1, x, 0.0, 0.0)).unwrap();
            }
            writeln!(file, "ENDMDL").unwrap();
        }
        writeln!(file, "END").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_atom_line() {
        let line = atom_line(12, "CA", "GLY", 3, 1.5, -2.25, 10.0);
        let (atom, alt_loc) = parse_atom_line(&line).unwrap();
        assert_eq!(alt_loc, None);
        assert_eq!(atom.ins_code, None);
        assert_eq!(atom.serial, 12);
        assert_eq!(atom.name, "CA");
        assert_eq!(atom.res_name, "GLY");
        assert_eq!(atom.res_serial, 3);
        assert_eq!(atom.chain, 'A');
        assert_eq!(atom.coords, Coordinate::new(1.5, -2.25, 10.0));
        assert!(parse_atom_line("ATOM      1  CA").is_none());

        let line = record(5, "CB", 'B', "SER", 'H', 52, 'A', 0.0, 1.0, 2.0);
        let (atom, alt_loc) = parse_atom_line(&line).unwrap();
        assert_eq!(alt_loc, Some('B'));
        assert_eq!(atom.res_name, "SER");
        assert_eq!(atom.chain, 'H');
        assert_eq!(atom.residue_id(), ResidueId::new('H', 52, Some('A')));
        assert_eq!(atom.coords, Coordinate::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn test_keeps_first_alternate_location() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", record(1, "CA", ' ', "ALA", 'A', 1, ' ', 0.0, 0.0, 0.0)).unwrap();
        writeln!(file, "{}", record(2, "CA", 'A', "SER", 'A', 2, ' ', 3.8, 0.0, 0.0)).unwrap();
        writeln!(file, "{}", record(3, "OG", 'A', "SER", 'A', 2, ' ', 4.5, 1.0, 0.0)).unwrap();
        writeln!(file, "{}", record(4, "CA", 'B', "SER", 'A', 2, ' ', 3.9, 0.2, 0.0)).unwrap();
        writeln!(file, "{}", record(5, "OG", 'B', "SER", 'A', 2, ' ', 4.4, -1.0, 0.0)).unwrap();
        // only a B conformer for this atom
        writeln!(file, "{}", record(6, "CB", 'B', "SER", 'A', 2, ' ', 3.8, -1.5, 0.0)).unwrap();
        file.flush().unwrap();

        let models = PdbTrajectory::new(file.path()).read_pdb(None).unwrap();
        let serials: Vec<i32> = models[&1].atoms.iter().map(|a| a.serial).collect();
        assert_eq!(serials, vec![1, 2, 3, 6]);
    }

    #[test]
    fn test_insertion_codes_split_residues() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", record(1, "CA", ' ', "ALA", 'A', 52, ' ', 0.0, 0.0, 0.0)).unwrap();
        writeln!(file, "{}", record(2, "CA", ' ', "GLY", 'A', 52, 'A', 3.8, 0.0, 0.0)).unwrap();
        writeln!(file, "{}", record(3, "CA", ' ', "LYS", 'A', 53, ' ', 7.6, 0.0, 0.0)).unwrap();
        file.flush().unwrap();

        let run = ContactRun {
            contact_type: "Ca".parse().unwrap(),
            cutoff: 4.0,
            residues: true,
            directed: false,
        };
        let results = PdbTrajectory::new(file.path()).contacts_per_model(&run, None, None).unwrap();
        assert_eq!(results[0].contact_list, pairs(&[("A52", "A52A"), ("A52A", "A53")]));
    }

    #[test]
    fn test_residue_contacts_keep_chains() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", record(1, "CA", ' ', "ALA", 'A', 10, ' ', 0.0, 0.0, 0.0)).unwrap();
        writeln!(file, "{}", record(2, "CA", ' ', "ALA", 'A', 11, ' ', 3.8, 0.0, 0.0)).unwrap();
        writeln!(file, "{}", record(3, "CA", ' ', "VAL", 'B', 10, ' ', 0.0, 3.5, 0.0)).unwrap();
        file.flush().unwrap();

        let out = tempfile::NamedTempFile::new().unwrap();
        let run = ContactRun {
            contact_type: "Ca".parse().unwrap(),
            cutoff: 4.0,
            residues: true,
            directed: false,
        };
        let results = PdbTrajectory::new(file.path())
            .contacts_per_model(&run, None, Some(out.path()))
            .unwrap();
        assert_eq!(results[0].contact_list, pairs(&[("A10", "A11"), ("A10", "B10")]));

        let mut reader = csv::Reader::from_path(out.path()).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[3], "A10:A11;A10:B10");
    }

    #[test]
    fn test_read_models() {
        let file = write_two_models();
        let traj = PdbTrajectory::new(file.path());
        let models = traj.read_pdb(None).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[&1].len(), 8);
        assert_eq!(traj.read_pdb(Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_single_model_without_markers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", atom_line(1, "CA", "ALA", 1, 0.0, 0.0, 0.0)).unwrap();
        writeln!(file, "{}", atom_line(2, "CA", "ALA", 2, 3.8, 0.0, 0.0)).unwrap();
        file.flush().unwrap();
        let models = PdbTrajectory::new(file.path()).read_pdb(None).unwrap();
        assert_eq!(models.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_contacts_per_model() {
        let file = write_two_models();
        let traj = PdbTrajectory::new(file.path());
        let out = tempfile::NamedTempFile::new().unwrap();
        let run = ContactRun {
            contact_type: "Ca".parse().unwrap(),
            cutoff: 4.0,
            residues: false,
            directed: false,
        };
        let results = traj.contacts_per_model(&run, None, Some(out.path())).unwrap();
        assert_eq!(results.len(), 2);
        // compact model: 3 consecutive CA pairs, stretched model: none
        assert_eq!(results[0].contacts, 3);
        assert_eq!(results[0].contact_list[0], ("2".to_string(), "4".to_string()));
        assert_eq!(results[1].contacts, 0);

        let mut reader = csv::Reader::from_path(out.path()).unwrap();
        assert_eq!(reader.records().count(), 2);
    }

    #[test]
    fn test_residue_level_contacts() {
        let file = write_two_models();
        let traj = PdbTrajectory::new(file.path());
        let run = ContactRun {
            contact_type: "ALL".parse().unwrap(),
            cutoff: 4.0,
            residues: true,
            directed: false,
        };
        let results = traj.contacts_per_model(&run, Some(1), None).unwrap();
        assert_eq!(results[0].contact_list, pairs(&[("A1", "A2"), ("A2", "A3"), ("A3", "A4")]));
    }

    #[test]
    fn test_density_per_model() {
        let file = write_two_models();
        let traj = PdbTrajectory::new(file.path());
        let ct: ContactType = "Ca".parse().unwrap();
        let h = traj.density_per_model(&ct, 4.0, None, None).unwrap();
        // CAs land in 3 cells in the compact model and 4 in the stretched one
        assert_eq!(h.total_cells(), 7);
    }
}

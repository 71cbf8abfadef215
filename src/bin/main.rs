use clap::{Parser, Subcommand};
use contact_grid_rs::{ContactRun, ContactType, PdbTrajectory, Trajectory};
use std::path::PathBuf;

/// Command-line tool for grid-based contact detection in protein structures
#[derive(Parser)]
#[command(name = "contact-grid")]
#[command(about = "Find atom and residue contacts in PDB files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute contacts for every model of a PDB file
    Contacts {
        /// Path to the PDB file
        #[arg(short, long)]
        pdb: PathBuf,

        /// Contact type, e.g. Ca, BB, ALL, BB/SC or Ca+BB/SC
        #[arg(short = 't', long, default_value = "Ca")]
        contact_type: String,

        /// Distance cutoff in Angstrom (inclusive)
        #[arg(short, long, default_value_t = 8.0)]
        cutoff: f64,

        /// Report residue contacts instead of atom contacts
        #[arg(long)]
        residues: bool,

        /// Orient residue contacts i-set → j-set (crossed contact types)
        #[arg(long, requires = "residues")]
        directed: bool,

        /// Maximum number of models to process (default: all models)
        #[arg(long)]
        max_models: Option<usize>,

        /// Output CSV path (default: auto-generated from the PDB path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Histogram of non-empty neighbour cells per non-empty grid cell
    Density {
        /// Path to the PDB file
        #[arg(short, long)]
        pdb: PathBuf,

        /// Contact type selecting the atoms to grid
        #[arg(short = 't', long, default_value = "Ca")]
        contact_type: String,

        /// Cell size / cutoff in Angstrom
        #[arg(short, long, default_value_t = 8.0)]
        cutoff: f64,

        /// Maximum number of models to process (default: all models)
        #[arg(long)]
        max_models: Option<usize>,

        /// Output CSV path (default: auto-generated from the PDB path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_contact_type(s: &str) -> ContactType {
    match s.parse() {
        Ok(ct) => ct,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Contacts {
            pdb,
            contact_type,
            cutoff,
            residues,
            directed,
            max_models,
            output,
        } => {
            println!("Reading structure: {:?}", pdb);
            println!("Contact type: {}", contact_type);
            println!("Cutoff distance: {}", cutoff);

            let run = ContactRun {
                contact_type: parse_contact_type(&contact_type),
                cutoff,
                residues,
                directed,
            };
            let traj = PdbTrajectory::new(&pdb);
            let output_path = output.unwrap_or_else(|| traj.default_output("_contacts.csv"));

            match traj.contacts_per_model(&run, max_models, Some(output_path.as_path())) {
                Ok(results) => {
                    let total: usize = results.iter().map(|r| r.contacts).sum();
                    println!("✅ Processed {} models, {} contacts", results.len(), total);
                    println!("📄 Results saved to: {:?}", output_path);
                }
                Err(e) => {
                    eprintln!("❌ Error computing contacts: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Density {
            pdb,
            contact_type,
            cutoff,
            max_models,
            output,
        } => {
            println!("Reading structure: {:?}", pdb);
            println!("Contact type: {}", contact_type);
            println!("Cell size: {}", cutoff);

            let ct = parse_contact_type(&contact_type);
            let traj = PdbTrajectory::new(&pdb);
            let output_path = output.unwrap_or_else(|| traj.default_output("_density.csv"));

            match traj.density_per_model(&ct, cutoff, max_models, Some(output_path.as_path())) {
                Ok(histogram) => {
                    println!("✅ Counted {} non-empty cells", histogram.total_cells());
                    for (neighbours, cells) in histogram.iter() {
                        println!("  {:>2} neighbours: {}", neighbours, cells);
                    }
                    println!("📄 Histogram saved to: {:?}", output_path);
                }
                Err(e) => {
                    eprintln!("❌ Error computing density: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

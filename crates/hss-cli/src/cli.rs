use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Expand a study document into its candidate case variants
    Expand {
        /// Path to the study document (YAML or JSON)
        study: PathBuf,
        /// Print the variants as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Run the full pipeline against the built-in simulated engine
    Run {
        /// Path to the study document (YAML or JSON)
        study: PathBuf,
        /// Directory for exports, merged dataset, boundary table and manifest
        #[arg(short, long, default_value = "hss-out")]
        output: PathBuf,
    },
    /// Merge raw result exports into one dataset CSV
    Aggregate {
        /// Path to the study document (YAML or JSON)
        study: PathBuf,
        /// Raw export CSVs to merge, in precedence order
        #[arg(required = true)]
        exports: Vec<PathBuf>,
        /// Merged dataset output path
        #[arg(short, long, default_value = "merged.csv")]
        output: PathBuf,
    },
    /// Compute impedance-locus boundary polygons from raw exports
    Boundary {
        /// Path to the study document (YAML or JSON)
        study: PathBuf,
        /// Raw export CSVs to read impedance sweeps from
        #[arg(required = true)]
        exports: Vec<PathBuf>,
        /// Boundary table output path
        #[arg(short, long, default_value = "boundaries.csv")]
        output: PathBuf,
    },
}

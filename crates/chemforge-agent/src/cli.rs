//! Command-line surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chemforge")]
#[command(version)]
#[command(about = "Text-to-molecule generation and rigid docking", long_about = None)]
pub struct Cli {
    /// Config file (overrides CHEMFORGE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Do not record this run in the history file
    #[arg(long, global = true)]
    pub no_history: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate candidate molecules from a text prompt
    Generate {
        prompt: String,

        /// Backend to query; repeat for several. Defaults to the configured default backend.
        #[arg(long = "model", short = 'm')]
        models: Vec<String>,

        /// Experiment the run belongs to
        #[arg(long)]
        experiment: Option<String>,
    },

    /// Dock a ligand into a preset target's active site
    Dock {
        smiles: String,
        target: String,

        /// Include the ligand and target PDB blocks in the output
        #[arg(long)]
        with_structures: bool,
    },

    /// Validate a SMILES string and print its descriptors
    Validate { smiles: String },

    /// Write an SDF block with 3D coordinates for a SMILES string
    Structure {
        smiles: String,

        /// Output file; stdout when absent
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// List generation backends and their availability
    Models,

    /// List docking targets
    Targets,

    /// Show recent generation runs
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_with_models() {
        let cli = Cli::try_parse_from([
            "chemforge", "generate", "an aspirin analogue", "-m", "primary-model", "--model", "molt5",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate { prompt, models, experiment } => {
                assert_eq!(prompt, "an aspirin analogue");
                assert_eq!(models, vec!["primary-model", "molt5"]);
                assert!(experiment.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_dock_with_globals() {
        let cli = Cli::try_parse_from([
            "chemforge", "dock", "CCO", "covid_protease", "--no-history", "--config", "alt.toml",
        ])
        .unwrap();
        assert!(cli.no_history);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Commands::Dock { ref target, .. } if target == "covid_protease"));
    }

    #[test]
    fn test_dock_requires_target() {
        assert!(Cli::try_parse_from(["chemforge", "dock", "CCO"]).is_err());
    }
}

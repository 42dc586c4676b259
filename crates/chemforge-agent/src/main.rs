//! Chemforge — text-to-molecule generation and rigid docking.
//! Entry point for the command-line binary.

mod cli;
mod commands;
mod config;
mod history;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chemforge_common::{ChemforgeError, ErrorKind};
use chemforge_models::ModelError;
use chemforge_molecules::export::ExportError;
use chemforge_molecules::{DockingError, MoleculeError};

/// Classify an error for the process exit code by the first typed error in its chain.
fn error_kind(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<MoleculeError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<DockingError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<ExportError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<ModelError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<ChemforgeError>() {
            return e.kind();
        }
    }
    ErrorKind::Internal
}

async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    info!(
        default_backend = %config.generation.default_backend,
        backends = config.backends.len(),
        network = config.network.enabled,
        "Configuration loaded"
    );

    let app = commands::App::build(&config, !cli.no_history)?;
    commands::run(&app, cli.command).await
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chemforge=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Chemforge {}", env!("CARGO_PKG_VERSION"));

    let cli = cli::Cli::parse();
    if let Err(e) = run(cli).await {
        let kind = error_kind(&e);
        eprintln!("Error: {:#}", e);
        std::process::exit(kind.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_kind_walks_the_chain() {
        let invalid = chemforge_molecules::parse_smiles("((").unwrap_err();
        let err = Err::<(), _>(invalid).context("validating input").unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Validation);

        let unknown = anyhow::Error::from(DockingError::UnknownTarget("x".into()));
        assert_eq!(error_kind(&unknown).exit_code(), 3);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(error_kind(&plain), ErrorKind::Internal);
    }
}

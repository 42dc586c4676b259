//! Subcommand implementations and the wiring from config to engines.

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use chemforge_common::SandboxClient;
use chemforge_models::registry::{backend_description, offline_backend};
use chemforge_models::{
    normalize_backend_name, BackendRegistry, GenerationOrchestrator, HttpModelBackend, OrchestratorConfig,
    DEFAULT_BACKEND,
};
use chemforge_molecules::docking::DockingResult;
use chemforge_molecules::pdb::StructureFetcher;
use chemforge_molecules::{
    structure_3d, validate_smiles, ConformerEmbedder, DockingEngine, TargetStructureProvider, TargetTable,
};

use crate::cli::Commands;
use crate::config::Config;
use crate::history::{DockingRecord, GenerationRecord, JsonlRunStore, MemoryRunStore, RunStore};

/// Backends that always exist, offline unless configured with a service URL.
const CANONICAL_BACKENDS: &[&str] = &[DEFAULT_BACKEND, "molt5", "chemberta"];

/// Everything a command needs, built once from the config.
pub struct App {
    pub orchestrator: GenerationOrchestrator,
    pub docking: DockingEngine,
    pub embedder: ConformerEmbedder,
    pub store: Arc<dyn RunStore>,
}

impl App {
    pub fn build(config: &Config, record_history: bool) -> anyhow::Result<Self> {
        let mut client = SandboxClient::new()?;
        for domain in &config.network.allowed_domains {
            client.allow_domain(domain);
        }

        let registry = Arc::new(build_registry(config, &client)?);
        let orchestrator = GenerationOrchestrator::new(
            registry,
            OrchestratorConfig {
                default_backend: normalize_backend_name(&config.generation.default_backend),
                call_timeout_ms: config.generation.call_timeout_ms,
            },
        );

        let embedder = ConformerEmbedder::new(config.embedding.clone());
        let provider = build_target_provider(config, client)?;
        let docking = DockingEngine::new(config.docking.engine.clone(), embedder.clone(), provider);

        let store: Arc<dyn RunStore> = if record_history && config.history.enabled {
            let store = JsonlRunStore::new(&config.history.path);
            info!(path = %store.path().display(), "Recording run history");
            Arc::new(store)
        } else {
            Arc::new(MemoryRunStore::new())
        };

        Ok(Self { orchestrator, docking, embedder, store })
    }
}

pub fn build_registry(config: &Config, client: &SandboxClient) -> anyhow::Result<BackendRegistry> {
    let mut names: Vec<String> = CANONICAL_BACKENDS.iter().map(|s| s.to_string()).collect();
    for name in config.backends.keys() {
        let canonical = normalize_backend_name(name);
        if !names.contains(&canonical) {
            names.push(canonical);
        }
    }

    let mut builder = BackendRegistry::builder()
        .health_timeout(Duration::from_millis(config.generation.health_timeout_ms));

    for name in names {
        let endpoint = config.endpoint(&name);

        match endpoint.and_then(|e| e.base_url.as_deref()) {
            Some(base_url) => {
                let description = endpoint
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| backend_description(&name).to_string());
                info!(backend = %name, base_url, "Registering model service");
                let backend = HttpModelBackend::new(name.as_str(), base_url, client.clone())
                    .with_api_key(config.api_key(&name))
                    .with_description(description);
                builder = builder.register(Arc::new(backend));
            }
            None if CANONICAL_BACKENDS.contains(&name.as_str()) => {
                builder = builder.register(Arc::new(offline_backend(&name)));
            }
            None => warn!(backend = %name, "Backend configured without base_url; skipping"),
        }
    }

    Ok(builder.build())
}

fn build_target_provider(config: &Config, client: SandboxClient) -> anyhow::Result<TargetStructureProvider> {
    let table = match &config.docking.targets_file {
        Some(path) => TargetTable::from_yaml_file(path)
            .with_context(|| format!("loading docking targets from {}", path.display()))?,
        None => TargetTable::default(),
    };

    if !config.network.enabled {
        info!("Network disabled; docking uses placeholder target structures");
        return Ok(TargetStructureProvider::new(table, None, config.docking.fetch_policy));
    }

    let mut fetcher = StructureFetcher::new(client)
        .with_base_url(&config.network.rcsb_base_url)
        .with_timeout(Duration::from_secs(config.network.fetch_timeout_secs));
    if let Some(dir) = &config.network.cache_dir {
        fetcher = fetcher.with_cache_dir(dir);
    }
    Ok(TargetStructureProvider::new(table, Some(fetcher), config.docking.fetch_policy))
}

/// Docking output without the bulky structure blocks.
#[derive(Debug, Serialize)]
struct DockingSummary<'a> {
    target_id: &'a str,
    target_name: &'a str,
    pdb_id: &'a str,
    ligand_smiles: &'a str,
    affinity: f64,
    score_breakdown: &'a chemforge_molecules::scoring::ScoreBreakdown,
    structure_source: chemforge_molecules::StructureSource,
    num_atoms: usize,
    centroid: [f64; 3],
}

impl<'a> DockingSummary<'a> {
    fn new(result: &'a DockingResult) -> Self {
        Self {
            target_id: &result.target_id,
            target_name: &result.target_name,
            pdb_id: &result.pdb_id,
            ligand_smiles: &result.ligand_smiles,
            affinity: result.affinity,
            score_breakdown: &result.score_breakdown,
            structure_source: result.structure_source,
            num_atoms: result.conformer.len(),
            centroid: result.conformer.centroid(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Generate { prompt, models, experiment } => {
            let candidates = app.orchestrator.generate(&prompt, &models).await;
            print_json(&candidates)?;
            let record = GenerationRecord::new(&prompt, candidates, experiment);
            if let Err(e) = app.store.save_generation(record).await {
                warn!(error = %e, "Could not record generation run");
            }
        }

        Commands::Dock { smiles, target, with_structures } => {
            let result = app.docking.dock(&smiles, &target).await?;
            if with_structures {
                print_json(&result)?;
            } else {
                print_json(&DockingSummary::new(&result))?;
            }
            if let Err(e) = app.store.save_docking(DockingRecord::new(&result)).await {
                warn!(error = %e, "Could not record docking run");
            }
        }

        Commands::Validate { smiles } => {
            let report = validate_smiles(&smiles);
            print_json(&report)?;
            if !report.valid {
                // Typed error for the exit code.
                chemforge_molecules::parse_smiles(&smiles)?;
            }
        }

        Commands::Structure { smiles, out } => {
            let embedder = app.embedder.clone();
            let block = tokio::task::spawn_blocking(move || structure_3d(&smiles, &embedder)).await??;
            if !block.is_3d {
                warn!(smiles = %block.smiles, "No 3D geometry found; wrote a 2D layout");
            }
            match out {
                Some(path) => {
                    tokio::fs::write(&path, &block.sdf)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "Structure written");
                }
                None => print!("{}", block.sdf),
            }
        }

        Commands::Models => {
            print_json(&app.orchestrator.registry().catalogue().await)?;
        }

        Commands::Targets => {
            let targets: Vec<_> = app.docking.provider().table().iter().collect();
            print_json(&targets)?;
        }

        Commands::History { limit } => {
            print_json(&app.store.recent_generations(limit).await?)?;
        }
    }
    Ok(())
}

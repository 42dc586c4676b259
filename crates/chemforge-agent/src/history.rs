//! Run history: generation and docking records handed to a store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use chemforge_models::GenerationCandidate;
use chemforge_molecules::docking::DockingResult;
use chemforge_molecules::scoring::ScoreBreakdown;
use chemforge_molecules::StructureSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub prompt: String,
    pub results: Vec<GenerationCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationRecord {
    pub fn new(prompt: &str, results: Vec<GenerationCandidate>, experiment_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            results,
            experiment_id,
            created_at: Utc::now(),
        }
    }
}

/// Summary of one docking run. Coordinates and PDB blocks are not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingRecord {
    pub id: Uuid,
    pub ligand_smiles: String,
    pub target_id: String,
    pub pdb_id: String,
    pub affinity: f64,
    pub score_breakdown: ScoreBreakdown,
    pub structure_source: StructureSource,
    pub created_at: DateTime<Utc>,
}

impl DockingRecord {
    pub fn new(result: &DockingResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            ligand_smiles: result.ligand_smiles.clone(),
            target_id: result.target_id.clone(),
            pdb_id: result.pdb_id.clone(),
            affinity: result.affinity,
            score_breakdown: result.score_breakdown,
            structure_source: result.structure_source,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunRecord {
    Generation(GenerationRecord),
    Docking(DockingRecord),
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save_generation(&self, record: GenerationRecord) -> anyhow::Result<()>;
    async fn save_docking(&self, record: DockingRecord) -> anyhow::Result<()>;
    /// Most recent generation records, newest first.
    async fn recent_generations(&self, limit: usize) -> anyhow::Result<Vec<GenerationRecord>>;
}

fn newest_generations(records: impl DoubleEndedIterator<Item = RunRecord>, limit: usize) -> Vec<GenerationRecord> {
    records
        .rev()
        .filter_map(|r| match r {
            RunRecord::Generation(g) => Some(g),
            RunRecord::Docking(_) => None,
        })
        .take(limit)
        .collect()
}

#[derive(Default)]
pub struct MemoryRunStore {
    records: Mutex<Vec<RunRecord>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save_generation(&self, record: GenerationRecord) -> anyhow::Result<()> {
        self.records.lock().await.push(RunRecord::Generation(record));
        Ok(())
    }

    async fn save_docking(&self, record: DockingRecord) -> anyhow::Result<()> {
        self.records.lock().await.push(RunRecord::Docking(record));
        Ok(())
    }

    async fn recent_generations(&self, limit: usize) -> anyhow::Result<Vec<GenerationRecord>> {
        let records = self.records.lock().await.clone();
        Ok(newest_generations(records.into_iter(), limit))
    }
}

/// Append-only JSON lines file, one `RunRecord` per line.
pub struct JsonlRunStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlRunStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: RunRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_all(&self) -> anyhow::Result<Vec<RunRecord>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %self.path.display(), line = n + 1, error = %e, "Skipping unreadable history line"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl RunStore for JsonlRunStore {
    async fn save_generation(&self, record: GenerationRecord) -> anyhow::Result<()> {
        self.append(RunRecord::Generation(record)).await
    }

    async fn save_docking(&self, record: DockingRecord) -> anyhow::Result<()> {
        self.append(RunRecord::Docking(record)).await
    }

    async fn recent_generations(&self, limit: usize) -> anyhow::Result<Vec<GenerationRecord>> {
        Ok(newest_generations(self.read_all().await?.into_iter(), limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn generation(prompt: &str) -> GenerationRecord {
        GenerationRecord::new(prompt, vec![GenerationCandidate::placeholder("your_model")], None)
    }

    fn docking() -> DockingRecord {
        DockingRecord {
            id: Uuid::new_v4(),
            ligand_smiles: "CCO".into(),
            target_id: "covid_protease".into(),
            pdb_id: "6LU7".into(),
            affinity: -6.0,
            score_breakdown: ScoreBreakdown::split(-6.0),
            structure_source: StructureSource::Placeholder,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_newest_first() {
        let store = MemoryRunStore::new();
        store.save_generation(generation("first")).await.unwrap();
        store.save_docking(docking()).await.unwrap();
        store.save_generation(generation("second")).await.unwrap();
        store.save_generation(generation("third")).await.unwrap();

        let recent = store.recent_generations(2).await.unwrap();
        let prompts: Vec<&str> = recent.iter().map(|r| r.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn test_jsonl_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlRunStore::new(dir.path().join("nested").join("runs.jsonl"));

        assert!(store.recent_generations(10).await.unwrap().is_empty());

        let first = GenerationRecord::new("aspirin", vec![], Some("exp-1".into()));
        store.save_generation(first.clone()).await.unwrap();
        store.save_docking(docking()).await.unwrap();
        store.save_generation(generation("caffeine")).await.unwrap();

        let recent = store.recent_generations(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].prompt, "caffeine");
        assert_eq!(recent[1], first);

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().contains("\"kind\":\"docking\""));
    }

    #[tokio::test]
    async fn test_jsonl_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let store = JsonlRunStore::new(&path);
        store.save_generation(generation("ok")).await.unwrap();
        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push_str("{not json\n");
        std::fs::write(&path, text).unwrap();

        let recent = store.recent_generations(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].prompt, "ok");
    }
}

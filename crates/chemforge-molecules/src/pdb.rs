//! PDB structure fetching with an on-disk cache.

use anyhow::{bail, Context, Result};
use chemforge_common::SandboxClient;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

pub const RCSB_DOWNLOAD_URL: &str = "https://files.rcsb.org/download";

/// Structure text plus where it came from.
#[derive(Debug, Clone)]
pub struct FetchedStructure {
    pub pdb_id: String,
    pub text: String,
    pub from_cache: bool,
}

/// Client for fetching protein structures from the RCSB download service.
#[derive(Debug, Clone)]
pub struct StructureFetcher {
    client: SandboxClient,
    base_url: String,
    cache_dir: Option<PathBuf>,
    timeout: Duration,
}

impl StructureFetcher {
    /// A fetcher against the public RCSB endpoint with a 5 s timeout and no cache.
    pub fn new(client: SandboxClient) -> Self {
        Self {
            client,
            base_url: RCSB_DOWNLOAD_URL.to_string(),
            cache_dir: None,
            timeout: Duration::from_secs(5),
        }
    }

    /// Point at a mirror. Its host is added to the client's allowlist.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.client.allow_url_host(base_url);
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache_dir<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.as_ref().to_path_buf());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch a PDB entry by its four-character ID.
    pub async fn fetch_pdb(&self, pdb_id: &str) -> Result<FetchedStructure> {
        let pdb_id = pdb_id.trim().to_uppercase();
        if pdb_id.len() != 4 || !pdb_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            bail!("'{}' is not a PDB ID", pdb_id);
        }

        let file_name = format!("{}.pdb", pdb_id.to_lowercase());
        if let Some(dir) = &self.cache_dir {
            let path = dir.join(&file_name);
            if path.exists() {
                debug!("PDB {} found in cache", pdb_id);
                let text = fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading cached {}", path.display()))?;
                return Ok(FetchedStructure { pdb_id, text, from_cache: true });
            }
        }

        info!("Fetching PDB {} from {}", pdb_id, self.base_url);
        let url = format!("{}/{}.pdb", self.base_url, pdb_id);
        let request = self.client.get(&url)?;
        let text = tokio::time::timeout(self.timeout, async {
            let response = request.send().await?.error_for_status()?;
            response.text().await
        })
        .await
        .with_context(|| format!("PDB {} download timed out after {:?}", pdb_id, self.timeout))?
        .with_context(|| format!("PDB {} download failed", pdb_id))?;

        if text.trim().is_empty() {
            bail!("PDB {} download returned an empty body", pdb_id);
        }

        if let Some(dir) = &self.cache_dir {
            if let Err(e) = write_cache(dir, &file_name, &text).await {
                warn!(pdb_id = %pdb_id, dir = %dir.display(), error = %e, "Could not cache PDB structure");
            }
        }

        Ok(FetchedStructure { pdb_id, text, from_cache: false })
    }
}

/// Write through a temporary sibling and rename, so readers never see a
/// partial file.
async fn write_cache(dir: &Path, file_name: &str, text: &str) -> std::io::Result<()> {
    fs::create_dir_all(dir).await?;
    let tmp = dir.join(format!(".{}.{:016x}.tmp", file_name, rand::random::<u64>()));
    fs::write(&tmp, text).await?;
    if let Err(e) = fs::rename(&tmp, dir.join(file_name)).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

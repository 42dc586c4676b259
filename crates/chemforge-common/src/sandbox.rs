use reqwest::{Client, ClientBuilder, Url};
use std::collections::HashSet;
use std::time::Duration;
use crate::error::ChemforgeError;

/// Hosts every Chemforge deployment needs: the RCSB download endpoint and
/// locally hosted model services.
const DEFAULT_ALLOWLIST: &[&str] = &[
    "files.rcsb.org", // PDB reference structures
    "localhost",      // Local model services
    "127.0.0.1",      // Localhost alt
];

/// An HTTP client that only allows requests to approved domains.
/// Model backends and the structure fetcher both go through it.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a new SandboxClient with the default allowlist and a 30 s
    /// overall request timeout. Callers set tighter per-request timeouts.
    pub fn new() -> Result<Self, ChemforgeError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ChemforgeError> {
        let allowlist = DEFAULT_ALLOWLIST.iter().map(|d| d.to_string()).collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| ChemforgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.trim().to_lowercase());
    }

    /// Appends the host of `url` to the allowlist. Returns false if the URL has no host.
    pub fn allow_url_host(&mut self, url: &str) -> bool {
        match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
            Some(host) => {
                self.allow_domain(&host);
                true
            }
            None => false,
        }
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// GET request builder, refused for hosts outside the allowlist.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, ChemforgeError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    /// POST request builder, refused for hosts outside the allowlist.
    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, ChemforgeError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    fn check(&self, url: &str) -> Result<(), ChemforgeError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(ChemforgeError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist() {
        let client = SandboxClient::new().unwrap();
        assert!(client.is_allowed("https://files.rcsb.org/download/6LU7.pdb"));
        assert!(client.is_allowed("http://localhost:8001/generate"));
        assert!(!client.is_allowed("https://example.com/"));
        assert!(!client.is_allowed("not a url"));
    }

    #[test]
    fn test_disallowed_host_is_refused() {
        let client = SandboxClient::new().unwrap();
        let err = client.get("https://evil.example.org/x").unwrap_err();
        assert!(matches!(err, ChemforgeError::Security(_)));
    }

    #[test]
    fn test_allow_url_host_and_subdomains() {
        let mut client = SandboxClient::new().unwrap();
        assert!(client.allow_url_host("https://models.example.org:8443/v1"));
        assert!(client.is_allowed("https://models.example.org/generate"));
        assert!(client.is_allowed("https://eu.models.example.org/generate"));
        assert!(!client.allow_url_host("nonsense"));
    }
}

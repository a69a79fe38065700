//! External proxy-provisioning collaborator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

/// One raw proxy candidate as delivered by the provisioning service.
pub type Candidate = (String, String, u16);

/// Supplier of raw proxy candidates. Best-effort by contract: an empty batch
/// is a valid answer, and the pool treats fetch errors the same way.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetch a fresh batch of `(scheme, host, port)` candidates.
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>>;
}

/// Fetches a newline-separated proxy list over HTTP.
pub struct HttpProxySource {
    source_url: String,
    client: Client,
}

impl HttpProxySource {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ProxySource for HttpProxySource {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>> {
        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .with_context(|| format!("requesting proxy list from {}", self.source_url))?;
        let content = response.text().await.context("reading proxy list body")?;
        Ok(parse_candidate_list(&content))
    }
}

/// Parse the text content into candidates, one per line. Accepts
/// `scheme://host:port` and bare `host:port` (assumed http); comments and
/// malformed lines are skipped.
pub(crate) fn parse_candidate_list(content: &str) -> Vec<Candidate> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            if line.contains("://") {
                let parsed = Url::parse(line).ok()?;
                let host = parsed.host_str()?.to_string();
                let port = parsed.port()?;
                Some((parsed.scheme().to_string(), host, port))
            } else {
                let (host, port) = line.rsplit_once(':')?;
                let port = port.parse().ok()?;
                Some(("http".to_string(), host.to_string(), port))
            }
        })
        .collect()
}

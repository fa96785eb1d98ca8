//! Remote transport: fetching tabular documents over HTTP.
//!
//! The orchestrator and update gate depend only on the `RemoteSource` trait,
//! so tests substitute an in-memory source for the network.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::SyncError;

/// Build the URL of one tabular document within the remote store.
pub fn document_url(base_url: &str, dataset_ref: &str) -> String {
    format!("{}?gid={}&single=true&output=tsv", base_url, dataset_ref)
}

/// A source of raw tabular document text.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the document at `url` as text.
    async fn fetch_url(&self, url: &str) -> Result<String, SyncError>;
}

/// Capability query: is the network reachable?
///
/// Consulted once before a sync batch; a mid-batch connectivity loss is
/// handled through the per-carrier failure path instead.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity stand-in for hosts without a reachability signal.
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// HTTP-backed remote source.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a client with the given connect and read timeout.
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch_url(&self, url: &str) -> Result<String, SyncError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// IPFS storage backend via the Kubo HTTP API.
///
/// IPFS is content-addressed: the locator for a payload is its CID,
/// assigned by the node at add time. Pinning marks content as protected
/// from garbage collection; unpinned content may be collected.
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;

use crate::config::StorageConfig;
use crate::error::{NotaryError, Result};

/// Trait for the content-storage boundary.
///
/// Payloads handed to a backend may already be sealed; backends never
/// interpret content.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Plain HTTP gateway URL for a locator.
    fn gateway_url(&self, locator: &str) -> String;

    /// Upload bytes. Returns the content-derived locator.
    async fn put(&self, data: &[u8]) -> Result<String>;

    /// Download bytes by locator.
    async fn get(&self, locator: &str) -> Result<Vec<u8>>;

    /// Protect content from garbage collection.
    async fn pin(&self, locator: &str) -> Result<()>;

    /// Mark content as eligible for garbage collection.
    /// Ok even if the locator was never pinned.
    async fn unpin(&self, locator: &str) -> Result<()>;

    /// Size in bytes of the stored content.
    async fn stat(&self, locator: &str) -> Result<u64>;

    /// Best-effort liveness probe. Returns false on transient
    /// unavailability instead of raising.
    async fn exists(&self, locator: &str) -> bool;
}

/// IPFS storage backend.
pub struct IpfsBackend {
    client: Client,
    config: StorageConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IpfsAddResponse {
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IpfsStatResponse {
    size: u64,
}

impl IpfsBackend {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/v0/{path}", self.config.api_url)
    }
}

#[async_trait]
impl StorageBackend for IpfsBackend {
    fn name(&self) -> &str {
        "IPFS"
    }

    fn gateway_url(&self, locator: &str) -> String {
        format!("{}{locator}", self.config.gateway_base)
    }

    /// Add data to IPFS, pinned, CIDv1. The returned CID is the locator.
    async fn put(&self, data: &[u8]) -> Result<String> {
        let part = multipart::Part::bytes(data.to_vec()).file_name("data");
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(self.api("add"))
            .query(&[("pin", "true"), ("cid-version", "1")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| NotaryError::Storage(format!("IPFS add failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotaryError::Storage(format!("IPFS add failed: {body}")));
        }

        let add_resp: IpfsAddResponse = resp
            .json()
            .await
            .map_err(|e| NotaryError::Serialization(format!("IPFS add response: {e}")))?;

        Ok(add_resp.hash)
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .post(self.api("cat"))
            .query(&[("arg", locator)])
            .send()
            .await
            .map_err(|e| NotaryError::Storage(format!("IPFS cat failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotaryError::Storage(format!("IPFS cat failed: {body}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| NotaryError::Storage(format!("IPFS cat body: {e}")))?;

        Ok(bytes.to_vec())
    }

    async fn pin(&self, locator: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.api("pin/add"))
            .query(&[("arg", locator)])
            .send()
            .await
            .map_err(|e| NotaryError::Storage(format!("IPFS pin failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotaryError::Storage(format!("IPFS pin failed: {body}")));
        }
        Ok(())
    }

    /// Unpin — don't error if not pinned.
    async fn unpin(&self, locator: &str) -> Result<()> {
        let _ = self
            .client
            .post(self.api("pin/rm"))
            .query(&[("arg", locator)])
            .send()
            .await;
        Ok(())
    }

    async fn stat(&self, locator: &str) -> Result<u64> {
        let resp = self
            .client
            .post(self.api("block/stat"))
            .query(&[("arg", locator)])
            .send()
            .await
            .map_err(|e| NotaryError::Storage(format!("IPFS stat failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotaryError::Storage(format!("IPFS stat failed: {body}")));
        }

        let stat: IpfsStatResponse = resp
            .json()
            .await
            .map_err(|e| NotaryError::Serialization(format!("IPFS stat response: {e}")))?;

        Ok(stat.size)
    }

    async fn exists(&self, locator: &str) -> bool {
        match self
            .client
            .post(self.api("block/stat"))
            .query(&[("arg", locator)])
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

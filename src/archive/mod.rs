/// Archive adapter: durable off-chain persistence for recorded exchanges.
///
/// Wraps a content-addressed storage backend and optionally seals
/// payloads before upload. Also renders the shareable verification
/// certificate that accompanies every anchored record and archives it
/// the same way (always unsealed, since certificates are meant to be
/// handed to third parties).
pub mod ipfs;
pub mod seal;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NotaryError, Result};
use ipfs::StorageBackend;
use seal::SealKey;

/// Concurrent uploads in flight during a batch archive.
const UPLOAD_FANOUT: usize = 5;

/// Outcome of archiving one payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveResult {
    /// Content locator (CID).
    pub locator: String,
    /// Gateway retrieval URL.
    pub url: String,
    /// Uploaded size in bytes (after sealing, if sealed).
    pub size: u64,
    /// Upload timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Shareable verification certificate for an anchored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub record_id: String,
    pub tx_hash: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub status: u16,
    pub network: String,
}

/// Archive adapter over an injected storage backend.
///
/// Constructed explicitly and passed in wherever archival is needed;
/// multiple adapters with different configurations can coexist and tests
/// substitute fake backends.
pub struct ArchiveAdapter {
    backend: Arc<dyn StorageBackend>,
    seal_key: Option<SealKey>,
}

impl ArchiveAdapter {
    pub fn new(backend: Arc<dyn StorageBackend>, seal_key: Option<SealKey>) -> Self {
        Self { backend, seal_key }
    }

    /// Upload a payload, sealing it first when `encrypt` is set.
    ///
    /// Requesting encryption without a configured sealing key is a fatal
    /// configuration error, never a silent fallback to plaintext.
    pub async fn archive(&self, payload: &[u8], encrypt: bool) -> Result<ArchiveResult> {
        let data = if encrypt {
            let key = self.seal_key.as_ref().ok_or_else(|| {
                NotaryError::Configuration(
                    "archive encryption requested but no sealing key is configured".into(),
                )
            })?;
            seal::seal(key, payload)?
        } else {
            payload.to_vec()
        };

        let size = data.len() as u64;
        let locator = self.backend.put(&data).await?;
        debug!(locator = %locator, size, sealed = encrypt, "Payload archived");

        Ok(ArchiveResult {
            url: self.backend.gateway_url(&locator),
            locator,
            size,
            timestamp: Utc::now(),
        })
    }

    /// Retrieve a payload, opening it when `decrypt` is set.
    ///
    /// Content without the sealed-format marker comes back unchanged.
    pub async fn retrieve(&self, locator: &str, decrypt: bool) -> Result<Vec<u8>> {
        let data = self.backend.get(locator).await?;
        if !decrypt {
            return Ok(data);
        }
        let key = self.seal_key.as_ref().ok_or_else(|| {
            NotaryError::Configuration(
                "archive decryption requested but no sealing key is configured".into(),
            )
        })?;
        seal::open(key, &data)
    }

    /// Upload many payloads with a bounded concurrency window.
    ///
    /// Locators come back in input order.
    pub async fn archive_batch(
        &self,
        payloads: Vec<Vec<u8>>,
        encrypt: bool,
    ) -> Result<Vec<ArchiveResult>> {
        stream::iter(payloads)
            .map(|payload| async move { self.archive(&payload, encrypt).await })
            .buffered(UPLOAD_FANOUT)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    /// Render the verification certificate and archive it unsealed.
    pub async fn archive_certificate(&self, cert: &Certificate) -> Result<ArchiveResult> {
        let doc = serde_json::to_vec_pretty(cert)
            .map_err(|e| NotaryError::Serialization(e.to_string()))?;
        self.archive(&doc, false).await
    }

    /// Protect archived content from garbage collection.
    pub async fn pin(&self, locator: &str) -> Result<()> {
        self.backend.pin(locator).await
    }

    /// Release archived content for garbage collection.
    pub async fn unpin(&self, locator: &str) -> Result<()> {
        self.backend.unpin(locator).await
    }

    /// Best-effort liveness probe; false on transient unavailability.
    pub async fn exists(&self, locator: &str) -> bool {
        self.backend.exists(locator).await
    }

    /// Gateway URL for a locator.
    pub fn gateway_url(&self, locator: &str) -> String {
        self.backend.gateway_url(locator)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::NotaryError;

    /// In-memory backend: locator is the BLAKE3 hex of the content.
    #[derive(Default)]
    pub struct MemoryBackend {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
        pub pinned: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageBackend for MemoryBackend {
        fn name(&self) -> &str {
            "memory"
        }

        fn gateway_url(&self, locator: &str) -> String {
            format!("memory://{locator}")
        }

        async fn put(&self, data: &[u8]) -> Result<String> {
            let locator = blake3::hash(data).to_hex().to_string();
            self.objects
                .lock()
                .unwrap()
                .insert(locator.clone(), data.to_vec());
            Ok(locator)
        }

        async fn get(&self, locator: &str) -> Result<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(locator)
                .cloned()
                .ok_or_else(|| NotaryError::Storage(format!("not found: {locator}")))
        }

        async fn pin(&self, locator: &str) -> Result<()> {
            self.pinned.lock().unwrap().push(locator.to_string());
            Ok(())
        }

        async fn unpin(&self, locator: &str) -> Result<()> {
            self.pinned.lock().unwrap().retain(|l| l != locator);
            Ok(())
        }

        async fn stat(&self, locator: &str) -> Result<u64> {
            Ok(self.get(locator).await?.len() as u64)
        }

        async fn exists(&self, locator: &str) -> bool {
            self.objects.lock().unwrap().contains_key(locator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryBackend;
    use super::*;

    fn adapter(seal_key: Option<SealKey>) -> (ArchiveAdapter, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::default());
        (
            ArchiveAdapter::new(backend.clone(), seal_key),
            backend,
        )
    }

    #[tokio::test]
    async fn test_archive_retrieve_roundtrip_plain() {
        let (adapter, _) = adapter(None);
        let result = adapter.archive(b"payload", false).await.unwrap();
        assert_eq!(result.size, 7);
        assert_eq!(result.url, format!("memory://{}", result.locator));

        let back = adapter.retrieve(&result.locator, false).await.unwrap();
        assert_eq!(back, b"payload");
    }

    #[tokio::test]
    async fn test_archive_retrieve_roundtrip_sealed() {
        let (adapter, backend) = adapter(Some(SealKey::derive(b"secret")));
        let result = adapter.archive(b"payload", true).await.unwrap();

        // Stored bytes are sealed, not plaintext.
        let stored = backend.objects.lock().unwrap()[&result.locator].clone();
        assert!(seal::is_sealed(&stored));

        let back = adapter.retrieve(&result.locator, true).await.unwrap();
        assert_eq!(back, b"payload");
    }

    #[tokio::test]
    async fn test_encrypt_without_key_is_configuration_error() {
        let (adapter, _) = adapter(None);
        let err = adapter.archive(b"payload", true).await.unwrap_err();
        assert!(matches!(err, NotaryError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_retrieve_decrypt_passes_through_unsealed() {
        let (adapter, _) = adapter(Some(SealKey::derive(b"secret")));
        let result = adapter.archive(b"plain payload", false).await.unwrap();
        let back = adapter.retrieve(&result.locator, true).await.unwrap();
        assert_eq!(back, b"plain payload");
    }

    #[tokio::test]
    async fn test_archive_batch_preserves_order() {
        let (adapter, _) = adapter(None);
        let payloads: Vec<Vec<u8>> = (0u8..12).map(|i| vec![i; 16]).collect();
        let results = adapter.archive_batch(payloads.clone(), false).await.unwrap();

        assert_eq!(results.len(), 12);
        for (payload, result) in payloads.iter().zip(&results) {
            let back = adapter.retrieve(&result.locator, false).await.unwrap();
            assert_eq!(&back, payload);
        }
    }

    #[tokio::test]
    async fn test_certificate_is_archived_unsealed() {
        let (adapter, backend) = adapter(Some(SealKey::derive(b"secret")));
        let cert = Certificate {
            record_id: "42".into(),
            tx_hash: "0xabc".into(),
            timestamp: Utc::now(),
            url: "https://api.example.com/users".into(),
            status: 200,
            network: "sepolia".into(),
        };

        let result = adapter.archive_certificate(&cert).await.unwrap();
        let stored = backend.objects.lock().unwrap()[&result.locator].clone();
        assert!(!seal::is_sealed(&stored));

        let parsed: Certificate = serde_json::from_slice(&stored).unwrap();
        assert_eq!(parsed.record_id, "42");
    }

    #[tokio::test]
    async fn test_pin_unpin_and_exists() {
        let (adapter, backend) = adapter(None);
        let result = adapter.archive(b"pinned", false).await.unwrap();

        adapter.pin(&result.locator).await.unwrap();
        assert!(backend.pinned.lock().unwrap().contains(&result.locator));

        adapter.unpin(&result.locator).await.unwrap();
        assert!(backend.pinned.lock().unwrap().is_empty());

        assert!(adapter.exists(&result.locator).await);
        assert!(!adapter.exists("missing").await);
    }
}

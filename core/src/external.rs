//! Interfaces to external collaborators
//!
//! The blob store (pinning gateway) and the chain service are remote systems.
//! The core only depends on the traits below; HTTP implementations live in
//! the client crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::hash_hex;
use crate::error::{CoreError, Result};

/// Opaque blob store locator
pub type ContentId = String;

/// Chain transaction hash
pub type TransactionId = String;

/// Metadata attached to a pinned blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMetadata {
    /// Display name of the pin
    pub name: String,

    /// Original file name
    pub file_name: String,

    /// Free-form key/value pairs
    pub keyvalues: BTreeMap<String, String>,
}

/// A time-limited retrieval URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    /// The URL itself
    pub url: String,

    /// When it stops working
    pub expires_at: DateTime<Utc>,
}

/// Expiry of something valid for `ttl_secs` from `now`
///
/// Lifetimes that do not fit a timestamp are rejected as invalid input.
pub fn expiry_after(now: DateTime<Utc>, ttl_secs: u64) -> Result<DateTime<Utc>> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| CoreError::InvalidInput(format!("lifetime of {}s is out of range", ttl_secs)))
}

/// Content-addressed blob storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their locator
    async fn pin(&self, bytes: Vec<u8>, metadata: PinMetadata) -> Result<ContentId>;

    /// Retrieve bytes by locator
    async fn fetch(&self, content_id: &str) -> Result<Vec<u8>>;

    /// Create a time-limited retrieval URL
    async fn signed_url(&self, content_id: &str, ttl_secs: u64) -> Result<SignedUrl>;
}

/// Smart-contract access
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainService: Send + Sync {
    /// Read-only call of a module function
    async fn view(&self, function: &str, args: Vec<serde_json::Value>) -> Result<Vec<serde_json::Value>>;

    /// State-changing call, signed by `signer`
    async fn submit(
        &self,
        function: &str,
        args: Vec<serde_json::Value>,
        signer: &str,
    ) -> Result<TransactionId>;
}

/// In-process blob store keyed by SHA-256 of the content
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<ContentId, (Vec<u8>, PinMetadata)>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> Result<usize> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| CoreError::Internal(format!("Failed to read blob store: {}", e)))?;
        Ok(blobs.len())
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Overwrite a stored blob in place
    pub fn replace(&self, content_id: &str, bytes: Vec<u8>) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| CoreError::Internal(format!("Failed to write blob store: {}", e)))?;
        match blobs.get_mut(content_id) {
            Some(entry) => {
                entry.0 = bytes;
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("blob {}", content_id))),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn pin(&self, bytes: Vec<u8>, metadata: PinMetadata) -> Result<ContentId> {
        let content_id = format!("mem-{}", hash_hex(&bytes));
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| CoreError::Internal(format!("Failed to write blob store: {}", e)))?;
        blobs.insert(content_id.clone(), (bytes, metadata));
        Ok(content_id)
    }

    async fn fetch(&self, content_id: &str) -> Result<Vec<u8>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| CoreError::Internal(format!("Failed to read blob store: {}", e)))?;
        blobs
            .get(content_id)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| CoreError::NotFound(format!("blob {}", content_id)))
    }

    async fn signed_url(&self, content_id: &str, ttl_secs: u64) -> Result<SignedUrl> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| CoreError::Internal(format!("Failed to read blob store: {}", e)))?;
        if !blobs.contains_key(content_id) {
            return Err(CoreError::NotFound(format!("blob {}", content_id)));
        }
        Ok(SignedUrl {
            url: format!("memory://{}", content_id),
            expires_at: expiry_after(Utc::now(), ttl_secs)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        let cid = store.pin(b"rows".to_vec(), PinMetadata::default()).await.unwrap();

        assert!(cid.starts_with("mem-"));
        assert_eq!(store.fetch(&cid).await.unwrap(), b"rows");
        assert_eq!(store.len().unwrap(), 1);

        // Identical bytes share a locator
        let again = store.pin(b"rows".to_vec(), PinMetadata::default()).await.unwrap();
        assert_eq!(cid, again);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_missing_blob() {
        let store = MemoryBlobStore::new();
        assert!(matches!(store.fetch("mem-nope").await, Err(CoreError::NotFound(_))));
        assert!(matches!(store.signed_url("mem-nope", 60).await, Err(CoreError::NotFound(_))));
        assert!(store.replace("mem-nope", vec![]).is_err());
    }

    #[test]
    fn test_expiry_after_rejects_huge_lifetimes() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 60).unwrap(), now + chrono::Duration::seconds(60));
        assert!(matches!(expiry_after(now, u64::MAX), Err(CoreError::InvalidInput(_))));
        assert!(matches!(expiry_after(now, i64::MAX as u64), Err(CoreError::InvalidInput(_))));
        assert!(expiry_after(DateTime::<Utc>::MAX_UTC, 1).is_err());
    }

    #[tokio::test]
    async fn test_memory_store_huge_ttl_is_invalid_input() {
        let store = MemoryBlobStore::new();
        let cid = store.pin(b"rows".to_vec(), PinMetadata::default()).await.unwrap();
        let err = store.signed_url(&cid, u64::MAX).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_memory_store_signed_url() {
        let store = MemoryBlobStore::new();
        let cid = store.pin(b"rows".to_vec(), PinMetadata::default()).await.unwrap();
        let signed = store.signed_url(&cid, 3600).await.unwrap();

        assert!(signed.url.ends_with(&cid));
        assert!(signed.expires_at > Utc::now());
    }
}

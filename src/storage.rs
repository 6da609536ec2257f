//! Storage Fake
//!
//! TigerStyle: object storage addressed by bucket and key, kept in memory.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   BlobStorage Trait                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              ↑
//!                  ┌───────────┴───────────┐
//!                  │    SimBlobStorage     │
//!                  │ validate → fault →    │
//!                  │ BucketMap<BlobObject> │
//!                  └───────────────────────┘
//! ```
//!
//! Uploads drain their input completely into an immutable buffer before
//! anything is stored; downloads hand out a fresh reader over that buffer.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SimClock};
use crate::constants::CONTENT_TYPE_DEFAULT;
use crate::error::FakeResult;
use crate::fault::FaultPolicy;
use crate::matching::starts_with_ignore_case;
use crate::store::BucketMap;

// =============================================================================
// Types
// =============================================================================

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    /// Object bytes
    pub content: Bytes,
    /// MIME type recorded at upload
    pub content_type: String,
    /// Clock time of the upload
    pub uploaded_at: DateTime<Utc>,
}

impl BlobObject {
    /// Size of the content in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Reader returned by downloads; implements both `std::io::Read` and
/// `tokio::io::AsyncRead`.
pub type BlobReader = Cursor<Bytes>;

// =============================================================================
// BlobStorage Trait
// =============================================================================

/// Contract of an object storage integration.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store the full content of `content` at `bucket`/`key`, replacing any
    /// existing object. `None` content type means `application/octet-stream`.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content: &mut (dyn AsyncRead + Unpin + Send),
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> FakeResult<()>;

    /// Reader over the object, or `None` if it does not exist.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> FakeResult<Option<BlobReader>>;

    /// Whether the object exists.
    async fn exists(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> FakeResult<bool>;

    /// Remove the object; returns whether one was removed.
    async fn delete(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> FakeResult<bool>;

    /// Keys of `bucket`, ordinal ascending, optionally restricted to those
    /// starting with `prefix` (ignoring case).
    async fn list_keys(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cancel: &CancellationToken,
    ) -> FakeResult<Vec<String>>;
}

// =============================================================================
// SimBlobStorage
// =============================================================================

/// In-memory blob storage.
#[derive(Debug)]
pub struct SimBlobStorage {
    objects: BucketMap<BlobObject>,
    fault: FaultPolicy,
    clock: Arc<dyn Clock>,
}

impl SimBlobStorage {
    /// Create a storage fake using `clock` for upload times and `fault`
    /// before every operation.
    pub fn new(clock: Arc<dyn Clock>, fault: FaultPolicy) -> Self {
        Self {
            objects: BucketMap::new(),
            fault,
            clock,
        }
    }

    /// Upload an in-memory buffer.
    ///
    /// # Errors
    /// Same as [`BlobStorage::upload`].
    pub async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        content: impl Into<Bytes>,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> FakeResult<()> {
        let content: Bytes = content.into();
        let mut reader: &[u8] = &content;
        self.upload(bucket, key, &mut reader, content_type, cancel)
            .await
    }

    /// Every object of `bucket`, keyed and ordered by key.
    ///
    /// Inspection only: no validation, no fault policy.
    pub fn get_all_blobs(&self, bucket: &str) -> BTreeMap<String, BlobObject> {
        self.objects.bucket(bucket)
    }

    /// Object at `bucket`/`key` without going through the fault policy.
    pub fn get_blob(&self, bucket: &str, key: &str) -> Option<BlobObject> {
        self.objects.get(bucket, key)
    }

    /// Names of every bucket that has received an upload, ordinal ascending.
    pub fn bucket_names(&self) -> Vec<String> {
        self.objects.bucket_names()
    }

    /// Number of objects across all buckets.
    pub fn total_object_count(&self) -> usize {
        self.objects.len()
    }

    /// Sum of object sizes across all buckets.
    pub fn total_size_in_bytes(&self) -> u64 {
        self.objects.sum_by(|blob| u64::try_from(blob.size()).unwrap_or(u64::MAX))
    }

    /// Drop every bucket and object.
    pub fn clear(&self) {
        self.objects.clear();
        tracing::trace!("blob storage cleared");
    }
}

impl Default for SimBlobStorage {
    fn default() -> Self {
        Self::new(Arc::new(SimClock::new()), FaultPolicy::none())
    }
}

#[async_trait]
impl BlobStorage for SimBlobStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content: &mut (dyn AsyncRead + Unpin + Send),
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> FakeResult<()> {
        self.fault.apply(cancel).await?;

        let mut buffer = Vec::new();
        content.read_to_end(&mut buffer).await?;

        let blob = BlobObject {
            content: Bytes::from(buffer),
            content_type: content_type.unwrap_or(CONTENT_TYPE_DEFAULT).to_string(),
            uploaded_at: self.clock.now(),
        };
        let size_bytes = blob.size();
        let replaced = self.objects.upsert(bucket, key, blob).is_some();

        tracing::trace!(
            bucket = bucket,
            key = key,
            size_bytes = size_bytes,
            replaced = replaced,
            "blob uploaded"
        );
        Ok(())
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> FakeResult<Option<BlobReader>> {
        self.fault.apply(cancel).await?;

        Ok(self
            .objects
            .get(bucket, key)
            .map(|blob| Cursor::new(blob.content)))
    }

    async fn exists(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> FakeResult<bool> {
        self.fault.apply(cancel).await?;

        Ok(self.objects.contains(bucket, key))
    }

    async fn delete(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> FakeResult<bool> {
        self.fault.apply(cancel).await?;

        let removed = self.objects.remove(bucket, key).is_some();
        tracing::trace!(bucket = bucket, key = key, removed = removed, "blob deleted");
        Ok(removed)
    }

    async fn list_keys(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cancel: &CancellationToken,
    ) -> FakeResult<Vec<String>> {
        self.fault.apply(cancel).await?;

        Ok(match prefix {
            Some(prefix) => self
                .objects
                .keys(bucket, |key| starts_with_ignore_case(key, prefix)),
            None => self.objects.keys(bucket, |_| true),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

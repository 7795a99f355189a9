//! Object-storage collaborator interface and artifact path naming.
//!
//! Buckets and paths are opaque strings the core constructs; it never
//! inspects storage metadata beyond success or failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Bucket holding uploaded source documents.
pub const SOURCE_BUCKET: &str = "documents";
/// Bucket holding finalized artifacts; sources are never overwritten.
pub const SIGNED_BUCKET: &str = "signed-documents";

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>>;

    /// Upload and return the public retrieval URL for the object.
    async fn upload_bytes(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<String>;

    async fn remove_object(&self, bucket: &str, path: &str) -> anyhow::Result<()>;
}

/// Path for an uploaded source document: `{owner}/{millis}-{name}`.
pub fn source_path(owner: Uuid, at: DateTime<Utc>, original_name: &str) -> String {
    format!("{}/{}-{}", owner, at.timestamp_millis(), original_name)
}

/// Path for a finalized artifact: `{owner}/signed-{millis}-{name}`.
pub fn signed_path(owner: Uuid, at: DateTime<Utc>, original_name: &str) -> String {
    format!("{}/signed-{}-{}", owner, at.timestamp_millis(), original_name)
}

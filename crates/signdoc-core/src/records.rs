//! Persisted records and the record-store collaborator interface.
//!
//! The core writes these records through [`RecordStore`] and treats them as
//! write-only output, not a cache. Persisted signature coordinates are in
//! page space: the surface → page conversion happens exactly once, in
//! [`SignatureRecord::from_placement`], and finalize never re-flips.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::SignError;
use crate::geometry::{self, NativeRect, PageGeometry, SurfaceGeometry};
use crate::placement::{Placement, PlacementStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Signed,
    /// Externally driven terminal states; the core never sets these.
    Expired,
    Cancelled,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Signed => "signed",
            DocumentStatus::Expired => "expired",
            DocumentStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub source_url: String,
    pub original_name: String,
    pub file_size: u64,
    pub page_count: u32,
    pub status: DocumentStatus,
    pub signed_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persisted mirror of a placement. The rect is page-space, bottom-left
/// anchored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    /// 1-based page number.
    pub page: u32,
    pub rect: NativeRect,
    pub signer_email: String,
    pub signer_name: Option<String>,
    pub mark_image: Option<Vec<u8>>,
    pub status: PlacementStatus,
    pub signed_at: Option<DateTime<Utc>>,
}

impl SignatureRecord {
    /// Validate a placement against its document and convert it to page
    /// space for persistence.
    pub fn from_placement(
        placement: &Placement,
        document: &DocumentRecord,
        page: PageGeometry,
        surface: SurfaceGeometry,
        zoom: f64,
    ) -> Result<Self, SignError> {
        if placement.page == 0 || placement.page > document.page_count {
            return Err(SignError::Validation(format!(
                "page {} out of range 1..={}",
                placement.page, document.page_count
            )));
        }
        if placement.rect.width <= 0.0 || placement.rect.height <= 0.0 {
            return Err(SignError::Validation(
                "mark dimensions must be positive".into(),
            ));
        }
        // Zero-area geometry is undefined for the coordinate mapper.
        if page.width <= 0.0 || page.height <= 0.0 {
            return Err(SignError::Validation("page geometry must be non-zero".into()));
        }
        if surface.width <= 0.0 || surface.height <= 0.0 || zoom <= 0.0 {
            return Err(SignError::Validation(
                "surface geometry and zoom must be non-zero".into(),
            ));
        }
        if placement.signer_email.trim().is_empty() {
            return Err(SignError::Validation("signer email must not be empty".into()));
        }

        Ok(Self {
            id: placement.id.as_uuid(),
            document_id: document.id,
            page: placement.page,
            rect: geometry::to_native(placement.rect, page, surface, zoom),
            signer_email: placement.signer_email.clone(),
            signer_name: placement.signer_name.clone(),
            mark_image: placement.mark_image.clone(),
            status: PlacementStatus::Placed,
            signed_at: None,
        })
    }

    /// The label burned next to the mark: a human name when one was given,
    /// the email otherwise.
    pub fn display_name(&self) -> &str {
        self.signer_name.as_deref().unwrap_or(&self.signer_email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DocumentUploaded,
    DocumentViewed,
    DocumentDeleted,
    SignaturePlaced,
    SignatureFinalized,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::DocumentUploaded => "document_uploaded",
            AuditAction::DocumentViewed => "document_viewed",
            AuditAction::DocumentDeleted => "document_deleted",
            AuditAction::SignaturePlaced => "signature_placed",
            AuditAction::SignatureFinalized => "signature_finalized",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub document_id: Uuid,
    pub owner_id: Uuid,
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(document_id: Uuid, owner_id: Uuid, action: AuditAction) -> Self {
        Self {
            document_id,
            owner_id,
            action,
            timestamp: Utc::now(),
        }
    }
}

/// Record storage collaborator. The core only issues the filtered queries
/// and single-row upserts below; failures are opaque to it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up a document by id, scoped to its owner.
    async fn document(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<DocumentRecord>>;

    async fn insert_signature(&self, record: &SignatureRecord) -> anyhow::Result<()>;

    /// All signatures for a document, in insertion order.
    async fn signatures(&self, document_id: Uuid) -> anyhow::Result<Vec<SignatureRecord>>;

    /// Signatures still awaiting finalize (`status = placed`).
    async fn placed_signatures(&self, document_id: Uuid) -> anyhow::Result<Vec<SignatureRecord>>;

    async fn signature(&self, id: Uuid) -> anyhow::Result<Option<SignatureRecord>>;

    /// Returns false when the signature did not exist.
    async fn delete_signature(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Compare-and-swap the document from `pending` to `signed`, attaching
    /// the finalized artifact URL. Returns false when the document was not
    /// pending; concurrent finalize requests lose this race instead of
    /// double-stamping.
    async fn mark_signed(&self, document_id: Uuid, signed_url: &str) -> anyhow::Result<bool>;

    /// Batch-transition every placed signature of the document to
    /// `finalized` with the given timestamp.
    async fn finalize_signatures(
        &self,
        document_id: Uuid,
        signed_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn append_audit(&self, entry: &AuditEntry) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::PlacementStore;
    use pretty_assertions::assert_eq;

    fn document() -> DocumentRecord {
        DocumentRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            source_url: "mem://documents/test.pdf".into(),
            original_name: "test.pdf".into(),
            file_size: 1024,
            page_count: 3,
            status: DocumentStatus::Pending,
            signed_url: None,
            created_at: Utc::now(),
        }
    }

    fn surface() -> SurfaceGeometry {
        SurfaceGeometry {
            width: 612.0,
            height: 792.0,
        }
    }

    fn signed_placement(store: &mut PlacementStore, page: u32) -> Placement {
        let id = store.add(page);
        store.update(
            id,
            crate::placement::PlacementUpdate {
                signer_email: Some("ada@example.com".into()),
                ..Default::default()
            },
        );
        store.get(id).unwrap().clone()
    }

    #[test]
    fn from_placement_converts_to_page_space() {
        let mut store = PlacementStore::new();
        let placement = signed_placement(&mut store, 1);
        let record = SignatureRecord::from_placement(
            &placement,
            &document(),
            PageGeometry::letter(),
            surface(),
            1.0,
        )
        .unwrap();
        // Default placement sits at surface (50, 50) with a 150x50 mark.
        assert_eq!(record.rect.x, 50.0);
        assert_eq!(record.rect.y, 792.0 - 50.0 - 50.0);
        assert_eq!(record.rect.width, 150.0);
        assert_eq!(record.status, PlacementStatus::Placed);
        assert_eq!(record.id, placement.id.as_uuid());
    }

    #[test]
    fn from_placement_rejects_out_of_range_page() {
        let mut store = PlacementStore::new();
        let placement = signed_placement(&mut store, 9);
        let err = SignatureRecord::from_placement(
            &placement,
            &document(),
            PageGeometry::letter(),
            surface(),
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, SignError::Validation(_)));
    }

    #[test]
    fn from_placement_rejects_missing_signer() {
        let mut store = PlacementStore::new();
        let id = store.add(1);
        let placement = store.get(id).unwrap().clone();
        let err = SignatureRecord::from_placement(
            &placement,
            &document(),
            PageGeometry::letter(),
            surface(),
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, SignError::Validation(_)));
    }

    #[test]
    fn from_placement_rejects_zero_zoom() {
        let mut store = PlacementStore::new();
        let placement = signed_placement(&mut store, 1);
        let err = SignatureRecord::from_placement(
            &placement,
            &document(),
            PageGeometry::letter(),
            surface(),
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, SignError::Validation(_)));
    }

    #[test]
    fn display_name_prefers_human_name() {
        let mut store = PlacementStore::new();
        let mut placement = signed_placement(&mut store, 1);
        placement.signer_name = Some("Ada Lovelace".into());
        let record = SignatureRecord::from_placement(
            &placement,
            &document(),
            PageGeometry::letter(),
            surface(),
            1.0,
        )
        .unwrap();
        assert_eq!(record.display_name(), "Ada Lovelace");
    }
}

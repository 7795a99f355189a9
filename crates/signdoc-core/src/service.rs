//! Signing operations against the storage and record collaborators.
//!
//! Finalize is one-way: fetch the source bytes, burn every placed mark,
//! upload the result as a new artifact, then claim the `pending` → `signed`
//! transition. The source object is never overwritten.

use chrono::Utc;
use uuid::Uuid;

use crate::compose;
use crate::error::SignError;
use crate::geometry::{PageGeometry, SurfaceGeometry};
use crate::placement::Placement;
use crate::records::{AuditAction, AuditEntry, RecordStore, SignatureRecord};
use crate::storage::{self, ObjectStore};

/// Outcome of a successful finalize.
#[derive(Debug, Clone)]
pub struct FinalizedDocument {
    pub document_id: Uuid,
    pub signed_url: String,
    pub signed_at: chrono::DateTime<Utc>,
    /// Marks actually burned; placements on missing pages are skipped.
    pub stamped: usize,
}

/// Persist a session placement as a signature record, converting it to page
/// space, and record the audit trail entry.
pub async fn place_signature(
    records: &dyn RecordStore,
    owner: Uuid,
    document_id: Uuid,
    placement: &Placement,
    page: PageGeometry,
    surface: SurfaceGeometry,
    zoom: f64,
) -> Result<SignatureRecord, SignError> {
    let document = records
        .document(document_id, owner)
        .await?
        .ok_or_else(|| SignError::NotFound(format!("document {document_id}")))?;

    let record = SignatureRecord::from_placement(placement, &document, page, surface, zoom)?;
    records.insert_signature(&record).await?;
    records
        .append_audit(&AuditEntry::new(
            document_id,
            owner,
            AuditAction::SignaturePlaced,
        ))
        .await?;

    tracing::debug!(%document_id, signature = %record.id, page = record.page, "signature placed");
    Ok(record)
}

/// Delete a signature record, verifying the caller owns its document.
pub async fn remove_signature(
    records: &dyn RecordStore,
    owner: Uuid,
    signature_id: Uuid,
) -> Result<(), SignError> {
    let signature = records
        .signature(signature_id)
        .await?
        .ok_or_else(|| SignError::NotFound(format!("signature {signature_id}")))?;
    // An owner mismatch looks identical to a missing record from outside.
    records
        .document(signature.document_id, owner)
        .await?
        .ok_or_else(|| SignError::NotFound(format!("signature {signature_id}")))?;

    records.delete_signature(signature_id).await?;
    Ok(())
}

/// Every signature of an owned document, in insertion order.
pub async fn signatures_for_document(
    records: &dyn RecordStore,
    owner: Uuid,
    document_id: Uuid,
) -> Result<Vec<SignatureRecord>, SignError> {
    records
        .document(document_id, owner)
        .await?
        .ok_or_else(|| SignError::NotFound(format!("document {document_id}")))?;
    Ok(records.signatures(document_id).await?)
}

/// Burn all placed signatures into the document and transition it to signed.
pub async fn finalize_document(
    storage: &dyn ObjectStore,
    records: &dyn RecordStore,
    owner: Uuid,
    document_id: Uuid,
) -> Result<FinalizedDocument, SignError> {
    let fail = |e: anyhow::Error| SignError::FinalizeFailed(e.to_string());

    let document = records
        .document(document_id, owner)
        .await
        .map_err(fail)?
        .ok_or_else(|| SignError::NotFound(format!("document {document_id}")))?;

    let signatures = records.placed_signatures(document_id).await.map_err(fail)?;
    if signatures.is_empty() {
        return Err(SignError::NoSignatures);
    }

    let original = storage
        .fetch_bytes(&document.source_url)
        .await
        .map_err(fail)?;

    let signed_at = Utc::now();
    let stamped = compose::burn_marks(&original, &signatures, signed_at)?;

    let path = storage::signed_path(owner, signed_at, &document.original_name);
    let signed_url = storage
        .upload_bytes(
            storage::SIGNED_BUCKET,
            &path,
            stamped.bytes,
            storage::PDF_CONTENT_TYPE,
        )
        .await
        .map_err(fail)?;

    // Claim the pending → signed transition. Losing the swap means another
    // finalize already signed this document; remove the artifact we just
    // uploaded so nothing dangling stays behind.
    let claimed = records.mark_signed(document_id, &signed_url).await.map_err(fail)?;
    if !claimed {
        if let Err(err) = storage.remove_object(storage::SIGNED_BUCKET, &path).await {
            tracing::warn!(%document_id, error = %err, "failed to remove orphaned signed artifact");
        }
        return Err(SignError::FinalizeFailed(format!(
            "document {document_id} is not pending"
        )));
    }

    records
        .finalize_signatures(document_id, signed_at)
        .await
        .map_err(fail)?;
    records
        .append_audit(&AuditEntry {
            document_id,
            owner_id: owner,
            action: AuditAction::SignatureFinalized,
            timestamp: signed_at,
        })
        .await
        .map_err(fail)?;

    tracing::info!(%document_id, stamped = stamped.stamped, %signed_url, "document finalized");

    Ok(FinalizedDocument {
        document_id,
        signed_url,
        signed_at,
        stamped: stamped.stamped,
    })
}

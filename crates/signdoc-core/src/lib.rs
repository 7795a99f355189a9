//! Core signing engine for SignDoc.
//!
//! Places signature marks on a rendered PDF and burns them into a new signed
//! artifact. Three layers, in dependency order:
//!
//! - [`geometry`]: pure transforms between the on-screen render surface and
//!   PDF page space.
//! - [`placement`]: the per-session, in-memory store of editable marks.
//! - [`compose`] and [`service`]: the one-way finalize pipeline that stamps
//!   placed marks into the document and drives its `pending` → `signed`
//!   transition.
//!
//! Object storage and record persistence sit behind the
//! [`storage::ObjectStore`] and [`records::RecordStore`] traits; the core
//! never talks to a backend directly.

pub mod compose;
pub mod error;
pub mod geometry;
pub mod placement;
pub mod records;
pub mod service;
pub mod storage;

pub use compose::{burn_marks, page_count, page_geometries, StampedDocument};
pub use error::SignError;
pub use geometry::{
    constrain, to_native, to_surface, NativeRect, PageGeometry, SurfaceGeometry, SurfaceRect,
};
pub use placement::{Placement, PlacementId, PlacementStatus, PlacementStore, PlacementUpdate};
pub use records::{
    AuditAction, AuditEntry, DocumentRecord, DocumentStatus, RecordStore, SignatureRecord,
};
pub use service::{
    finalize_document, place_signature, remove_signature, signatures_for_document,
    FinalizedDocument,
};
pub use storage::{signed_path, source_path, ObjectStore};

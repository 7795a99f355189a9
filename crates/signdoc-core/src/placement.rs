//! In-memory placement list for one document-editing session.
//!
//! Each editing session owns its own [`PlacementStore`]; it is never shared
//! across documents and is dropped when the session ends. Coordinates stay
//! in surface space for the whole editing phase and are converted to page
//! space once, when a placement is persisted (see `records`).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{self, SurfaceGeometry, SurfaceRect};

/// Default mark size in surface units.
pub const DEFAULT_WIDTH: f64 = 150.0;
pub const DEFAULT_HEIGHT: f64 = 50.0;

/// Initial position for a freshly added mark.
const DEFAULT_X: f64 = 50.0;
const DEFAULT_Y: f64 = 50.0;

/// Stable identifier for a placement within one editing session.
///
/// Identity survives removals; a list ordinal would silently shift onto a
/// different placement after a remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementId(Uuid);

impl PlacementId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    Placed,
    Finalized,
}

/// A single signature mark bound to a page: position, size, signer and
/// optional raster payload. Surface-space while editing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub id: PlacementId,
    /// 1-based page number.
    pub page: u32,
    pub rect: SurfaceRect,
    pub signer_email: String,
    pub signer_name: Option<String>,
    /// Opaque raster payload (PNG bytes), attached once the user completes
    /// the mark-drawing step.
    pub mark_image: Option<Vec<u8>>,
    pub status: PlacementStatus,
}

/// Partial update merged into a placement by drag/resize or the signer form.
#[derive(Debug, Clone, Default)]
pub struct PlacementUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub signer_email: Option<String>,
    pub signer_name: Option<String>,
    pub mark_image: Option<Vec<u8>>,
}

/// Ordered collection of placements for the document being edited, plus the
/// advisory active selection.
#[derive(Debug, Default)]
pub struct PlacementStore {
    placements: Vec<Placement>,
    active: Option<PlacementId>,
}

impl PlacementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new placement on `page` at the default size and position,
    /// and make it the active selection.
    pub fn add(&mut self, page: u32) -> PlacementId {
        let id = PlacementId::new();
        self.placements.push(Placement {
            id,
            page,
            rect: SurfaceRect {
                x: DEFAULT_X,
                y: DEFAULT_Y,
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            },
            signer_email: String::new(),
            signer_name: None,
            mark_image: None,
            status: PlacementStatus::Placed,
        });
        self.active = Some(id);
        id
    }

    pub fn get(&self, id: PlacementId) -> Option<&Placement> {
        self.placements.iter().find(|p| p.id == id)
    }

    /// Merge `update` into the placement with `id`. A stale id is a caller
    /// bug, not a runtime condition: the call is a silent no-op.
    pub fn update(&mut self, id: PlacementId, update: PlacementUpdate) {
        let Some(placement) = self.placements.iter_mut().find(|p| p.id == id) else {
            return;
        };
        if let Some(x) = update.x {
            placement.rect.x = x;
        }
        if let Some(y) = update.y {
            placement.rect.y = y;
        }
        if let Some(width) = update.width {
            placement.rect.width = width;
        }
        if let Some(height) = update.height {
            placement.rect.height = height;
        }
        if let Some(email) = update.signer_email {
            placement.signer_email = email;
        }
        if let Some(name) = update.signer_name {
            placement.signer_name = Some(name);
        }
        if let Some(image) = update.mark_image {
            placement.mark_image = Some(image);
        }
    }

    /// Move a placement to `(x, y)`, clamped so it never leaves the rendered
    /// page bounds. Applied after every interactive drag.
    pub fn drag_to(&mut self, id: PlacementId, x: f64, y: f64, bounds: SurfaceGeometry) {
        let Some(placement) = self.placements.iter_mut().find(|p| p.id == id) else {
            return;
        };
        let moved = SurfaceRect {
            x,
            y,
            ..placement.rect
        };
        placement.rect = geometry::constrain(moved, bounds);
    }

    /// Delete the placement with `id`, clearing the active selection if it
    /// pointed at it.
    pub fn remove(&mut self, id: PlacementId) {
        self.placements.retain(|p| p.id != id);
        if self.active == Some(id) {
            self.active = None;
        }
    }

    /// Set or clear the active selection. Unknown ids are ignored.
    pub fn activate(&mut self, id: Option<PlacementId>) {
        match id {
            Some(id) if self.get(id).is_none() => {}
            other => self.active = other,
        }
    }

    pub fn active(&self) -> Option<PlacementId> {
        self.active
    }

    /// Placements on `page`, in insertion order. Recomputed per call; the
    /// rendering layer uses this to decide what to draw for the visible page.
    pub fn for_page(&self, page: u32) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(move |p| p.page == page)
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Drop everything; used when switching documents.
    pub fn clear(&mut self) {
        self.placements.clear();
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bounds() -> SurfaceGeometry {
        SurfaceGeometry {
            width: 612.0,
            height: 792.0,
        }
    }

    #[test]
    fn add_uses_defaults_and_activates() {
        let mut store = PlacementStore::new();
        let id = store.add(2);
        let placement = store.get(id).unwrap();
        assert_eq!(placement.page, 2);
        assert_eq!(placement.rect.width, DEFAULT_WIDTH);
        assert_eq!(placement.rect.height, DEFAULT_HEIGHT);
        assert_eq!(placement.status, PlacementStatus::Placed);
        assert_eq!(store.active(), Some(id));
    }

    #[test]
    fn add_then_remove_returns_to_empty() {
        let mut store = PlacementStore::new();
        let id = store.add(1);
        store.remove(id);
        assert!(store.is_empty());
        assert_eq!(store.active(), None);
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let mut store = PlacementStore::new();
        let id = store.add(1);
        store.remove(id);
        store.update(
            id,
            PlacementUpdate {
                x: Some(10.0),
                ..Default::default()
            },
        );
        assert!(store.is_empty());
    }

    #[test]
    fn update_merges_partial_fields() {
        let mut store = PlacementStore::new();
        let id = store.add(1);
        store.update(
            id,
            PlacementUpdate {
                signer_email: Some("ada@example.com".into()),
                signer_name: Some("Ada Lovelace".into()),
                ..Default::default()
            },
        );
        let placement = store.get(id).unwrap();
        assert_eq!(placement.signer_email, "ada@example.com");
        assert_eq!(placement.signer_name.as_deref(), Some("Ada Lovelace"));
        // Untouched fields keep their values.
        assert_eq!(placement.rect.width, DEFAULT_WIDTH);
    }

    #[test]
    fn drag_is_clamped_to_bounds() {
        let mut store = PlacementStore::new();
        let id = store.add(1);
        store.drag_to(id, 10_000.0, -50.0, bounds());
        let placement = store.get(id).unwrap();
        assert_eq!(placement.rect.x, 612.0 - DEFAULT_WIDTH);
        assert_eq!(placement.rect.y, 0.0);
    }

    #[test]
    fn removing_other_placement_keeps_selection() {
        let mut store = PlacementStore::new();
        let first = store.add(1);
        let second = store.add(1);
        store.activate(Some(first));
        store.remove(second);
        assert_eq!(store.active(), Some(first));
    }

    #[test]
    fn activate_unknown_id_is_ignored() {
        let mut store = PlacementStore::new();
        let id = store.add(1);
        store.remove(id);
        store.activate(Some(id));
        assert_eq!(store.active(), None);
    }

    #[test]
    fn for_page_filters_and_preserves_order() {
        let mut store = PlacementStore::new();
        let a = store.add(1);
        let _b = store.add(2);
        let c = store.add(1);
        let on_page_one: Vec<PlacementId> = store.for_page(1).map(|p| p.id).collect();
        assert_eq!(on_page_one, vec![a, c]);
    }

    #[test]
    fn clear_empties_list_and_selection() {
        let mut store = PlacementStore::new();
        store.add(1);
        store.add(2);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.active(), None);
    }
}

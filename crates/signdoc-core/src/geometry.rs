//! Coordinate transforms between the on-screen render surface and PDF page space.
//!
//! PDF pages have a bottom-left origin with Y increasing upward; the render
//! surface has a top-left origin with Y increasing downward. A rectangle is
//! anchored at its top-left corner in surface space but at its bottom-left
//! corner in page space, so every conversion flips Y against the page height.

use serde::{Deserialize, Serialize};

/// A page's intrinsic size in PDF points, bottom-left origin.
///
/// Immutable once the document is loaded; one value per page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
        }
    }

    pub fn a4() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
        }
    }
}

/// The rendered size of the visible page on screen at the current zoom,
/// top-left origin. Recomputed on zoom or viewport changes, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceGeometry {
    pub width: f64,
    pub height: f64,
}

/// Axis-aligned rectangle in surface space, anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Axis-aligned rectangle in page space, anchored at its bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NativeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Round to 2 decimals, half away from zero, so stored coordinates stay
/// reproducible across repeated conversions.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a surface-space rectangle to page space.
///
/// Scale factors are independent per axis; behavior with zero-area geometry
/// or zero zoom is undefined and must be guarded by the caller.
pub fn to_native(
    rect: SurfaceRect,
    page: PageGeometry,
    surface: SurfaceGeometry,
    zoom: f64,
) -> NativeRect {
    let scale_x = page.width / (surface.width * zoom);
    let scale_y = page.height / (surface.height * zoom);

    // The surface anchor is the rect's top-left; the page anchor is its
    // bottom-left, hence the flip subtracts the scaled height as well.
    NativeRect {
        x: round2(rect.x * scale_x),
        y: round2(page.height - rect.y * scale_y - rect.height * scale_y),
        width: round2(rect.width * scale_x),
        height: round2(rect.height * scale_y),
    }
}

/// Convert a page-space rectangle back to surface space. Exact inverse of
/// [`to_native`], used to render already-persisted signatures.
pub fn to_surface(
    rect: NativeRect,
    page: PageGeometry,
    surface: SurfaceGeometry,
    zoom: f64,
) -> SurfaceRect {
    let scale_x = (surface.width * zoom) / page.width;
    let scale_y = (surface.height * zoom) / page.height;

    SurfaceRect {
        x: round2(rect.x * scale_x),
        y: round2((page.height - rect.y - rect.height) * scale_y),
        width: round2(rect.width * scale_x),
        height: round2(rect.height * scale_y),
    }
}

/// Clamp a rectangle's position so it lies fully inside `bounds`. Size is
/// untouched; a rect larger than the bounds pins to the origin.
pub fn constrain(rect: SurfaceRect, bounds: SurfaceGeometry) -> SurfaceRect {
    SurfaceRect {
        x: rect.x.min(bounds.width - rect.width).max(0.0),
        y: rect.y.min(bounds.height - rect.height).max(0.0),
        width: rect.width,
        height: rect.height,
    }
}

//! Property tests for the coordinate transforms.

use proptest::prelude::*;
use signdoc_core::geometry::{self, PageGeometry, SurfaceGeometry, SurfaceRect};

fn page() -> impl Strategy<Value = PageGeometry> {
    prop_oneof![Just(PageGeometry::letter()), Just(PageGeometry::a4())]
}

proptest! {
    /// Converting to page space and back lands within ±0.01 page units of
    /// the original, expressed in surface units by scaling with the per-axis
    /// factor. The back-conversion rounds its own output, hence the extra
    /// half-hundredth.
    #[test]
    fn surface_round_trip_stays_within_tolerance(
        page in page(),
        zoom in 0.5f64..=3.0,
        fx in 0.0f64..1.0,
        fy in 0.0f64..1.0,
        width in 20.0f64..200.0,
        height in 20.0f64..100.0,
    ) {
        let surface = SurfaceGeometry { width: page.width, height: page.height };
        let max_x = page.width * zoom - width;
        let max_y = page.height * zoom - height;
        prop_assume!(max_x > 0.0 && max_y > 0.0);

        let rect = SurfaceRect { x: fx * max_x, y: fy * max_y, width, height };
        let native = geometry::to_native(rect, page, surface, zoom);
        let back = geometry::to_surface(native, page, surface, zoom);

        let scale_x = (surface.width * zoom) / page.width;
        let scale_y = (surface.height * zoom) / page.height;
        let tol_x = 0.01 * scale_x + 0.005;
        let tol_y = 0.01 * scale_y + 0.005;

        prop_assert!((back.x - rect.x).abs() <= tol_x);
        prop_assert!((back.y - rect.y).abs() <= tol_y);
        prop_assert!((back.width - rect.width).abs() <= tol_x);
        prop_assert!((back.height - rect.height).abs() <= tol_y);
    }

    /// A converted mark never leaves the page when the rect fits on the
    /// rendered surface.
    #[test]
    fn native_rect_stays_on_page(
        page in page(),
        zoom in 0.5f64..=3.0,
        fx in 0.0f64..1.0,
        fy in 0.0f64..1.0,
        width in 20.0f64..200.0,
        height in 20.0f64..100.0,
    ) {
        let surface = SurfaceGeometry { width: page.width, height: page.height };
        let max_x = page.width * zoom - width;
        let max_y = page.height * zoom - height;
        prop_assume!(max_x > 0.0 && max_y > 0.0);

        let rect = SurfaceRect { x: fx * max_x, y: fy * max_y, width, height };
        let native = geometry::to_native(rect, page, surface, zoom);

        // Rounding may overshoot the edge by at most half a hundredth.
        prop_assert!(native.x >= -0.005);
        prop_assert!(native.y >= -0.005);
        prop_assert!(native.x + native.width <= page.width + 0.015);
        prop_assert!(native.y + native.height <= page.height + 0.015);
    }

    #[test]
    fn constrain_is_idempotent(
        x in -500.0f64..1500.0,
        y in -500.0f64..1500.0,
        width in 1.0f64..400.0,
        height in 1.0f64..400.0,
        bw in 100.0f64..1000.0,
        bh in 100.0f64..1000.0,
    ) {
        let bounds = SurfaceGeometry { width: bw, height: bh };
        let rect = SurfaceRect { x, y, width, height };
        let once = geometry::constrain(rect, bounds);
        let twice = geometry::constrain(once, bounds);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn constrained_rect_lies_inside_fitting_bounds(
        x in -500.0f64..1500.0,
        y in -500.0f64..1500.0,
        width in 1.0f64..400.0,
        height in 1.0f64..400.0,
        bw in 100.0f64..1000.0,
        bh in 100.0f64..1000.0,
    ) {
        prop_assume!(width <= bw && height <= bh);
        let bounds = SurfaceGeometry { width: bw, height: bh };
        let clamped = geometry::constrain(SurfaceRect { x, y, width, height }, bounds);

        prop_assert!(clamped.x >= 0.0);
        prop_assert!(clamped.y >= 0.0);
        prop_assert!(clamped.x + clamped.width <= bw);
        prop_assert!(clamped.y + clamped.height <= bh);
        // Size never changes, only position.
        prop_assert_eq!(clamped.width, width);
        prop_assert_eq!(clamped.height, height);
    }
}

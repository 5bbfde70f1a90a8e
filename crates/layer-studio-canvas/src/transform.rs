//! Screen-to-canvas coordinate mapping.
//!
//! Pointer events arrive in screen space. The canvas surface reports its
//! current screen transform (the SVG `getScreenCTM()` matrix `a b c d e f`);
//! inverting it yields canvas-local coordinates, the space layers live in.

use glam::{DAffine2, DVec2};

/// Build a screen transform from SVG matrix components.
pub fn screen_ctm(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> DAffine2 {
    DAffine2::from_cols_array(&[a, b, c, d, e, f])
}

/// Map a screen-space point into canvas-local space. Returns `None` when the
/// transform is degenerate (zero scale) and cannot be inverted.
pub fn screen_to_local(ctm: &DAffine2, screen: DVec2) -> Option<DVec2> {
    let det = ctm.matrix2.determinant();
    if !det.is_finite() || det.abs() < f64::EPSILON {
        return None;
    }
    Some(ctm.inverse().transform_point2(screen))
}

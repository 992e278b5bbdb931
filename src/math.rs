//! 2D vector math. Single-precision everywhere except rotation angles, which
//! are tracked in `f64` per the shape model (see `shape`).

pub use glam::Vec2;

/// Absolute epsilon used for float comparisons that affect detection outcomes.
pub const EPSILON: f32 = 1e-6;

pub fn approx_eq(a: f32, b: f32) -> bool {
    approx::abs_diff_eq!(a, b, epsilon = EPSILON)
}

pub fn approx_zero(a: f32) -> bool {
    approx_eq(a, 0.0)
}

/// `Vec2` implements `approx`'s traits (via glam's `approx` feature), so
/// callers that want relative/ulps comparisons on vectors can reach for
/// `approx::relative_eq!`/`approx::ulps_eq!` directly rather than this
/// module's scalar-only helpers.
pub fn vec2_approx_eq(a: Vec2, b: Vec2) -> bool {
    approx::abs_diff_eq!(a, b, epsilon = EPSILON)
}

/// Rotate `v` 90 degrees counter-clockwise (the "left" normal).
pub fn left_perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Rotate `v` 90 degrees clockwise (the "right" normal).
pub fn right_perp(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpendiculars_are_orthogonal() {
        let v = Vec2::new(1.0, 0.0);
        assert!(approx_zero(left_perp(v).dot(v)));
        assert!(approx_zero(right_perp(v).dot(v)));
    }

    #[test]
    fn left_and_right_are_opposite() {
        let v = Vec2::new(0.3, 0.9);
        let sum = left_perp(v) + right_perp(v);
        assert!(approx_zero(sum.x) && approx_zero(sum.y));
    }
}

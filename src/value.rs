//! Number semantics shared by the whole pipeline.
//!
//! Data values are 64-bit floats. Two reserved magic values distinguish a
//! point that breaks a line segment (`NUM_INVALID`, written as `!` in the
//! script) from a point that is simply absent (`NUM_SKIP`, written as `-`).
//! The clamps bound what counts as a representable value, and `COOR_HI`
//! bounds coordinates so geometric arithmetic cannot overflow.

/// Smallest positive magnitude accepted on logarithmic axes.
pub const NUM_LO: f64 = 1e-300;

/// Largest magnitude accepted anywhere.
pub const NUM_HI: f64 = 1e+300;

/// Magic reserved value: invalid datum, breaks a line segment.
pub const NUM_INVALID: f64 = 0.56598313e+301;

/// Magic reserved value: skipped datum, treated as if absent.
pub const NUM_SKIP: f64 = 0.90870847e+301;

/// Clamp for screen coordinates to prevent overflow in geometry code.
pub const COOR_HI: f64 = 1e24;

/// Correction factor for floating point precision issues in comparisons.
pub const EPSILON: f64 = 1e-6;

/// Spacing around various boxes (legend frames, title frames, tag boxes).
pub const BOX_SPACING: f64 = 8.0;

/// Spacing from a series data point to its tag.
pub const TAG_SPACING: f64 = BOX_SPACING / 2.0;

/// Maximum number of points per emitted polyline; longer runs are split.
pub const MAX_POLY: usize = 16000;

/// Determines if two coordinates are so near as to be considered the same.
pub fn coor_near(c1: f64, c2: f64) -> bool {
    (c1 - c2).abs() < EPSILON
}

/// Is `v` the skip sentinel?
pub fn is_skip(v: f64) -> bool {
    v == NUM_SKIP
}

/// Is `v` a representable value (not a sentinel, within the clamps)?
pub fn is_representable(v: f64) -> bool {
    v.abs() <= NUM_HI
}

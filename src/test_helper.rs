use std::f64::{EPSILON, MAX};

pub fn equal_floats(a: f64, b: f64) -> bool {
    if a == 0. && b == 0. {
        return true;
    }

    let diff = (a - b).abs();

    if a == 0. || b == 0. {
        return diff < EPSILON;
    }

    diff / (a.abs() + b.abs()).min(MAX) < EPSILON
}

/// Like `equal_floats`, with an explicit absolute tolerance. Transforms only
/// round-trip to about 1e-14, not to machine epsilon.
pub fn equal_floats_tol(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

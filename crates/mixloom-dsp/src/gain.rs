//! Pan and fade gain laws plus the output soft clipper.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

/// Constant-power pan: `θ = (pan + 1)·π/4`, returns `(cos θ, sin θ)`.
#[inline]
pub fn constant_power_pan(pan: f32) -> (f32, f32) {
    let theta = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    let (sin, cos) = theta.sin_cos();
    (cos, sin)
}

/// Equal-power fade gains `(outgoing, incoming)` at progress `p ∈ [0, 1]`.
#[inline]
pub fn equal_power_gains(progress: f32) -> (f32, f32) {
    let angle = progress.clamp(0.0, 1.0) * FRAC_PI_2;
    let (sin, cos) = angle.sin_cos();
    (cos, sin)
}

/// Exponential soft clip: identity inside `[-1, 1]`, `1 - e^(1-x)` above, `-1 + e^(1+x)` below.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    if x > 1.0 {
        1.0 - (1.0 - x).exp()
    } else if x < -1.0 {
        -1.0 + (1.0 + x).exp()
    } else {
        x
    }
}

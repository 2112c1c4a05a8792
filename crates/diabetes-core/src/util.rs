use std::time::Instant;

#[inline]
pub fn now_us(start: Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

#[inline]
pub fn clamp01(x: f64) -> f64 {
    if x < 0.0 { 0.0 } else if x > 1.0 { 1.0 } else { x }
}

/// Round to `dp` decimal places, ties to even on the exact binary value.
///
/// Goes through the float formatter, which rounds the exact decimal expansion,
/// so `round_dp(28.5 * 0.9, 1)` is 25.7 (the product is 25.650000000000002)
/// while `round_dp(0.125, 2)` is 0.12.
pub fn round_dp(x: f64, dp: usize) -> f64 {
    if !x.is_finite() {
        return x;
    }
    format!("{:.*}", dp, x).parse::<f64>().unwrap_or(x)
}

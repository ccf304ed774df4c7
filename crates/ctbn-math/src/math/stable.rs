//! Log-domain arithmetic for likelihood scores.

/// `ln(sum(exp(v)))` computed in one streaming pass.
///
/// The running sum is kept relative to the largest value seen so far and
/// rescaled whenever a larger one arrives, so no term overflows. Empty
/// input and all `-inf` input give `-inf`; any NaN gives NaN; any `+inf`
/// gives `+inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let mut max = f64::NEG_INFINITY;
    let mut scaled = 0.0;
    for &v in values {
        if v.is_nan() {
            return f64::NAN;
        }
        if v == f64::INFINITY {
            return f64::INFINITY;
        }
        if v == f64::NEG_INFINITY {
            continue;
        }
        if v > max {
            scaled = scaled * (max - v).exp() + 1.0;
            max = v;
        } else {
            scaled += (v - max).exp();
        }
    }
    if scaled == 0.0 {
        f64::NEG_INFINITY
    } else {
        max + scaled.ln()
    }
}

/// `x * ln(y)` with `0 * ln(y) = 0` for every `y`, zero included.
///
/// An unobserved transition (`x = 0`) must not poison a score through a
/// zero rate.
pub fn xlny(x: f64, y: f64) -> f64 {
    match (x, y) {
        (x, y) if x.is_nan() || y.is_nan() => f64::NAN,
        (x, _) if x == 0.0 => 0.0,
        (x, y) => x * y.ln(),
    }
}

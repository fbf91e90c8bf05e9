//! Numerical Hygiene
//!
//! Small helpers shared by the estimator and the scorers:
//! - finiteness checks on raw supplier data
//! - stable logistic and softmax
//! - weight normalization for posterior grids

/// True when any value is NaN or infinite.
pub fn has_invalid_values(arr: &[f64]) -> bool {
    arr.iter().any(|x| !x.is_finite())
}

/// Logistic function that stays finite for large |x|.
pub fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Softmax over log-weights with max subtraction.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Normalize weights in place; returns `false` when the mass is unusable.
pub fn normalize_weights(weights: &mut [f64]) -> bool {
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return false;
    }
    for w in weights.iter_mut() {
        *w /= total;
    }
    true
}

/// Non-decreasing check for ordered threshold lists.
pub fn is_ordered(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

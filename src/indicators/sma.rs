// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Unweighted mean of the trailing `window` closes.  Undefined until `window`
// closes are available.
// =============================================================================

/// Compute the SMA series for `closes` over a trailing `window`.
///
/// The output is aligned with the input; the first `window - 1` elements are
/// `None`.  `window == 0` yields all `None`.
pub fn sma_series(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if window == 0 || closes.len() < window {
        return result;
    }

    let divisor = window as f64;
    for (i, w) in closes.windows(window).enumerate() {
        let mean = w.iter().sum::<f64>() / divisor;
        if mean.is_finite() {
            result[i + window - 1] = Some(mean);
        }
    }

    result
}

// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (span + 1)
//   EMA_0      = close_0
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The series is seeded with the first close itself (no SMA warm-up), so it is
// defined from the very first candle onwards.
// =============================================================================

/// Compute the EMA series for `closes` with the given `span`.
///
/// The output is aligned with the input.  Element 0 equals `closes[0]`.
///
/// # Edge cases
/// - `span == 0` => all `None`
/// - Once a non-finite value appears the remainder of the series is `None`;
///   downstream consumers should not trust a broken series.
pub fn ema_series(closes: &[f64], span: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if span == 0 {
        return result;
    }

    let multiplier = 2.0 / (span + 1) as f64;
    let mut prev: Option<f64> = None;

    for (slot, &close) in result.iter_mut().zip(closes) {
        let ema = match prev {
            None => close,
            Some(prev_ema) => close * multiplier + prev_ema * (1.0 - multiplier),
        };
        if !ema.is_finite() {
            break;
        }
        *slot = Some(ema);
        prev = Some(ema);
    }

    result
}

// =============================================================================
// Relative Strength Index (RSI) — recursive EWMA smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Split each delta into gain = max(delta, 0), loss = max(-delta, 0).
// Step 3 — Smooth gains and losses with a recursive EWMA, alpha = 1 / period:
//            avg_1 = x_1
//            avg_i = alpha * x_i + (1 - alpha) * avg_{i-1}
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Zones:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

/// Compute the RSI series for `closes` at the given smoothing `period`.
///
/// The output is aligned with the input: element `i` is the RSI at close `i`,
/// or `None` where it is undefined.  Index 0 has no delta and is always `None`.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - Average loss zero with positive average gain => 100.0
/// - Average loss and average gain both zero (flat market) => 50.0
/// - Once a non-finite value appears the remainder of the series is `None`.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < 2 {
        return result;
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0_f64;
    let mut avg_loss = 0.0_f64;

    for (i, w) in closes.windows(2).enumerate() {
        let delta = w[1] - w[0];
        if !delta.is_finite() {
            break;
        }
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        if i == 0 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => result[i + 1] = Some(rsi),
            None => break, // Non-finite — stop producing values.
        }
    }

    result
}

/// Label an RSI reading.
pub fn rsi_zone(value: f64) -> &'static str {
    if value >= 70.0 {
        "OVERBOUGHT"
    } else if value <= 30.0 {
        "OVERSOLD"
    } else {
        "NEUTRAL"
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - If average loss is zero (only gains), RSI is 100.0.
/// - Returns `None` when the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // No movement at all — neutral.
    } else if avg_loss == 0.0 {
        100.0 // All gains, no losses.
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}

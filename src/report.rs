// =============================================================================
// Text report — human-readable rendering of a panel snapshot
// =============================================================================

use std::fmt::Write;

use crate::analysis::{PanelSnapshot, TimeframeAnalysis};

/// Format a price with thousands separators and two decimals: `$68,123.45`.
pub fn format_price(price: f64) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac_part}")
}

/// Render one timeframe block.
pub fn render_timeframe(analysis: &TimeframeAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "── {} Analysis ──", analysis.timeframe);

    match &analysis.latest {
        Some(latest) => {
            let _ = writeln!(out, "Last Price: {}", format_price(latest.last_price));
            let _ = writeln!(out, "RSI-14: {:.1} ({})", latest.rsi_14, latest.rsi_14_zone);
            let _ = writeln!(out, "RSI-6/24: {:.1} / {:.1}", latest.rsi_6, latest.rsi_24);
            let _ = writeln!(out, "EMA Cross: {}", latest.trend);
            let _ = writeln!(
                out,
                "EMA-9: {}  EMA-21: {}  SMA-50: {}",
                format_price(latest.ema_9),
                format_price(latest.ema_21),
                format_price(latest.sma_50)
            );
        }
        None => {
            let _ = writeln!(
                out,
                "No data available ({} candles received)",
                analysis.candles_in
            );
        }
    }
    out
}

/// Render the full snapshot, one block per timeframe plus the update time.
pub fn render_snapshot(snapshot: &PanelSnapshot) -> String {
    let mut out = format!("{} — Real-Time Analysis\n", snapshot.symbol);
    for analysis in &snapshot.timeframes {
        out.push_str(&render_timeframe(analysis));
    }
    let _ = writeln!(
        out,
        "Last update: {}",
        snapshot.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    out
}

// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators shown on the panel.
// Every series function returns a `Vec<Option<f64>>` aligned with its input so
// callers are forced to handle the warm-up region and numerical edge cases.

pub mod ema;
pub mod rsi;
pub mod sma;

pub use ema::ema_series;
pub use rsi::{rsi_series, rsi_zone};
pub use sma::sma_series;

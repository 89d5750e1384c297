pub mod client;
pub mod rate_limit;
pub mod retry;

pub use client::BinanceClient;

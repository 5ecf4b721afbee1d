// LegiScan API client: typed requests and validated responses.

pub mod client;
pub mod response;

pub use client::{LegiScan, LegiScanClient, LegiScanError};

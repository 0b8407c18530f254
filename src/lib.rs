//! Library crate for gvm-scan-rs: a GMP client and the scan workflow built on it.
pub mod config;
pub mod error;
pub mod gmp;
pub mod report;
pub mod resolve;
pub mod types;
pub mod workflow;
pub mod xml;

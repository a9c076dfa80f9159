//! Detects Cloudflare fingerprints on a site's hosting.
//!
//! A check probes a URL once, derives header and cookie indicators from the
//! response, and remembers the result per hostname so repeated checks within
//! the freshness window are answered without touching the network.

pub mod check;
pub mod config;
pub mod error;
pub mod http_probe;
pub mod server;
pub mod store;

pub use check::{CheckPolicy, Checker};
pub use error::{CheckError, ProbeError, StoreError};
pub use http_probe::result::CheckResult;

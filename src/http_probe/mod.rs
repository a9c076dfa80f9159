pub mod probe;
pub mod result;

pub mod prelude {
    pub use super::probe::{Fetcher, HttpFetcher, ProbeResponse, with_deadline};
    pub use super::result::{CheckResult, extract};
    pub use crate::error::ProbeError;
}

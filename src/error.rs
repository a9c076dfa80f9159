use std::fmt::Write;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of the single outbound probe request.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No response headers arrived before the deadline.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// DNS, connect, TLS or protocol failure. Never retried.
    #[error("request failed")]
    Network(#[source] BoxError),
}

/// Errors returned by [`crate::check::Checker::check`].
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid url {input:?}: {reason}")]
    InvalidInput { input: String, reason: String },

    #[error("probe of {url} failed")]
    ProbeFailed {
        url: String,
        #[source]
        source: ProbeError,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis command failed")]
    Redis(#[from] redis::RedisError),

    #[error("malformed record for {hostname}: field {field:?} = {value:?}")]
    Malformed {
        hostname: String,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Renders an error followed by each of its causes.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}

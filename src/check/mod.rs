//! The check operation: cache lookup, freshness decision, probe, and a
//! best-effort write of the new result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::task::TaskTracker;
use url::Url;

use crate::error::{CheckError, report};
use crate::http_probe::prelude::*;
use crate::store::CheckStore;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CheckPolicy {
    pub probe_timeout: Duration,
    /// Cached records younger than this are returned without probing.
    pub freshness_window: Duration,
}

impl Default for CheckPolicy {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }
}

/// Runs checks against a fetcher and a store. Cheap to clone; clones share
/// the same collaborators and pending-write tracker.
///
/// Concurrent checks of the same hostname are not deduplicated: both may
/// probe, and the store keeps whichever write lands last.
#[derive(Clone)]
pub struct Checker {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn CheckStore>,
    clock: Arc<dyn Clock>,
    policy: CheckPolicy,
    writes: TaskTracker,
}

impl Checker {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn CheckStore>, policy: CheckPolicy) -> Self {
        Self::with_clock(fetcher, store, Arc::new(SystemClock), policy)
    }

    pub fn with_clock(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn CheckStore>,
        clock: Arc<dyn Clock>,
        policy: CheckPolicy,
    ) -> Self {
        Self {
            fetcher,
            store,
            clock,
            policy,
            writes: TaskTracker::new(),
        }
    }

    /// Returns the indicators for `url`'s hostname, from the cache when a
    /// record younger than the freshness window exists, otherwise by probing.
    ///
    /// A failed probe is an error even when an older record exists, and it
    /// leaves that record untouched.
    pub async fn check(&self, url: &str) -> Result<CheckResult, CheckError> {
        let (url, hostname) = parse_target(url)?;

        if let Some(cached) = self.lookup(&hostname).await {
            if self.is_fresh(&hostname, &cached) {
                return Ok(cached);
            }
        } else {
            log::debug!("No cached check for {hostname}");
        }

        let probe_started = Instant::now();
        let response = self
            .fetcher
            .fetch(&url, self.policy.probe_timeout)
            .await
            .map_err(|source| {
                log::warn!("Probe of {url} failed: {source}");
                CheckError::ProbeFailed {
                    url: url.to_string(),
                    source,
                }
            })?;
        let probe_finished = Instant::now();

        let check = extract(
            &response.headers,
            probe_started,
            probe_finished,
            self.clock.now_millis(),
        );
        log::info!(
            "Checked {hostname}: status {}, {}ms, server header {}",
            response.status,
            check.response_time,
            check.server_header
        );

        self.spawn_write(hostname, check.clone());
        Ok(check)
    }

    /// Waits until every cache write spawned so far has finished.
    ///
    /// Meant for shutdown and tests, with a single caller at a time: the
    /// tracker is closed for the wait and reopened afterwards, so a second
    /// concurrent flush can reopen it early and stall the first one's wait
    /// until the next close.
    pub async fn flush_writes(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    /// A record whose age cannot be computed (timestamp out of range) is stale.
    fn is_fresh(&self, hostname: &str, cached: &CheckResult) -> bool {
        let window = i64::try_from(self.policy.freshness_window.as_millis()).unwrap_or(i64::MAX);
        match self.clock.now_millis().checked_sub(cached.time) {
            Some(age) if age < window => {
                log::debug!("Cache hit for {hostname} (age {age}ms)");
                true
            }
            Some(age) => {
                log::debug!("Cache entry for {hostname} is stale (age {age}ms)");
                false
            }
            None => {
                log::warn!(
                    "Cache entry for {hostname} has out-of-range time {}, treating as stale",
                    cached.time
                );
                false
            }
        }
    }

    async fn lookup(&self, hostname: &str) -> Option<CheckResult> {
        match self.store.get(hostname).await {
            Ok(found) => found,
            Err(e) => {
                // Treated as a miss: the probe still answers the request.
                log::warn!("Cache read for {hostname} failed: {}", report(&e));
                None
            }
        }
    }

    fn spawn_write(&self, hostname: String, check: CheckResult) {
        let store = Arc::clone(&self.store);
        self.writes.spawn(async move {
            if let Err(e) = store.put(&hostname, &check).await {
                log::warn!("Cache write for {hostname} failed: {}", report(&e));
            }
        });
    }
}

/// Parses an absolute http(s) URL and returns it with its hostname.
pub fn parse_target(input: &str) -> Result<(Url, String), CheckError> {
    let invalid = |reason: String| CheckError::InvalidInput {
        input: input.to_string(),
        reason,
    };

    let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    let hostname = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(invalid("missing host".to_string())),
    };

    Ok((url, hostname))
}

//! Per-hostname storage of the last [`CheckResult`].
//!
//! The checker only needs "get the last record" and "overwrite the record";
//! locking and any storage timeouts are the store's own business.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::http_probe::result::CheckResult;

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

#[async_trait]
pub trait CheckStore: Send + Sync {
    /// Most recently written record for `hostname`, or `None`.
    async fn get(&self, hostname: &str) -> Result<Option<CheckResult>, StoreError>;

    /// Replaces any previous record for `hostname`.
    async fn put(&self, hostname: &str, check: &CheckResult) -> Result<(), StoreError>;
}

pub const FIELD_TIME: &str = "time";
pub const FIELD_RESPONSE_TIME: &str = "response-time";
pub const FIELD_SERVER_HEADER: &str = "server-header";
pub const FIELD_DUID_COOKIE: &str = "duid-cookie";
pub const FIELD_LOAD_BALANCER_COOKIE: &str = "load-balancer-cookie";
pub const FIELD_BOT_MANAGEMENT_COOKIE: &str = "bot-management-cookie";
pub const FIELD_OFFLINE_BROWSING_INFO_COOKIE: &str = "offline-browsing-info-cookie";
pub const FIELD_USE_OFFLINE_BROWSING_COOKIE: &str = "use-offline-browsing-cookie";

pub fn record_key(hostname: &str) -> String {
    format!("previous-check:hostname#{hostname}")
}

fn bit(value: bool) -> String {
    let bit = if value { "1" } else { "0" };
    bit.to_string()
}

/// Flat string form of a record: numbers as decimal strings, booleans as
/// `"1"`/`"0"`.
pub fn to_fields(check: &CheckResult) -> Vec<(&'static str, String)> {
    vec![
        (FIELD_TIME, check.time.to_string()),
        (FIELD_RESPONSE_TIME, check.response_time.to_string()),
        (FIELD_SERVER_HEADER, bit(check.server_header)),
        (FIELD_DUID_COOKIE, bit(check.duid_cookie)),
        (FIELD_LOAD_BALANCER_COOKIE, bit(check.load_balancer_cookie)),
        (FIELD_BOT_MANAGEMENT_COOKIE, bit(check.bot_management_cookie)),
        (FIELD_OFFLINE_BROWSING_INFO_COOKIE, bit(check.offline_browsing_info_cookie)),
        (FIELD_USE_OFFLINE_BROWSING_COOKIE, bit(check.use_offline_browsing_cookie)),
    ]
}

/// Inverse of [`to_fields`]. A record without a `time` field is absent;
/// any boolean other than `"1"` reads as false.
pub fn from_fields<F>(hostname: &str, field: F) -> Result<Option<CheckResult>, StoreError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(time) = field(FIELD_TIME) else {
        return Ok(None);
    };

    let malformed = |name: &'static str, value: String| StoreError::Malformed {
        hostname: hostname.to_string(),
        field: name,
        value,
    };
    let flag = |name: &str| field(name).as_deref() == Some("1");

    let time = time
        .parse::<i64>()
        .map_err(|_| malformed(FIELD_TIME, time.clone()))?;
    let response_time = match field(FIELD_RESPONSE_TIME) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| malformed(FIELD_RESPONSE_TIME, raw.clone()))?,
        None => 0,
    };

    Ok(Some(CheckResult {
        time,
        response_time,
        server_header: flag(FIELD_SERVER_HEADER),
        duid_cookie: flag(FIELD_DUID_COOKIE),
        load_balancer_cookie: flag(FIELD_LOAD_BALANCER_COOKIE),
        bot_management_cookie: flag(FIELD_BOT_MANAGEMENT_COOKIE),
        offline_browsing_info_cookie: flag(FIELD_OFFLINE_BROWSING_INFO_COOKIE),
        use_offline_browsing_cookie: flag(FIELD_USE_OFFLINE_BROWSING_COOKIE),
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn sample() -> CheckResult {
        CheckResult {
            time: 1_607_000_000_123,
            response_time: 87,
            server_header: true,
            duid_cookie: false,
            load_balancer_cookie: true,
            bot_management_cookie: false,
            offline_browsing_info_cookie: true,
            use_offline_browsing_cookie: false,
        }
    }

    fn as_map(fields: Vec<(&'static str, String)>) -> HashMap<String, String> {
        fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_key_is_per_hostname() {
        assert_eq!(record_key("example.com"), "previous-check:hostname#example.com");
    }

    #[test]
    fn test_fields_round_trip() {
        let map = as_map(to_fields(&sample()));

        assert_eq!(map["time"], "1607000000123");
        assert_eq!(map["server-header"], "1");
        assert_eq!(map["duid-cookie"], "0");

        let back = from_fields("example.com", |name| map.get(name).cloned())
            .expect("well formed")
            .expect("present");
        assert_eq!(back, sample());
    }

    #[test]
    fn test_missing_time_reads_as_absent() {
        let back = from_fields("example.com", |_| None).expect("no error");
        assert!(back.is_none());
    }

    #[test]
    fn test_unparsable_time_is_malformed() {
        let err = from_fields("example.com", |name| {
            (name == FIELD_TIME).then(|| "yesterday".to_string())
        })
        .expect_err("time must be numeric");

        assert!(matches!(err, StoreError::Malformed { field: "time", .. }));
    }

    #[test]
    fn test_non_bit_booleans_read_as_false() {
        let mut map = as_map(to_fields(&sample()));
        map.insert(FIELD_SERVER_HEADER.to_string(), "true".to_string());

        let back = from_fields("example.com", |name| map.get(name).cloned())
            .expect("well formed")
            .expect("present");
        assert!(!back.server_header);
    }
}

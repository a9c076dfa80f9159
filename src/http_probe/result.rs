use std::time::Instant;

use reqwest::header::{HeaderMap, SERVER, SET_COOKIE};
use serde::{Deserialize, Serialize};

/// Value of the `server` header sent by Cloudflare's edge.
pub const CLOUDFLARE_SERVER: &str = "cloudflare";

// See https://support.cloudflare.com/hc/en-us/articles/200170156-Understanding-the-Cloudflare-Cookies
pub const DUID_COOKIE: &str = "__cfduid=";
pub const LOAD_BALANCER_COOKIE: &str = "__cflb=";
pub const BOT_MANAGEMENT_COOKIE: &str = "__cf_bm=";
pub const OFFLINE_BROWSING_INFO_COOKIE: &str = "cf_ob_info=";
pub const USE_OFFLINE_BROWSING_COOKIE: &str = "cf_use_ob=";

/// Outcome of one probe of a hostname.
///
/// This is both the value returned to callers and the record kept in the
/// cache store, so cached and fresh answers have the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// When the check completed, in epoch milliseconds.
    pub time: i64,
    /// Wall-clock duration of the probe request in milliseconds.
    pub response_time: u64,

    pub server_header: bool,
    pub duid_cookie: bool,
    pub load_balancer_cookie: bool,
    pub bot_management_cookie: bool,
    pub offline_browsing_info_cookie: bool,
    pub use_offline_browsing_cookie: bool,
}

/// Derives the indicator set from a probe response's headers.
///
/// `checked_at` is the wall-clock reading (epoch ms) taken once the probe
/// completed. Cookie indicators are plain substring matches on the combined
/// `set-cookie` text, not a cookie parse: `x__cfduid=1` still counts as a
/// `__cfduid` cookie, while `__cfduidx=1` does not.
pub fn extract(
    headers: &HeaderMap,
    probe_started: Instant,
    probe_finished: Instant,
    checked_at: i64,
) -> CheckResult {
    let mut indicators = CheckResult {
        time: checked_at,
        response_time: probe_finished
            .saturating_duration_since(probe_started)
            .as_millis() as u64,
        ..Default::default()
    };

    if combined_header(headers, SERVER).as_deref() == Some(CLOUDFLARE_SERVER) {
        indicators.server_header = true;
    }

    if let Some(set_cookie) = combined_header(headers, SET_COOKIE) {
        indicators.duid_cookie = set_cookie.contains(DUID_COOKIE);
        indicators.load_balancer_cookie = set_cookie.contains(LOAD_BALANCER_COOKIE);
        indicators.bot_management_cookie = set_cookie.contains(BOT_MANAGEMENT_COOKIE);
        indicators.offline_browsing_info_cookie = set_cookie.contains(OFFLINE_BROWSING_INFO_COOKIE);
        indicators.use_offline_browsing_cookie = set_cookie.contains(USE_OFFLINE_BROWSING_COOKIE);
    }

    indicators
}

/// All values of `name` joined with `", "`, or `None` when the header is absent.
fn combined_header(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn extract_now(headers: &HeaderMap) -> CheckResult {
        let now = Instant::now();
        extract(headers, now, now, 1_700_000_000_000)
    }

    #[test]
    fn test_no_headers_yields_all_false() {
        let result = extract_now(&HeaderMap::new());

        assert_eq!(
            result,
            CheckResult {
                time: 1_700_000_000_000,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_server_header_is_exact_and_case_sensitive() {
        assert!(extract_now(&headers(&[("server", "cloudflare")])).server_header);

        for other in ["Cloudflare", "CLOUDFLARE", "cloudflare-nginx", " cloudflare", "nginx"] {
            let map = {
                let mut map = HeaderMap::new();
                map.insert(SERVER, HeaderValue::from_str(other).expect("valid header"));
                map
            };
            assert!(!extract_now(&map).server_header, "{other:?} must not match");
        }
    }

    #[test]
    fn test_repeated_server_header_is_combined_before_matching() {
        let map = headers(&[("server", "cloudflare"), ("server", "cloudflare")]);
        assert!(!extract_now(&map).server_header);
    }

    #[test]
    fn test_cookie_indicators_are_independent() {
        let map = headers(&[
            ("set-cookie", "__cfduid=abc; path=/; HttpOnly"),
            ("set-cookie", "__cf_bm=xyz; path=/"),
        ]);
        let result = extract_now(&map);

        assert!(result.duid_cookie);
        assert!(result.bot_management_cookie);
        assert!(!result.load_balancer_cookie);
        assert!(!result.offline_browsing_info_cookie);
        assert!(!result.use_offline_browsing_cookie);
        assert!(!result.server_header);
    }

    #[test]
    fn test_all_indicators_set() {
        let map = headers(&[
            ("server", "cloudflare"),
            ("set-cookie", "__cfduid=1"),
            ("set-cookie", "__cflb=2"),
            ("set-cookie", "__cf_bm=3"),
            ("set-cookie", "cf_ob_info=4"),
            ("set-cookie", "cf_use_ob=5"),
        ]);
        let result = extract_now(&map);

        assert!(result.server_header);
        assert!(result.duid_cookie);
        assert!(result.load_balancer_cookie);
        assert!(result.bot_management_cookie);
        assert!(result.offline_browsing_info_cookie);
        assert!(result.use_offline_browsing_cookie);
    }

    #[test]
    fn test_cookie_match_is_anchored_on_equals_only() {
        // A longer name does not contain "__cfduid=".
        assert!(!extract_now(&headers(&[("set-cookie", "__cfduidx=abc")])).duid_cookie);

        // Substring matching does not check cookie boundaries, so a name or
        // value that ends in the marker is a false positive.
        assert!(extract_now(&headers(&[("set-cookie", "x__cfduid=abc")])).duid_cookie);
        assert!(extract_now(&headers(&[("set-cookie", "session=y; note=__cf_bm=1")])).bot_management_cookie);
    }

    #[test]
    fn test_cookie_without_equals_does_not_match() {
        assert!(!extract_now(&headers(&[("set-cookie", "__cflb")])).load_balancer_cookie);
    }

    #[test]
    fn test_response_time_is_probe_duration() {
        let started = Instant::now();
        let finished = started + Duration::from_millis(250);

        let result = extract(&HeaderMap::new(), started, finished, 42);
        assert_eq!(result.response_time, 250);
        assert_eq!(result.time, 42);

        // Reversed instants never go negative.
        let result = extract(&HeaderMap::new(), finished, started, 42);
        assert_eq!(result.response_time, 0);
    }

    #[test]
    fn test_json_field_names() {
        let result = CheckResult {
            time: 1,
            response_time: 2,
            server_header: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).expect("serializable");

        assert_eq!(json["time"], 1);
        assert_eq!(json["responseTime"], 2);
        assert_eq!(json["serverHeader"], true);
        assert_eq!(json["duidCookie"], false);
        assert_eq!(json["loadBalancerCookie"], false);
        assert_eq!(json["botManagementCookie"], false);
        assert_eq!(json["offlineBrowsingInfoCookie"], false);
        assert_eq!(json["useOfflineBrowsingCookie"], false);
    }
}

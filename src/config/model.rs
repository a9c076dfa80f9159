use serde::Deserialize;

/// Service configuration as read from `config.yml`.
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP front end binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Hard deadline for the probe request, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// How long a cached check is served before the host is probed again.
    #[serde(default = "default_freshness_window_seconds")]
    pub freshness_window_seconds: u64,

    /// Accept invalid TLS certificates on probed hosts.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Where previous checks are kept.
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    Redis {
        url: String,
    },
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            probe_timeout_ms: default_probe_timeout_ms(),
            freshness_window_seconds: default_freshness_window_seconds(),
            accept_invalid_certs: false,
            store: StoreConfig::default(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

fn default_freshness_window_seconds() -> u64 {
    60 * 60
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.probe_timeout_ms, 10_000);
        assert_eq!(config.freshness_window_seconds, 3600);
        assert!(!config.accept_invalid_certs);
        assert_eq!(config.store, StoreConfig::Memory);
    }

    #[test]
    fn test_service_config_deserialization() {
        let yaml = r#"
                    listen_addr: 127.0.0.1:9000
                    probe_timeout_ms: 2500
                    store:
                        kind: redis
                        url: redis://localhost:6379
                                    "#;

        let config: ServiceConfig = serde_yaml::from_str(yaml).expect("Invalid YAML");
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.probe_timeout_ms, 2500);
        // check defaults for fields left out
        assert_eq!(config.freshness_window_seconds, 3600);
        assert!(!config.accept_invalid_certs);
        assert_eq!(
            config.store,
            StoreConfig::Redis {
                url: "redis://localhost:6379".to_string()
            }
        );
    }

    #[test]
    fn test_empty_mapping_is_all_defaults() {
        let config: ServiceConfig = serde_yaml::from_str("{}").expect("Invalid YAML");
        assert_eq!(config, ServiceConfig::default());
    }
}

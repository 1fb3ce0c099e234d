//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use nsx_client::LbProvider;
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration of the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub nsx_url: String,
    pub nsx_username: String,
    pub nsx_password: String,
    pub nsx_insecure: bool,
    pub cluster_name: String,
    pub lb_provider: LbProvider,
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
    pub concurrency: u16,
    pub gc_interval: Duration,
    pub drift_interval: Duration,
    pub metrics_addr: SocketAddr,
    /// Publish Kubernetes Events on NetworkInfo objects
    pub emit_events: bool,
}

impl ControllerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.is_empty()).ok_or_else(|| {
                ControllerError::InvalidConfig(format!("{} environment variable is required", key))
            })
        };

        let lb_provider = match lookup("NSX_LB_PROVIDER") {
            None => LbProvider::NsxLb,
            Some(value) => LbProvider::parse(&value).ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "NSX_LB_PROVIDER must be one of none, nsx-lb, avi (got {})",
                    value
                ))
            })?,
        };

        let metrics_addr = lookup("METRICS_BIND_ADDRESS")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let metrics_addr = metrics_addr.parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!(
                "METRICS_BIND_ADDRESS {} is not a socket address: {}",
                metrics_addr, e
            ))
        })?;

        Ok(Self {
            nsx_url: required("NSX_MANAGER_URL")?,
            nsx_username: required("NSX_USERNAME")?,
            nsx_password: required("NSX_PASSWORD")?,
            nsx_insecure: parse_flag(&lookup, "NSX_INSECURE_SKIP_VERIFY", false)?,
            cluster_name: required("CLUSTER_NAME")?,
            lb_provider,
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|v| !v.is_empty()),
            concurrency: parse_number(&lookup, "RECONCILE_CONCURRENCY", 8)?,
            gc_interval: parse_interval(&lookup, "GC_INTERVAL_SECS", 600)?,
            drift_interval: parse_interval(&lookup, "DRIFT_INTERVAL_SECS", 600)?,
            metrics_addr,
            emit_events: parse_flag(&lookup, "EMIT_EVENTS", true)?,
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| {
            ControllerError::InvalidConfig(format!("{} must be a number (got {}): {}", key, value, e))
        }),
    }
}

/// Whole seconds, at least one
fn parse_interval<F>(lookup: &F, key: &str, default_secs: u64) -> Result<Duration, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_number(lookup, key, default_secs)? {
        0 => Err(ControllerError::InvalidConfig(format!("{} must be greater than zero", key))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.parse::<bool>().map_err(|_| {
            ControllerError::InvalidConfig(format!("{} must be true or false (got {})", key, value))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> HashMap<String, String> {
        env(&[
            ("NSX_MANAGER_URL", "https://nsx.example.com"),
            ("NSX_USERNAME", "admin"),
            ("NSX_PASSWORD", "secret"),
            ("CLUSTER_NAME", "cluster-a"),
        ])
    }

    #[test]
    fn test_defaults() {
        let vars = base();
        let config = ControllerConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.lb_provider, LbProvider::NsxLb);
        assert!(!config.nsx_insecure);
        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.gc_interval, Duration::from_secs(600));
        assert_eq!(config.drift_interval, Duration::from_secs(600));
        assert_eq!(config.metrics_addr.port(), 8080);
        assert!(config.emit_events);
    }

    #[test]
    fn test_overrides() {
        let mut vars = base();
        vars.extend(env(&[
            ("NSX_LB_PROVIDER", "avi"),
            ("NSX_INSECURE_SKIP_VERIFY", "true"),
            ("WATCH_NAMESPACE", "team-a"),
            ("RECONCILE_CONCURRENCY", "2"),
            ("GC_INTERVAL_SECS", "60"),
            ("METRICS_BIND_ADDRESS", "127.0.0.1:9090"),
            ("EMIT_EVENTS", "false"),
        ]));
        let config = ControllerConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.lb_provider, LbProvider::Avi);
        assert!(config.nsx_insecure);
        assert_eq!(config.watch_namespace.as_deref(), Some("team-a"));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.gc_interval, Duration::from_secs(60));
        assert_eq!(config.metrics_addr.port(), 9090);
        assert!(!config.emit_events);
    }

    #[test]
    fn test_malformed_flag_is_rejected() {
        let mut vars = base();
        vars.insert("NSX_INSECURE_SKIP_VERIFY".to_string(), "yes".to_string());
        let err = ControllerConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("NSX_INSECURE_SKIP_VERIFY"));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        for key in ["GC_INTERVAL_SECS", "DRIFT_INTERVAL_SECS"] {
            let mut vars = base();
            vars.insert(key.to_string(), "0".to_string());
            let err = ControllerConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn test_missing_password_is_rejected() {
        let mut vars = base();
        vars.remove("NSX_PASSWORD");
        let err = ControllerConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("NSX_PASSWORD"));
    }

    #[test]
    fn test_unknown_lb_provider_is_rejected() {
        let mut vars = base();
        vars.insert("NSX_LB_PROVIDER".to_string(), "f5".to_string());
        assert!(ControllerConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }
}

//! Default transport selection from environment signals.

use std::net::IpAddr;
use tracing::debug;

use crate::config::TransportMethod;

/// What the process knows about where it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSignals {
    /// `FIGMA_TRANSPORT`, when set to a recognised value.
    pub explicit: Option<TransportMethod>,
    /// `FIGMA_BRIDGE_HOST`: the host this process is reached on.
    pub host: Option<String>,
    /// `FIGMA_DEPLOYED` or `CI` is truthy.
    pub deployed: bool,
}

impl EnvironmentSignals {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = lookup("FIGMA_TRANSPORT").and_then(|raw| raw.parse().ok());
        let host = lookup("FIGMA_BRIDGE_HOST")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        let deployed = ["FIGMA_DEPLOYED", "CI"]
            .iter()
            .any(|key| lookup(key).is_some_and(|v| is_truthy(&v)));

        Self {
            explicit,
            host,
            deployed,
        }
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub trait TransportStrategy: Send + Sync {
    fn select(&self, signals: &EnvironmentSignals) -> TransportMethod;
}

/// Explicit override, then deployed → direct, loopback host → broker,
/// otherwise direct.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransportStrategy;

impl TransportStrategy for DefaultTransportStrategy {
    fn select(&self, signals: &EnvironmentSignals) -> TransportMethod {
        if let Some(method) = signals.explicit {
            return method;
        }
        if signals.deployed {
            return TransportMethod::Direct;
        }
        match signals.host.as_deref() {
            Some(host) if is_loopback_host(host) => TransportMethod::Broker,
            _ => TransportMethod::Direct,
        }
    }
}

pub fn detect_default_transport(
    signals: &EnvironmentSignals,
    strategy: &dyn TransportStrategy,
) -> TransportMethod {
    let method = strategy.select(signals);
    debug!(transport = method.as_str(), ?signals, "selected default transport");
    method
}

fn is_loopback_host(host: &str) -> bool {
    let host = host
        .trim_start_matches('[')
        .split(']')
        .next()
        .unwrap_or_default();
    let host = match host.parse::<IpAddr>() {
        Ok(ip) => return ip.is_loopback() || ip.is_unspecified(),
        // strip a trailing :port on names
        Err(_) => host.rsplit_once(':').map_or(host, |(name, _)| name),
    };
    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }
    let host = host.to_ascii_lowercase();
    host == "localhost" || host.ends_with(".localhost")
}

//! Host configuration

use std::net::SocketAddr;
use std::time::Duration;

use holosync_coord::{DiscoveryConfig, DiscoveryMode, DEFAULT_POLL_INTERVAL, DEFAULT_SIMULATION_DELAY};
use holosync_core::{HoloError, HoloResult};

pub const ENV_TICK_INTERVAL: &str = "HOLOSYNC_TICK_INTERVAL";
pub const ENV_DISCOVERY_POLL: &str = "HOLOSYNC_DISCOVERY_POLL";
pub const ENV_SIMULATION: &str = "HOLOSYNC_SIMULATION";
pub const ENV_SIMULATION_DELAY: &str = "HOLOSYNC_SIMULATION_DELAY";
pub const ENV_BIND: &str = "HOLOSYNC_BIND";
pub const ENV_JSON_LOGS: &str = "HOLOSYNC_JSON_LOGS";

/// Spectator host configuration
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Interval between broadcast ticks
    pub tick_interval: Duration,
    /// Interval between checks during targeted discovery
    pub discovery_poll_interval: Duration,
    /// Fabricate a coordinate instead of running the detector
    pub simulation: bool,
    pub simulation_delay: Duration,
    /// UDP address the host binds to
    pub bind_addr: SocketAddr,
    pub json_logs: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            tick_interval: Duration::from_millis(33),
            discovery_poll_interval: DEFAULT_POLL_INTERVAL,
            simulation: false,
            simulation_delay: DEFAULT_SIMULATION_DELAY,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7410)),
            json_logs: false,
        }
    }
}

impl HostConfig {
    /// Defaults overridden by `HOLOSYNC_*` environment variables
    pub fn from_env() -> HoloResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> HoloResult<Self> {
        let mut config = HostConfig::default();

        if let Some(value) = lookup(ENV_TICK_INTERVAL) {
            config.tick_interval = parse_duration(ENV_TICK_INTERVAL, &value)?;
        }
        if let Some(value) = lookup(ENV_DISCOVERY_POLL) {
            config.discovery_poll_interval = parse_duration(ENV_DISCOVERY_POLL, &value)?;
        }
        if let Some(value) = lookup(ENV_SIMULATION) {
            config.simulation = parse_bool(ENV_SIMULATION, &value)?;
        }
        if let Some(value) = lookup(ENV_SIMULATION_DELAY) {
            config.simulation_delay = parse_duration(ENV_SIMULATION_DELAY, &value)?;
        }
        if let Some(value) = lookup(ENV_BIND) {
            config.bind_addr = value
                .trim()
                .parse()
                .map_err(|e| HoloError::Config(format!("{}: {}", ENV_BIND, e)))?;
        }
        if let Some(value) = lookup(ENV_JSON_LOGS) {
            config.json_logs = parse_bool(ENV_JSON_LOGS, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HoloResult<()> {
        if self.tick_interval.is_zero() {
            return Err(HoloError::Config("tick interval must be non-zero".into()));
        }
        if self.discovery_poll_interval.is_zero() {
            return Err(HoloError::Config("discovery poll interval must be non-zero".into()));
        }
        Ok(())
    }

    /// Settings for the coordinate service
    pub fn discovery_config(&self) -> DiscoveryConfig {
        let mode = if self.simulation {
            DiscoveryMode::Simulated {
                delay: self.simulation_delay,
            }
        } else {
            DiscoveryMode::Detector
        };

        DiscoveryConfig {
            poll_interval: self.discovery_poll_interval,
            mode,
        }
    }
}

fn parse_duration(key: &str, value: &str) -> HoloResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| HoloError::Config(format!("{}: {}", key, e)))
}

fn parse_bool(key: &str, value: &str) -> HoloResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(HoloError::Config(format!("{}: not a boolean: {:?}", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HostConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.tick_interval, Duration::from_millis(33));
        assert_eq!(config.discovery_poll_interval, Duration::from_secs(1));
        assert!(!config.simulation);
        assert_eq!(config.bind_addr.port(), 7410);
        assert_eq!(config.discovery_config().mode, DiscoveryMode::Detector);
    }

    #[test]
    fn test_overrides() {
        let config = HostConfig::from_lookup(lookup(&[
            (ENV_TICK_INTERVAL, "50ms"),
            (ENV_SIMULATION, "true"),
            (ENV_SIMULATION_DELAY, "500ms"),
            (ENV_BIND, "127.0.0.1:9000"),
            (ENV_JSON_LOGS, "1"),
        ]))
        .unwrap();

        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(config.json_logs);
        assert_eq!(
            config.discovery_config().mode,
            DiscoveryMode::Simulated {
                delay: Duration::from_millis(500)
            }
        );
    }

    #[test]
    fn test_bad_values_rejected() {
        for pairs in [
            [(ENV_TICK_INTERVAL, "fast")],
            [(ENV_TICK_INTERVAL, "0s")],
            [(ENV_SIMULATION, "maybe")],
            [(ENV_BIND, "localhost")],
        ] {
            assert!(matches!(
                HostConfig::from_lookup(lookup(&pairs)),
                Err(HoloError::Config(_))
            ));
        }
    }
}

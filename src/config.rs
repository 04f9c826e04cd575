//! Configuration - environment variable parsing

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::game::model::ModeType;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Tick rate for the match (Hz).
    pub tick_rate: u32,
    /// Lines buffered per connection before new ones are dropped.
    pub outbound_capacity: usize,
    /// Level both boards start at.
    pub beginning_level: u32,
    /// Rule mode, resolved once per match.
    pub mode: ModeType,
    /// Log filter (trace, debug, info, warn, error or a full directive).
    pub log_level: String,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            tick_rate: crate::TICK_RATE,
            outbound_capacity: 256,
            beginning_level: 0,
            mode: ModeType::Modern,
            log_level: "info".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `LIGHTBLOCKS_*` environment variables.
    ///
    /// Unset variables keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("LIGHTBLOCKS_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(addr))?;
        }
        if let Some(rate) = lookup("LIGHTBLOCKS_TICK_RATE") {
            config.tick_rate = parse_positive("LIGHTBLOCKS_TICK_RATE", &rate)?;
        }
        if let Some(capacity) = lookup("LIGHTBLOCKS_OUTBOUND_CAPACITY") {
            config.outbound_capacity = parse_positive("LIGHTBLOCKS_OUTBOUND_CAPACITY", &capacity)?;
        }
        if let Some(level) = lookup("LIGHTBLOCKS_BEGINNING_LEVEL") {
            config.beginning_level = level.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "LIGHTBLOCKS_BEGINNING_LEVEL",
                value: level.clone(),
            })?;
        }
        if let Some(mode) = lookup("LIGHTBLOCKS_MODE") {
            config.mode = mode.parse()?;
        }
        if let Some(log_level) = lookup("LIGHTBLOCKS_LOG") {
            config.log_level = log_level;
        }

        Ok(config)
    }
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Ok(value),
        _ => Err(ConfigError::InvalidValue { key, value: raw.to_string() }),
    }
}

impl FromStr for ModeType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(ModeType::Classic),
            "modern" => Ok(ModeType::Modern),
            "mix" => Ok(ModeType::Mix),
            _ => Err(ConfigError::InvalidValue {
                key: "LIGHTBLOCKS_MODE",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Bind address did not parse.
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    /// Value out of range or of the wrong form.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
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
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.mode, ModeType::Modern);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_reads_all_keys() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("LIGHTBLOCKS_BIND_ADDR", "127.0.0.1:9001"),
            ("LIGHTBLOCKS_TICK_RATE", "30"),
            ("LIGHTBLOCKS_OUTBOUND_CAPACITY", "64"),
            ("LIGHTBLOCKS_BEGINNING_LEVEL", "5"),
            ("LIGHTBLOCKS_MODE", "Mix"),
            ("LIGHTBLOCKS_LOG", "lightblocks_match=debug"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9001".parse().unwrap());
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.outbound_capacity, 64);
        assert_eq!(config.beginning_level, 5);
        assert_eq!(config.mode, ModeType::Mix);
        assert_eq!(config.log_level, "lightblocks_match=debug");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("LIGHTBLOCKS_BIND_ADDR", "nowhere")])),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("LIGHTBLOCKS_TICK_RATE", "0")])),
            Err(ConfigError::InvalidValue { key: "LIGHTBLOCKS_TICK_RATE", .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("LIGHTBLOCKS_OUTBOUND_CAPACITY", "-3")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("LIGHTBLOCKS_MODE", "arcade")])),
            Err(ConfigError::InvalidValue { key: "LIGHTBLOCKS_MODE", .. })
        ));
    }
}

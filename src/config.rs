use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
const DEFAULT_HIGH_WATER_MARK: usize = 4;

/// Tuning for a single relay. Constant for the lifetime of one [`relay`](crate::relay) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum bytes read from upstream per iteration. Bounds the relay's
    /// own memory use, whatever the size of the transfer.
    pub chunk_size: NonZeroUsize,

    /// Chunks a [`ChannelSink`](crate::ChannelSink) buffers before drain
    /// suspends the relay.
    pub high_water_mark: NonZeroUsize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            chunk_size: NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
            high_water_mark: NonZeroUsize::new(DEFAULT_HIGH_WATER_MARK)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl RelayConfig {
    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_high_water_mark(mut self, high_water_mark: NonZeroUsize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }

    /// Defaults, overridden by `RELAY_CHUNK_SIZE` and `RELAY_HIGH_WATER_MARK`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = RelayConfig::default();
        if let Some(chunk_size) = positive(&lookup, "RELAY_CHUNK_SIZE")? {
            config.chunk_size = chunk_size;
        }
        if let Some(high_water_mark) = positive(&lookup, "RELAY_HIGH_WATER_MARK")? {
            config.high_water_mark = high_water_mark;
        }
        Ok(config)
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<NonZeroUsize>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<NonZeroUsize>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::num::NonZeroUsize;

    use assert_matches::assert_matches;

    use super::RelayConfig;
    use crate::error::ConfigError;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(65536, config.chunk_size.get());
        assert_eq!(4, config.high_water_mark.get());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: RelayConfig = serde_json::from_str(r#"{"chunk_size": 1024}"#).unwrap();
        assert_eq!(1024, config.chunk_size.get());
        assert_eq!(RelayConfig::default().high_water_mark, config.high_water_mark);
    }

    #[test]
    fn test_deserialize_rejects_zero_chunk() {
        assert!(serde_json::from_str::<RelayConfig>(r#"{"chunk_size": 0}"#).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("RELAY_CHUNK_SIZE", "4096"),
            ("RELAY_HIGH_WATER_MARK", " 2 "),
        ]))
        .unwrap();
        assert_eq!(NonZeroUsize::new(4096), Some(config.chunk_size));
        assert_eq!(NonZeroUsize::new(2), Some(config.high_water_mark));

        let config = RelayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(RelayConfig::default(), config);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        for value in ["0", "-1", "lots"] {
            let err = RelayConfig::from_lookup(lookup(&[("RELAY_CHUNK_SIZE", value)])).unwrap_err();
            assert_matches!(err, ConfigError::InvalidValue { key: "RELAY_CHUNK_SIZE", .. });
        }
    }
}

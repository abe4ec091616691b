use std::fmt;
use std::path::PathBuf;

use chrono_tz::Tz;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
const DEFAULT_COMPACT_THRESHOLD: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding `records.wal`.
    pub data_dir: PathBuf,
    /// Building timezone; decides which calendar day a booking falls on.
    pub timezone: Tz,
    pub metrics_port: Option<u16>,
    /// Serialize conflict check + insert within one manager instance.
    pub serialize_creates: bool,
    /// Compact the WAL on startup once it holds this many entries.
    pub compact_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            timezone: chrono_tz::America::Sao_Paulo,
            metrics_port: None,
            serialize_creates: true,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.var, self.value)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup("CONDOBOOK_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into());

        let tz_name = lookup("CONDOBOOK_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.into());
        let timezone: Tz = tz_name.parse().map_err(|_| ConfigError {
            var: "CONDOBOOK_TIMEZONE",
            value: tz_name.clone(),
        })?;

        let metrics_port = parse_opt(&lookup, "CONDOBOOK_METRICS_PORT")?;
        let compact_threshold =
            parse_opt(&lookup, "CONDOBOOK_COMPACT_THRESHOLD")?.unwrap_or(DEFAULT_COMPACT_THRESHOLD);

        let serialize_creates = match lookup("CONDOBOOK_SERIALIZE_CREATES") {
            None => true,
            Some(v) => match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError {
                        var: "CONDOBOOK_SERIALIZE_CREATES",
                        value: v,
                    });
                }
            },
        };

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            timezone,
            metrics_port,
            serialize_creates,
            compact_threshold,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("records.wal")
    }
}

fn parse_opt<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { var, value: v }),
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.wal_path(), PathBuf::from("./data/records.wal"));
    }

    #[test]
    fn reads_all_vars() {
        let config = Config::from_lookup(lookup(&[
            ("CONDOBOOK_DATA_DIR", "/var/lib/condobook"),
            ("CONDOBOOK_TIMEZONE", "Europe/Lisbon"),
            ("CONDOBOOK_METRICS_PORT", "9100"),
            ("CONDOBOOK_SERIALIZE_CREATES", "off"),
            ("CONDOBOOK_COMPACT_THRESHOLD", "50"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/condobook"));
        assert_eq!(config.timezone, chrono_tz::Europe::Lisbon);
        assert_eq!(config.metrics_port, Some(9100));
        assert!(!config.serialize_creates);
        assert_eq!(config.compact_threshold, 50);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = Config::from_lookup(lookup(&[("CONDOBOOK_TIMEZONE", "Mars/Olympus")])).unwrap_err();
        assert_eq!(err.var, "CONDOBOOK_TIMEZONE");
    }

    #[test]
    fn rejects_bad_port() {
        let err = Config::from_lookup(lookup(&[("CONDOBOOK_METRICS_PORT", "http")])).unwrap_err();
        assert_eq!(err.var, "CONDOBOOK_METRICS_PORT");
        assert!(err.to_string().contains("http"));
    }
}

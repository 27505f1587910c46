//! Runtime configuration, read from environment variables.
//!
//! | Variable                | Default             | Meaning                          |
//! |-------------------------|---------------------|----------------------------------|
//! | `CGMETER_MOUNTS_PATH`   | `/proc/self/mounts` | mount table scanned at startup   |
//! | `CGMETER_INTERVAL_SECS` | `1`                 | seconds between samples          |
//! | `CGMETER_SAMPLES`       | unset               | stop after this many samples     |

use std::path::PathBuf;
use std::time::Duration;

use crate::mounts;

pub const MOUNTS_PATH_VAR: &str = "CGMETER_MOUNTS_PATH";
pub const INTERVAL_VAR: &str = "CGMETER_INTERVAL_SECS";
pub const SAMPLES_VAR: &str = "CGMETER_SAMPLES";

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for environment variable `{name}`")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mounts_path: PathBuf,
    pub interval: Duration,
    /// Number of samples to take before exiting; `None` runs forever.
    pub samples: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mounts_path: PathBuf::from(mounts::SELF_MOUNTS_PATH),
            interval: DEFAULT_INTERVAL,
            samples: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Config::default();

        if let Some(path) = lookup(MOUNTS_PATH_VAR) {
            config.mounts_path = PathBuf::from(path);
        }
        if let Some(value) = lookup(INTERVAL_VAR) {
            config.interval = match value.trim().parse::<f64>() {
                Ok(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
                    .map_err(|_| invalid(INTERVAL_VAR, value.clone()))?,
                _ => return Err(invalid(INTERVAL_VAR, value)),
            };
        }
        if let Some(value) = lookup(SAMPLES_VAR) {
            let samples = value
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid(SAMPLES_VAR, value))?;
            config.samples = Some(samples);
        }

        Ok(config)
    }
}

fn invalid(name: &'static str, value: String) -> Error {
    Error::InvalidValue { name, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.mounts_path, PathBuf::from("/proc/self/mounts"));
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.samples, None);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (MOUNTS_PATH_VAR, "/tmp/mounts"),
            (INTERVAL_VAR, "2.5"),
            (SAMPLES_VAR, "3"),
        ]))
        .unwrap();
        assert_eq!(config.mounts_path, PathBuf::from("/tmp/mounts"));
        assert_eq!(config.interval, Duration::from_millis(2500));
        assert_eq!(config.samples, Some(3));
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            (INTERVAL_VAR, "0"),
            (INTERVAL_VAR, "-2"),
            (INTERVAL_VAR, "fast"),
            (INTERVAL_VAR, "inf"),
            (SAMPLES_VAR, "-1"),
        ] {
            match Config::from_lookup(lookup(&[(name, value)])) {
                Err(Error::InvalidValue { name: n, value: v }) => {
                    assert_eq!(n, name);
                    assert_eq!(v, value);
                }
                other => panic!("expected InvalidValue for {name}={value}, got {other:?}"),
            }
        }
    }
}

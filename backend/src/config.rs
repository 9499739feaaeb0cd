//! Agent configuration, read from a `KEY=VALUE` file.
//!
//! ```text
//! hostname=airlink
//! database_file=/home/airlinkproxy/archive/airlinkproxy.sdb
//! server_port=8000
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::info;

use crate::scheduler::{ScheduleError, Scheduler};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: dotenvy::Error,
    },

    #[error("{key} must be specified in the config file")]
    Missing { key: &'static str },

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub hostname: Option<String>,
    pub port: u16,
    pub server_port: u16,
    pub timeout_secs: u64,
    pub poll_freq_secs: u64,
    pub poll_freq_offset: u64,
    pub archive_interval_secs: u64,
    pub database_file: Option<PathBuf>,
    pub service_name: String,
    pub debug: bool,
    pub log_to_stdout: bool,
    /// Keys present in the file that mean nothing to the agent.
    pub ignored_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: None,
            port: 80,
            server_port: 8000,
            timeout_secs: 15,
            poll_freq_secs: 5,
            poll_freq_offset: 5,
            archive_interval_secs: 60,
            database_file: None,
            service_name: "airlink-proxy".to_string(),
            debug: false,
            log_to_stdout: false,
            ignored_keys: Vec::new(),
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let read_error = |source: dotenvy::Error| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        };

        let pairs = dotenvy::from_path_iter(path)
            .map_err(read_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_error)?;

        Self::from_pairs(pairs)
    }

    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "hostname" => config.hostname = non_empty(value),
                "port" => config.port = parse(&key, &value)?,
                "server_port" => config.server_port = parse(&key, &value)?,
                "timeout_secs" => config.timeout_secs = parse(&key, &value)?,
                "poll_freq_secs" => config.poll_freq_secs = parse(&key, &value)?,
                "poll_freq_offset" => config.poll_freq_offset = parse(&key, &value)?,
                "archive_interval_secs" => config.archive_interval_secs = parse(&key, &value)?,
                "database_file" => config.database_file = non_empty(value).map(PathBuf::from),
                "service_name" => {
                    if let Some(name) = non_empty(value) {
                        config.service_name = name;
                    }
                }
                "debug" => config.debug = parse_bool(&key, &value)?,
                "log_to_stdout" => config.log_to_stdout = parse_bool(&key, &value)?,
                _ => config.ignored_keys.push(key.clone()),
            }
        }

        Ok(config)
    }

    pub fn hostname(&self) -> Result<&str, ConfigError> {
        self.hostname
            .as_deref()
            .ok_or(ConfigError::Missing { key: "hostname" })
    }

    pub fn database_file(&self) -> Result<&Path, ConfigError> {
        self.database_file
            .as_deref()
            .ok_or(ConfigError::Missing {
                key: "database_file",
            })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scheduler(&self) -> Result<Scheduler, ConfigError> {
        Ok(Scheduler::new(
            self.poll_freq_secs,
            self.archive_interval_secs,
            self.poll_freq_offset,
        )?)
    }

    pub fn log_summary(&self, conf_file: &Path) {
        info!("debug                : {}", self.debug);
        info!("log_to_stdout        : {}", self.log_to_stdout);
        info!("conf_file            : {}", conf_file.display());
        info!("version              : {}", env!("CARGO_PKG_VERSION"));
        info!(
            "host:port            : {}:{}",
            self.hostname.as_deref().unwrap_or("<unset>"),
            self.port
        );
        info!("server_port          : {}", self.server_port);
        info!("timeout_secs         : {}", self.timeout_secs);
        info!("poll_freq_secs       : {}", self.poll_freq_secs);
        info!("poll_freq_offset     : {}", self.poll_freq_offset);
        info!("archive_interval_secs: {}", self.archive_interval_secs);
        info!(
            "database_file        : {}",
            self.database_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string())
        );
        info!("service_name         : {}", self.service_name);
        for key in &self.ignored_keys {
            log::debug!("Ignoring unknown configuration key: {}", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_pairs(Vec::new()).unwrap();

        assert_eq!(config, Config::default());
        assert!(matches!(
            config.hostname(),
            Err(ConfigError::Missing { key: "hostname" })
        ));
        assert!(config.database_file().is_err());
        assert!(config.scheduler().is_ok());
        assert_eq!(config.fetch_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_values_and_unknown_keys() {
        let config = Config::from_pairs(pairs(&[
            ("hostname", "airlink.local"),
            ("port", "8080"),
            ("server_port", "9000"),
            ("archive_interval_secs", "300"),
            ("database_file", "/tmp/a/b.sdb"),
            ("debug", "1"),
            ("log_to_stdout", "true"),
            ("colour", "blue"),
        ]))
        .unwrap();

        assert_eq!(config.hostname().unwrap(), "airlink.local");
        assert_eq!(config.port, 8080);
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.archive_interval_secs, 300);
        assert_eq!(config.database_file().unwrap(), Path::new("/tmp/a/b.sdb"));
        assert!(config.debug);
        assert!(config.log_to_stdout);
        assert_eq!(config.ignored_keys, vec!["colour".to_string()]);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_pairs(pairs(&[("port", "eighty")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            Config::from_pairs(pairs(&[("debug", "maybe")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_archive_interval_must_be_multiple_of_poll() {
        let config = Config::from_pairs(pairs(&[("archive_interval_secs", "62")])).unwrap();

        assert!(matches!(
            config.scheduler(),
            Err(ConfigError::Schedule(ScheduleError::NotAMultiple { .. }))
        ));

        let config = Config::from_pairs(pairs(&[("archive_interval_secs", "65")])).unwrap();
        assert!(config.scheduler().is_ok());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# airlink proxy").unwrap();
        writeln!(file, "hostname=airlink").unwrap();
        writeln!(file, "database_file=/var/lib/airlink/airlink.sdb").unwrap();
        writeln!(file, "timeout_secs=3").unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.hostname().unwrap(), "airlink");
        assert_eq!(config.fetch_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_load_rejects_hyphenated_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hostname=airlink").unwrap();
        writeln!(file, "database-file=/var/lib/airlink/airlink.sdb").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("nope.conf")),
            Err(ConfigError::Read { .. })
        ));
    }
}

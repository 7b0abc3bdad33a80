use crate::errors::AppError;
use log::debug;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STATION_SELECTOR: &str = "button.fs-6";
pub const DEFAULT_CONTAINER_SELECTOR: &str = "#uutList";
pub const DEFAULT_REFRESH_MS: u64 = 60_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const MIN_REFRESH_MS: u64 = 10_000;
const TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 1_000..=60_000;

/// Page-level selectors; the per-slot markup signatures are fixed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorConfig {
    pub tester_name: String,
    pub slots_container: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            tester_name: DEFAULT_STATION_SELECTOR.into(),
            slots_container: DEFAULT_CONTAINER_SELECTOR.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

fn enabled_default() -> bool { true }

impl StationConfig {
    /// A station built from a bare URL (command line or prompt).
    pub fn from_url(url: &str) -> Self {
        Self {
            id: "station".into(),
            name: "Station".into(),
            url: url.to_string(),
            enabled: true,
            selectors: SelectorConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    pub testers: Vec<StationConfig>,
    pub refresh_interval: u64,
    pub timeout: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            testers: vec![],
            refresh_interval: DEFAULT_REFRESH_MS,
            timeout: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl RunConfig {
    pub fn single(url: &str) -> Self {
        Self { testers: vec![StationConfig::from_url(url)], ..Self::default() }
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::IO(format!("read config {}: {}", path.display(), e)))?;
        let cfg = Self::from_json(&raw)?;
        debug!("loaded {} testers from {}", cfg.testers.len(), path.display());
        Ok(cfg)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let cfg: RunConfig = serde_json::from_str(raw)?;
        let problems = cfg.validate();
        if !problems.is_empty() {
            return Err(AppError::Config(problems.join(", ")));
        }
        Ok(cfg)
    }

    /// Every problem found, empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (i, t) in self.testers.iter().enumerate() {
            if t.id.is_empty() {
                errors.push(format!("tester at index {} is missing id", i));
            } else if !seen.insert(t.id.as_str()) {
                errors.push(format!("duplicate tester id '{}'", t.id));
            }
            if t.name.is_empty() {
                errors.push(format!("tester at index {} is missing name", i));
            }
            if t.url.is_empty() {
                errors.push(format!("tester at index {} is missing url", i));
            } else if Url::parse(&t.url).is_err() {
                errors.push(format!("tester at index {} has invalid url", i));
            }
        }

        if self.refresh_interval < MIN_REFRESH_MS {
            errors.push(format!("refreshInterval must be at least {}ms", MIN_REFRESH_MS));
        }
        if !TIMEOUT_RANGE_MS.contains(&self.timeout) {
            errors.push(format!(
                "timeout must be between {}ms and {}ms",
                TIMEOUT_RANGE_MS.start(),
                TIMEOUT_RANGE_MS.end()
            ));
        }
        errors
    }

    pub fn enabled(&self) -> impl Iterator<Item = &StationConfig> {
        self.testers.iter().filter(|t| t.enabled)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval)
    }
}

/// `http://<host>:<port>`, as typed at the prompt.
pub fn url_from_host_port(host: &str, port: &str) -> String {
    format!("http://{}:{}", host.trim(), port.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_missing_keys() {
        let cfg = RunConfig::from_json(
            r#"{"testers":[{"id":"ess08","name":"ESS08","url":"http://192.168.140.103:8080","maxRetries":3}]}"#,
        )
        .unwrap();
        assert_eq!(cfg.refresh_interval, DEFAULT_REFRESH_MS);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT_MS);
        let t = &cfg.testers[0];
        assert!(t.enabled);
        assert_eq!(t.selectors, SelectorConfig::default());
    }

    #[test]
    fn collects_all_problems() {
        let cfg = RunConfig {
            testers: vec![
                StationConfig { id: "a".into(), name: "".into(), url: "not a url".into(), enabled: true, selectors: SelectorConfig::default() },
                StationConfig::from_url("http://h:1"),
                StationConfig::from_url("http://h:2"),
            ],
            refresh_interval: 5_000,
            timeout: 500,
        };
        let errs = cfg.validate();
        assert!(errs.iter().any(|e| e.contains("missing name")));
        assert!(errs.iter().any(|e| e.contains("invalid url")));
        assert!(errs.iter().any(|e| e.contains("duplicate tester id 'station'")));
        assert!(errs.iter().any(|e| e.contains("refreshInterval")));
        assert!(errs.iter().any(|e| e.contains("timeout")));
    }

    #[test]
    fn invalid_file_is_config_error() {
        let err = RunConfig::from_json(r#"{"testers":[{"name":"x","url":"http://h:1"}]}"#).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn loads_from_disk_and_filters_disabled() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"testers":[
                {{"id":"a","name":"A","url":"http://10.0.0.1:8080"}},
                {{"id":"b","name":"B","url":"http://10.0.0.2:8080","enabled":false}}
            ],"refreshInterval":15000}}"#
        )
        .unwrap();
        let cfg = RunConfig::load(f.path()).unwrap();
        let ids: Vec<_> = cfg.enabled().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a"]);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(15));
    }

    #[test]
    fn host_port_url() {
        assert_eq!(url_from_host_port(" 10.1.1.2 ", "8080\n"), "http://10.1.1.2:8080");
    }
}

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::dispatch::default_jobs;
use crate::error::MarkerError;
use crate::hits::{DEFAULT_MAX_EVALUE, DEFAULT_MIN_COVERAGE, HitThresholds};
use crate::layout::{DEFAULT_MARKER_SET, RemoteLayout};
use crate::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_RETRIES, RetryPolicy};
use crate::worker::PipelineSettings;

pub const DEFAULT_CONFIG_FILE: &str = "marker-genes.json";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub store: Option<StoreEntry>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub marker_set: Option<String>,
    #[serde(default)]
    pub hmmsearch: Option<String>,
    #[serde(default)]
    pub search_threads: Option<usize>,
    #[serde(default)]
    pub max_evalue: Option<f64>,
    #[serde(default)]
    pub min_coverage: Option<f64>,
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub retries: Option<usize>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEntry {
    Local(String),
    Http(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Local(Utf8PathBuf),
    Http(String),
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub store: StoreLocation,
    pub work_dir: Utf8PathBuf,
    pub hmmsearch: Option<PathBuf>,
    pub search_threads: usize,
    pub jobs: usize,
    pub settings: PipelineSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MarkerError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }
        let content = fs::read_to_string(&config_path)
            .map_err(|_| MarkerError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MarkerError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MarkerError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let store = match config.store {
            Some(StoreEntry::Local(root)) => StoreLocation::Local(Utf8PathBuf::from(root)),
            Some(StoreEntry::Http(url)) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(MarkerError::ConfigParse(format!(
                        "store url must be http(s): {url}"
                    )));
                }
                StoreLocation::Http(url)
            }
            None => StoreLocation::Local(Utf8PathBuf::from("store")),
        };

        let max_evalue = config.max_evalue.unwrap_or(DEFAULT_MAX_EVALUE);
        if !(max_evalue >= 0.0) {
            return Err(MarkerError::ConfigParse(format!(
                "max_evalue must be non-negative: {max_evalue}"
            )));
        }
        let min_coverage = config.min_coverage.unwrap_or(DEFAULT_MIN_COVERAGE);
        if !(0.0..=1.0).contains(&min_coverage) {
            return Err(MarkerError::ConfigParse(format!(
                "min_coverage must be within [0, 1]: {min_coverage}"
            )));
        }

        let marker_set = config
            .marker_set
            .unwrap_or_else(|| DEFAULT_MARKER_SET.to_string());
        if marker_set.is_empty() || marker_set.contains('/') {
            return Err(MarkerError::ConfigParse(format!(
                "invalid marker set name: {marker_set:?}"
            )));
        }

        let retry = RetryPolicy::new(
            config.retries.unwrap_or(DEFAULT_RETRIES),
            Duration::from_millis(config.retry_delay_ms.unwrap_or(DEFAULT_BASE_DELAY_MS)),
        );

        Ok(ResolvedConfig {
            schema_version,
            store,
            work_dir: config
                .work_dir
                .map(Utf8PathBuf::from)
                .unwrap_or_else(default_work_dir),
            hmmsearch: config.hmmsearch.map(PathBuf::from),
            search_threads: config.search_threads.unwrap_or(1).max(1),
            jobs: config.jobs.unwrap_or_else(default_jobs).max(1),
            settings: PipelineSettings {
                layout: RemoteLayout::new(&marker_set),
                retry,
                thresholds: HitThresholds {
                    max_evalue,
                    min_coverage,
                },
            },
        })
    }
}

pub fn default_work_dir() -> Utf8PathBuf {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.cache_dir().join("marker-genes").join("work")).ok()
        })
        .unwrap_or_else(|| Utf8PathBuf::from(".marker-genes"))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_fill_in() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.store, StoreLocation::Local(Utf8PathBuf::from("store")));
        assert_eq!(resolved.settings.layout.marker_set(), "phyeco");
        assert_eq!(resolved.settings.thresholds, HitThresholds::default());
        assert_eq!(resolved.settings.retry.retries, DEFAULT_RETRIES);
        assert!(resolved.jobs >= 1);
    }

    #[test]
    fn parses_http_store() {
        let config: Config = serde_json::from_str(
            r#"{ "store": { "http": "https://objects.example.org/igg" }, "jobs": 8, "min_coverage": 0.4 }"#,
        )
        .unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(
            resolved.store,
            StoreLocation::Http("https://objects.example.org/igg".to_string())
        );
        assert_eq!(resolved.jobs, 8);
        assert_eq!(resolved.settings.thresholds.min_coverage, 0.4);
    }

    #[test]
    fn rejects_coverage_out_of_range() {
        let config = Config {
            min_coverage: Some(1.5),
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(config),
            Err(MarkerError::ConfigParse(_))
        );
    }

    #[test]
    fn unknown_fields_rejected() {
        let parsed = serde_json::from_str::<Config>(r#"{ "genomes": [] }"#);
        assert!(parsed.is_err());
    }
}

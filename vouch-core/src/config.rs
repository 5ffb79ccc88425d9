//! Configuration system for Vouch.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/vouch/config.toml` and/or `.vouch/config.toml`
//! in the workspace directory.

use crate::error::ConfigError;
use crate::scoring::{DEFAULT_MIN_METRIC_THRESHOLD, DeviceCapacities};
use crate::scoring::aggregator::{
    DEFAULT_AGGREGATE_TIMEOUT, DEFAULT_MAX_CONCURRENCY, DEFAULT_METRIC_TIMEOUT,
};
use crate::scoring::weights::WeightTable;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub scoring: ScoringConfig,
    pub repo_host: RepoHostConfig,
    pub lineage: LineageConfig,
    pub registry: RegistryConfig,
}

/// Scoring fan-out, weighting and device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Cut-off for a single metric evaluation.
    pub metric_timeout_ms: u64,
    /// Cut-off for a whole scoring request.
    pub aggregate_timeout_ms: u64,
    /// Evaluations allowed to run at once across all requests.
    pub max_concurrent_evaluations: usize,
    /// Lowest sub-score, per-device size score included, an accepted artifact may have.
    pub min_metric_threshold: f64,
    pub weights: WeightTable,
    pub device_capacities: DeviceCapacities,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            metric_timeout_ms: DEFAULT_METRIC_TIMEOUT.as_millis() as u64,
            aggregate_timeout_ms: DEFAULT_AGGREGATE_TIMEOUT.as_millis() as u64,
            max_concurrent_evaluations: DEFAULT_MAX_CONCURRENCY,
            min_metric_threshold: DEFAULT_MIN_METRIC_THRESHOLD,
            weights: WeightTable::default(),
            device_capacities: DeviceCapacities::default(),
        }
    }
}

/// Repository host (GitHub REST API) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoHostConfig {
    /// When false, host-backed metrics score neutral without any request.
    pub enabled: bool,
    pub api_base: String,
    /// Personal access token; raises the API rate limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for RepoHostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.github.com".into(),
            token: None,
            user_agent: "vouch/1.0".into(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// Insert declared links into the graph before each score computation.
    pub sync_on_score: bool,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            sync_on_score: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON registry file. Unset means the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl RegistryConfig {
    /// Configured path, or `registry.json` under the platform data directory.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            directories::ProjectDirs::from("dev", "vouch", "vouch")
                .map(|dirs| dirs.data_dir().join("registry.json"))
        })
    }
}

impl TrustConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scoring = &self.scoring;
        if scoring.metric_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "scoring.metric_timeout_ms must be positive".into(),
            });
        }
        if scoring.aggregate_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "scoring.aggregate_timeout_ms must be positive".into(),
            });
        }
        if scoring.max_concurrent_evaluations == 0 {
            return Err(ConfigError::Invalid {
                message: "scoring.max_concurrent_evaluations must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&scoring.min_metric_threshold) {
            return Err(ConfigError::Invalid {
                message: "scoring.min_metric_threshold must be within [0, 1]".into(),
            });
        }
        if self.repo_host.enabled && self.repo_host.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "repo_host.request_timeout_secs must be positive".into(),
            });
        }
        scoring.weights.validate()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }
}

/// Load configuration with layered merging.
///
/// Order: defaults, user `config.toml`, workspace `.vouch/config.toml`,
/// `VOUCH_` environment variables, explicit overrides. The merged result is
/// validated before it is returned.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&TrustConfig>,
) -> Result<TrustConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(TrustConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "vouch", "vouch") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".vouch").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // VOUCH_SCORING__METRIC_TIMEOUT_MS, VOUCH_REPO_HOST__TOKEN, ...
    figment = figment.merge(Env::prefixed("VOUCH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: TrustConfig = figment.extract().map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "vouch", "vouch")
        && config_dir.config_dir().join("config.toml").exists()
    {
        return true;
    }
    workspace.is_some_and(|ws| ws.join(".vouch").join("config.toml").exists())
}

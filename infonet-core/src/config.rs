//! Application configuration.
//!
//! Settings are read from a TOML file (every section optional) and Reddit
//! credentials can be supplied or overridden through `REDDIT_*` environment
//! variables so they never need to live in the file.

use crate::{Category, ConfigError};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USERNAME: &str = "REDDIT_USERNAME";
pub const ENV_PASSWORD: &str = "REDDIT_PASSWORD";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub collection: CollectionConfig,
    pub groups: Vec<GroupConfig>,
    pub analysis: AnalysisConfig,
    pub visualization: VisualizationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
    pub api_base_url: String,
    pub token_url: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            username: None,
            password: None,
            user_agent: "script:infonet:v0.1 (misinformation network analysis)".to_string(),
            api_base_url: "https://oauth.reddit.com".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            timeout_secs: 30,
            requests_per_minute: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub query: String,
    pub sort: String,
    pub time_filter: String,
    /// Submissions kept per subreddit.
    pub limit: u32,
    /// Inclusive lower bound on submission creation date (`YYYY-MM-DD`).
    pub start_date: Option<NaiveDate>,
    /// Exclusive upper bound on submission creation date (`YYYY-MM-DD`).
    pub end_date: Option<NaiveDate>,
    /// When non-empty, only records mentioning one of these are kept.
    pub keywords: Vec<String>,
    pub pause_between_subreddits_ms: u64,
    pub max_attempts: u32,
    pub data_dir: PathBuf,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            query: "covid OR vaccine".to_string(),
            sort: "top".to_string(),
            time_filter: "year".to_string(),
            limit: 100,
            start_date: None,
            end_date: None,
            keywords: Vec::new(),
            pause_between_subreddits_ms: 2000,
            max_attempts: 3,
            data_dir: PathBuf::from("reddit_data"),
        }
    }
}

impl CollectionConfig {
    /// Half-open `[start, end)` window as UTC instants.
    pub fn window(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let to_utc = |date: NaiveDate| {
            date.and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive))
        };
        (
            self.start_date.and_then(to_utc),
            self.end_date.and_then(to_utc),
        )
    }

    /// The keyword list used by the original COVID-19 study.
    pub fn covid_keywords() -> Vec<String> {
        [
            "covid", "coronavirus", "pandemic", "vaccine", "pfizer", "moderna", "johnson", "j&j",
            "astrazeneca", "vaccination", "vax", "vaxx", "mrna", "covax", "sars-cov-2",
            "immunization", "booster", "lockdown", "mandate", "jab", "fauci", "cdc", "who",
            "masks",
        ]
        .iter()
        .map(|k| k.to_string())
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub category: Category,
    pub subreddits: Vec<String>,
}

impl GroupConfig {
    pub fn default_groups() -> Vec<GroupConfig> {
        vec![
            GroupConfig {
                category: Category::Misinformation,
                subreddits: [
                    "NoNewNormal",
                    "Conspiracy",
                    "DebateVaccines",
                    "ChurchOfCOVID",
                    "LockdownSkepticism",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
            GroupConfig {
                category: Category::Factual,
                subreddits: [
                    "Coronavirus",
                    "COVID19",
                    "science",
                    "medicine",
                    "Health",
                    "askscience",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub results_dir: PathBuf,
    pub top_n: usize,
    pub top_crossposters: usize,
    pub pagerank_damping: f64,
    pub pagerank_max_iter: usize,
    /// Pivot sources used for approximate betweenness; 0 means exact.
    pub betweenness_samples: usize,
    pub path_length_sample: usize,
    pub seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            top_n: 10,
            top_crossposters: 20,
            pagerank_damping: 0.85,
            pagerank_max_iter: 100,
            betweenness_samples: 500,
            path_length_sample: 500,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub enabled: bool,
    pub max_nodes: usize,
    pub width: u32,
    pub height: u32,
    pub layout_iterations: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_nodes: 1000,
            width: 1600,
            height: 1200,
            layout_iterations: 100,
        }
    }
}

impl AppConfig {
    /// Built-in defaults reproducing the original study.
    pub fn with_defaults() -> Self {
        Self {
            groups: GroupConfig::default_groups(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(content)?;
        if config.groups.is_empty() {
            config.groups = GroupConfig::default_groups();
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given, otherwise the defaults; then apply the environment and validate.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::with_defaults(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override credentials from the environment; `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = non_empty(ENV_CLIENT_ID) {
            debug!("Using {} from environment", ENV_CLIENT_ID);
            self.reddit.client_id = value;
        }
        if let Some(value) = non_empty(ENV_CLIENT_SECRET) {
            self.reddit.client_secret = value;
        }
        if let Some(value) = non_empty(ENV_USERNAME) {
            self.reddit.username = Some(value);
        }
        if let Some(value) = non_empty(ENV_PASSWORD) {
            self.reddit.password = Some(value);
        }
        if let Some(value) = non_empty(ENV_USER_AGENT) {
            self.reddit.user_agent = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for category in Category::ALL {
            let declared = self.groups.iter().filter(|g| g.category == category).count();
            if declared > 1 {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("the {} group is declared {} times", category, declared),
                });
            }

            let has_subreddits = self
                .groups
                .iter()
                .any(|g| g.category == category && !g.subreddits.is_empty());
            if !has_subreddits {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("no subreddits configured for the {} group", category),
                });
            }
        }

        if let Some(blank) = self
            .groups
            .iter()
            .flat_map(|g| g.subreddits.iter())
            .find(|s| s.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "groups.subreddits".to_string(),
                value: format!("'{}'", blank),
            });
        }

        if self.collection.limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collection.limit".to_string(),
                value: "0".to_string(),
            });
        }

        if self.collection.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collection.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }

        if let (Some(start), Some(end)) = (self.collection.start_date, self.collection.end_date) {
            if start >= end {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("start_date {} is not before end_date {}", start, end),
                });
            }
        }

        if !(0.0..1.0).contains(&self.analysis.pagerank_damping) {
            return Err(ConfigError::InvalidValue {
                field: "analysis.pagerank_damping".to_string(),
                value: self.analysis.pagerank_damping.to_string(),
            });
        }

        Ok(())
    }

    /// Credentials must be present before anything talks to Reddit.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.reddit.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: format!("reddit.client_id (or {})", ENV_CLIENT_ID),
            });
        }
        if self.reddit.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: format!("reddit.client_secret (or {})", ENV_CLIENT_SECRET),
            });
        }
        Ok(())
    }

    pub fn group(&self, category: Category) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.category == category)
    }
}

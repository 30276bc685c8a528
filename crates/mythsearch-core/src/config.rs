//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_SEARCH__PAGE_SIZE`). Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Which persisted index format backs the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Faiss,
    Lancedb,
}

/// How many candidates are ranked before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Exhaustive,
    Widening,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub backend: IndexBackend,
    pub index_path: String,
    pub metadata_path: String,
    pub stories_dir: String,
    pub lance_uri: String,
    pub lance_table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Faiss,
            index_path: "vector_db/stories.index".to_string(),
            metadata_path: "vector_db/metadata.json".to_string(),
            stories_dir: "stories".to_string(),
            lance_uri: "vector_db/lancedb".to_string(),
            lance_table: "stories".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub model_dir: String,
    pub dimension: usize,
    pub max_len: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            model_dir: "models/all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            max_len: 256,
            use_fake: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub page_size: usize,
    pub max_pages: usize,
    pub strategy: StrategyKind,
    pub widening_initial_k: usize,
    pub query_timeout_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            max_pages: 50,
            strategy: StrategyKind::Exhaustive,
            widening_initial_k: 100,
            query_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { ttl_secs: 30 * 60 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub session: SessionSettings,
}

impl Settings {
    pub fn validate_for_env(&self, env: &str) -> Result<()> {
        if self.search.page_size == 0 {
            return Err(Error::InvalidConfig("search.page_size must be >= 1".into()));
        }
        if self.search.max_pages == 0 {
            return Err(Error::InvalidConfig("search.max_pages must be >= 1".into()));
        }
        if self.search.widening_initial_k == 0 {
            return Err(Error::InvalidConfig("search.widening_initial_k must be >= 1".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be >= 1".into()));
        }
        match env {
            "prod" | "production" => {
                if self.embedding.use_fake {
                    return Err(Error::InvalidConfig("fake embeddings are not allowed in production".into()));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
    settings: Settings,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_for_env(None)
    }

    pub fn load_for_env(env_name: Option<&str>) -> Result<Self> {
        let env_name = match env_name {
            Some(name) => name.to_string(),
            None => env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()),
        };

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let base_dir = env::current_dir()?;
        let config = Self::from_figment(figment, base_dir)?;
        config.settings.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Builds a config from an already assembled figment; relative paths
    /// resolve against `base_dir`.
    pub fn from_figment(figment: Figment, base_dir: PathBuf) -> Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(Self { figment, settings, base_dir })
    }

    pub fn from_settings(settings: Settings, base_dir: PathBuf) -> Self {
        let figment = Figment::from(Serialized::defaults(settings.clone()));
        Self { figment, settings, base_dir }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Resolves a configured path against the config's base directory.
    pub fn path(&self, raw: &str) -> PathBuf {
        resolve_with_base(&self.base_dir, raw)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

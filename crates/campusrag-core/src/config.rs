//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nesting levels, e.g. `APP_ASSEMBLER__MAX_SIZE=4000`).
//! Every retrieval policy knob lives here so tests and deployments can tune
//! thresholds and weights without code changes.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self::from_figment(figment))
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub router: RouterSettings,
    pub retriever: RetrieverSettings,
    pub merger: MergerSettings,
    pub assembler: AssemblerSettings,
    pub health: HealthSettings,
    pub expansion: ExpansionSettings,
    /// Display label and classifier keywords per department key.
    pub departments: BTreeMap<String, DepartmentSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Directory holding the per-collection LanceDB tables.
    pub root: String,
}

impl Default for StoreSettings {
    fn default() -> Self { Self { root: "data/stores".to_string() } }
}

impl StoreSettings {
    pub fn root_path(&self) -> PathBuf { expand_path(&self.root) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { dimension: 384 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Minimum classifier score (0..=1) a department needs to be selected.
    pub min_confidence: f32,
    /// Upper bound on classifier-selected departments per query.
    pub max_departments: usize,
    /// Share of the classifier score taken from embedding similarity against
    /// department labels; the rest is lexical keyword coverage.
    pub embedding_weight: f32,
}

impl Default for RouterSettings {
    fn default() -> Self { Self { min_confidence: 0.5, max_departments: 2, embedding_weight: 0.0 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    pub k: usize,
    pub min_score: f32,
    pub timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
}

impl Default for RetrieverSettings {
    fn default() -> Self { Self { k: 8, min_score: 0.0, timeout_ms: 1500, retry_backoff_ms: 50, max_retries: 1 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    MinMax,
    Rank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergerSettings {
    pub normalization: Normalization,
    /// Weight for passages from a caller-hinted department.
    pub explicit_weight: f32,
    /// Weight for passages from a classifier-selected department.
    pub inferred_weight: f32,
    /// Weight for passages from the general collection.
    pub general_weight: f32,
}

impl Default for MergerSettings {
    fn default() -> Self {
        Self { normalization: Normalization::MinMax, explicit_weight: 1.3, inferred_weight: 1.1, general_weight: 1.05 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetUnit {
    Chars,
    /// Approximate tokens: words / 0.75.
    Tokens,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerSettings {
    pub max_size: usize,
    pub max_passages: usize,
    /// Shingle overlap at or above which two passages of the same document
    /// count as duplicates.
    pub overlap_threshold: f32,
    pub shingle_size: usize,
    pub unit: BudgetUnit,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self { max_size: 6000, max_passages: 8, overlap_threshold: 0.8, shingle_size: 3, unit: BudgetUnit::Chars }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub probe_timeout_ms: u64,
    pub refresh_interval_secs: u64,
}

impl Default for HealthSettings {
    fn default() -> Self { Self { probe_timeout_ms: 1000, refresh_interval_secs: 30 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionSettings {
    /// Trigger phrase -> related terms appended to the embedded query text.
    pub concepts: BTreeMap<String, Vec<String>>,
    pub max_terms_per_concept: usize,
}

impl Default for ExpansionSettings {
    fn default() -> Self { Self { concepts: BTreeMap::new(), max_terms_per_concept: 2 } }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentSettings {
    pub label: String,
    pub keywords: Vec<String>,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        fn unit_interval(name: &str, v: f32) -> Result<()> {
            if (0.0..=1.0).contains(&v) { Ok(()) } else { Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {v}"))) }
        }
        fn positive(name: &str, v: f32) -> Result<()> {
            if v.is_finite() && v > 0.0 { Ok(()) } else { Err(Error::InvalidConfig(format!("{name} must be positive, got {v}"))) }
        }
        if self.embedding.dimension == 0 { return Err(Error::InvalidConfig("embedding.dimension must be > 0".into())); }
        unit_interval("router.min_confidence", self.router.min_confidence)?;
        unit_interval("router.embedding_weight", self.router.embedding_weight)?;
        if self.retriever.k == 0 { return Err(Error::InvalidConfig("retriever.k must be > 0".into())); }
        if !self.retriever.min_score.is_finite() { return Err(Error::InvalidConfig("retriever.min_score must be finite".into())); }
        if self.retriever.timeout_ms == 0 { return Err(Error::InvalidConfig("retriever.timeout_ms must be > 0".into())); }
        positive("merger.explicit_weight", self.merger.explicit_weight)?;
        positive("merger.inferred_weight", self.merger.inferred_weight)?;
        positive("merger.general_weight", self.merger.general_weight)?;
        if self.assembler.max_size == 0 { return Err(Error::InvalidConfig("assembler.max_size must be > 0".into())); }
        if self.assembler.max_passages == 0 { return Err(Error::InvalidConfig("assembler.max_passages must be > 0".into())); }
        if self.assembler.shingle_size == 0 { return Err(Error::InvalidConfig("assembler.shingle_size must be > 0".into())); }
        unit_interval("assembler.overlap_threshold", self.assembler.overlap_threshold)?;
        Ok(())
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

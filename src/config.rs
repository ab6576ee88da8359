//! Configuration parsing and validation.
//!
//! Settings are read from a TOML file (default `./config/folio.toml`). Every
//! section has defaults, so an empty file is a valid configuration. Secrets
//! are never read from the file: provider credentials come from the
//! environment through [`Credentials::from_env`].
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3000"
//! expose_error_details = false
//!
//! [retrieval]
//! match_count = 5
//! match_threshold = 0.5
//!
//! [generation]
//! primary_model = "gemini-flash-lite-latest"
//! fallback_model = "gemini-flash-latest"
//!
//! [seed]
//! notes_path = "data/notes.md"
//! owner_name = "Jane Doe"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Include upstream error text in 500 responses. Turn off in production.
    #[serde(default = "default_true")]
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            expose_error_details: true,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_match_count")]
    pub match_count: usize,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_count: default_match_count(),
            match_threshold: default_match_threshold(),
        }
    }
}

fn default_match_count() -> usize {
    5
}
fn default_match_threshold() -> f32 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_history: default_max_history(),
            timeout_secs: default_timeout_secs(),
            stream_idle_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_primary_model() -> String {
    "gemini-flash-lite-latest".to_string()
}
fn default_fallback_model() -> String {
    "gemini-flash-latest".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_max_history() -> usize {
    folio_chat_core::history::MAX_HISTORY_TURNS
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RewriteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_primary_model")]
    pub model: String,
    #[serde(default = "default_rewrite_tokens")]
    pub max_output_tokens: u32,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_primary_model(),
            max_output_tokens: default_rewrite_tokens(),
        }
    }
}

fn default_rewrite_tokens() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
        }
    }
}

fn default_embedding_model() -> String {
    "gemini-embedding-001".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Project URL. `SUPABASE_URL` in the environment takes precedence.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_search_function")]
    pub search_function: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            table: default_table(),
            search_function: default_search_function(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_table() -> String {
    "knowledge_chunks".to_string()
}
fn default_search_function() -> String {
    "search_knowledge".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedConfig {
    #[serde(default = "default_notes_path")]
    pub notes_path: PathBuf,
    /// Replaces the built-in profile blocks when set.
    #[serde(default)]
    pub profile_path: Option<PathBuf>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            notes_path: default_notes_path(),
            profile_path: None,
            owner_name: None,
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_notes_path() -> PathBuf {
    PathBuf::from("data/notes.md")
}
fn default_delay_ms() -> u64 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:3000/api/chat".to_string()
}

/// Provider secrets, read from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub store_url: String,
    pub store_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("store_url", &self.store_url)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Resolve credentials from `GEMINI_API_KEY`, `SUPABASE_URL` (or
    /// `store.url`), and `SUPABASE_SERVICE_ROLE_KEY`.
    ///
    /// The error names every missing variable.
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    fn resolve(config: &Config, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let gemini_api_key = present("GEMINI_API_KEY");
        let store_url = present("SUPABASE_URL").or_else(|| config.store.url.clone());
        let store_key = present("SUPABASE_SERVICE_ROLE_KEY");

        let mut missing = Vec::new();
        if gemini_api_key.is_none() {
            missing.push("GEMINI_API_KEY");
        }
        if store_url.is_none() {
            missing.push("SUPABASE_URL");
        }
        if store_key.is_none() {
            missing.push("SUPABASE_SERVICE_ROLE_KEY");
        }

        match (gemini_api_key, store_url, store_key) {
            (Some(gemini_api_key), Some(store_url), Some(store_key)) => Ok(Self {
                gemini_api_key,
                store_url: store_url.trim_end_matches('/').to_string(),
                store_key,
            }),
            _ => bail!("Missing provider credentials: {}", missing.join(", ")),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.match_count == 0 {
        bail!("retrieval.match_count must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.match_threshold) {
        bail!("retrieval.match_threshold must be in [0.0, 1.0]");
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }

    if config.generation.max_output_tokens == 0 || config.rewrite.max_output_tokens == 0 {
        bail!("max_output_tokens must be > 0");
    }

    if config.generation.primary_model.trim().is_empty()
        || config.generation.fallback_model.trim().is_empty()
    {
        bail!("generation.primary_model and generation.fallback_model must be set");
    }

    if config.server.bind.trim().is_empty() {
        bail!("server.bind must not be empty");
    }

    for (key, secs) in [
        ("generation.timeout_secs", config.generation.timeout_secs),
        (
            "generation.stream_idle_timeout_secs",
            config.generation.stream_idle_timeout_secs,
        ),
        ("store.timeout_secs", config.store.timeout_secs),
        ("client.timeout_secs", config.client.timeout_secs),
    ] {
        if secs == 0 {
            bail!("{} must be > 0", key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.retrieval.match_count, 5);
        assert_eq!(config.retrieval.match_threshold, 0.5);
        assert_eq!(config.generation.max_history, 10);
        assert_eq!(config.generation.primary_model, "gemini-flash-lite-latest");
        assert_eq!(config.generation.fallback_model, "gemini-flash-latest");
        assert_eq!(config.store.table, "knowledge_chunks");
        assert_eq!(config.seed.delay_ms, 200);
        assert!(config.rewrite.enabled);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = parse("[retrieval]\nmatch_count = 8\n[server]\nexpose_error_details = false\n")
            .unwrap();
        assert_eq!(config.retrieval.match_count, 8);
        assert_eq!(config.retrieval.match_threshold, 0.5);
        assert!(!config.server.expose_error_details);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse("[retrieval]\nmatch_count = 0\n").is_err());
        assert!(parse("[retrieval]\nmatch_threshold = 1.5\n").is_err());
        assert!(parse("[generation]\nmax_output_tokens = 0\n").is_err());
        assert!(parse("[generation]\nfallback_model = \"\"\n").is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        for section in [
            "[generation]\ntimeout_secs = 0\n",
            "[generation]\nstream_idle_timeout_secs = 0\n",
            "[store]\ntimeout_secs = 0\n",
            "[client]\ntimeout_secs = 0\n",
        ] {
            let err = parse(section).unwrap_err().to_string();
            assert!(err.contains("timeout_secs must be > 0"), "{}: {}", section, err);
        }
        assert!(parse("[client]\ntimeout_secs = 1\n").is_ok());
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(&path, "[seed]\nowner_name = \"Jane Doe\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.seed.owner_name.as_deref(), Some("Jane Doe"));
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_credentials_report_missing_vars() {
        let config = Config::default();
        let env: HashMap<&str, &str> = [("GEMINI_API_KEY", "k")].into_iter().collect();
        let err = Credentials::resolve(&config, |n| env.get(n).map(|v| v.to_string()))
            .unwrap_err()
            .to_string();
        assert!(err.contains("SUPABASE_URL"));
        assert!(err.contains("SUPABASE_SERVICE_ROLE_KEY"));
        assert!(!err.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_credentials_fall_back_to_configured_url() {
        let mut config = Config::default();
        config.store.url = Some("https://project.supabase.co/".to_string());
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "k"),
            ("SUPABASE_SERVICE_ROLE_KEY", "s"),
        ]
        .into_iter()
        .collect();
        let creds =
            Credentials::resolve(&config, |n| env.get(n).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.store_url, "https://project.supabase.co");
    }

    #[test]
    fn test_blank_credentials_count_as_missing() {
        let config = Config::default();
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "  "),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "s"),
        ]
        .into_iter()
        .collect();
        assert!(Credentials::resolve(&config, |n| env.get(n).map(|v| v.to_string())).is_err());
    }
}

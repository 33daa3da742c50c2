use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::{PiataConfig, WarningSeverity};

/// Loads the Piata configuration from disk and the environment.
#[derive(Debug)]
pub struct ConfigLoader {
    config: PiataConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > PIATA_CONFIG env > ~/.piata/piata.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("PIATA_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".piata")
            .join("piata.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> piata_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            PiataConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        // Validate config: log warnings, fail on errors
        let warnings = config.diagnostics();
        let (errors, rest): (Vec<_>, Vec<_>) = warnings
            .into_iter()
            .partition(|w| w.severity == WarningSeverity::Error);
        for w in &rest {
            warn!("{}", w);
        }
        if !errors.is_empty() {
            let field = errors
                .iter()
                .map(|w| w.field.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let reason = errors
                .iter()
                .map(|w| w.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(piata_core::PiataError::ConfigValidation { field, reason });
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse TOML text into a config, naming `path` in any error.
    pub fn parse(raw: &str, path: &Path) -> piata_core::Result<PiataConfig> {
        toml::from_str::<PiataConfig>(raw).map_err(|e| {
            piata_core::PiataError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> PiataConfig {
        self.config.clone()
    }

    /// Path the config was resolved from (it may not exist).
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (PIATA_LLM_MODEL, PIATA_LOG_LEVEL, etc.)
    fn apply_env_overrides(mut config: PiataConfig) -> PiataConfig {
        if let Ok(v) = std::env::var("PIATA_LLM_MODEL") {
            config.llm.model = v;
        }
        if let Ok(v) = std::env::var("PIATA_LLM_BASE_URL") {
            config.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("PIATA_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("PIATA_DB_PATH") {
            config.store.db_path = PathBuf::from(v);
        }
        // API key: config file takes priority, env is the fallback.
        if config.llm.api_key.is_none()
            && let Ok(v) = std::env::var("OPENAI_API_KEY")
        {
            config.llm.api_key = Some(v);
        }
        config
    }
}

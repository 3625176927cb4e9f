use anyhow::{anyhow, bail, Context, Result};
use poisonlab_core::RelayConfig;
use poisonlab_policy::{Variant, DEFAULT_MAX_READ_BYTES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LLM_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Everything the binary needs at startup. Built once, then passed down
/// explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub variant: Variant,
    pub server: ServerConfig,
    pub access: AccessConfig,
    pub llm: LlmConfig,
    pub agent: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins the secure variant accepts. Ignored by the vulnerable variant.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Directory relative paths resolve against. Defaults to the working directory.
    pub base_dir: Option<PathBuf>,
    /// Only enforced by the secure variant.
    pub allowed_roots: Vec<PathBuf>,
    pub audit_log: Option<PathBuf>,
    pub max_read_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Secure,
            server: ServerConfig::default(),
            access: AccessConfig::default(),
            llm: LlmConfig::default(),
            agent: RelayConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            allowed_roots: vec![
                PathBuf::from("demo/user_files"),
                PathBuf::from("demo/public"),
            ],
            audit_log: None,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: 60,
            api_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Read `path` (or start from defaults) and apply `POISONLAB_*` overrides
    /// from the process environment. Call [`AppConfig::validate`] afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("POISONLAB_VARIANT") {
            self.variant = value
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("Invalid POISONLAB_VARIANT")?;
        }
        if let Some(value) = get("POISONLAB_HOST") {
            self.server.host = value;
        }
        if let Some(value) = get("POISONLAB_PORT") {
            self.server.port = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid POISONLAB_PORT: {}", value))?;
        }
        if let Some(value) = get("POISONLAB_LLM_ENDPOINT") {
            self.llm.endpoint = value;
        }
        if let Some(value) = get("POISONLAB_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = get(&self.llm.api_key_env) {
            self.llm.api_key = Some(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.agent.max_iterations == 0 {
            bail!("agent.max_iterations must be at least 1");
        }
        if self.access.max_read_bytes == 0 {
            bail!("access.max_read_bytes must be at least 1");
        }
        if self.llm.endpoint.trim().is_empty() {
            bail!("llm.endpoint must not be empty");
        }
        if self.variant.is_secure() && self.access.allowed_roots.is_empty() {
            bail!("secure variant requires at least one entry in access.allowed_roots");
        }
        Ok(())
    }

    /// Absolute directory relative paths resolve against.
    pub fn base_dir(&self) -> Result<PathBuf> {
        let cwd = || std::env::current_dir().context("Failed to determine working directory");
        match &self.access.base_dir {
            Some(dir) if dir.is_absolute() => Ok(dir.clone()),
            Some(dir) => Ok(cwd()?.join(dir)),
            None => cwd(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.variant, Variant::Secure);
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("POISONLAB_VARIANT", "Vulnerable"),
            ("POISONLAB_PORT", "9001"),
            ("POISONLAB_LLM_MODEL", "gemini-1.5-pro"),
            ("GEMINI_API_KEY", "key-123"),
            ("POISONLAB_HOST", ""),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.variant, Variant::Vulnerable);
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.llm.api_key.as_deref(), Some("key-123"));
    }

    #[test]
    fn test_api_key_env_name_is_configurable() {
        let vars = env(&[("GEMINI_API_KEY", "wrong"), ("MY_KEY", "right")]);
        let mut config = AppConfig::default();
        config.llm.api_key_env = "MY_KEY".to_string();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("right"));
    }

    #[test]
    fn test_bad_env_values_are_rejected() {
        let mut config = AppConfig::default();
        let vars = env(&[("POISONLAB_PORT", "eighty")]);
        assert!(config.apply_env(|k| vars.get(k).cloned()).is_err());

        let vars = env(&[("POISONLAB_VARIANT", "paranoid")]);
        assert!(config.apply_env(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.access.allowed_roots.clear();
        assert!(config.validate().is_err());

        config.variant = Variant::Vulnerable;
        assert!(config.validate().is_ok());

        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_base_dir_resolves_against_cwd() {
        let mut config = AppConfig::default();
        config.access.base_dir = Some(PathBuf::from("sandbox"));
        let base = config.base_dir().unwrap();
        assert!(base.is_absolute());
        assert!(base.ends_with("sandbox"));
    }
}

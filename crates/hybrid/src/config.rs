use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use notecheck_llm::{LlmClient, LlmProvider};
use serde::Deserialize;

use crate::generative::DEFAULT_MIN_CHARS;

pub const DEFAULT_CONFIG: &str = "notecheck.toml";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Settings shared by the service and the CLI. File values are overridden by
/// `NOTECHECK_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotecheckConfig {
    pub provider: String,
    pub model: Option<String>,
    /// Word list or Hunspell `.dic`; a `.aff` beside it is applied.
    pub dictionary: Option<PathBuf>,
    pub min_chars: usize,
    pub bind_addr: String,
}

impl Default for NotecheckConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi.as_str().to_string(),
            model: None,
            dictionary: None,
            min_chars: DEFAULT_MIN_CHARS,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl NotecheckConfig {
    /// Reads `path`, else `NOTECHECK_CONFIG`, else `notecheck.toml`; a missing
    /// file means defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => env::var("NOTECHECK_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG)),
        };
        let config = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            Self::from_toml_str(&contents)?
        } else {
            Self::default()
        };
        config.with_overrides(|key| env::var(key).ok())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| anyhow!("invalid config: {e}"))
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(provider) = var("NOTECHECK_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = var("NOTECHECK_MODEL") {
            self.model = Some(model);
        }
        if let Some(path) = var("NOTECHECK_DICTIONARY") {
            self.dictionary = Some(PathBuf::from(path));
        }
        if let Some(min_chars) = var("NOTECHECK_MIN_CHARS") {
            self.min_chars = min_chars
                .trim()
                .parse()
                .with_context(|| format!("NOTECHECK_MIN_CHARS must be a number, got {min_chars}"))?;
        }
        if let Some(addr) = var("BIND_ADDR") {
            self.bind_addr = addr;
        }
        self.provider()?;
        Ok(self)
    }

    pub fn provider(&self) -> Result<LlmProvider> {
        LlmProvider::from_str(&self.provider)
            .ok_or_else(|| anyhow!("unknown provider {}", self.provider))
    }

    pub fn model(&self) -> Result<String> {
        let provider = self.provider()?;
        Ok(self
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string()))
    }

    /// The configured model client, or `None` when its API key is not set.
    pub fn build_client(&self) -> Result<Option<LlmClient>> {
        let provider = self.provider()?;
        let key_var = provider.api_key_var();
        if env::var(key_var).map(|v| v.trim().is_empty()).unwrap_or(true) {
            tracing::info!(provider = provider.as_str(), "{key_var} not set");
            return Ok(None);
        }
        LlmClient::new(provider, self.model()?).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn toml_values_fill_defaults() {
        let config = NotecheckConfig::from_toml_str(
            "provider = \"anthropic\"\ndictionary = \"dict/en_US.dic\"\n",
        )
        .unwrap();
        assert_eq!(config.provider().unwrap(), LlmProvider::Anthropic);
        assert_eq!(config.model().unwrap(), "claude-3-5-haiku-latest");
        assert_eq!(config.dictionary.as_deref(), Some(Path::new("dict/en_US.dic")));
        assert_eq!(config.min_chars, DEFAULT_MIN_CHARS);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            ("NOTECHECK_PROVIDER", "deepseek"),
            ("NOTECHECK_MODEL", "deepseek-reasoner"),
            ("NOTECHECK_MIN_CHARS", "4"),
            ("BIND_ADDR", " "),
        ]
        .into_iter()
        .collect();
        let config = NotecheckConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.provider().unwrap(), LlmProvider::Deepseek);
        assert_eq!(config.model().unwrap(), "deepseek-reasoner");
        assert_eq!(config.min_chars, 4);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn rejects_unknown_provider_and_bad_numbers() {
        let bad_provider = NotecheckConfig::default()
            .with_overrides(|key| (key == "NOTECHECK_PROVIDER").then(|| "gemini".to_string()));
        assert!(bad_provider.is_err());
        let bad_number = NotecheckConfig::default()
            .with_overrides(|key| (key == "NOTECHECK_MIN_CHARS").then(|| "ten".to_string()));
        assert!(bad_number.is_err());
        assert!(NotecheckConfig::from_toml_str("min_chars = \"x\"").is_err());
    }

    #[test]
    fn load_reads_an_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_chars = 25\nmodel = \"gpt-4o\"").unwrap();
        let config = NotecheckConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.min_chars, 25);
    }
}

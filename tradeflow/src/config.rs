//! Validated run configuration.
//!
//! A [`RunConfig`] can only be obtained through validation: the builder, JSON
//! loading and serde deserialization all funnel through the same checks, so
//! an invalid combination is rejected before any run starts.

use crate::core::{ModelTier, StageId};
use crate::errors::ConfigError;
use crate::pipeline::RetryPolicy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Supported model provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI.
    OpenAi,
    /// Anthropic.
    Anthropic,
    /// Google Gemini.
    Google,
    /// Local Ollama server.
    Ollama,
    /// OpenRouter.
    OpenRouter,
}

impl Provider {
    /// Returns the stable identifier string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Ollama => "ollama",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Returns the endpoint used when no backend URL is configured.
    #[must_use]
    pub const fn default_backend_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/",
            Self::Google => "https://generativelanguage.googleapis.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" => Ok(Self::Google),
            "ollama" => Ok(Self::Ollama),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_deep_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_quick_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_rounds() -> u32 {
    1
}

fn default_online_tools() -> bool {
    true
}

fn default_active_stages() -> Vec<String> {
    StageId::ALL.iter().map(|s| s.as_str().to_string()).collect()
}

fn default_timeout_ms() -> u64 {
    120_000
}

/// Unvalidated configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRunConfig {
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default = "default_deep_model")]
    deep_model: String,
    #[serde(default = "default_quick_model")]
    quick_model: String,
    #[serde(default)]
    backend_url: Option<String>,
    #[serde(default = "default_rounds")]
    max_debate_rounds: u32,
    #[serde(default = "default_rounds")]
    max_risk_rounds: u32,
    #[serde(default = "default_online_tools")]
    online_tools: bool,
    #[serde(default = "default_active_stages")]
    active_stages: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    invocation_timeout_ms: u64,
    #[serde(default)]
    retry: RetryPolicy,
    #[serde(default)]
    results_dir: Option<PathBuf>,
}

impl Default for RawRunConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            deep_model: default_deep_model(),
            quick_model: default_quick_model(),
            backend_url: None,
            max_debate_rounds: default_rounds(),
            max_risk_rounds: default_rounds(),
            online_tools: default_online_tools(),
            active_stages: default_active_stages(),
            invocation_timeout_ms: default_timeout_ms(),
            retry: RetryPolicy::default(),
            results_dir: None,
        }
    }
}

/// Options controlling one pipeline run. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRunConfig")]
pub struct RunConfig {
    provider: Provider,
    deep_model: String,
    quick_model: String,
    backend_url: String,
    max_debate_rounds: u32,
    max_risk_rounds: u32,
    online_tools: bool,
    active_stages: BTreeSet<StageId>,
    invocation_timeout_ms: u64,
    retry: RetryPolicy,
    results_dir: Option<PathBuf>,
}

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = ConfigError;

    fn try_from(raw: RawRunConfig) -> Result<Self, Self::Error> {
        let provider: Provider = raw.provider.parse()?;

        if raw.deep_model.trim().is_empty() {
            return Err(ConfigError::EmptyModel("deep_model"));
        }
        if raw.quick_model.trim().is_empty() {
            return Err(ConfigError::EmptyModel("quick_model"));
        }
        if raw.max_debate_rounds == 0 {
            return Err(ConfigError::InvalidRounds {
                field: "max_debate_rounds",
                value: raw.max_debate_rounds,
            });
        }
        if raw.max_risk_rounds == 0 {
            return Err(ConfigError::InvalidRounds {
                field: "max_risk_rounds",
                value: raw.max_risk_rounds,
            });
        }
        if raw.invocation_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if raw.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryBudget);
        }

        let active_stages = raw
            .active_stages
            .iter()
            .map(|s| s.parse::<StageId>())
            .collect::<Result<BTreeSet<_>, _>>()?;
        if active_stages.is_empty() {
            return Err(ConfigError::NoActiveStages);
        }

        let backend_url = raw
            .backend_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| provider.default_backend_url().to_string());

        Ok(Self {
            provider,
            deep_model: raw.deep_model,
            quick_model: raw.quick_model,
            backend_url,
            max_debate_rounds: raw.max_debate_rounds,
            max_risk_rounds: raw.max_risk_rounds,
            online_tools: raw.online_tools,
            active_stages,
            invocation_timeout_ms: raw.invocation_timeout_ms,
            retry: raw.retry,
            results_dir: raw.results_dir,
        })
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Google,
            deep_model: default_deep_model(),
            quick_model: default_quick_model(),
            backend_url: Provider::Google.default_backend_url().to_string(),
            max_debate_rounds: default_rounds(),
            max_risk_rounds: default_rounds(),
            online_tools: default_online_tools(),
            active_stages: StageId::ALL.into_iter().collect(),
            invocation_timeout_ms: default_timeout_ms(),
            retry: RetryPolicy::default(),
            results_dir: None,
        }
    }
}

impl RunConfig {
    /// Starts a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawRunConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        Self::try_from(raw)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Malformed(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Returns the provider backend.
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Returns the heavy-tier model identifier.
    #[must_use]
    pub fn deep_model(&self) -> &str {
        &self.deep_model
    }

    /// Returns the light-tier model identifier.
    #[must_use]
    pub fn quick_model(&self) -> &str {
        &self.quick_model
    }

    /// Returns the model identifier for a tier.
    #[must_use]
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Deep => &self.deep_model,
            ModelTier::Quick => &self.quick_model,
        }
    }

    /// Returns the provider endpoint.
    #[must_use]
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Returns the research debate round limit.
    #[must_use]
    pub fn max_debate_rounds(&self) -> u32 {
        self.max_debate_rounds
    }

    /// Returns the risk debate round limit.
    #[must_use]
    pub fn max_risk_rounds(&self) -> u32 {
        self.max_risk_rounds
    }

    /// Returns true when analysts should use live data sources.
    #[must_use]
    pub fn online_tools(&self) -> bool {
        self.online_tools
    }

    /// Returns the active stages in canonical order.
    #[must_use]
    pub fn active_stages(&self) -> &BTreeSet<StageId> {
        &self.active_stages
    }

    /// Returns true if the stage is active for this run.
    #[must_use]
    pub fn is_active(&self, stage: StageId) -> bool {
        self.active_stages.contains(&stage)
    }

    /// Returns the per-invocation timeout.
    #[must_use]
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.invocation_timeout_ms)
    }

    /// Returns the retry policy applied to every capability call.
    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the directory final states are saved to, if any.
    #[must_use]
    pub fn results_dir(&self) -> Option<&Path> {
        self.results_dir.as_deref()
    }
}

/// Builder for [`RunConfig`]. Validation happens in [`RunConfigBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    raw: RawRunConfig,
}

impl RunConfigBuilder {
    /// Sets the provider by name (case-insensitive).
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.raw.provider = provider.into();
        self
    }

    /// Sets the heavy-tier model.
    #[must_use]
    pub fn deep_model(mut self, model: impl Into<String>) -> Self {
        self.raw.deep_model = model.into();
        self
    }

    /// Sets the light-tier model.
    #[must_use]
    pub fn quick_model(mut self, model: impl Into<String>) -> Self {
        self.raw.quick_model = model.into();
        self
    }

    /// Sets the backend URL.
    #[must_use]
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.raw.backend_url = Some(url.into());
        self
    }

    /// Sets the research debate round limit.
    #[must_use]
    pub fn max_debate_rounds(mut self, rounds: u32) -> Self {
        self.raw.max_debate_rounds = rounds;
        self
    }

    /// Sets the risk debate round limit.
    #[must_use]
    pub fn max_risk_rounds(mut self, rounds: u32) -> Self {
        self.raw.max_risk_rounds = rounds;
        self
    }

    /// Selects live or cached data sources.
    #[must_use]
    pub fn online_tools(mut self, online: bool) -> Self {
        self.raw.online_tools = online;
        self
    }

    /// Sets the active stages.
    #[must_use]
    pub fn active_stages(mut self, stages: impl IntoIterator<Item = StageId>) -> Self {
        self.raw.active_stages = stages.into_iter().map(|s| s.as_str().to_string()).collect();
        self
    }

    /// Sets the active stages by name; unknown names fail at build time.
    #[must_use]
    pub fn active_stage_names(mut self, stages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.raw.active_stages = stages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-invocation timeout.
    #[must_use]
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.raw.invocation_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.raw.retry = retry;
        self
    }

    /// Sets the directory final states are saved to.
    #[must_use]
    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.results_dir = Some(dir.into());
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<RunConfig, ConfigError> {
        RunConfig::try_from(self.raw)
    }
}

/// Validates a ticker symbol and returns it upper-cased.
pub fn validate_ticker(ticker: &str) -> Result<String, ConfigError> {
    let symbol = ticker.trim().to_ascii_uppercase();
    let valid = (1..=10).contains(&symbol.len())
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '.' || c == '-');
    if valid {
        Ok(symbol)
    } else {
        Err(ConfigError::InvalidTicker(ticker.to_string()))
    }
}

/// Parses a `YYYY-MM-DD` trade date.
pub fn parse_trade_date(date: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidTradeDate(date.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::builder().build().unwrap();
        assert_eq!(config.provider(), Provider::Google);
        assert_eq!(config.deep_model(), "gemini-2.5-pro");
        assert_eq!(config.model_for(ModelTier::Quick), "gemini-2.5-flash");
        assert_eq!(config.max_debate_rounds(), 1);
        assert!(config.online_tools());
        assert_eq!(config.active_stages().len(), 4);
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let err = RunConfig::builder().max_debate_rounds(0).build().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidRounds {
                field: "max_debate_rounds",
                value: 0
            }
        );

        let err = RunConfig::builder().max_risk_rounds(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRounds { field: "max_risk_rounds", .. }));
    }

    #[test]
    fn test_empty_stages_rejected() {
        let err = RunConfig::builder()
            .active_stages(Vec::new())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::NoActiveStages);
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let err = RunConfig::builder()
            .active_stage_names(["market", "options"])
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownStage("options".to_string()));
    }

    #[test]
    fn test_active_stages_use_canonical_order() {
        let config = RunConfig::builder()
            .active_stages([StageId::Fundamentals, StageId::Market, StageId::News])
            .build()
            .unwrap();
        let order: Vec<_> = config.active_stages().iter().copied().collect();
        assert_eq!(order, vec![StageId::Market, StageId::News, StageId::Fundamentals]);
    }

    #[test]
    fn test_provider_parsing_and_backend_default() {
        let config = RunConfig::builder().provider("OpenRouter").build().unwrap();
        assert_eq!(config.provider(), Provider::OpenRouter);
        assert_eq!(config.backend_url(), "https://openrouter.ai/api/v1");

        let err = RunConfig::builder().provider("acme").build().unwrap_err();
        assert_eq!(err, ConfigError::UnknownProvider("acme".to_string()));
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = RunConfig::from_json_str(
            r#"{"provider": "anthropic", "max_risk_rounds": 3, "active_stages": ["news"]}"#,
        )
        .unwrap();
        assert_eq!(config.provider(), Provider::Anthropic);
        assert_eq!(config.max_risk_rounds(), 3);
        assert_eq!(config.max_debate_rounds(), 1);
        assert!(config.is_active(StageId::News));
        assert!(!config.is_active(StageId::Market));
    }

    #[test]
    fn test_deserialize_validates() {
        let result: Result<RunConfig, _> = serde_json::from_str(r#"{"max_debate_rounds": 0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = RunConfig::builder()
            .provider("ollama")
            .max_debate_rounds(2)
            .results_dir("/tmp/results")
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_validate_ticker() {
        assert_eq!(validate_ticker(" brk.b ").unwrap(), "BRK.B");
        assert!(validate_ticker("").is_err());
        assert!(validate_ticker("ABCDEFGHIJK").is_err());
        assert!(validate_ticker("AA PL").is_err());
    }

    #[test]
    fn test_parse_trade_date() {
        let date = parse_trade_date("2024-01-15").unwrap();
        assert_eq!(date.to_string(), "2024-01-15");
        assert!(parse_trade_date("2024-13-01").is_err());
        assert!(parse_trade_date("15/01/2024").is_err());
    }
}

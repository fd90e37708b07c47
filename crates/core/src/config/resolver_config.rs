use std::collections::HashMap;
use std::env;

use crate::config::{parse_bool, ConfigError, ConfigSource};

pub const FAST_INIT_VAR: &str = "WIREGRAPH_FAST_INIT";
pub const FAN_IN_THRESHOLD_VAR: &str = "WIREGRAPH_FAN_IN_THRESHOLD";
pub const DEDUPE_FINDINGS_VAR: &str = "WIREGRAPH_DEDUPE_FINDINGS";

/// Configuration trait shared by wiregraph configuration structs
pub trait ConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Options that tune resolution and strategy selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Provider requests against uncached bindings become inline switching providers
    pub fast_init: bool,
    /// Distinct consumption sites at which a binding needs caching
    pub fan_in_threshold: usize,
    /// Report identical findings raised by several components once
    pub dedupe_findings: bool,
    sources: HashMap<String, ConfigSource>,
}

impl ResolverConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        let mut sources = HashMap::new();
        sources.insert("fast_init".to_string(), ConfigSource::Default("false".to_string()));
        sources.insert("fan_in_threshold".to_string(), ConfigSource::Default("2".to_string()));
        sources.insert("dedupe_findings".to_string(), ConfigSource::Default("true".to_string()));

        Self {
            fast_init: false,
            fan_in_threshold: 2,
            dedupe_findings: true,
            sources,
        }
    }

    /// Enable or disable fast-init provider strategies
    pub fn with_fast_init(mut self, fast_init: bool) -> Self {
        self.fast_init = fast_init;
        self.sources.insert("fast_init".to_string(), ConfigSource::Programmatic);
        self
    }

    /// Set the fan-in caching threshold
    pub fn with_fan_in_threshold(mut self, threshold: usize) -> Self {
        self.fan_in_threshold = threshold;
        self.sources.insert("fan_in_threshold".to_string(), ConfigSource::Programmatic);
        self
    }

    /// Enable or disable finding deduplication
    pub fn with_dedupe_findings(mut self, dedupe: bool) -> Self {
        self.dedupe_findings = dedupe;
        self.sources.insert("dedupe_findings".to_string(), ConfigSource::Programmatic);
        self
    }

    fn read_var(name: &str) -> Result<Option<String>, ConfigError> {
        match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::environment_error(format!(
                "{} is not valid unicode",
                name
            ))),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTrait for ResolverConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(value) = Self::read_var(FAST_INIT_VAR)? {
            config.fast_init = parse_bool("fast_init", &value)?;
            config
                .sources
                .insert("fast_init".to_string(), ConfigSource::EnvVar(FAST_INIT_VAR.to_string()));
        }

        if let Some(value) = Self::read_var(FAN_IN_THRESHOLD_VAR)? {
            config.fan_in_threshold = value.trim().parse().map_err(|_| {
                ConfigError::invalid_value("fan_in_threshold", &value, "an integer >= 2")
            })?;
            config.sources.insert(
                "fan_in_threshold".to_string(),
                ConfigSource::EnvVar(FAN_IN_THRESHOLD_VAR.to_string()),
            );
        }

        if let Some(value) = Self::read_var(DEDUPE_FINDINGS_VAR)? {
            config.dedupe_findings = parse_bool("dedupe_findings", &value)?;
            config.sources.insert(
                "dedupe_findings".to_string(),
                ConfigSource::EnvVar(DEDUPE_FINDINGS_VAR.to_string()),
            );
        }

        config.validate()?;
        tracing::debug!(
            fast_init = config.fast_init,
            fan_in_threshold = config.fan_in_threshold,
            dedupe_findings = config.dedupe_findings,
            "Loaded resolver configuration from environment"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fan_in_threshold < 2 {
            return Err(ConfigError::invalid_value(
                "fan_in_threshold",
                self.fan_in_threshold.to_string(),
                "an integer >= 2",
            ));
        }
        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        self.sources.clone()
    }
}

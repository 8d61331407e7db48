#![forbid(unsafe_code)]

//! Runtime configuration for binding objects.
//!
//! [`BindingConfig`] is plain data passed to every [`BindingObject`] at
//! construction. With the `config-file` feature it can also be loaded from a
//! TOML or JSON document; missing keys fall back to the defaults.
//!
//! ```toml
//! reference_mode = "weak"
//! max_coalesced_rounds = 16
//! skip_redundant_writes = true
//! ```
//!
//! [`BindingObject`]: crate::BindingObject

use std::fmt;

/// How subscription caches hold their source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-file",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ReferenceMode {
    /// Non-owning: a bound item stays collectible while a stale container
    /// still references it.
    #[default]
    Weak,
    /// Owning: every cached source is kept alive until the cache is released.
    Strong,
}

/// Tunables shared by every binding object created from a table.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-file",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BindingConfig {
    /// Reference mode for caches of reference-typed sources.
    pub reference_mode: ReferenceMode,
    /// Upper bound on drain rounds of deferred work after one entry call.
    ///
    /// A circular binding re-queues itself forever; the rest is dropped with a
    /// warning once this many rounds have run.
    pub max_coalesced_rounds: u32,
    /// Skip the target write when the newly evaluated value equals the last
    /// written one.
    pub skip_redundant_writes: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            reference_mode: ReferenceMode::Weak,
            max_coalesced_rounds: 16,
            skip_redundant_writes: true,
        }
    }
}

impl BindingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reference_mode(mut self, mode: ReferenceMode) -> Self {
        self.reference_mode = mode;
        self
    }

    #[must_use]
    pub fn with_max_coalesced_rounds(mut self, rounds: u32) -> Self {
        self.max_coalesced_rounds = rounds.max(1);
        self
    }

    #[must_use]
    pub fn with_skip_redundant_writes(mut self, skip: bool) -> Self {
        self.skip_redundant_writes = skip;
        self
    }

    /// Parse a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validated()
    }

    /// Parse a JSON document.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validated()
    }

    #[cfg(feature = "config-file")]
    fn validated(self) -> Result<Self, ConfigError> {
        if self.max_coalesced_rounds == 0 {
            return Err(ConfigError::Invalid(
                "max_coalesced_rounds must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}

/// Errors from loading a [`BindingConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    Toml(String),
    /// The JSON document could not be parsed.
    Json(String),
    /// The document parsed but holds an unusable value.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toml(msg) => write!(f, "invalid binding config (toml): {msg}"),
            Self::Json(msg) => write!(f, "invalid binding config (json): {msg}"),
            Self::Invalid(msg) => write!(f, "invalid binding config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BindingConfig::default();
        assert_eq!(config.reference_mode, ReferenceMode::Weak);
        assert_eq!(config.max_coalesced_rounds, 16);
        assert!(config.skip_redundant_writes);
    }

    #[test]
    fn builders() {
        let config = BindingConfig::new()
            .with_reference_mode(ReferenceMode::Strong)
            .with_max_coalesced_rounds(0)
            .with_skip_redundant_writes(false);
        assert_eq!(config.reference_mode, ReferenceMode::Strong);
        assert_eq!(config.max_coalesced_rounds, 1, "clamped to at least one round");
        assert!(!config.skip_redundant_writes);
    }

    #[test]
    fn error_display() {
        let err = ConfigError::Invalid("nope".into());
        assert_eq!(err.to_string(), "invalid binding config: nope");
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_partial_document_uses_defaults() {
        let config = BindingConfig::from_toml_str("reference_mode = \"strong\"\n").unwrap();
        assert_eq!(config.reference_mode, ReferenceMode::Strong);
        assert_eq!(config.max_coalesced_rounds, 16);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn json_document() {
        let config =
            BindingConfig::from_json_str(r#"{"max_coalesced_rounds": 4, "skip_redundant_writes": false}"#)
                .unwrap();
        assert_eq!(config.max_coalesced_rounds, 4);
        assert!(!config.skip_redundant_writes);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn zero_rounds_rejected() {
        let err = BindingConfig::from_toml_str("max_coalesced_rounds = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn malformed_toml() {
        let err = BindingConfig::from_toml_str("reference_mode = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}

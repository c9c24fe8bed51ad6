//! Engine configuration
//!
//! One [`EngineConfig`] composes the per-layer settings. Every section is
//! optional in a config file; missing keys keep their defaults.

use std::fs;
use std::path::Path;

use recon_formula::FormulaConfig;
use recon_normalize::NormalizeConfig;
use serde::{Deserialize, Serialize};

/// Errors loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or type error
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or type error
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Extension is neither `.toml` nor `.json`
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Values parse but make no sense
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Surrogate identity settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Prefix of synthesized issue ids
    pub surrogate_prefix: String,
    /// Hex digits of the SHA-256 digest kept after the prefix
    pub surrogate_hex_len: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            surrogate_prefix: "LEGACY-RECOVERED-".to_string(),
            surrogate_hex_len: 16,
        }
    }
}

impl IdentityConfig {
    /// Builder: surrogate prefix
    #[inline]
    #[must_use]
    pub fn with_surrogate_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.surrogate_prefix = prefix.into();
        self
    }

    /// Builder: digest length
    #[inline]
    #[must_use]
    pub fn with_surrogate_hex_len(mut self, len: usize) -> Self {
        self.surrogate_hex_len = len;
        self
    }
}

/// Configuration for a [`Reconciler`](crate::Reconciler)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Legacy grid repair
    pub normalize: NormalizeConfig,
    /// Formula pass bound and totals rounding
    pub formula: FormulaConfig,
    /// Surrogate ids
    pub identity: IdentityConfig,
    /// Stamp adopted cells with where their value came from
    pub stamp_provenance: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            formula: FormulaConfig::default(),
            identity: IdentityConfig::default(),
            stamp_provenance: true,
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: normalizer settings
    #[inline]
    #[must_use]
    pub fn with_normalize(mut self, normalize: NormalizeConfig) -> Self {
        self.normalize = normalize;
        self
    }

    /// Builder: formula settings
    #[inline]
    #[must_use]
    pub fn with_formula(mut self, formula: FormulaConfig) -> Self {
        self.formula = formula;
        self
    }

    /// Builder: identity settings
    #[inline]
    #[must_use]
    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    /// Builder: provenance stamping
    #[inline]
    #[must_use]
    pub fn with_stamp_provenance(mut self, stamp: bool) -> Self {
        self.stamp_provenance = stamp;
        self
    }

    /// Load from a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Parse and validate TOML
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.formula.passes == 0 {
            return Err(ConfigError::Invalid("formula.passes must be at least 1".into()));
        }
        let len = self.identity.surrogate_hex_len;
        if !(4..=64).contains(&len) {
            return Err(ConfigError::Invalid(format!(
                "identity.surrogate_hex_len must be within 4..=64, got {len}"
            )));
        }
        if self.identity.surrogate_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("identity.surrogate_prefix is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.identity.surrogate_prefix, "LEGACY-RECOVERED-");
        assert_eq!(config.identity.surrogate_hex_len, 16);
        assert_eq!(config.formula.passes, 2);
        assert_eq!(config.normalize.difference_row_threshold, 3);
        assert!(config.stamp_provenance);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            "stamp_provenance = false\n[formula]\npasses = 4\n[identity]\nsurrogate_hex_len = 12\n",
        )
        .unwrap();
        assert_eq!(
            config,
            EngineConfig::new()
                .with_stamp_provenance(false)
                .with_formula(FormulaConfig::default().with_passes(4))
                .with_identity(IdentityConfig::default().with_surrogate_hex_len(12))
        );
    }

    #[test]
    fn json_and_validation() {
        let config =
            EngineConfig::from_json_str(r#"{"normalize": {"difference_row_threshold": 5}}"#).unwrap();
        assert_eq!(config.normalize.difference_row_threshold, 5);

        let err = EngineConfig::from_json_str(r#"{"formula": {"passes": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = EngineConfig::from_toml_str("[identity]\nsurrogate_hex_len = 99\n").unwrap_err();
        assert!(err.to_string().contains("surrogate_hex_len"));
    }

    #[test]
    fn load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[formula]\ntotals_precision = 0").unwrap();
        drop(file);
        assert_eq!(EngineConfig::load(&path).unwrap().formula.totals_precision, Some(0));

        let yaml = dir.path().join("engine.yaml");
        fs::write(&yaml, "formula: {}").unwrap();
        assert!(matches!(EngineConfig::load(&yaml), Err(ConfigError::UnsupportedFormat(_))));
        assert!(matches!(
            EngineConfig::load(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}

//! Issue identity resolution
//!
//! Picks the durable id of a snapshot from the strongest signal available.
//! Resolution never fails: when nothing identifies the issue a deterministic
//! surrogate is synthesized from its content, so the same legacy record maps
//! to the same id on every run.

use std::fmt;

use recon_normalize::Snapshot;
use recon_schema::canonical_json;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{ConfigError, IdentityConfig};
use crate::store::MasterStore;

/// Signal the resolved id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Stored `issue_id`
    Explicit,
    /// `template.issue_id`
    Fragment,
    /// Master index lookup by `sop_point`
    SecondaryReference,
    /// Synthesized from content
    Surrogate,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Fragment => "fragment",
            Self::SecondaryReference => "secondary_reference",
            Self::Surrogate => "surrogate",
        })
    }
}

/// Outcome of [`IdentityResolver::resolve`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Resolved id
    pub issue_id: String,
    /// Winning signal
    pub source: IdentitySource,
    /// A stored surrogate was replaced by a stronger signal
    pub corrected: bool,
}

impl Resolution {
    fn new(issue_id: impl Into<String>, source: IdentitySource) -> Self {
        Self {
            issue_id: issue_id.into(),
            source,
            corrected: false,
        }
    }
}

/// Resolves snapshot identities against a master store
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    config: IdentityConfig,
    surrogate_pattern: Regex,
}

impl IdentityResolver {
    /// Compile the surrogate pattern for `config`
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] if the prefix yields an unusable pattern.
    pub fn new(config: IdentityConfig) -> Result<Self, ConfigError> {
        let pattern = format!("^{}[0-9a-fA-F]+$", regex::escape(&config.surrogate_prefix));
        let surrogate_pattern = Regex::new(&pattern)
            .map_err(|e| ConfigError::Invalid(format!("surrogate pattern: {e}")))?;
        Ok(Self {
            config,
            surrogate_pattern,
        })
    }

    /// Settings in use
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Whether `issue_id` was synthesized by a previous run
    #[must_use]
    pub fn is_surrogate(&self, issue_id: &str) -> bool {
        self.surrogate_pattern.is_match(issue_id)
    }

    /// Resolve the durable id of `snapshot`
    ///
    /// Cascade: explicit id (unless it is a surrogate contradicted by a
    /// stronger signal), fragment id, secondary reference for upstream
    /// origins, content surrogate.
    pub fn resolve(&self, snapshot: &Snapshot, store: &dyn MasterStore) -> Resolution {
        if let Some(explicit) = snapshot.explicit_issue_id() {
            if self.is_surrogate(explicit) {
                if let Some(stronger) = self.stronger_signal(snapshot, store) {
                    if stronger.issue_id != explicit {
                        info!(
                            stored = explicit,
                            resolved = %stronger.issue_id,
                            source = %stronger.source,
                            "corrected surrogate issue id"
                        );
                        return Resolution {
                            corrected: true,
                            ..stronger
                        };
                    }
                }
            }
            return Resolution::new(explicit, IdentitySource::Explicit);
        }

        if let Some(fragment) = snapshot.fragment_issue_id() {
            return Resolution::new(fragment, IdentitySource::Fragment);
        }

        if let Some(resolution) = self.by_secondary_reference(snapshot, store) {
            return resolution;
        }

        let surrogate = self.surrogate_id(snapshot);
        debug!(issue_id = %surrogate, origin = %snapshot.origin, "synthesized surrogate issue id");
        Resolution::new(surrogate, IdentitySource::Surrogate)
    }

    /// Deterministic surrogate for `snapshot`
    ///
    /// SHA-256 over the canonical JSON of name, origin and a digest of every
    /// grid payload plus the stored variables.
    #[must_use]
    pub fn surrogate_id(&self, snapshot: &Snapshot) -> String {
        let content = json!({
            "grids": snapshot.grid_payloads().collect::<Vec<_>>(),
            "variables": snapshot.variables,
        });
        let seed = json!({
            "name": snapshot.issue_name().unwrap_or_default(),
            "origin": snapshot.origin.as_str(),
            "content": hex::encode(Sha256::digest(canonical_json(&content).as_bytes())),
        });
        let digest = hex::encode(Sha256::digest(canonical_json(&seed).as_bytes()));
        let len = self.config.surrogate_hex_len.min(digest.len());
        format!("{}{}", self.config.surrogate_prefix, &digest[..len])
    }

    fn stronger_signal(&self, snapshot: &Snapshot, store: &dyn MasterStore) -> Option<Resolution> {
        snapshot
            .fragment_issue_id()
            .filter(|id| !self.is_surrogate(id) && store.contains(id))
            .map(|id| Resolution::new(id, IdentitySource::Fragment))
            .or_else(|| self.by_secondary_reference(snapshot, store))
    }

    fn by_secondary_reference(
        &self,
        snapshot: &Snapshot,
        store: &dyn MasterStore,
    ) -> Option<Resolution> {
        if !snapshot.origin.is_upstream() {
            return None;
        }
        let point = snapshot.sop_point?;
        let master = store.lookup_by_secondary_reference(point)?;
        debug!(point, issue_id = %master.issue_id, "resolved issue id by reference point");
        Some(Resolution::new(master.issue_id, IdentitySource::SecondaryReference))
    }
}

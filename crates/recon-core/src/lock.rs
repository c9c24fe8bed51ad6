//! Lifecycle stages and the edit lock policy
//!
//! Locks are a pure function of `(origin, workflow stage)`. They are never
//! stored on an instance, so moving between construction and hydration
//! cannot change them.

use std::fmt;
use std::str::FromStr;

use recon_normalize::{Origin, OriginKind};
use serde::{Deserialize, Serialize};

/// Workflow stage of the document the issue lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStage {
    /// Being drafted
    #[default]
    Draft,
    /// Issued
    Finalized,
    /// Read-only viewing
    View,
}

impl WorkflowStage {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized => "finalized",
            Self::View => "view",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "finalized" | "final" => Ok(Self::Finalized),
            "view" => Ok(Self::View),
            other => Err(format!("unknown workflow stage: {other}")),
        }
    }
}

/// How an instance came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    /// Created fresh from a master
    ConstructingNew,
    /// Rebuilt from a stored snapshot
    Hydrating,
}

/// One of the three edit locks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// Issue id may not be rebound
    Identity,
    /// Figures and rows may not change
    Structure,
    /// Narrative may not change
    Content,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identity => "identity",
            Self::Structure => "structure",
            Self::Content => "content",
        })
    }
}

/// Edit locks in force for an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locks {
    pub lock_identity: bool,
    pub lock_structure: bool,
    pub lock_content: bool,
}

impl Locks {
    /// Everything locked
    pub const ALL: Self = Self {
        lock_identity: true,
        lock_structure: true,
        lock_content: true,
    };

    /// Nothing locked
    pub const NONE: Self = Self {
        lock_identity: false,
        lock_structure: false,
        lock_content: false,
    };

    /// Policy table
    ///
    /// | origin           | draft                   | finalized / view |
    /// |------------------|-------------------------|------------------|
    /// | upstream-derived | identity, structure     | all              |
    /// | manually-added   | none                    | all              |
    /// | notice-native    | identity                | all              |
    #[must_use]
    pub fn for_issue(origin: &Origin, stage: WorkflowStage) -> Self {
        if stage != WorkflowStage::Draft {
            return Self::ALL;
        }
        match origin.kind() {
            OriginKind::UpstreamDerived => Self {
                lock_identity: true,
                lock_structure: true,
                lock_content: false,
            },
            OriginKind::ManuallyAdded => Self::NONE,
            OriginKind::NoticeNative => Self {
                lock_identity: true,
                lock_structure: false,
                lock_content: false,
            },
        }
    }

    /// Whether `lock` is held
    #[inline]
    #[must_use]
    pub fn is_locked(&self, lock: LockKind) -> bool {
        match lock {
            LockKind::Identity => self.lock_identity,
            LockKind::Structure => self.lock_structure,
            LockKind::Content => self.lock_content,
        }
    }
}

//! Read-only master template lookup

use dashmap::DashMap;
use recon_normalize::NormalizeError;
use recon_schema::IssueTemplate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ReconcileError;

/// Source of master templates
///
/// Implementations hand out owned copies; the engine never mutates a master.
pub trait MasterStore: Send + Sync {
    /// Master by issue id
    fn get(&self, issue_id: &str) -> Option<IssueTemplate>;

    /// Master registered under a secondary reference point
    fn lookup_by_secondary_reference(&self, point: u64) -> Option<IssueTemplate>;

    /// Whether a master exists for `issue_id`
    fn contains(&self, issue_id: &str) -> bool {
        self.get(issue_id).is_some()
    }
}

/// One entry of a masters file: a template plus its optional reference point
#[derive(Debug, Deserialize)]
struct MasterRecord {
    #[serde(default)]
    sop_point: Option<u64>,
    #[serde(flatten)]
    template: IssueTemplate,
}

/// Concurrent in-memory [`MasterStore`]
#[derive(Debug, Default)]
pub struct InMemoryMasterStore {
    templates: DashMap<String, IssueTemplate>,
    by_point: DashMap<u64, String>,
}

impl InMemoryMasterStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a master; its schema hash is refreshed on the way in
    pub fn insert(&self, mut template: IssueTemplate) {
        template.refresh_schema_hash();
        self.templates.insert(template.issue_id.clone(), template);
    }

    /// Register a master reachable by `point` as well as by id
    pub fn insert_with_point(&self, point: u64, template: IssueTemplate) {
        self.by_point.insert(point, template.issue_id.clone());
        self.insert(template);
    }

    /// Builder form of [`insert_with_point`](Self::insert_with_point)
    #[must_use]
    pub fn with_master(self, point: Option<u64>, template: IssueTemplate) -> Self {
        match point {
            Some(point) => self.insert_with_point(point, template),
            None => self.insert(template),
        }
        self
    }

    /// Load from a JSON array of templates, each optionally carrying `sop_point`
    ///
    /// # Errors
    /// [`NormalizeError::InvalidSnapshot`] when the document is not an array
    /// of templates.
    pub fn from_json(raw: &Value) -> Result<Self, ReconcileError> {
        let records: Vec<MasterRecord> = Vec::deserialize(raw)
            .map_err(|e| NormalizeError::invalid_snapshot(format!("masters: {e}")))?;
        let store = Self::new();
        for record in records {
            match record.sop_point {
                Some(point) => store.insert_with_point(point, record.template),
                None => store.insert(record.template),
            }
        }
        debug!(masters = store.len(), points = store.by_point.len(), "loaded master store");
        Ok(store)
    }

    /// Number of masters
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// No masters registered
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl MasterStore for InMemoryMasterStore {
    fn get(&self, issue_id: &str) -> Option<IssueTemplate> {
        self.templates.get(issue_id).map(|entry| entry.value().clone())
    }

    fn lookup_by_secondary_reference(&self, point: u64) -> Option<IssueTemplate> {
        let issue_id = self.by_point.get(&point)?.value().clone();
        self.get(&issue_id)
    }

    fn contains(&self, issue_id: &str) -> bool {
        self.templates.contains_key(issue_id)
    }
}

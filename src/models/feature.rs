use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::portal::{BusinessObject, Criteria, EditState, HandlerRegistry, ParamKind, Scope};

/// The lifecycle state of a feature.
///
/// - `Proposed`: Initial idea, not yet fully specified
/// - `Specified`: Requirements defined, ready for implementation
/// - `Implemented`: Built and deployed
/// - `Deprecated`: No longer active, kept for historical reference
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureState {
    #[default]
    Proposed,
    Specified,
    Implemented,
    Deprecated,
}

impl FeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Specified => "specified",
            Self::Implemented => "implemented",
            Self::Deprecated => "deprecated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "proposed" => Some(Self::Proposed),
            "specified" => Some(Self::Specified),
            "implemented" => Some(Self::Implemented),
            "deprecated" => Some(Self::Deprecated),
            _ => None,
        }
    }
}

/// A stored feature row.
///
/// This is what the database reads and writes, and what a list hands to
/// `fetch_child` as criteria when it loads its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub details: Option<String>,
    pub state: FeatureState,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A feature as a business object.
///
/// Root when fetched on its own by id, child when loaded through a
/// [`FeatureList`](super::FeatureList). Setters mark the object dirty; the
/// portal decides on `save` whether that means insert, update or delete.
#[derive(Debug, Clone)]
pub struct Feature {
    id: Uuid,
    project_id: Uuid,
    title: String,
    details: Option<String>,
    state: FeatureState,
    priority: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    edit: EditState,
}

impl Default for Feature {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            title: String::new(),
            details: None,
            state: FeatureState::default(),
            priority: 0,
            created_at: now,
            updated_at: now,
            edit: EditState::default(),
        }
    }
}

impl BusinessObject for Feature {
    fn edit_state(&self) -> Option<&EditState> {
        Some(&self.edit)
    }

    fn edit_state_mut(&mut self) -> Option<&mut EditState> {
        Some(&mut self.edit)
    }
}

impl Feature {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn state(&self) -> FeatureState {
        self.state
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_new(&self) -> bool {
        self.edit.is_new()
    }

    pub fn is_deleted(&self) -> bool {
        self.edit.is_deleted()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.edit.mark_dirty();
    }

    pub fn set_details(&mut self, details: Option<String>) {
        self.details = details;
        self.edit.mark_dirty();
    }

    pub fn set_state(&mut self, state: FeatureState) {
        self.state = state;
        self.edit.mark_dirty();
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
        self.edit.mark_dirty();
    }

    /// Flag for deletion; the next save removes the row.
    pub fn mark_deleted(&mut self) {
        self.edit.mark_deleted();
    }

    pub fn to_record(&self) -> FeatureRecord {
        FeatureRecord {
            id: self.id,
            project_id: self.project_id,
            title: self.title.clone(),
            details: self.details.clone(),
            state: self.state,
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn load(&mut self, record: FeatureRecord) {
        self.id = record.id;
        self.project_id = record.project_id;
        self.title = record.title;
        self.details = record.details;
        self.state = record.state;
        self.priority = record.priority;
        self.created_at = record.created_at;
        self.updated_at = record.updated_at;
    }

    fn create(&mut self, criteria: &Criteria) -> anyhow::Result<()> {
        let project_id = criteria.uuid(0).context("Project id is required")?;
        let now = Utc::now();
        self.id = Uuid::new_v4();
        self.project_id = project_id;
        self.created_at = now;
        self.updated_at = now;
        Ok(())
    }

    fn insert(&mut self, db: &Database) -> anyhow::Result<()> {
        let now = Utc::now();
        self.created_at = now;
        self.updated_at = now;
        db.insert_feature(&self.to_record())
    }

    fn update(&mut self, db: &Database) -> anyhow::Result<()> {
        self.updated_at = Utc::now();
        if !db.update_feature(&self.to_record())? {
            anyhow::bail!("Feature {} not found", self.id);
        }
        Ok(())
    }

    fn delete(&mut self, db: &Database) -> anyhow::Result<()> {
        if !db.delete_feature(self.id)? {
            anyhow::bail!("Feature {} not found", self.id);
        }
        Ok(())
    }

    /// Register root and child handlers for features.
    ///
    /// Root fetch takes the feature id; child fetch takes a serialized
    /// [`FeatureRecord`] handed down by the owning list.
    pub fn register(registry: &mut HandlerRegistry, db: &Database) {
        for scope in [Scope::Root, Scope::Child] {
            let insert_db = db.clone();
            let update_db = db.clone();
            let delete_db = db.clone();
            registry
                .register::<Feature>()
                .create(scope, [ParamKind::Uuid], |feature, criteria, _| {
                    feature.create(criteria)
                })
                .insert(scope, move |feature, _, _| feature.insert(&insert_db))
                .update(scope, move |feature, _, _| feature.update(&update_db))
                .delete(scope, move |feature, _, _| feature.delete(&delete_db));
        }

        let fetch_db = db.clone();
        registry
            .register::<Feature>()
            .fetch(Scope::Root, [ParamKind::Uuid], move |feature, criteria, _| {
                let id = criteria.uuid(0).context("Feature id is required")?;
                let record = fetch_db
                    .get_feature(id)?
                    .ok_or_else(|| anyhow::anyhow!("Feature {} not found", id))?;
                feature.load(record);
                Ok(())
            })
            .fetch(Scope::Child, [ParamKind::Object], |feature, criteria, _| {
                let record: FeatureRecord = criteria.parse(0).context("Invalid feature row")?;
                feature.load(record);
                Ok(())
            });
    }
}

use std::ops::{Index, IndexMut};

use anyhow::Context;
use uuid::Uuid;

use super::feature::Feature;
use crate::db::Database;
use crate::portal::{
    BusinessObject, ChildPortal, Criteria, EditState, HandlerRegistry, ParamKind, Scope,
};

/// The features of one project, loaded and saved as a unit.
///
/// Each feature is a child: the list fetches them through `fetch_child` and
/// saves them through `update_children`, so every child dispatch passes the
/// same interceptor and activator as the list itself.
#[derive(Debug, Default)]
pub struct FeatureList {
    project_id: Uuid,
    items: Vec<Feature>,
    deleted: Vec<Feature>,
    edit: EditState,
}

impl BusinessObject for FeatureList {
    fn edit_state(&self) -> Option<&EditState> {
        Some(&self.edit)
    }

    fn edit_state_mut(&mut self) -> Option<&mut EditState> {
        Some(&mut self.edit)
    }

    fn is_dirty(&self) -> bool {
        self.edit.is_dirty()
            || !self.deleted.is_empty()
            || self.items.iter().any(|feature| feature.is_dirty())
    }
}

impl FeatureList {
    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Feature> {
        self.items.get_mut(index)
    }

    pub fn find(&self, id: Uuid) -> Option<&Feature> {
        self.items.iter().find(|feature| feature.id() == id)
    }

    pub fn push(&mut self, feature: Feature) {
        self.items.push(feature);
    }

    /// Take a feature out of the list.
    ///
    /// A feature that was never saved is simply dropped; a stored one is kept
    /// aside, marked deleted, and removed from the database on the next save.
    pub fn remove(&mut self, index: usize) -> Option<Uuid> {
        if index >= self.items.len() {
            return None;
        }
        let mut feature = self.items.remove(index);
        let id = feature.id();
        if !feature.is_new() {
            feature.mark_deleted();
            self.deleted.push(feature);
        }
        Some(id)
    }

    fn save_children(&mut self, portal: &mut ChildPortal<'_>) -> anyhow::Result<()> {
        // A child leaves `deleted` as soon as its row is gone; the rest stay queued.
        let mut pending = std::mem::take(&mut self.deleted).into_iter();
        while let Some(mut feature) = pending.next() {
            if let Err(err) = portal.update_child(&mut feature) {
                self.deleted.push(feature);
                self.deleted.extend(pending);
                return Err(err.into());
            }
        }
        portal.update_children(self.items.iter_mut())?;
        Ok(())
    }

    /// Register root handlers for feature lists. Criteria is the project id.
    pub fn register(registry: &mut HandlerRegistry, db: &Database) {
        let fetch_db = db.clone();
        registry
            .register::<FeatureList>()
            .create(Scope::Root, [ParamKind::Uuid], |list, criteria, _| {
                list.project_id = criteria.uuid(0).context("Project id is required")?;
                Ok(())
            })
            .fetch(Scope::Root, [ParamKind::Uuid], move |list, criteria, portal| {
                let project_id = criteria.uuid(0).context("Project id is required")?;
                list.project_id = project_id;
                list.items.clear();
                list.deleted.clear();
                for record in fetch_db.get_features_by_project(project_id)? {
                    let row = serde_json::to_value(&record)?;
                    list.items.push(portal.fetch_child::<Feature>(Criteria::single(row))?);
                }
                Ok(())
            })
            .insert(Scope::Root, |list, _, portal| list.save_children(portal))
            .update(Scope::Root, |list, _, portal| list.save_children(portal));
    }
}

impl Index<usize> for FeatureList {
    type Output = Feature;

    fn index(&self, index: usize) -> &Feature {
        &self.items[index]
    }
}

impl IndexMut<usize> for FeatureList {
    fn index_mut(&mut self, index: usize) -> &mut Feature {
        &mut self.items[index]
    }
}

impl<'a> IntoIterator for &'a FeatureList {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

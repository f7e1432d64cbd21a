//! Business objects served through the data portal.
//!
//! - [`Feature`]: one feature of a project. A root when fetched by id, a child
//!   when loaded through its list.
//! - [`FeatureList`]: all features of one project; owns its children and saves
//!   them through child dispatch.

mod feature;
mod feature_list;

pub use feature::*;
pub use feature_list::*;

use crate::db::Database;
use crate::portal::HandlerRegistry;

/// Register every model's handlers against `db`.
pub fn register(registry: &mut HandlerRegistry, db: &Database) {
    Feature::register(registry, db);
    FeatureList::register(registry, db);
}

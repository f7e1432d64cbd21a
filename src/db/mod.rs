mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::{FeatureRecord, FeatureState};

const FEATURE_COLUMNS: &str =
    "id, project_id, title, details, state, priority, created_at, updated_at";

/// SQLite storage behind the feature handlers.
///
/// Cheap to clone; every clone shares one connection behind a mutex, so
/// handler closures can each own a handle.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    pub fn get_feature(&self, id: Uuid) -> Result<Option<FeatureRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {FEATURE_COLUMNS} FROM features WHERE id = ?"
        ))?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_feature(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_features_by_project(&self, project_id: Uuid) -> Result<Vec<FeatureRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {FEATURE_COLUMNS} FROM features WHERE project_id = ? ORDER BY priority, title"
        ))?;

        let features = stmt
            .query_map([project_id.to_string()], row_to_feature)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(features)
    }

    pub fn insert_feature(&self, feature: &FeatureRecord) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO features (id, project_id, title, details, state, priority, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                feature.id.to_string(),
                feature.project_id.to_string(),
                &feature.title,
                &feature.details,
                feature.state.as_str(),
                feature.priority,
                feature.created_at.to_rfc3339(),
                feature.updated_at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    /// Overwrite the stored row. Returns `false` when no row has that id.
    pub fn update_feature(&self, feature: &FeatureRecord) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE features SET title = ?, details = ?, state = ?, priority = ?, updated_at = ? WHERE id = ?",
            (
                &feature.title,
                &feature.details,
                feature.state.as_str(),
                feature.priority,
                feature.updated_at.to_rfc3339(),
                feature.id.to_string(),
            ),
        )?;
        Ok(rows > 0)
    }

    pub fn delete_feature(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM features WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// `portal.db` under the platform data directory.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "rocket-portal")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("portal.db"))
}

fn row_to_feature(row: &Row<'_>) -> rusqlite::Result<FeatureRecord> {
    Ok(FeatureRecord {
        id: parse_uuid(row.get::<_, String>(0)?),
        project_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        details: row.get(3)?,
        state: FeatureState::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
        priority: row.get(5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

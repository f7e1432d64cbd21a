use chrono::Utc;
use rocket_portal::db::Database;
use rocket_portal::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn record(project_id: Uuid, title: &str, priority: i32) -> FeatureRecord {
    let now = Utc::now();
    FeatureRecord {
        id: Uuid::new_v4(),
        project_id,
        title: title.to_string(),
        details: None,
        state: FeatureState::Proposed,
        priority,
        created_at: now,
        updated_at: now,
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let project_id = Uuid::new_v4();
    }

    describe "features" {
        describe "get_feature" {
            it "returns None for a non-existent feature" {
                let result = db.get_feature(Uuid::new_v4()).expect("Query failed");
                assert!(result.is_none());
            }

            it "returns an inserted feature by id" {
                let mut feature = record(project_id, "Login", 0);
                feature.details = Some("OAuth and password".to_string());
                feature.state = FeatureState::Specified;
                db.insert_feature(&feature).expect("Failed to insert");

                let found = db.get_feature(feature.id).expect("Query failed").expect("Not found");
                assert_eq!(found.title, "Login");
                assert_eq!(found.project_id, project_id);
                assert_eq!(found.details.as_deref(), Some("OAuth and password"));
                assert_eq!(found.state, FeatureState::Specified);
            }
        }

        describe "get_features_by_project" {
            it "orders by priority, then title" {
                db.insert_feature(&record(project_id, "Zebra", 1)).expect("Failed to insert");
                db.insert_feature(&record(project_id, "Beta", 2)).expect("Failed to insert");
                db.insert_feature(&record(project_id, "Alpha", 1)).expect("Failed to insert");

                let features = db.get_features_by_project(project_id).expect("Query failed");
                let titles: Vec<&str> = features.iter().map(|f| f.title.as_str()).collect();
                assert_eq!(titles, vec!["Alpha", "Zebra", "Beta"]);
            }

            it "only returns the project's features" {
                db.insert_feature(&record(project_id, "Mine", 0)).expect("Failed to insert");
                db.insert_feature(&record(Uuid::new_v4(), "Theirs", 0)).expect("Failed to insert");

                let features = db.get_features_by_project(project_id).expect("Query failed");
                assert_eq!(features.len(), 1);
                assert_eq!(features[0].title, "Mine");
            }
        }

        describe "insert_feature" {
            it "rejects a duplicate id" {
                let feature = record(project_id, "Once", 0);
                db.insert_feature(&feature).expect("Failed to insert");

                assert!(db.insert_feature(&feature).is_err());
            }
        }

        describe "update_feature" {
            it "overwrites the stored fields" {
                let mut feature = record(project_id, "Draft", 0);
                db.insert_feature(&feature).expect("Failed to insert");

                feature.title = "Final".to_string();
                feature.state = FeatureState::Implemented;
                feature.priority = 5;
                let updated = db.update_feature(&feature).expect("Update failed");

                assert!(updated);
                let found = db.get_feature(feature.id).expect("Query failed").expect("Not found");
                assert_eq!(found.title, "Final");
                assert_eq!(found.state, FeatureState::Implemented);
                assert_eq!(found.priority, 5);
            }

            it "returns false for a non-existent feature" {
                let updated = db.update_feature(&record(project_id, "Ghost", 0)).expect("Update failed");
                assert!(!updated);
            }
        }

        describe "delete_feature" {
            it "removes the feature" {
                let feature = record(project_id, "Doomed", 0);
                db.insert_feature(&feature).expect("Failed to insert");

                assert!(db.delete_feature(feature.id).expect("Delete failed"));
                assert!(db.get_feature(feature.id).expect("Query failed").is_none());
            }

            it "returns false for a non-existent feature" {
                assert!(!db.delete_feature(Uuid::new_v4()).expect("Delete failed"));
            }
        }
    }

    describe "on disk" {
        it "persists across connections" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("portal.db");
            let feature = record(project_id, "Durable", 0);

            {
                let db = Database::open(path.clone()).expect("Failed to open");
                db.migrate().expect("Failed to migrate");
                db.insert_feature(&feature).expect("Failed to insert");
            }

            let reopened = Database::open(path).expect("Failed to reopen");
            reopened.migrate().expect("Failed to migrate");
            let found = reopened.get_feature(feature.id).expect("Query failed");
            assert_eq!(found.map(|f| f.title), Some("Durable".to_string()));
        }
    }
}

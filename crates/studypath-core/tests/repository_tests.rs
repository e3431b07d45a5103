use studypath_core::config::StorageConfig;
use studypath_core::roadmap::RoadmapStructure;
use studypath_core::storage::{ImportError, RepositoryError, RoadmapPatch};
use studypath_core::{Edge, FileStore, KeyValueStore, MemoryStore, Position, Roadmap, RoadmapRepository, TopicNode};
use tempfile::TempDir;

fn roadmap(topic: &str) -> Roadmap {
    Roadmap::new(
        topic,
        RoadmapStructure {
            nodes: vec![
                TopicNode::new("1", "Basics", 1, 1),
                TopicNode::new("2", "Next Steps", 2, 1),
            ],
            edges: vec![Edge::new("1", "2")],
        },
    )
}

fn listed_ids<S: KeyValueStore>(repo: &RoadmapRepository<S>) -> Vec<String> {
    repo.list_metadata()
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect()
}

#[test]
fn test_save_and_get() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    let saved = roadmap("Rust");
    repo.save(&saved).unwrap();

    assert_eq!(repo.get(&saved.id).unwrap(), Some(saved.clone()));
    assert_eq!(listed_ids(&repo), vec![saved.id]);
    assert_eq!(repo.get("missing").unwrap(), None);
}

#[test]
fn test_newest_first_and_eviction() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    let roadmaps: Vec<Roadmap> = (0..11).map(|i| roadmap(&format!("Topic {i}"))).collect();

    for r in &roadmaps[..10] {
        repo.save(r).unwrap();
    }
    assert_eq!(listed_ids(&repo).len(), 10);
    assert_eq!(listed_ids(&repo)[0], roadmaps[9].id);

    repo.save(&roadmaps[10]).unwrap();

    let ids = listed_ids(&repo);
    assert_eq!(ids.len(), 10);
    assert_eq!(ids[0], roadmaps[10].id);
    assert!(!ids.contains(&roadmaps[0].id));
    assert_eq!(repo.get(&roadmaps[0].id).unwrap(), None);
    assert!(repo.get(&roadmaps[1].id).unwrap().is_some());

    let config = StorageConfig::default();
    assert_eq!(repo.store().get(&config.roadmap_key(&roadmaps[0].id)).unwrap(), None);
}

#[test]
fn test_corrupt_aggregate_self_heals() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    let config = StorageConfig::default();
    let good = roadmap("Good");
    let bad = roadmap("Bad");
    repo.save(&good).unwrap();
    repo.save(&bad).unwrap();

    repo.store()
        .set(&config.roadmap_key(&bad.id), r#"{"id": 42, "nodes": "nope"}"#)
        .unwrap();

    assert_eq!(repo.get(&bad.id).unwrap(), None);
    assert_eq!(listed_ids(&repo), vec![good.id.clone()]);
    assert_eq!(repo.store().get(&config.roadmap_key(&bad.id)).unwrap(), None);
    assert!(repo.get(&good.id).unwrap().is_some());
}

#[test]
fn test_corrupt_list_cleared() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    let config = StorageConfig::default();
    repo.store().set(&config.list_key(), "not json").unwrap();

    assert!(repo.list_metadata().unwrap().is_empty());
    assert_eq!(repo.store().get(&config.list_key()).unwrap(), None);
}

#[test]
fn test_legacy_completion_discarded() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    let config = StorageConfig::default();
    let saved = roadmap("Legacy");
    repo.save(&saved).unwrap();

    let mut doc = serde_json::to_value(&saved).unwrap();
    let obj = doc.as_object_mut().unwrap();
    obj.remove("completedResources");
    obj.insert("completedNodes".to_string(), serde_json::json!(["1"]));
    repo.store()
        .set(&config.roadmap_key(&saved.id), &doc.to_string())
        .unwrap();

    let loaded = repo.get(&saved.id).unwrap().unwrap();
    assert!(loaded.completed_resources.is_empty());
    assert_eq!(loaded.nodes, saved.nodes);
}

#[test]
fn test_import_assigns_new_id() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    let mut original = roadmap("Rust");
    original.toggle_resource_complete("1", "resource_1");
    repo.save(&original).unwrap();

    let exported = repo.export(&original.id).unwrap();
    let imported = repo.import(&exported).unwrap();

    assert_ne!(imported.id, original.id);
    assert_eq!(imported.topic, original.topic);
    assert_eq!(imported.completed_resources, original.completed_resources);
    assert_eq!(repo.get(&original.id).unwrap(), Some(original.clone()));
    assert_eq!(listed_ids(&repo), vec![imported.id, original.id]);
}

#[test]
fn test_import_rejects_bad_documents() {
    let repo = RoadmapRepository::new(MemoryStore::new());

    assert!(matches!(repo.import("{ not json"), Err(ImportError::InvalidJson(_))));
    assert!(matches!(
        repo.import(r#"{"topic": "x", "title": "x", "edges": []}"#),
        Err(ImportError::Schema(_))
    ));
    assert!(repo.list_metadata().unwrap().is_empty());
}

#[test]
fn test_import_fills_defaults() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    let raw = r#"{
        "topic": "SQL",
        "title": "SQL Roadmap",
        "nodes": [
            {"id": "1", "data": {"label": "Select", "description": "Queries", "level": 1, "category": "core"}}
        ],
        "edges": []
    }"#;

    let imported = repo.import(raw).unwrap();
    assert_eq!(imported.node_count, 1);
    assert!(imported.completed_resources.is_empty());
    assert!(!imported.nodes[0].is_fetched());
    assert_eq!(repo.get(&imported.id).unwrap(), Some(imported));
}

#[test]
fn test_quota_failure_leaves_previous_state() {
    let first = roadmap("First");
    let second = roadmap("Second");

    let probe = RoadmapRepository::new(MemoryStore::new());
    probe.save(&first).unwrap();
    let needed = probe.store().used_bytes();

    let repo = RoadmapRepository::new(MemoryStore::with_quota(needed + 64));
    repo.save(&first).unwrap();

    let result = repo.save(&second);
    assert!(matches!(result, Err(RepositoryError::StorageQuotaExceeded(_))));
    assert_eq!(listed_ids(&repo), vec![first.id.clone()]);
    assert_eq!(repo.get(&second.id).unwrap(), None);
    assert_eq!(repo.get(&first.id).unwrap(), Some(first));
}

#[test]
fn test_unavailable_store() {
    let repo = RoadmapRepository::new(MemoryStore::unavailable());
    assert!(matches!(
        repo.save(&roadmap("Rust")),
        Err(RepositoryError::StorageUnavailable(_))
    ));
    let info = repo.storage_info();
    assert!(!info.available);
    assert_eq!(info.roadmap_count, 0);
}

#[test]
fn test_update_patch() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    let saved = roadmap("Rust");
    repo.save(&saved).unwrap();

    let updated = repo
        .update(
            &saved.id,
            RoadmapPatch {
                title: Some("Rust, Properly".to_string()),
                last_position: Some(Some(Position::new("2", 0))),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.title, "Rust, Properly");
    assert!(updated.updated_at >= saved.updated_at);
    let listed = repo.list_metadata().unwrap();
    assert_eq!(listed[0].title, "Rust, Properly");
    assert_eq!(
        repo.get(&saved.id).unwrap().unwrap().last_position,
        Some(Position::new("2", 0))
    );

    assert!(matches!(
        repo.update("missing", RoadmapPatch::default()),
        Err(RepositoryError::NotFound(_))
    ));
}

#[test]
fn test_clear_all_keeps_foreign_keys() {
    let repo = RoadmapRepository::new(MemoryStore::new());
    repo.save(&roadmap("One")).unwrap();
    repo.save(&roadmap("Two")).unwrap();
    repo.store().set("other_app_setting", "1").unwrap();

    repo.clear_all().unwrap();

    assert!(repo.list_metadata().unwrap().is_empty());
    assert_eq!(repo.store().list_keys().unwrap(), vec!["other_app_setting"]);
    assert_eq!(repo.storage_info().roadmap_count, 0);
}

#[test]
fn test_file_store_round_trip() {
    let temp = TempDir::new().unwrap();
    let config = StorageConfig {
        data_dir: temp.path().join("data").to_string_lossy().to_string(),
        max_roadmaps: 2,
        ..StorageConfig::default()
    };
    let repo = RoadmapRepository::with_config(FileStore::with_config(&config), config.clone());

    let a = roadmap("A");
    let b = roadmap("B");
    let c = roadmap("C");
    for r in [&a, &b, &c] {
        repo.save(r).unwrap();
    }

    assert_eq!(listed_ids(&repo), vec![c.id.clone(), b.id.clone()]);
    assert_eq!(repo.get(&c.id).unwrap(), Some(c.clone()));
    assert!(!temp
        .path()
        .join("data")
        .join(format!("{}.json", config.roadmap_key(&a.id)))
        .exists());

    // A second repository over the same directory sees the same data.
    let reopened = RoadmapRepository::with_config(FileStore::with_config(&config), config);
    assert_eq!(reopened.list_roadmaps().unwrap(), vec![c, b]);

    assert!(matches!(reopened.export(&a.id), Err(RepositoryError::NotFound(_))));
}

#[test]
fn test_unrepresentable_id_is_absent() {
    let temp = TempDir::new().unwrap();
    let config = StorageConfig {
        data_dir: temp.path().to_string_lossy().to_string(),
        ..StorageConfig::default()
    };
    let repo = RoadmapRepository::with_config(FileStore::with_config(&config), config);
    let kept = roadmap("Rust");
    repo.save(&kept).unwrap();

    for id in ["foo.bar", "../escape", "a/b"] {
        assert_eq!(repo.get(id).unwrap(), None);
        assert!(repo.delete(id).is_ok());
        assert!(matches!(repo.export(id), Err(RepositoryError::NotFound(_))));
    }
    assert_eq!(listed_ids(&repo), vec![kept.id]);
}

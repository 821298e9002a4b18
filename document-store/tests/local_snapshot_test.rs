use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use kb_document_store::{DocumentMetadata, DocumentStore, LocalStore, NewDocument};

#[tokio::test]
async fn test_loads_snapshot_written_by_older_versions() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("knowledge_documents.json");
    let snapshot = json!([
        {"id": 0, "text": "Badges must be worn.", "metadata": {"title": "Badges"}, "embedding": "[0.25, 0.5]"},
        {"id": "1", "text": "Desks are hot-desked.", "metadata": "{\"category\": \"office\"}", "embedding": "(1.0, 2.0)"},
        {"id": "2", "metadata": {}, "embedding": [0.0, 0.0]},
        {"id": "3", "text": "Printers are on floor 2.", "embedding": null}
    ]);
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot).unwrap()).unwrap();

    let store = LocalStore::new(&path);
    let documents = store.load().await.unwrap();

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "3"]);
    assert_eq!(documents[0].embedding, Some(vec![0.25, 0.5]));
    assert_eq!(documents[1].metadata.category, "office");
    assert_eq!(documents[1].embedding, Some(vec![1.0, 2.0]));
    assert_eq!(documents[2].embedding, None);
    assert_eq!(documents[2].metadata, DocumentMetadata::default());

    let added = store
        .insert(NewDocument {
            text: "Lunch is at noon.".to_string(),
            metadata: DocumentMetadata::new("Lunch", "Handbook", "office"),
            embedding: vec![0.5, 0.5],
        })
        .await
        .unwrap();
    // Ids stay unique past rows that were not loaded.
    assert_eq!(added.id, "4");

    // Existing rows are written back untouched, the new one is appended.
    let rewritten: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let rows = rewritten.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(&rows[..4], &snapshot.as_array().unwrap()[..]);
    assert_eq!(rows[4]["id"], json!("4"));
    assert_eq!(rows[4]["embedding"], json!([0.5, 0.5]));
    assert_eq!(rows[4]["metadata"]["title"], json!("Lunch"));

    // The legacy rows still load the same way after the rewrite.
    let reloaded = LocalStore::new(&path).load().await.unwrap();
    let ids: Vec<&str> = reloaded.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "3", "4"]);
}

#[tokio::test]
async fn test_rows_with_bad_fields_are_not_lost_on_insert() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("knowledge_documents.json");
    let snapshot = json!([
        {"id": null, "text": "legacy row imported before ids were assigned"},
        {"id": "1", "text": "Expense claims go to HR.", "metadata": {"title": 5, "source": "HR"}}
    ]);
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot).unwrap()).unwrap();

    let store = LocalStore::new(&path);
    let documents = store.load().await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].metadata, DocumentMetadata::new("", "HR", ""));

    store
        .insert(NewDocument {
            text: "Parking is free.".to_string(),
            metadata: DocumentMetadata::new("Parking", "Handbook", "office"),
            embedding: vec![1.0],
        })
        .await
        .unwrap();

    let rewritten: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(rewritten[0], snapshot[0]);
    assert_eq!(rewritten[1]["metadata"]["source"], json!("HR"));
    assert_eq!(rewritten[1]["metadata"]["title"], json!(5));
    assert_eq!(rewritten[2]["text"], json!("Parking is free."));
}

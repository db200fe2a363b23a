use super::*;
use crate::config::DistanceMetric;
use tempfile::TempDir;

#[test]
fn document_constructor_sets_class() {
    let object = StoredObject::document("Paris is the capital of France.", vec![0.1, 0.2]);

    assert_eq!(object.class, DOCUMENT_CLASS);
    assert_eq!(object.text, "Paris is the capital of France.");
    assert_eq!(object.vector.len(), 2);
}

#[test]
fn stored_object_serialization() {
    let object = StoredObject::document("Test content", vec![0.5, 0.25]);

    let json = serde_json::to_string(&object).expect("can serialize json");
    let deserialized: StoredObject = serde_json::from_str(&json).expect("can parse json");

    assert_eq!(object, deserialized);
}

#[tokio::test]
async fn opens_memory_backend() {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    config.store.distance = DistanceMetric::Cosine;

    let store = open_vector_store(&config)
        .await
        .expect("should open memory store");
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn opens_lancedb_backend() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };

    let store = open_vector_store(&config)
        .await
        .expect("should open lancedb store");
    assert_eq!(store.count().await.expect("should count"), 0);
}

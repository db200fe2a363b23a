use super::*;
use crate::config::Config;
use tempfile::TempDir;

fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    (config, temp_dir)
}

fn test_objects() -> Vec<StoredObject> {
    vec![
        StoredObject::document("Paris is the capital of France.", vec![1.0, 0.0, 0.0]),
        StoredObject::document("Berlin is the capital of Germany.", vec![0.0, 1.0, 0.0]),
        StoredObject::document("Tropical flowers need humidity.", vec![0.0, 0.0, 1.0]),
        StoredObject::document("Lyon is a city in France.", vec![0.9, 0.1, 0.0]),
    ]
}

#[tokio::test]
async fn vector_store_initialization() {
    let (config, _temp_dir) = create_test_config();

    let store = LanceVectorStore::new(&config)
        .await
        .expect("should create vector store");

    assert_eq!(store.table_name, "Document");
    assert_eq!(store.count().await.expect("should count"), 0);
    assert_eq!(
        store.vector_dimension().await.expect("should read dimension"),
        None
    );
}

#[tokio::test]
async fn query_before_first_insert_is_empty() {
    let (config, _temp_dir) = create_test_config();
    let store = LanceVectorStore::new(&config)
        .await
        .expect("should create vector store");

    let matches = store
        .nearest_neighbors(&[1.0, 0.0, 0.0], 3, &["text"], &CancellationToken::new())
        .await
        .expect("search should succeed");

    assert!(matches.is_empty());
}

#[tokio::test]
async fn store_and_search_batch() {
    let (config, _temp_dir) = create_test_config();
    let store = LanceVectorStore::new(&config)
        .await
        .expect("should create vector store");

    store
        .batch_insert(test_objects(), &CancellationToken::new())
        .await
        .expect("batch insert should succeed");

    assert_eq!(store.count().await.expect("should count"), 4);
    assert_eq!(
        store.vector_dimension().await.expect("should read dimension"),
        Some(3)
    );

    let matches = store
        .nearest_neighbors(&[1.0, 0.0, 0.0], 3, &["text"], &CancellationToken::new())
        .await
        .expect("search should succeed");

    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0]["text"], "Paris is the capital of France.");
    assert_eq!(matches[1]["text"], "Lyon is a city in France.");
    assert!(matches.iter().all(|m| m.len() == 1));
}

#[tokio::test]
async fn reopen_finds_existing_table() {
    let (config, _temp_dir) = create_test_config();

    {
        let store = LanceVectorStore::new(&config)
            .await
            .expect("should create vector store");
        store
            .batch_insert(test_objects(), &CancellationToken::new())
            .await
            .expect("batch insert should succeed");
    }

    let reopened = LanceVectorStore::new(&config)
        .await
        .expect("should reopen vector store");
    assert_eq!(reopened.count().await.expect("should count"), 4);

    reopened
        .batch_insert(
            vec![StoredObject::document("Madrid is in Spain.", vec![0.5, 0.5, 0.0])],
            &CancellationToken::new(),
        )
        .await
        .expect("append should succeed");
    assert_eq!(reopened.count().await.expect("should count"), 5);
}

#[tokio::test]
async fn empty_batch_is_noop() {
    let (config, _temp_dir) = create_test_config();
    let store = LanceVectorStore::new(&config)
        .await
        .expect("should create vector store");

    store
        .batch_insert(Vec::new(), &CancellationToken::new())
        .await
        .expect("empty insert should succeed");

    assert_eq!(store.count().await.expect("should count"), 0);
}

#[test]
fn mixed_dimensions_in_one_batch_are_rejected() {
    let objects = vec![
        StoredObject::document("a", vec![1.0, 2.0]),
        StoredObject::document("b", vec![1.0]),
    ];

    assert!(create_record_batch(&objects).is_err());
}

#[test]
fn record_batch_layout() {
    let batch = create_record_batch(&test_objects()).expect("should build record batch");

    assert_eq!(batch.num_rows(), 4);
    assert_eq!(batch.num_columns(), 5);

    let parsed = parse_search_batch(&batch, &["text", "class", "vector", "missing"]);
    assert_eq!(parsed.len(), 4);
    assert_eq!(parsed[0]["text"], "Paris is the capital of France.");
    assert_eq!(parsed[0]["class"], "Document");
    assert_eq!(parsed[0]["vector"], serde_json::json!([1.0, 0.0, 0.0]));
    assert!(!parsed[0].contains_key("missing"));
}

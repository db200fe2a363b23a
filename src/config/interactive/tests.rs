use super::load_existing_config as load_existing_config_impl;
use tempfile::TempDir;

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "not [valid toml")
        .expect("should write config file");

    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert!(!config.ollama.host.is_empty());
    assert!(!config.ollama.embedding_model.is_empty());
    assert!(config.server.port > 0);
}

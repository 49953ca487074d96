use actions_board::registry::{Registry, RegistryError};
use actions_board::storage::{ADDED_REPOS_KEY, JsonFileStore, KeyValueStore};

fn full_names(registry: &Registry) -> Vec<String> {
    registry
        .list()
        .unwrap()
        .into_iter()
        .map(|r| r.full_name)
        .collect()
}

#[test]
fn registry_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state.json");

    {
        let mut registry = Registry::new(JsonFileStore::new(&path));
        registry.add("octocat", "Hello-World").unwrap();
        registry.add("rust-lang", "cargo").unwrap();
        registry.set_auto_refresh(true).unwrap();
    }

    let mut registry = Registry::new(JsonFileStore::new(&path));
    assert_eq!(full_names(&registry), ["octocat/Hello-World", "rust-lang/cargo"]);
    assert!(registry.auto_refresh_enabled().unwrap());

    registry.remove("OCTOCAT", "hello-world").unwrap();
    let reopened = Registry::new(JsonFileStore::new(&path));
    assert_eq!(full_names(&reopened), ["rust-lang/cargo"]);
}

#[test]
fn persisted_layout_uses_shared_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut registry = Registry::new(JsonFileStore::new(&path));
    registry.add("octocat", "Hello-World").unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let repos: serde_json::Value =
        serde_json::from_str(raw[ADDED_REPOS_KEY].as_str().unwrap()).unwrap();
    assert_eq!(repos[0]["owner"], "octocat");
    assert_eq!(repos[0]["name"], "Hello-World");
    assert_eq!(repos[0]["full_name"], "octocat/Hello-World");
}

#[test]
fn corrupt_state_file_reads_as_empty_and_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let mut registry = Registry::new(JsonFileStore::new(&path));
    assert!(registry.list().unwrap().is_empty());
    registry.add("octocat", "Hello-World").unwrap();
    assert_eq!(full_names(&registry), ["octocat/Hello-World"]);
}

#[test]
fn malformed_repo_list_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut store = JsonFileStore::new(&path);
    store
        .set(ADDED_REPOS_KEY, r#"{"owner":"octocat","name":"Hello-World"}"#)
        .unwrap();

    let registry = Registry::new(store);
    assert!(registry.list().unwrap().is_empty());
}

#[test]
fn duplicate_add_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut registry = Registry::new(JsonFileStore::new(&path));
    registry.add("octocat", "Hello-World").unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let err = registry.add("Octocat", "HELLO-WORLD").unwrap_err();
    assert!(matches!(err, RegistryError::Duplicate { .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

use super::*;

#[test]
fn missing_preference_is_light() {
    assert_eq!(load(&ClientStorage::in_memory()), Theme::Light);
}

#[test]
fn unknown_value_reads_as_light() {
    let storage = ClientStorage::in_memory();
    storage.local().set(THEME_KEY, "solarized").unwrap();
    assert_eq!(load(&storage), Theme::Light);
}

#[test]
fn toggle_persists() {
    let storage = ClientStorage::in_memory();
    assert_eq!(toggle(&storage).unwrap(), Theme::Dark);
    assert_eq!(storage.local().get(THEME_KEY).as_deref(), Some("dark"));
    assert_eq!(toggle(&storage).unwrap(), Theme::Light);
    assert_eq!(load(&storage), Theme::Light);
}

#[test]
fn store_then_load() {
    let storage = ClientStorage::in_memory();
    store(&storage, Theme::Dark).unwrap();
    assert_eq!(load(&storage), Theme::Dark);
}

#[test]
fn serializes_lowercase() {
    assert_eq!(serde_json::to_value(Theme::Dark).unwrap(), serde_json::json!("dark"));
}

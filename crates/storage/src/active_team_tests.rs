use super::*;

#[test]
fn defaults_to_none_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ActiveTeamRegistry::load(dir.path().join("active-team.json")).unwrap();
    assert_eq!(registry.get(), None);
}

#[test]
fn set_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("active-team.json");
    let registry = ActiveTeamRegistry::load(path.clone()).unwrap();
    registry.set(Some("alpha".to_string())).unwrap();
    assert_eq!(registry.get(), Some("alpha".to_string()));

    let reloaded = ActiveTeamRegistry::load(path).unwrap();
    assert_eq!(reloaded.get(), Some("alpha".to_string()));
}

#[test]
fn clearing_writes_null() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("active-team.json");
    let registry = ActiveTeamRegistry::load(path.clone()).unwrap();
    registry.set(Some("alpha".to_string())).unwrap();
    registry.set(None).unwrap();

    let reloaded = ActiveTeamRegistry::load(path).unwrap();
    assert_eq!(reloaded.get(), None);
}

use std::sync::Arc;
use std::time::Duration;

use memento_core::config::AutosaveConfig;
use memento_core::entitlement::StaticEntitlement;
use memento_core::{Editor, PhotoAsset, Project, ProjectSettings, TransitionType};
use memento_session::export::ManifestEncoder;
use memento_session::*;

fn new_editor(premium: bool) -> SharedEditor {
    let entitlement = if premium {
        StaticEntitlement::PREMIUM
    } else {
        StaticEntitlement::FREE
    };
    let project = Project::new("Trip", ProjectSettings::default());
    shared(Editor::new(project, Arc::new(entitlement), 100))
}

#[tokio::test(start_paused = true)]
async fn autosaved_project_reloads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonDirStore::new(dir.path()));
    let editor = new_editor(true);
    let coordinator = AutosaveCoordinator::new(store.clone(), AutosaveConfig::default());
    let handle = spawn_autosave(editor.clone(), coordinator, MonotonicClock::new());

    {
        let mut ed = lock(&editor);
        let assets: Vec<PhotoAsset> = (0..3)
            .map(|i| PhotoAsset::new(format!("file:///trip/{i}.jpg"), 1600, 1200))
            .collect();
        assert!(ed.insert_photos(&assets).is_applied());
        assert!(ed.add_transition(1, TransitionType::Cube).is_applied());
        assert!(ed.rename("Summer trip").is_applied());
    }
    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.shutdown().await.unwrap();

    let id = lock(&editor).project().id;
    let stored = store.load(id).await.unwrap();
    assert_eq!(stored.title, "Summer trip");
    let reloaded = Project::try_from(stored).unwrap();
    assert_eq!(reloaded.timeline, lock(&editor).project().timeline);

    let listed = store.load_all().await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_autosave_keeps_editing_alive() {
    let store = Arc::new(MemoryStore::new());
    store.set_failing(true);
    let editor = new_editor(false);
    let coordinator = AutosaveCoordinator::new(store.clone(), AutosaveConfig::default());
    let handle = spawn_autosave(editor.clone(), coordinator, MonotonicClock::new());
    let mut status = handle.status();

    lock(&editor).insert_photos(&[PhotoAsset::new("file:///a.jpg", 1, 1)]);
    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert_eq!(*status.borrow_and_update(), SaveStatus::Error);

    // Editing continues and the next change is saved once the store recovers.
    store.set_failing(false);
    lock(&editor).insert_photos(&[PhotoAsset::new("file:///b.jpg", 1, 1)]);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.save_calls(), 2);
    let id = lock(&editor).project().id;
    assert_eq!(store.get(id).unwrap().photos.len(), 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn export_snapshot_of_shared_editor() {
    let dir = tempfile::tempdir().unwrap();
    let editor = new_editor(false);
    lock(&editor).insert_photos(&[
        PhotoAsset::new("file:///a.jpg", 1, 1),
        PhotoAsset::new("file:///b.jpg", 1, 1),
    ]);

    let project = lock(&editor).project().clone();
    let controller =
        ExportController::new(Arc::new(ManifestEncoder), Arc::new(StaticEntitlement::FREE));
    let out = dir.path().join("trip.json");
    let outcome = controller.export(&project, ExportRequest::video(&out)).await;
    assert_eq!(outcome, ExportOutcome::Completed(out));
    assert_eq!(controller.state(), ExportState::Idle);
}

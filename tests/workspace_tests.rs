use std::sync::Arc;
use std::time::Duration;

use codepad_lib::config::ConfigStore;
use codepad_lib::error::CodepadError;
use codepad_lib::files::{
    FileRecord, MemorySelection, SelectionState, SelectionStore, SyncEvent, Workspace,
    WorkspaceSettings,
};
use codepad_lib::remote::MemoryFileStore;
use codepad_lib::templates;
use tokio::sync::mpsc::{self, UnboundedReceiver};

const USER: &str = "u1";

fn seeded_store() -> Arc<MemoryFileStore> {
    let store = Arc::new(MemoryFileStore::new());
    store.insert(USER, FileRecord::new("A", "a.py", "a0", "python"));
    store.insert(USER, FileRecord::new("B", "b.py", "Y", "python"));
    store
}

fn open(
    store: &Arc<MemoryFileStore>,
    selection: Arc<dyn SelectionStore>,
) -> (Workspace, UnboundedReceiver<SyncEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let ws = Workspace::new(
        USER,
        store.clone(),
        selection,
        WorkspaceSettings::default(),
        Some(tx),
    );
    (ws, rx)
}

async fn started(store: &Arc<MemoryFileStore>) -> (Workspace, UnboundedReceiver<SyncEvent>) {
    let (ws, rx) = open(store, Arc::new(MemorySelection::default()));
    ws.start().await.unwrap();
    (ws, rx)
}

#[tokio::test(start_paused = true)]
async fn test_typing_burst_persists_only_last_text() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    ws.select_file("A").await.unwrap();

    ws.edit("a").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    ws.edit("ab").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    ws.edit("abc").unwrap();
    tokio::time::sleep(Duration::from_millis(3100)).await;

    assert_eq!(store.saves_of("A"), vec!["abc"]);
    assert_eq!(ws.find("A").unwrap().code, "abc");
}

#[tokio::test(start_paused = true)]
async fn test_switch_flushes_outgoing_before_showing_incoming() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    ws.select_file("A").await.unwrap();
    ws.edit("X").unwrap();

    let view = ws.select_file("B").await.unwrap();

    assert_eq!(store.stored(USER, "A").unwrap().code, "X");
    assert_eq!(view.code, "Y");
    assert_eq!(ws.state(), SelectionState::FileOpen("B".into()));

    // The cancelled timer must not write again.
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(store.saves_of("A"), vec!["X"]);
}

#[tokio::test(start_paused = true)]
async fn test_switch_back_shows_own_draft() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    ws.select_file("B").await.unwrap();
    ws.edit("Y2").unwrap();
    ws.select_file("A").await.unwrap();

    // Remote changes behind our back do not override the draft.
    store.insert(USER, FileRecord::new("B", "b.py", "remote", "python"));
    let view = ws.select_file("B").await.unwrap();
    assert_eq!(view.code, "Y2");
}

#[tokio::test(start_paused = true)]
async fn test_delete_active_file_closes_editor() {
    let store = seeded_store();
    let selection = Arc::new(MemorySelection::default());
    let (ws, _rx) = open(&store, selection.clone());
    ws.start().await.unwrap();
    ws.select_file("A").await.unwrap();

    ws.delete_file("A").await.unwrap();

    assert_eq!(ws.state(), SelectionState::NoFileOpen);
    assert!(ws.find("A").is_none());
    assert!(ws.active().is_none());
    assert!(selection.load().is_none());
    assert!(store.stored(USER, "A").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_with_pending_edit_never_recreates_file() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    ws.select_file("A").await.unwrap();
    ws.edit("unsaved").unwrap();

    ws.delete_file("A").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5000)).await;
    ws.close().await.unwrap();

    assert!(store.stored(USER, "A").is_none());
    assert!(store.saves_of("A").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_delete_keeps_file_and_pending_edit() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    ws.select_file("A").await.unwrap();
    ws.edit("keep me").unwrap();

    store.set_offline(true);
    let err = ws.delete_file("A").await.unwrap_err();
    assert!(matches!(err, CodepadError::RemoteUnavailable(_)));
    assert!(ws.find("A").is_some());
    assert_eq!(ws.state(), SelectionState::FileOpen("A".into()));
    assert!(ws.autosave().is_pending("A"));

    store.set_offline(false);
    ws.close().await.unwrap();
    assert_eq!(store.stored(USER, "A").unwrap().code, "keep me");
}

#[tokio::test(start_paused = true)]
async fn test_restart_with_deleted_pointer_opens_nothing() {
    let store = seeded_store();
    let (ws, _rx) = open(&store, Arc::new(MemorySelection::with("gone")));

    let start = ws.start().await.unwrap();

    assert!(start.opened.is_none());
    assert_eq!(start.file_count, 2);
    assert_eq!(ws.state(), SelectionState::NoFileOpen);
    assert!(store.stored(USER, "gone").is_none());
    assert!(store.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_reopens_last_file_from_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = Arc::new(ConfigStore::at(dir.path().join("config.json")));
    let store = seeded_store();

    {
        let (ws, _rx) = open(&store, config.clone());
        ws.start().await.unwrap();
        ws.select_file("B").await.unwrap();
        ws.edit("edited").unwrap();
        ws.close().await.unwrap();
    }
    assert_eq!(config.load().last_file_id.as_deref(), Some("B"));

    let (ws, _rx) = open(&store, config.clone());
    let start = ws.start().await.unwrap();
    assert_eq!(start.opened.unwrap().code, "edited");
    assert_eq!(ws.state(), SelectionState::FileOpen("B".into()));
}

#[tokio::test(start_paused = true)]
async fn test_create_file_uses_template_and_opens_it() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;

    let view = ws.create_file("test", "python").await.unwrap();

    assert!(view.id != "A" && view.id != "B");
    assert_eq!(view.name, "test.py");
    assert_eq!(view.code, templates::default_template("python"));
    let stored = store.stored(USER, &view.id).unwrap();
    assert_eq!(stored.code, templates::default_template("python"));
    assert_eq!(ws.state(), SelectionState::FileOpen(view.id.clone()));
    assert_eq!(ws.files().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_created_ids_are_unique() {
    let store = Arc::new(MemoryFileStore::new());
    let (ws, _rx) = started(&store).await;

    let first = ws.create_file("one", "rust").await.unwrap();
    let second = ws.create_file("two", "rust").await.unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test(start_paused = true)]
async fn test_create_failure_leaves_registry_unchanged() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    store.set_offline(true);

    let err = ws.create_file("test", "python").await.unwrap_err();

    assert!(matches!(err, CodepadError::RemoteUnavailable(_)));
    assert_eq!(ws.files().len(), 2);
    assert_eq!(ws.state(), SelectionState::NoFileOpen);
}

#[tokio::test(start_paused = true)]
async fn test_upload_detects_language() {
    let store = Arc::new(MemoryFileStore::new());
    let (ws, _rx) = started(&store).await;

    let view = ws.upload_file("main.rs", "fn main() {}").await.unwrap();
    assert_eq!(view.name, "main.rs");
    assert_eq!(view.language, "rust");
    assert_eq!(view.code, "fn main() {}");

    assert_eq!(ws.upload_file("data.CSV", "a,b").await.unwrap().language, "csv");
    assert_eq!(ws.upload_file("README", "").await.unwrap().language, "plaintext");
}

#[tokio::test(start_paused = true)]
async fn test_rename_failure_keeps_old_name() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    store.set_offline(true);

    assert!(ws.rename_file("A", "renamed.py").await.is_err());
    assert_eq!(ws.find("A").unwrap().name, "a.py");
}

#[tokio::test(start_paused = true)]
async fn test_rename_with_pending_edit_persists_new_name() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    ws.select_file("A").await.unwrap();
    ws.edit("X").unwrap();

    let renamed = ws.rename_file("A", "renamed.py").await.unwrap();
    assert_eq!(renamed.name, "renamed.py");
    tokio::time::sleep(Duration::from_millis(3100)).await;

    let stored = store.stored(USER, "A").unwrap();
    assert_eq!(stored.name, "renamed.py");
    assert_eq!(stored.code, "X");
}

#[tokio::test(start_paused = true)]
async fn test_select_falls_back_to_cache_when_offline() {
    let store = seeded_store();
    let (ws, mut rx) = started(&store).await;
    store.set_offline(true);

    let view = ws.select_file("B").await.unwrap();

    assert_eq!(view.code, "Y");
    assert!(matches!(rx.try_recv(), Ok(SyncEvent::Warning { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_offline_start_leaves_empty_registry() {
    let store = seeded_store();
    store.set_offline(true);
    let (ws, mut rx) = open(&store, Arc::new(MemorySelection::with("A")));

    let start = ws.start().await.unwrap();

    assert!(start.needs_file);
    assert!(start.opened.is_none());
    assert!(matches!(rx.try_recv(), Ok(SyncEvent::Warning { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_search_by_name_prefix() {
    let store = seeded_store();
    store.insert(USER, FileRecord::new("C", "Alpha.js", "", "javascript"));
    let (ws, _rx) = started(&store).await;

    let hits: Vec<String> = ws.search(" a").into_iter().map(|r| r.id).collect();
    assert_eq!(hits, vec!["A", "C"]);
    assert_eq!(ws.search("").len(), 3);
    assert!(ws.search("zzz").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_switch_while_save_in_flight_writes_latest_last() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    ws.select_file("A").await.unwrap();
    store.set_latency(Duration::from_millis(200));

    ws.edit("X").unwrap();
    // The timer fires at 3000ms and its save is still in flight.
    tokio::time::sleep(Duration::from_millis(3050)).await;
    ws.edit("X2").unwrap();
    let view = ws.select_file("B").await.unwrap();

    assert_eq!(view.code, "Y");
    assert_eq!(ws.state(), SelectionState::FileOpen("B".into()));
    assert_eq!(store.saves_of("A"), vec!["X", "X2"]);
    assert_eq!(store.stored(USER, "A").unwrap().code, "X2");

    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(store.saves_of("A"), vec!["X", "X2"]);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_remote_delete_is_dropped() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    let ws = Arc::new(ws);
    ws.select_file("A").await.unwrap();
    store.set_latency(Duration::from_millis(100));

    let deleting = {
        let ws = ws.clone();
        tokio::spawn(async move { ws.delete_file("A").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    ws.edit("typed while deleting").unwrap();
    deleting.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(5000)).await;
    ws.close().await.unwrap();

    assert!(store.stored(USER, "A").is_none());
    assert!(store.saves_of("A").is_empty());
    assert!(ws.find("A").is_none());
    assert!(!ws.autosave().is_pending("A"));
    assert!(matches!(ws.edit("late"), Err(CodepadError::NoActiveFile)));
}

#[tokio::test(start_paused = true)]
async fn test_rename_while_autosave_in_flight_keeps_new_name() {
    let store = seeded_store();
    let (ws, _rx) = started(&store).await;
    ws.select_file("A").await.unwrap();
    store.set_latency(Duration::from_millis(200));

    ws.edit("X").unwrap();
    tokio::time::sleep(Duration::from_millis(3050)).await;
    let renamed = ws.rename_file("A", "renamed.py").await.unwrap();

    assert_eq!(renamed.name, "renamed.py");
    let stored = store.stored(USER, "A").unwrap();
    assert_eq!(stored.name, "renamed.py");
    assert_eq!(stored.code, "X");
    assert_eq!(ws.find("A").unwrap().name, "renamed.py");
    assert_eq!(store.saves_of("A"), vec!["X"]);
}

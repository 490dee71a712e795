use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::error::{CodepadError, Result};
use crate::files::{FilePatch, FileRecord, FileRegistry};
use crate::remote::FileStore;

/// Quiet period after the last edit before a file is written remotely.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(3000);

// ── Events ──────────────────────────────────────────────────────────────────

/// Notifications for the frontend. Failures are dismissible, never fatal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "data")]
pub enum SyncEvent {
    #[serde(rename_all = "camelCase")]
    Saved { file_id: String },
    #[serde(rename_all = "camelCase")]
    SaveFailed { file_id: String, message: String },
    Warning { message: String },
}

pub type EventSender = mpsc::UnboundedSender<SyncEvent>;

/// Result of a persist attempt that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flushed {
    /// Nothing was pending for the file.
    Nothing,
    Saved,
}

// ── State ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Pending {
    payload: Option<FileRecord>,
    timer: Option<JoinHandle<()>>,
}

impl Pending {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn is_idle(&self) -> bool {
        self.payload.is_none() && self.timer.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

struct Inner {
    store: Arc<dyn FileStore>,
    user_id: String,
    delay: Duration,
    registry: Arc<Mutex<FileRegistry>>,
    events: Option<EventSender>,
    pending: Mutex<HashMap<String, Pending>>,
    // One async gate per file id: every write for an id happens while holding it.
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Debounces edits per file id and writes the latest payload to the remote
/// store.
///
/// Each id owns at most one timer and one pending payload; a new edit
/// replaces the payload and restarts the timer. The timer path and
/// [`flush_now`](Self::flush_now) both go through `persist_pending`, so a
/// flush racing a just-fired timer sends the latest payload once.
#[derive(Clone)]
pub struct AutosaveCoordinator {
    inner: Arc<Inner>,
}

impl AutosaveCoordinator {
    pub fn new(
        store: Arc<dyn FileStore>,
        user_id: impl Into<String>,
        registry: Arc<Mutex<FileRegistry>>,
        delay: Duration,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                user_id: user_id.into(),
                delay,
                registry,
                events,
                pending: Mutex::new(HashMap::new()),
                gates: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Record `record` as the latest payload for its id and restart the
    /// debounce timer.
    pub fn schedule(&self, record: FileRecord) {
        let id = record.id.clone();
        let mut pending = self.inner.pending.lock();
        let entry = pending.entry(id.clone()).or_default();
        entry.payload = Some(record);
        entry.cancel_timer();

        let this = self.clone();
        let delay = self.inner.delay;
        entry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached: aborting the timer must never cut a write short.
            tokio::spawn(async move {
                let _ = this.persist_pending(&id).await;
            });
        }));
    }

    /// Set the pending payload without starting a timer.
    pub fn stage(&self, record: FileRecord) {
        let id = record.id.clone();
        self.inner.pending.lock().entry(id).or_default().payload = Some(record);
    }

    /// Cancel the timer for `id` and write its pending payload now.
    pub async fn flush_now(&self, id: &str) -> Result<Flushed> {
        self.cancel_timer(id);
        self.persist_pending(id).await
    }

    /// Flush every file with a pending payload. All files are attempted; the
    /// first failure is returned after the rest have been tried.
    pub async fn flush_all(&self) -> Result<usize> {
        let ids = self.pending_ids();
        let results = futures_util::future::join_all(ids.iter().map(|id| self.flush_now(id))).await;

        let mut saved = 0;
        let mut first_err = None;
        for result in results {
            match result {
                Ok(Flushed::Saved) => saved += 1,
                Ok(Flushed::Nothing) => {}
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(saved),
        }
    }

    /// Drop everything pending for `id`, waiting for any write already in
    /// flight. Returns the payload that was not yet written.
    pub async fn cancel(&self, id: &str) -> Option<FileRecord> {
        let parked = {
            let _file = self.lock_file(id).await;
            self.discard(id)
        };
        self.release_gate(id);
        parked
    }

    /// Hold off every write for `id` until the guard is dropped, waiting for
    /// one already in flight. Edits keep queueing meanwhile.
    pub async fn lock_file(&self, id: &str) -> OwnedMutexGuard<()> {
        self.gate(id).lock_owned().await
    }

    /// Drop the timer and payload for `id` without waiting. Only safe while
    /// holding [`lock_file`](Self::lock_file) for `id`.
    pub fn discard(&self, id: &str) -> Option<FileRecord> {
        let removed = self.inner.pending.lock().remove(id);
        removed.and_then(|mut entry| {
            entry.cancel_timer();
            entry.payload
        })
    }

    /// Put back a payload taken by [`cancel`](Self::cancel) and debounce it
    /// again, unless something newer has been scheduled since.
    pub fn restore(&self, record: FileRecord) {
        if self.is_pending(&record.id) {
            return;
        }
        self.schedule(record);
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.inner
            .pending
            .lock()
            .get(id)
            .is_some_and(|entry| entry.payload.is_some())
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.inner
            .pending
            .lock()
            .iter()
            .filter(|(_, entry)| entry.payload.is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn cancel_timer(&self, id: &str) {
        if let Some(entry) = self.inner.pending.lock().get_mut(id) {
            entry.cancel_timer();
        }
    }

    fn gate(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .gates
            .lock()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Forget the gate for `id` once nothing is queued and no one holds or
    /// waits on it.
    pub fn release_gate(&self, id: &str) {
        if self.inner.pending.lock().contains_key(id) {
            return;
        }
        let mut gates = self.inner.gates.lock();
        if gates.get(id).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            gates.remove(id);
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.inner.events {
            let _ = tx.send(event);
        }
    }

    /// Write the latest pending payload for `id`, if any.
    async fn persist_pending(&self, id: &str) -> Result<Flushed> {
        let result = {
            let _file = self.lock_file(id).await;
            self.write_pending(id).await
        };
        self.release_gate(id);
        result
    }

    async fn write_pending(&self, id: &str) -> Result<Flushed> {
        let payload = self
            .inner
            .pending
            .lock()
            .get_mut(id)
            .and_then(|entry| entry.payload.take());
        let Some(mut record) = payload else {
            return Ok(Flushed::Nothing);
        };
        // A rename may have committed after the edit was queued.
        let current_name = self.inner.registry.lock().find(id).map(|r| r.name.clone());
        match current_name {
            Some(name) => record.name = name,
            None => {
                tracing::debug!(file_id = %id, "file gone, dropping pending edit");
                self.inner.pending.lock().remove(id);
                return Ok(Flushed::Nothing);
            }
        }

        match self
            .inner
            .store
            .save_file(&self.inner.user_id, id, &record)
            .await
        {
            Ok(()) => {
                tracing::debug!(file_id = %id, bytes = record.code.len(), "autosaved");
                // The file may have been deleted meanwhile; nothing to update then.
                let _ = self
                    .inner
                    .registry
                    .lock()
                    .edit(id, &FilePatch::code(record.code));
                {
                    let mut pending = self.inner.pending.lock();
                    if pending.get(id).is_some_and(Pending::is_idle) {
                        pending.remove(id);
                    }
                }
                self.emit(SyncEvent::Saved {
                    file_id: id.to_string(),
                });
                Ok(Flushed::Saved)
            }
            Err(err) => {
                tracing::warn!(file_id = %id, error = %err, "autosave failed, keeping payload");
                {
                    let mut pending = self.inner.pending.lock();
                    let entry = pending.entry(id.to_string()).or_default();
                    if entry.payload.is_none() {
                        entry.payload = Some(record);
                    }
                }
                self.emit(SyncEvent::SaveFailed {
                    file_id: id.to_string(),
                    message: err.to_string(),
                });
                Err(match err {
                    CodepadError::RemoteUnavailable(_) => err,
                    other => CodepadError::remote(other),
                })
            }
        }
    }
}

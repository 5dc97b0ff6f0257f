use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::store::NoteStore;
use crate::types::{now_ms, Note};

/// Quiescence window after the last edit before a write commits.
pub const DEBOUNCE: Duration = Duration::from_millis(1000);

/// Decouples high-frequency edits from storage writes. Edits land in an
/// in-memory draft immediately; the store sees at most one save per
/// quiescence window, carrying the latest draft.
pub struct AutosaveCoordinator {
    store: NoteStore,
    /// The optimistic layer. Flows one way: draft → store, never back.
    draft: Arc<Mutex<Option<Note>>>,
    /// The single pending flush. A new edit supersedes it, never queues.
    pending: Option<JoinHandle<()>>,
    debounce: Duration,
}

impl AutosaveCoordinator {
    pub fn new(store: NoteStore) -> Self {
        Self {
            store,
            draft: Arc::new(Mutex::new(None)),
            pending: None,
            debounce: DEBOUNCE,
        }
    }

    /// Record an edit: refresh the draft, restart the quiescence timer.
    pub fn record_edit(&mut self, mut note: Note) {
        note.updated_at = now_ms();
        *lock(&self.draft) = Some(note);

        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        let store = self.store.clone();
        let draft = Arc::clone(&self.draft);
        let window = self.debounce;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let latest = lock(&draft).take();
            if let Some(note) = latest {
                if let Err(e) = store.save(&note).await {
                    tracing::warn!(note_id = %note.id, "autosave flush failed: {e}");
                    // Put the draft back so the edit stays visible to the UI.
                    let mut slot = lock(&draft);
                    if slot.is_none() {
                        *slot = Some(note);
                    }
                }
            }
        }));
    }

    /// Cancel the pending flush, dropping the unsaved draft. Called when
    /// the active note changes or the editor unmounts.
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        if let Some(dropped) = lock(&self.draft).take() {
            tracing::warn!(note_id = %dropped.id, "dropping unsaved edit before flush");
        }
    }

    /// The current optimistic state, if an edit is in flight.
    pub fn draft(&self) -> Option<Note> {
        lock(&self.draft).clone()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| !p.is_finished())
    }
}

impl Drop for AutosaveCoordinator {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

/// Lock the draft, recovering from a poisoned mutex — the critical
/// sections only move an Option and cannot leave it inconsistent.
fn lock(draft: &Mutex<Option<Note>>) -> std::sync::MutexGuard<'_, Option<Note>> {
    draft.lock().unwrap_or_else(|e| e.into_inner())
}

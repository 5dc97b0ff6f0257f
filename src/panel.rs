use tokio::sync::watch;

use crate::autosave::AutosaveCoordinator;
use crate::messenger::PanelIntent;
use crate::query::{NoteListView, ViewMode};
use crate::resolver::resolve_page;
use crate::store::{NoteStore, StoreError};
use crate::types::{now_ms, Note, PageContext};

/// Panel-side session: the resolved page context, the note list view, and
/// the autosave coordinator, wired to one store handle. The UI holds
/// read-only copies of what this hands out and never mutates store state
/// directly.
pub struct PanelSession {
    store: NoteStore,
    view: NoteListView,
    autosave: AutosaveCoordinator,
    context: watch::Receiver<Option<PageContext>>,
    mode: ViewMode,
}

impl PanelSession {
    pub fn new(store: NoteStore, context: watch::Receiver<Option<PageContext>>) -> Self {
        let autosave = AutosaveCoordinator::new(store.clone());
        Self {
            store,
            view: NoteListView::new(),
            autosave,
            context,
            mode: ViewMode::Domain,
        }
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn view_mode(&self) -> ViewMode {
        self.mode
    }

    /// Current page context; None means "no active context".
    pub fn context(&self) -> Option<PageContext> {
        self.context.borrow().clone()
    }

    pub fn selected(&self) -> Option<&str> {
        self.view.selected()
    }

    /// The note list for the current context and view mode. If the refresh
    /// moves the selection (the previous note vanished, or a first note
    /// appeared), any pending edit of the old note is cancelled.
    pub async fn notes(&mut self) -> Result<Vec<Note>, StoreError> {
        let before = self.view.selected().map(str::to_string);
        let domain = self.context.borrow().as_ref().map(|c| c.domain.clone());
        let notes = self
            .view
            .refresh(&self.store, domain.as_deref(), self.mode)
            .await?;
        if self.view.selected() != before.as_deref() {
            self.autosave.cancel_pending();
        }
        Ok(notes)
    }

    /// Create a note for the current page. Returns None without an active
    /// context — there is nothing to attach the note to.
    pub async fn create_note(&mut self) -> Result<Option<Note>, StoreError> {
        let ctx = self.context.borrow().clone();
        match ctx {
            Some(ctx) => self.create_note_at(&ctx).await.map(Some),
            None => Ok(None),
        }
    }

    async fn create_note_at(&mut self, ctx: &PageContext) -> Result<Note, StoreError> {
        self.autosave.cancel_pending();
        let note = Note::for_page(ctx, now_ms());
        self.store.save(&note).await?;
        self.view.select(note.id.clone());
        Ok(note)
    }

    /// Switch the active note, dropping any pending edit of the old one.
    pub fn open_note(&mut self, id: &str) {
        if self.view.selected() != Some(id) {
            self.autosave.cancel_pending();
            self.view.select(id);
        }
    }

    /// React to a background intent (context-menu action).
    pub async fn handle_intent(&mut self, intent: PanelIntent) -> Result<(), StoreError> {
        match intent {
            PanelIntent::OpenNote { id } => {
                self.open_note(&id);
                Ok(())
            }
            PanelIntent::CreateNote { url, title } => {
                match resolve_page(&url, title.as_deref()) {
                    Some(ctx) => self.create_note_at(&ctx).await.map(|_| ()),
                    None => Ok(()), // unresolvable page, nothing to create
                }
            }
        }
    }

    pub async fn edit_content(&mut self, content: String) -> Result<(), StoreError> {
        if let Some(mut note) = self.active_note().await? {
            note.content = content;
            self.autosave.record_edit(note);
        }
        Ok(())
    }

    pub async fn edit_title(&mut self, title: String) -> Result<(), StoreError> {
        if let Some(mut note) = self.active_note().await? {
            note.title = title;
            self.autosave.record_edit(note);
        }
        Ok(())
    }

    /// The selected note as the UI should render it: the in-flight draft
    /// when one exists, else the committed copy.
    pub async fn active_note(&self) -> Result<Option<Note>, StoreError> {
        if let Some(draft) = self.autosave.draft() {
            if Some(draft.id.as_str()) == self.view.selected() {
                return Ok(Some(draft));
            }
        }
        match self.view.selected() {
            Some(id) => self.store.get(id).await,
            None => Ok(None),
        }
    }

    /// Hard delete; the next refresh fixes up the selection.
    pub async fn delete_note(&mut self, id: &str) -> Result<(), StoreError> {
        if self.view.selected() == Some(id) {
            self.autosave.cancel_pending();
        }
        self.store.delete(id).await
    }
}

use crate::store::{sort_by_recency, NoteStore, StoreError};
use crate::types::Note;

/// Whether the list is filtered to the active domain or spans every domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Domain,
    All,
}

/// Derived, sorted view over the store plus the current selection.
/// Holds no note data of its own — every refresh re-reads the store.
#[derive(Debug, Default)]
pub struct NoteListView {
    selected: Option<String>,
}

impl NoteListView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-query the store and apply the selection policy:
    /// - a selection survives a refresh unless its id vanished;
    /// - with no selection and a non-empty list, the most recent note
    ///   (index 0) is selected.
    pub async fn refresh(
        &mut self,
        store: &NoteStore,
        domain: Option<&str>,
        mode: ViewMode,
    ) -> Result<Vec<Note>, StoreError> {
        let notes = match mode {
            ViewMode::Domain => match domain {
                Some(d) => store.get_by_domain(d).await?,
                None => Vec::new(),
            },
            ViewMode::All => {
                // get_all gives no order guarantee; sort here.
                let mut all = store.get_all().await?;
                sort_by_recency(&mut all);
                all
            }
        };

        if let Some(sel) = &self.selected {
            if !notes.iter().any(|n| &n.id == sel) {
                self.selected = None;
            }
        }
        if self.selected.is_none() {
            self.selected = notes.first().map(|n| n.id.clone());
        }
        Ok(notes)
    }

    pub fn select(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }
}

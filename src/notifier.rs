use std::collections::HashMap;

use tokio::sync::broadcast;

use crate::store::{NoteStore, StoreEvent};
use crate::types::{TabEvent, TabId, TabInfo};

/// Fixed badge color used whenever at least one note matches.
pub const BADGE_COLOR: &str = "#2e7d32";

pub const MENU_OPEN_LABEL: &str = "Open Note for this Page";
pub const MENU_CREATE_LABEL: &str = "Create Note for this Page";

/// Host seam for the notifier's outputs: the per-tab icon badge and the
/// single shared context-menu label.
pub trait BadgeSurface: Send {
    fn set_badge(&mut self, tab: TabId, text: Option<&str>, color: &str);
    fn set_menu_label(&mut self, label: &str);
}

/// Badge text for a match count: the count as text, or cleared when zero.
pub fn badge_text(count: usize) -> Option<String> {
    (count > 0).then(|| count.to_string())
}

/// Menu label is a process-wide singleton tied to the focused tab.
pub fn menu_label(has_match: bool) -> &'static str {
    if has_match {
        MENU_OPEN_LABEL
    } else {
        MENU_CREATE_LABEL
    }
}

#[derive(Debug, Clone)]
struct TabState {
    url: Option<String>,
}

/// Background-process state machine: one row per known tab plus the
/// focused-tab pointer. Driven by tab events and store-change events;
/// every entry point recomputes from a fresh store snapshot.
pub struct BadgeNotifier<S: BadgeSurface> {
    store: NoteStore,
    surface: S,
    tabs: HashMap<TabId, TabState>,
    focused: Option<TabId>,
}

impl<S: BadgeSurface> BadgeNotifier<S> {
    pub fn new(store: NoteStore, surface: S) -> Self {
        Self {
            store,
            surface,
            tabs: HashMap::new(),
            focused: None,
        }
    }

    pub async fn on_tab_focused(&mut self, tab: TabInfo) {
        self.focused = Some(tab.id);
        self.tabs.insert(tab.id, TabState { url: tab.url });
        self.recompute_tab(tab.id).await;
        self.refresh_menu().await;
    }

    pub async fn on_tab_navigated(&mut self, tab: TabInfo) {
        self.tabs.insert(tab.id, TabState { url: tab.url });
        self.recompute_tab(tab.id).await;
        if self.focused == Some(tab.id) {
            self.refresh_menu().await;
        }
    }

    pub async fn on_tab_closed(&mut self, id: TabId) {
        self.tabs.remove(&id);
        if self.focused == Some(id) {
            self.focused = None;
            // The label is bound to the focused tab; don't leave a stale
            // "open" offer behind.
            self.refresh_menu().await;
        }
    }

    /// Store contents changed: every known tab's badge may be stale.
    pub async fn on_store_changed(&mut self) {
        let ids: Vec<TabId> = self.tabs.keys().copied().collect();
        for id in ids {
            self.recompute_tab(id).await;
        }
        self.refresh_menu().await;
    }

    /// Count exact-URL matches for one tab and apply the badge. Tabs
    /// without a URL are skipped silently; a failed store read clears the
    /// badge — no badge beats a wrong one.
    async fn recompute_tab(&mut self, id: TabId) {
        let url = match self.tabs.get(&id).and_then(|t| t.url.clone()) {
            Some(url) => url,
            None => return,
        };
        let count = match self.store.get_by_url(&url).await {
            Ok(matches) => matches.len(),
            Err(e) => {
                tracing::debug!(tab = id, "badge recompute failed: {e}");
                self.surface.set_badge(id, None, BADGE_COLOR);
                return;
            }
        };
        self.surface
            .set_badge(id, badge_text(count).as_deref(), BADGE_COLOR);
    }

    async fn refresh_menu(&mut self) {
        let url = self
            .focused
            .and_then(|id| self.tabs.get(&id))
            .and_then(|t| t.url.clone());
        let has_match = match url {
            Some(url) => match self.store.get_by_url(&url).await {
                Ok(matches) => !matches.is_empty(),
                Err(_) => false,
            },
            None => false,
        };
        self.surface.set_menu_label(menu_label(has_match));
    }

    /// Background loop: react to both event sources until both close.
    /// The counterpart of the panel's own store subscription.
    pub async fn run(
        mut self,
        mut tab_events: broadcast::Receiver<TabEvent>,
        mut store_events: broadcast::Receiver<StoreEvent>,
    ) {
        let mut tabs_open = true;
        let mut store_open = true;
        while tabs_open || store_open {
            tokio::select! {
                event = tab_events.recv(), if tabs_open => match event {
                    Ok(TabEvent::Activated(tab)) => self.on_tab_focused(tab).await,
                    Ok(TabEvent::Navigated(tab)) => self.on_tab_navigated(tab).await,
                    Ok(TabEvent::Closed(id)) => self.on_tab_closed(id).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Stale per-tab state; rebuild what we still know.
                        self.on_store_changed().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => tabs_open = false,
                },
                event = store_events.recv(), if store_open => match event {
                    Ok(StoreEvent::NotesChanged) => self.on_store_changed().await,
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        self.on_store_changed().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => store_open = false,
                },
            }
        }
    }
}

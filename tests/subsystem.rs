//! End-to-end flow across the background and panel contexts: tab events,
//! menu intents, note creation, and the badge derived from store state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use pagenotes::notifier::{BadgeNotifier, BadgeSurface, MENU_CREATE_LABEL, MENU_OPEN_LABEL};
use pagenotes::types::TabId;
use pagenotes::{
    messenger, DomainResolver, NoteStore, PanelSession, TabEvent, TabInfo, ViewMode,
};

#[derive(Default, Clone)]
struct HostSurface {
    badges: Arc<Mutex<Vec<(TabId, Option<String>)>>>,
    labels: Arc<Mutex<Vec<String>>>,
}

impl HostSurface {
    fn badge(&self, tab: TabId) -> Option<Option<String>> {
        self.badges
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| *id == tab)
            .map(|(_, text)| text.clone())
    }

    fn label(&self) -> Option<String> {
        self.labels.lock().unwrap().last().cloned()
    }
}

impl BadgeSurface for HostSurface {
    fn set_badge(&mut self, tab: TabId, text: Option<&str>, _color: &str) {
        self.badges
            .lock()
            .unwrap()
            .push((tab, text.map(str::to_string)));
    }

    fn set_menu_label(&mut self, label: &str) {
        self.labels.lock().unwrap().push(label.to_string());
    }
}

fn tab(id: TabId, url: &str) -> TabInfo {
    TabInfo {
        id,
        url: Some(url.to_string()),
        title: Some("Example".to_string()),
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn menu_action_creates_a_note_and_the_badge_follows() {
    let store = NoteStore::in_memory();
    let (tab_tx, _) = broadcast::channel(16);
    let surface = HostSurface::default();

    // Background context.
    let notifier = BadgeNotifier::new(store.clone(), surface.clone());
    let background = tokio::spawn(notifier.run(tab_tx.subscribe(), store.subscribe()));

    // Panel context, fed by the resolver.
    let page = "https://example.com/article";
    let resolver = DomainResolver::watch(tab_tx.subscribe(), Some(tab(1, page)));
    let mut panel = PanelSession::new(store.clone(), resolver.subscribe());

    tab_tx.send(TabEvent::Activated(tab(1, page))).unwrap();
    wait_for(|| surface.label().as_deref() == Some(MENU_CREATE_LABEL)).await;
    assert_eq!(surface.badge(1), Some(None));

    // Context-menu click: background computes the intent and delivers it.
    let (sender, mut receiver) = messenger::channel();
    let intent = messenger::page_intent(&store, page, Some("Example"))
        .await
        .unwrap();
    let delivery = tokio::spawn(async move { sender.send(intent).await });

    let intent = receiver.recv().await.expect("intent delivered");
    panel.handle_intent(intent).await.unwrap();
    delivery.await.unwrap().expect("panel acknowledged");

    // The store change propagates back to the background surface.
    wait_for(|| surface.badge(1) == Some(Some("1".to_string()))).await;
    wait_for(|| surface.label().as_deref() == Some(MENU_OPEN_LABEL)).await;

    // A second click now opens the existing note instead of creating one.
    let next = messenger::page_intent(&store, page, None).await.unwrap();
    assert!(matches!(next, messenger::PanelIntent::OpenNote { .. }));
    assert_eq!(store.get_all().await.unwrap().len(), 1);

    // Navigating away clears the badge.
    tab_tx
        .send(TabEvent::Navigated(tab(1, "https://example.com/other")))
        .unwrap();
    wait_for(|| surface.badge(1) == Some(None)).await;

    background.abort();
    let _ = background.await;
}

#[tokio::test]
async fn panel_tracks_navigation_and_lists_per_domain() {
    let store = NoteStore::in_memory();
    let (tab_tx, _) = broadcast::channel(16);
    let resolver = DomainResolver::watch(
        tab_tx.subscribe(),
        Some(tab(1, "https://example.com/a")),
    );
    let mut panel = PanelSession::new(store.clone(), resolver.subscribe());
    let mut context_rx = resolver.subscribe();

    let first = panel.create_note().await.unwrap().expect("note for example.com");

    tab_tx
        .send(TabEvent::Navigated(tab(1, "https://other.org/x")))
        .unwrap();
    context_rx.changed().await.unwrap();

    let notes = panel.notes().await.unwrap();
    assert!(notes.is_empty(), "other.org has no notes yet");

    let second = panel.create_note().await.unwrap().expect("note for other.org");
    assert_eq!(second.domain, "other.org");

    panel.set_view_mode(ViewMode::All);
    let all = panel.notes().await.unwrap();
    let ids: Vec<&str> = all.iter().map(|n| n.id.as_str()).collect();
    assert!(ids.contains(&first.id.as_str()) && ids.contains(&second.id.as_str()));
}

#[tokio::test]
async fn export_import_survives_a_store_swap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pagenotes.json");
    let store = NoteStore::open(Some(path.as_path()));

    let (_tx, rx) = tokio::sync::watch::channel(Some(pagenotes::PageContext {
        domain: "example.com".to_string(),
        url: "https://example.com/a".to_string(),
        title: Some("Example".to_string()),
    }));
    let mut panel = PanelSession::new(store.clone(), rx);
    let note = panel.create_note().await.unwrap().unwrap();

    let exported = pagenotes::transfer::export_notes(&store).await.unwrap();

    let replacement = NoteStore::in_memory();
    let report = pagenotes::transfer::import_notes(&replacement, &exported)
        .await
        .unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 0);

    let restored = replacement.get(&note.id).await.unwrap().unwrap();
    assert_eq!(restored, note);

    let download = pagenotes::transfer::markdown_download(&restored);
    assert!(download.file_name.ends_with(".md"));
    assert_eq!(download.mime_type, "text/markdown");
    assert!(download.contents.contains("url: https://example.com/a"));
}

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use url::Url;

use crate::types::{PageContext, TabEvent, TabInfo};

/// Derive a page context from a raw URL and optional title.
/// URLs without a parseable hostname (privileged pages, about:blank)
/// yield None — absent context, not an error.
pub fn resolve_page(url: &str, title: Option<&str>) -> Option<PageContext> {
    let parsed = Url::parse(url).ok()?;
    let domain = parsed.host_str()?.to_string();
    Some(PageContext {
        domain,
        url: url.to_string(),
        title: title.map(str::to_string),
    })
}

fn resolve_tab(tab: &TabInfo) -> Option<PageContext> {
    tab.url
        .as_deref()
        .and_then(|u| resolve_page(u, tab.title.as_deref()))
}

/// Tracks the active tab's resolved context and republishes it through a
/// watch channel. The tab-event listener is torn down on drop.
pub struct DomainResolver {
    context: watch::Receiver<Option<PageContext>>,
    listener: Option<JoinHandle<()>>,
}

impl DomainResolver {
    /// Follow tab activations, plus completed navigations of the active
    /// tab only. `active` is the tab that is focused right now, so the
    /// initial context is derived without waiting for the first event.
    pub fn watch(mut tabs: broadcast::Receiver<TabEvent>, active: Option<TabInfo>) -> Self {
        let initial = active.as_ref().and_then(resolve_tab);
        let mut active_id = active.map(|t| t.id);
        let (tx, rx) = watch::channel(initial);
        let listener = tokio::spawn(async move {
            loop {
                match tabs.recv().await {
                    Ok(TabEvent::Activated(tab)) => {
                        active_id = Some(tab.id);
                        let _ = tx.send(resolve_tab(&tab));
                    }
                    Ok(TabEvent::Navigated(tab)) => {
                        // Background tabs navigate too; only the active
                        // tab drives the panel context.
                        if active_id == Some(tab.id) {
                            let _ = tx.send(resolve_tab(&tab));
                        }
                    }
                    Ok(TabEvent::Closed(id)) => {
                        if active_id == Some(id) {
                            active_id = None;
                            let _ = tx.send(None);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Only the newest tab state matters; keep going.
                        tracing::debug!("resolver lagged {skipped} tab events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self {
            context: rx,
            listener: Some(listener),
        }
    }

    /// Standalone fallback for hosts without a tab API: derive the context
    /// once from the given location and never update again.
    pub fn fixed(url: &str, title: Option<&str>) -> Self {
        let (_tx, rx) = watch::channel(resolve_page(url, title));
        Self {
            context: rx,
            listener: None,
        }
    }

    /// Current resolved context, if any.
    pub fn context(&self) -> Option<PageContext> {
        self.context.borrow().clone()
    }

    /// Watch handle for consumers that want to react to context changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<PageContext>> {
        self.context.clone()
    }
}

impl Drop for DomainResolver {
    fn drop(&mut self) {
        // No leaked tab observers past teardown.
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

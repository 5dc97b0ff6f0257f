//! Per-page markdown note subsystem: a key-value note store indexed by
//! page domain, kept in sync with the active browser tab.
//!
//! Two long-lived contexts share the [`store::NoteStore`]:
//!
//! - the background process runs [`notifier::BadgeNotifier`] (per-tab badge
//!   plus the shared context-menu label) and sends intents through
//!   [`messenger::Messenger`] when the menu action fires;
//! - the panel runs [`panel::PanelSession`] (note list, selection, and the
//!   debounced [`autosave::AutosaveCoordinator`]) fed by a
//!   [`resolver::DomainResolver`].
//!
//! They communicate only through the store's change events and the
//! acknowledged intent channel — no locks span the two sides.

pub mod autosave;
pub mod messenger;
pub mod notifier;
pub mod panel;
pub mod query;
pub mod resolver;
pub mod store;
pub mod transfer;
pub mod types;

pub use messenger::{Messenger, PanelIntent, PanelReceiver};
pub use panel::PanelSession;
pub use query::ViewMode;
pub use resolver::DomainResolver;
pub use store::{NoteStore, StoreError, StoreEvent};
pub use types::{EditorPrefs, Note, PageContext, TabEvent, TabInfo};

/// Only log WARN and above in production to avoid leaking note content.
pub fn init_logging() {
    #[cfg(debug_assertions)]
    tracing_subscriber::fmt::init();
    #[cfg(not(debug_assertions))]
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();
}

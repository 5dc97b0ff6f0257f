use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted note, keyed by page domain. Field names on the wire follow
/// the storage layout (`isUrlSpecific`, `createdAt`, `updatedAt`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String, // opaque UUID, immutable after creation
    pub title: String,
    /// Markdown body. Seeded with a metadata header at creation.
    pub content: String,
    /// Hostname of the page the note was created on. Immutable.
    pub domain: String,
    /// Full page URL at creation time.
    pub url: String,
    /// Reserved for per-URL (rather than per-domain) scoping.
    pub is_url_specific: bool,
    pub created_at: i64, // Unix timestamp in ms
    pub updated_at: i64,
}

impl Note {
    /// Create a note for the given page context. Seeds the content with a
    /// front-matter header carrying the URL, page title, and creation time.
    pub fn for_page(ctx: &PageContext, now_ms: i64) -> Self {
        let title = ctx
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        let created = chrono::DateTime::from_timestamp_millis(now_ms)
            .unwrap_or_default()
            .to_rfc3339();
        let content = format!(
            "---\nurl: {}\ntitle: {}\ncreated: {}\n---\n\n",
            ctx.url, title, created
        );
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            content,
            domain: ctx.domain.clone(),
            url: ctx.url.clone(),
            is_url_specific: false,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }
}

/// The active page, resolved from a tab URL. Absent entirely when the URL
/// cannot be parsed — dependents show a "no active context" state instead
/// of stale data.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    /// Hostname portion of the URL — the grouping key for notes.
    pub domain: String,
    pub url: String,
    pub title: Option<String>,
}

/// Editor preferences, persisted as separate top-level storage keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorPrefs {
    pub sans_font: String,
    pub mono_font: String,
    pub font_size: u32,
}

impl Default for EditorPrefs {
    fn default() -> Self {
        Self {
            sans_font: "sans-serif".to_string(),
            mono_font: "monospace".to_string(),
            font_size: 14,
        }
    }
}

pub type TabId = u32;

/// Snapshot of a browser tab as reported by the host shell.
/// `url` is None for privileged pages the host won't expose.
#[derive(Debug, Clone)]
pub struct TabInfo {
    pub id: TabId,
    pub url: Option<String>,
    pub title: Option<String>,
}

/// Tab lifecycle events fed to the resolver and the badge notifier.
#[derive(Debug, Clone)]
pub enum TabEvent {
    Activated(TabInfo),
    /// Navigation completed in a tab (not necessarily the focused one).
    Navigated(TabInfo),
    Closed(TabId),
}

/// Current wall-clock time as Unix ms.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PageContext {
        PageContext {
            domain: "example.com".to_string(),
            url: "https://example.com/a".to_string(),
            title: Some("Example Page".to_string()),
        }
    }

    #[test]
    fn for_page_seeds_metadata_header() {
        let note = Note::for_page(&ctx(), 1_700_000_000_000);
        assert!(note.content.starts_with("---\n"));
        assert!(note.content.contains("url: https://example.com/a"));
        assert!(note.content.contains("title: Example Page"));
        assert!(note.content.contains("created: "));
        assert_eq!(note.domain, "example.com");
        assert_eq!(note.created_at, note.updated_at);
        assert!(!note.id.is_empty());
        assert!(!note.is_url_specific);
    }

    #[test]
    fn for_page_defaults_blank_title() {
        let mut c = ctx();
        c.title = Some("   ".to_string());
        assert_eq!(Note::for_page(&c, 0).title, "Untitled");
        c.title = None;
        assert_eq!(Note::for_page(&c, 0).title, "Untitled");
    }

    #[test]
    fn note_serializes_with_storage_field_names() {
        let note = Note::for_page(&ctx(), 42);
        let v = serde_json::to_value(&note).unwrap();
        assert!(v.get("isUrlSpecific").is_some());
        assert!(v.get("createdAt").is_some());
        assert!(v.get("updatedAt").is_some());
        assert!(v.get("is_url_specific").is_none());
    }
}

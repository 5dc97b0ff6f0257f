use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::store::NoteStore;
use crate::types::{now_ms, Note};

/// MIME type of a per-note download.
pub const MARKDOWN_MIME: &str = "text/markdown";

/// Aggregate result of an import. Failures are per-record, never fatal to
/// the batch, so callers report "N imported, M skipped".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Payload for a per-note markdown download.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub contents: String,
}

/// Export every record as a JSON array (not the persisted map form).
pub async fn export_notes(store: &NoteStore) -> Result<String> {
    let mut notes = store.get_all().await?;
    crate::store::sort_by_recency(&mut notes);
    serde_json::to_string_pretty(&notes).context("serializing export")
}

/// Import a JSON array of note records, upserting each by id.
///
/// `id`, `domain`, and `content` must be non-empty strings (domain may not
/// be empty for a persisted record); everything else is coerced to a safe
/// default. Malformed elements are skipped with a warning.
pub async fn import_notes(store: &NoteStore, json: &str) -> Result<ImportReport> {
    let value: Value = serde_json::from_str(json).context("parsing import payload")?;
    let items = match value {
        Value::Array(items) => items,
        _ => bail!("import payload is not an array"),
    };

    let mut report = ImportReport::default();
    for item in &items {
        match coerce_record(item) {
            Some(note) => {
                store.save(&note).await?;
                report.imported += 1;
            }
            None => {
                tracing::warn!("skipping malformed import record: {item}");
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

/// Validate the required fields and fill the rest with defaults.
/// Returns None when the element can't become a well-formed record.
fn coerce_record(item: &Value) -> Option<Note> {
    let obj = item.as_object()?;
    let required = |key: &str| -> Option<String> {
        obj.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let id = required("id")?;
    let domain = required("domain")?;
    // Content must be a string but may be empty.
    let content = obj.get("content").and_then(Value::as_str)?.to_string();

    let now = now_ms();
    let created_at = obj.get("createdAt").and_then(Value::as_i64).unwrap_or(now);
    let updated_at = obj
        .get("updatedAt")
        .and_then(Value::as_i64)
        .unwrap_or(now)
        // Keep the record invariant even for inconsistent inputs.
        .max(created_at);

    Some(Note {
        id,
        title: obj
            .get("title")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("Untitled")
            .to_string(),
        content,
        domain,
        url: obj
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        is_url_specific: obj
            .get("isUrlSpecific")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        created_at,
        updated_at,
    })
}

/// Build the download payload for one note: sanitized title plus `.md`.
pub fn markdown_download(note: &Note) -> MarkdownFile {
    MarkdownFile {
        file_name: format!("{}.md", sanitize_file_name(&note.title)),
        mime_type: MARKDOWN_MIME,
        contents: note.content.clone(),
    }
}

/// Replace characters that are unsafe in filenames across platforms.
fn sanitize_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "note".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn note(id: &str, domain: &str, updated_at: i64) -> Note {
        Note {
            id: id.to_string(),
            title: format!("note {id}"),
            content: "# heading\n\nbody".to_string(),
            domain: domain.to_string(),
            url: format!("https://{domain}/page"),
            is_url_specific: false,
            created_at: 1,
            updated_at,
        }
    }

    #[tokio::test]
    async fn export_import_round_trips_by_id() {
        let store = NoteStore::in_memory();
        store.save(&note("a", "example.com", 10)).await.unwrap();
        store.save(&note("b", "other.org", 20)).await.unwrap();

        let exported = export_notes(&store).await.unwrap();

        let fresh = NoteStore::in_memory();
        let report = import_notes(&fresh, &exported).await.unwrap();
        assert_eq!(report, ImportReport { imported: 2, skipped: 0 });

        let original: HashMap<String, Note> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
        let restored: HashMap<String, Note> = fresh
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
        assert_eq!(original, restored);
    }

    #[tokio::test]
    async fn import_skips_records_missing_required_fields() {
        let store = NoteStore::in_memory();
        let json = serde_json::json!([
            {"id": "ok", "domain": "example.com", "content": "text"},
            {"id": "no-domain", "content": "text"},
        ])
        .to_string();

        let report = import_notes(&store, &json).await.unwrap();
        assert_eq!(report, ImportReport { imported: 1, skipped: 1 });
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "ok");
    }

    #[tokio::test]
    async fn import_coerces_missing_optional_fields() {
        let store = NoteStore::in_memory();
        let json = r#"[{"id": "x", "domain": "example.com", "content": ""}]"#;
        import_notes(&store, json).await.unwrap();

        let got = store.get("x").await.unwrap().unwrap();
        assert_eq!(got.title, "Untitled");
        assert_eq!(got.url, "");
        assert!(!got.is_url_specific);
        assert!(got.created_at > 0);
        assert!(got.updated_at >= got.created_at);
    }

    #[tokio::test]
    async fn import_rejects_non_array_payloads() {
        let store = NoteStore::in_memory();
        assert!(import_notes(&store, "{}").await.is_err());
        assert!(import_notes(&store, "not json").await.is_err());
    }

    #[test]
    fn markdown_download_sanitizes_title() {
        let mut n = note("a", "example.com", 10);
        n.title = "meeting: a/b <draft>?".to_string();
        let file = markdown_download(&n);
        assert_eq!(file.file_name, "meeting- a-b -draft--.md");
        assert_eq!(file.mime_type, "text/markdown");
        assert_eq!(file.contents, n.content);
    }

    #[test]
    fn markdown_download_never_yields_empty_name() {
        let mut n = note("a", "example.com", 10);
        n.title = "///".to_string();
        assert_eq!(markdown_download(&n).file_name, "---.md");
        n.title = "  .  ".to_string();
        assert_eq!(markdown_download(&n).file_name, "note.md");
    }
}

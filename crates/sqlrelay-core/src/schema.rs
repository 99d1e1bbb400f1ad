//! Schema store.
//!
//! A schema is a plain-text description of a database (tables, columns, keys)
//! that callers upload once and then reference by name when asking for a
//! query. [`SchemaStore`] is the seam the HTTP layer talks to; swap
//! [`FileSchemaStore`] for another backend without touching any handler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::{RelayError, Result};

/// Extensions accepted for uploaded schema files (compared case-insensitively).
pub const ACCEPTED_EXTENSIONS: &[&str] = &["txt"];

/// A named schema and its raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SchemaEntry {
    pub name: String,
    pub content: String,
}

#[async_trait]
pub trait SchemaStore: Send + Sync + 'static {
    /// Store `content` under `name`, replacing any previous entry.
    async fn put(&self, name: &str, content: &str) -> Result<SchemaEntry>;

    /// All known schema names, sorted ascending.
    async fn list(&self) -> Vec<String>;

    async fn get(&self, name: &str) -> Option<SchemaEntry>;
}

// ── Upload validation ────────────────────────────────────────────────────────

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are discarded, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9._-]` is dropped and leading/trailing `.`/`_` are trimmed, so
/// the result can never escape the schema directory.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == '_').to_owned()
}

/// Validate an uploaded file name and return the name it is stored under.
pub fn validate_upload_name(raw: Option<&str>) -> Result<String> {
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Err(RelayError::Validation("no file selected".into()));
    }

    let has_accepted_extension = |name: &str| {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                ACCEPTED_EXTENSIONS
                    .iter()
                    .any(|accepted| ext.eq_ignore_ascii_case(accepted))
            })
    };

    if !has_accepted_extension(raw) {
        return Err(unsupported(raw));
    }

    let name = sanitize_file_name(raw);
    // Sanitizing may strip everything but the extension, e.g. "../.txt".
    if !has_accepted_extension(&name) || Path::new(&name).file_stem().is_none() {
        return Err(unsupported(raw));
    }
    Ok(name)
}

fn unsupported(raw: &str) -> RelayError {
    RelayError::UnsupportedFileType {
        file_name: raw.to_owned(),
        accepted: ACCEPTED_EXTENSIONS
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Decode uploaded bytes as UTF-8 schema text.
pub fn decode_upload(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|_| RelayError::Validation("schema file must be UTF-8 encoded text".into()))
}

// ── In-memory store ──────────────────────────────────────────────────────────

/// Map-only store. Entries live as long as the process.
#[derive(Debug, Default)]
pub struct MemorySchemaStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchemaStore for MemorySchemaStore {
    async fn put(&self, name: &str, content: &str) -> Result<SchemaEntry> {
        insert(&self.entries, name, content);
        Ok(SchemaEntry {
            name: name.to_owned(),
            content: content.to_owned(),
        })
    }

    async fn list(&self) -> Vec<String> {
        sorted_names(&self.entries)
    }

    async fn get(&self, name: &str) -> Option<SchemaEntry> {
        lookup(&self.entries, name)
    }
}

// ── File-backed store ────────────────────────────────────────────────────────

/// Store that mirrors every entry to `<dir>/<name>`.
///
/// The file is written before the map is updated; a failed write leaves the
/// previous entry untouched so disk and memory never disagree.
#[derive(Debug)]
pub struct FileSchemaStore {
    dir: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileSchemaStore {
    /// Create `dir` if needed and load every schema file already in it.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut entries = HashMap::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(item) = read_dir.next_entry().await? {
            let path = item.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if validate_upload_name(Some(name)).ok().as_deref() != Some(name) {
                debug!(path = %path.display(), "skipping non-schema file");
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    entries.insert(name.to_owned(), content);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to load schema file"),
            }
        }

        info!(dir = %dir.display(), count = entries.len(), "schema store ready");
        Ok(Self {
            dir,
            entries: RwLock::new(entries),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SchemaStore for FileSchemaStore {
    async fn put(&self, name: &str, content: &str) -> Result<SchemaEntry> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, content).await?;
        insert(&self.entries, name, content);
        debug!(name, path = %path.display(), bytes = content.len(), "schema stored");
        Ok(SchemaEntry {
            name: name.to_owned(),
            content: content.to_owned(),
        })
    }

    async fn list(&self) -> Vec<String> {
        sorted_names(&self.entries)
    }

    async fn get(&self, name: &str) -> Option<SchemaEntry> {
        lookup(&self.entries, name)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

// A poisoned lock only means another writer panicked mid-insert; the map
// itself is still a valid HashMap, so keep serving it.
fn insert(entries: &RwLock<HashMap<String, String>>, name: &str, content: &str) {
    let mut map = entries.write().unwrap_or_else(|p| p.into_inner());
    map.insert(name.to_owned(), content.to_owned());
}

fn lookup(entries: &RwLock<HashMap<String, String>>, name: &str) -> Option<SchemaEntry> {
    let map = entries.read().unwrap_or_else(|p| p.into_inner());
    map.get(name).map(|content| SchemaEntry {
        name: name.to_owned(),
        content: content.clone(),
    })
}

fn sorted_names(entries: &RwLock<HashMap<String, String>>) -> Vec<String> {
    let map = entries.read().unwrap_or_else(|p| p.into_inner());
    let mut names: Vec<String> = map.keys().cloned().collect();
    names.sort();
    names
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(r"C:\tmp\loans db.txt"), "loans_db.txt");
        assert_eq!(sanitize_file_name("..hidden.txt"), "hidden.txt");
        assert_eq!(sanitize_file_name("cartera$%.txt"), "cartera.txt");
    }

    #[test]
    fn upload_name_requires_a_file() {
        assert!(matches!(validate_upload_name(None), Err(RelayError::Validation(_))));
        assert!(matches!(validate_upload_name(Some("  ")), Err(RelayError::Validation(_))));
    }

    #[test]
    fn upload_name_requires_text_extension() {
        assert_eq!(validate_upload_name(Some("loans.txt")).unwrap(), "loans.txt");
        assert_eq!(validate_upload_name(Some("LOANS.TXT")).unwrap(), "LOANS.TXT");
        assert!(matches!(
            validate_upload_name(Some("loans.csv")),
            Err(RelayError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            validate_upload_name(Some("loans")),
            Err(RelayError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            validate_upload_name(Some("../.txt")),
            Err(RelayError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert_eq!(decode_upload(b"CREATE TABLE loans;".to_vec()).unwrap(), "CREATE TABLE loans;");
        assert!(decode_upload(vec![0xff, 0xfe, 0x00]).is_err());
    }

    #[tokio::test]
    async fn memory_store_last_write_wins() {
        let store = MemorySchemaStore::new();
        store.put("b.txt", "one").await.unwrap();
        store.put("a.txt", "x").await.unwrap();
        store.put("b.txt", "two").await.unwrap();

        assert_eq!(store.list().await, vec!["a.txt", "b.txt"]);
        assert_eq!(store.get("b.txt").await.unwrap().content, "two");
        assert!(store.get("missing.txt").await.is_none());
    }

    #[tokio::test]
    async fn file_store_mirrors_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSchemaStore::open(dir.path()).await.unwrap();
            store.put("loans.txt", "loans(id, branch_id, status)").await.unwrap();
            store.put("loans.txt", "loans(id, branch_id, status, amount)").await.unwrap();
        }
        let on_disk = std::fs::read_to_string(dir.path().join("loans.txt")).unwrap();
        assert_eq!(on_disk, "loans(id, branch_id, status, amount)");

        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        let reopened = FileSchemaStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.list().await, vec!["loans.txt"]);
        assert_eq!(
            reopened.get("loans.txt").await.unwrap().content,
            "loans(id, branch_id, status, amount)"
        );
    }

    #[tokio::test]
    async fn file_store_keeps_map_on_failed_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSchemaStore::open(dir.path().join("schemas")).await.unwrap();
        store.put("a.txt", "v1").await.unwrap();

        std::fs::remove_dir_all(store.dir()).unwrap();
        assert!(store.put("a.txt", "v2").await.is_err());
        assert_eq!(store.get("a.txt").await.unwrap().content, "v1");
    }
}

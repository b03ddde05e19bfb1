//! Collaborators the engine consumes: document source, inline images,
//! highlight storage, key-value persistence and the conversation-thread
//! pointer. The engine never owns storage; it calls these traits and
//! reports their failures to the caller.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::address::AnchoredRange;
use crate::error::{Error, Result};
use crate::util::{data_uri, decode_text, extract_xml_encoding, time_now_secs};

/// Identity of a document in the host library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a persisted highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(pub i64);

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    pub external_id: Option<String>,
}

/// A highlight row as the storage collaborator keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: HighlightId,
    pub document_id: DocumentId,
    #[serde(flatten)]
    pub range: AnchoredRange,
    pub note: Option<String>,
    pub created_at: i64,
}

pub trait DocumentSource {
    /// Full HTML of a document.
    fn document_content(&self, id: DocumentId) -> Result<String>;

    fn document_metadata(&self, id: DocumentId) -> Result<DocumentMetadata>;
}

pub trait ImageSource {
    /// Data URI of the `index`-th embedded image of a document.
    fn inline_image_data(&self, document: DocumentId, index: u32) -> Result<String>;
}

pub trait HighlightStore {
    fn create_highlight(&mut self, document: DocumentId, range: &AnchoredRange)
    -> Result<HighlightId>;

    fn delete_highlight(&mut self, id: HighlightId) -> Result<()>;

    /// Attach a note; `None` removes it.
    fn save_note(&mut self, id: HighlightId, note: Option<&str>) -> Result<()>;

    fn list_highlights(&self, document: DocumentId) -> Result<Vec<Highlight>>;
}

/// Small string records keyed per document (`reader-progress-<id>`,
/// `reader-appearance-<id>`).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

pub trait ThreadPointerSink {
    /// Remember where a conversation thread left the reader.
    fn set_thread_last_cfi(&mut self, thread: i64, cfi: &str) -> Result<()>;
}

/// Everything a reader needs from its host.
pub trait Host: DocumentSource + ImageSource + HighlightStore + KeyValueStore + ThreadPointerSink {}

impl<T> Host for T where
    T: DocumentSource + ImageSource + HighlightStore + KeyValueStore + ThreadPointerSink
{
}

// --- Implementation: In-Memory ---

/// Documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocuments {
    documents: HashMap<DocumentId, (DocumentMetadata, String)>,
}

impl MemoryDocuments {
    pub fn insert(&mut self, id: DocumentId, title: &str, html: impl Into<String>) {
        let metadata = DocumentMetadata {
            title: title.to_string(),
            external_id: None,
        };
        self.documents.insert(id, (metadata, html.into()));
    }

    /// Insert raw markup, decoding it as UTF-8 or the encoding its XML
    /// declaration names, else Windows-1252.
    pub fn insert_bytes(&mut self, id: DocumentId, title: &str, bytes: &[u8]) {
        let hint = extract_xml_encoding(bytes);
        let html = decode_text(bytes, hint).into_owned();
        self.insert(id, title, html);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentSource for MemoryDocuments {
    fn document_content(&self, id: DocumentId) -> Result<String> {
        self.documents
            .get(&id)
            .map(|(_, html)| html.clone())
            .ok_or_else(|| Error::DocumentSource(format!("no document {id}")))
    }

    fn document_metadata(&self, id: DocumentId) -> Result<DocumentMetadata> {
        self.documents
            .get(&id)
            .map(|(metadata, _)| metadata.clone())
            .ok_or_else(|| Error::DocumentSource(format!("no document {id}")))
    }
}

/// Raw image bytes held in memory, served as data URIs.
#[derive(Debug, Clone, Default)]
pub struct MemoryImages {
    images: HashMap<(DocumentId, u32), Vec<u8>>,
}

impl MemoryImages {
    pub fn insert(&mut self, document: DocumentId, index: u32, data: Vec<u8>) {
        self.images.insert((document, index), data);
    }
}

impl ImageSource for MemoryImages {
    fn inline_image_data(&self, document: DocumentId, index: u32) -> Result<String> {
        self.images
            .get(&(document, index))
            .map(|data| data_uri(data))
            .ok_or_else(|| Error::InlineResource {
                document: document.0,
                index,
                reason: "not found".to_string(),
            })
    }
}

/// Highlight rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHighlights {
    rows: Vec<Highlight>,
    next_id: i64,
    /// Reject every write, to exercise failure paths.
    pub read_only: bool,
}

impl MemoryHighlights {
    pub fn rows(&self) -> &[Highlight] {
        &self.rows
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::Storage("highlight store is read-only".to_string()));
        }
        Ok(())
    }
}

impl HighlightStore for MemoryHighlights {
    fn create_highlight(
        &mut self,
        document: DocumentId,
        range: &AnchoredRange,
    ) -> Result<HighlightId> {
        self.check_writable()?;
        self.next_id += 1;
        let id = HighlightId(self.next_id);
        self.rows.push(Highlight {
            id,
            document_id: document,
            range: range.clone(),
            note: None,
            created_at: time_now_secs(),
        });
        Ok(id)
    }

    fn delete_highlight(&mut self, id: HighlightId) -> Result<()> {
        self.check_writable()?;
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        if self.rows.len() == before {
            return Err(Error::UnknownHighlight(id.0));
        }
        Ok(())
    }

    fn save_note(&mut self, id: HighlightId, note: Option<&str>) -> Result<()> {
        self.check_writable()?;
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(Error::UnknownHighlight(id.0))?;
        row.note = note.map(str::to_string);
        Ok(())
    }

    fn list_highlights(&self, document: DocumentId) -> Result<Vec<Highlight>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.document_id == document)
            .cloned()
            .collect())
    }
}

/// Key-value pairs held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Last CFI recorded per conversation thread.
#[derive(Debug, Clone, Default)]
pub struct MemoryThreads {
    pub pointers: HashMap<i64, String>,
}

impl ThreadPointerSink for MemoryThreads {
    fn set_thread_last_cfi(&mut self, thread: i64, cfi: &str) -> Result<()> {
        self.pointers.insert(thread, cfi.to_string());
        Ok(())
    }
}

// --- Implementation: Local File ---

/// Key-value pairs persisted as one JSON object on disk. Every `set`
/// rewrites the file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open a store, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

// --- Bundled host ---

/// A complete host assembled from the in-memory collaborators, with a
/// pluggable key-value store.
#[derive(Debug, Default)]
pub struct MemoryHost<S = MemoryStore> {
    pub documents: MemoryDocuments,
    pub images: MemoryImages,
    pub highlights: MemoryHighlights,
    pub storage: S,
    pub threads: MemoryThreads,
}

impl<S: KeyValueStore> MemoryHost<S> {
    pub fn with_storage(storage: S) -> Self {
        Self {
            documents: MemoryDocuments::default(),
            images: MemoryImages::default(),
            highlights: MemoryHighlights::default(),
            storage,
            threads: MemoryThreads::default(),
        }
    }
}

impl<S> DocumentSource for MemoryHost<S> {
    fn document_content(&self, id: DocumentId) -> Result<String> {
        self.documents.document_content(id)
    }

    fn document_metadata(&self, id: DocumentId) -> Result<DocumentMetadata> {
        self.documents.document_metadata(id)
    }
}

impl<S> ImageSource for MemoryHost<S> {
    fn inline_image_data(&self, document: DocumentId, index: u32) -> Result<String> {
        self.images.inline_image_data(document, index)
    }
}

impl<S> HighlightStore for MemoryHost<S> {
    fn create_highlight(
        &mut self,
        document: DocumentId,
        range: &AnchoredRange,
    ) -> Result<HighlightId> {
        self.highlights.create_highlight(document, range)
    }

    fn delete_highlight(&mut self, id: HighlightId) -> Result<()> {
        self.highlights.delete_highlight(id)
    }

    fn save_note(&mut self, id: HighlightId, note: Option<&str>) -> Result<()> {
        self.highlights.save_note(id, note)
    }

    fn list_highlights(&self, document: DocumentId) -> Result<Vec<Highlight>> {
        self.highlights.list_highlights(document)
    }
}

impl<S: KeyValueStore> KeyValueStore for MemoryHost<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage.set(key, value)
    }
}

impl<S> ThreadPointerSink for MemoryHost<S> {
    fn set_thread_last_cfi(&mut self, thread: i64, cfi: &str) -> Result<()> {
        self.threads.set_thread_last_cfi(thread, cfi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::StructuralPath;

    fn range(text: &str) -> AnchoredRange {
        AnchoredRange {
            start_path: StructuralPath(vec![0, 0]),
            start_offset: 0,
            end_path: StructuralPath(vec![0, 0]),
            end_offset: text.chars().count(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_highlight_store_lifecycle() {
        let mut store = MemoryHighlights::default();
        let doc = DocumentId(7);
        let id = store.create_highlight(doc, &range("words")).unwrap();
        store.save_note(id, Some("a note")).unwrap();
        let rows = store.list_highlights(doc).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].note.as_deref(), Some("a note"));
        assert!(store.list_highlights(DocumentId(8)).unwrap().is_empty());

        store.delete_highlight(id).unwrap();
        assert!(matches!(
            store.delete_highlight(id),
            Err(Error::UnknownHighlight(_))
        ));
    }

    #[test]
    fn test_read_only_store_rejects_writes() {
        let mut store = MemoryHighlights {
            read_only: true,
            ..Default::default()
        };
        assert!(matches!(
            store.create_highlight(DocumentId(1), &range("x")),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_highlight_row_json_is_flat() {
        let row = Highlight {
            id: HighlightId(3),
            document_id: DocumentId(1),
            range: range("abc"),
            note: None,
            created_at: 0,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["startPath"], serde_json::json!([0, 0]));
        assert_eq!(json["endOffset"], 3);
    }

    #[test]
    fn test_missing_image_is_inline_resource_error() {
        let images = MemoryImages::default();
        let err = images.inline_image_data(DocumentId(1), 4).unwrap_err();
        assert!(matches!(err, Error::InlineResource { index: 4, .. }));
    }

    #[test]
    fn test_insert_bytes_decodes_legacy_encodings() {
        let mut documents = MemoryDocuments::default();
        documents.insert_bytes(DocumentId(1), "utf8", "<p>café</p>".as_bytes());
        documents.insert_bytes(DocumentId(2), "cp1252", b"<p>caf\xe9 \x93quoted\x94</p>");
        assert_eq!(documents.len(), 2);
        assert_eq!(documents.document_content(DocumentId(1)).unwrap(), "<p>café</p>");
        assert_eq!(
            documents.document_content(DocumentId(2)).unwrap(),
            "<p>café \u{201c}quoted\u{201d}</p>"
        );
    }

    #[test]
    fn test_file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        {
            let mut store = FileStore::open(&path).unwrap();
            assert_eq!(store.get("reader-progress-1").unwrap(), None);
            store.set("reader-progress-1", r#"{"page":4}"#).unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(
            store.get("reader-progress-1").unwrap().as_deref(),
            Some(r#"{"page":4}"#)
        );
    }
}

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{validate_collection, DocKey, Document, DocumentStore};
use crate::error::StoreError;

const LOCK_FILE: &str = ".commit.lock";

/// JSON documents on disk, one file per document:
/// `<root>/<collection path>/<id>.json`.
///
/// Writes go through a uniquely named temp file and a rename so readers never
/// observe a half-written document. Every write holds an exclusive OS lock on
/// `<root>/.commit.lock` from the version check to the rename, so stores in
/// different processes sharing one root serialize their commits. Inside one
/// instance `commit` queues writers before they block on the OS lock, and
/// nothing in the locked section awaits.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    commit: Mutex<()>,
}

/// Exclusive hold on a root's lock file; released on drop.
struct RootLock(File);

impl RootLock {
    fn acquire(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        FileExt::lock_exclusive(&file).map_err(|e| {
            StoreError::Unavailable(format!("lock {}: {e}", path.display()))
        })?;
        Ok(Self(file))
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commit: Mutex::new(()),
        }
    }

    /// Store rooted at [`crate::store_dir`].
    pub fn open_default() -> Self {
        Self::new(crate::store_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        collection
            .split('/')
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
    }

    fn doc_path(&self, key: &DocKey) -> PathBuf {
        self.collection_dir(key.collection())
            .join(format!("{}.json", key.id()))
    }
}

fn read_doc(path: &Path) -> Result<Option<Document>, StoreError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_doc(path: &Path, doc: &Document) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?;
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(serde_json::to_string_pretty(doc)?.as_bytes())?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, key: &DocKey) -> Result<Option<Document>, StoreError> {
        read_doc(&self.doc_path(key))
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        validate_collection(collection)?;
        let dir = self.collection_dir(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            // temp files start with '.', which no valid id does
            let Some(id) = name.strip_suffix(".json").filter(|id| !id.starts_with('.')) else {
                continue;
            };
            if let Some(doc) = read_doc(&entry.path())? {
                docs.push((id.to_string(), doc));
            }
        }
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(docs)
    }

    async fn put(&self, key: &DocKey, data: Value) -> Result<Document, StoreError> {
        let _guard = self.commit.lock().await;
        let _lock = RootLock::acquire(&self.root)?;
        let path = self.doc_path(key);
        let doc = match read_doc(&path)? {
            Some(current) => current.successor(data),
            None => Document::initial(data),
        };
        write_doc(&path, &doc)?;
        Ok(doc)
    }

    async fn delete(&self, key: &DocKey) -> Result<bool, StoreError> {
        let _guard = self.commit.lock().await;
        let _lock = RootLock::acquire(&self.root)?;
        match fs::remove_file(self.doc_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn compare_and_put(
        &self,
        key: &DocKey,
        expected: Option<u64>,
        data: Value,
    ) -> Result<Document, StoreError> {
        let _guard = self.commit.lock().await;
        let _lock = RootLock::acquire(&self.root)?;
        let path = self.doc_path(key);
        let current = read_doc(&path)?;
        if current.as_ref().map(|doc| doc.version) != expected {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        let doc = match current {
            Some(current) => current.successor(data),
            None => Document::initial(data),
        };
        write_doc(&path, &doc)?;
        Ok(doc)
    }
}

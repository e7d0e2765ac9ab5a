//! JSON file persistence for the in-memory document store.
//!
//! Layout: `{"collections": {"<name>": {"<id>": {<fields>}}}}`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    infra::{contracts::SnapshotAdapter, error::AppError},
    store::memory::Collections,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    collections: Collections,
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot. A missing file is an empty store.
    pub fn read(&self) -> Result<Collections, AppError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no store snapshot yet, starting empty");
            return Ok(Collections::new());
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| AppError::SnapshotRead {
            path: self.path.clone(),
            source,
        })?;
        let document: SnapshotDocument =
            serde_json::from_str(&raw).map_err(|source| AppError::SnapshotParse {
                path: self.path.clone(),
                source,
            })?;

        Ok(document.collections)
    }

    /// Writes the snapshot through a sibling temp file so a crash never
    /// leaves a truncated snapshot behind.
    pub fn write(&self, collections: &Collections) -> Result<(), AppError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| AppError::StorageDirCreate {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let document = SnapshotDocument {
            collections: collections.clone(),
        };
        let raw = serde_json::to_string_pretty(&document).map_err(AppError::SnapshotEncode)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, raw).map_err(|source| AppError::SnapshotWrite {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| AppError::SnapshotWrite {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            collections = collections.len(),
            "store snapshot saved"
        );
        Ok(())
    }
}

impl SnapshotAdapter for SnapshotFile {
    fn load(&self) -> Result<Collections> {
        Ok(self.read()?)
    }

    fn save(&self, collections: &Collections) -> Result<()> {
        Ok(self.write(collections)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        store::{DocumentStore, InMemoryStore, CHATS},
        test_support::fields,
    };

    #[test]
    fn missing_file_loads_as_empty_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let snapshot = SnapshotFile::new(dir.path().join("store.json"));

        assert!(snapshot.load().expect("load").is_empty());
    }

    #[test]
    fn saved_store_loads_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let snapshot = SnapshotFile::new(dir.path().join("nested").join("store.json"));
        let store = InMemoryStore::new();
        store
            .set(CHATS, "c1", fields(json!({"type": "group", "participants": ["a"]})))
            .expect("seed");

        snapshot.save(&store.export().expect("export")).expect("save");
        let restored = InMemoryStore::from_collections(snapshot.load().expect("load"));

        let doc = restored.get(CHATS, "c1").expect("read").expect("chat present");
        assert_eq!(doc.get("type"), Some(&json!("group")));
        assert!(!snapshot.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").expect("write");

        let err = SnapshotFile::new(&path).read().expect_err("must fail");

        assert!(matches!(err, AppError::SnapshotParse { .. }));
    }
}

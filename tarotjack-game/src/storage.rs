//! Document stores behind the [`GameStorage`](crate::GameStorage) port.
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::GameStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document key '{0}' is not a plain name")]
    InvalidKey(String),
    #[error("document '{key}' could not be decoded: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("document '{key}' could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error on document '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

fn decode<T: DeserializeOwned>(key: &str, text: &str) -> Result<T, StorageError> {
    serde_json::from_str(text).map_err(|source| StorageError::Malformed {
        key: key.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string_pretty(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })
}

/// JSON documents held in memory. Clones share the same backing map, so a
/// test can keep a handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    docs: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON text stored under `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.docs.borrow().get(key).cloned()
    }

    /// Overwrite `key` with arbitrary text, bypassing encoding.
    pub fn put_raw(&self, key: &str, text: impl Into<String>) {
        self.docs.borrow_mut().insert(key.to_string(), text.into());
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.docs.borrow().contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.docs.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl GameStorage for MemoryStorage {
    type Error = StorageError;

    fn load_document<T>(&self, key: &str) -> Result<Option<T>, Self::Error>
    where
        T: DeserializeOwned,
    {
        self.docs
            .borrow()
            .get(key)
            .map(|text| decode(key, text))
            .transpose()
    }

    fn save_document<T>(&self, key: &str, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        let text = encode(key, value)?;
        self.docs.borrow_mut().insert(key.to_string(), text);
        Ok(())
    }

    fn delete_document(&self, key: &str) -> Result<(), Self::Error> {
        self.docs.borrow_mut().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per document under a root directory. Writes go to
/// a temp file that is synced and renamed over the target.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let plain = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }

    fn write_atomic(&self, key: &str, text: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let tmp_path = self.root.join(format!("{key}.json.tmp"));
        let final_path = self.root.join(format!("{key}.json"));
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(text.as_bytes())?;
            writer.flush()?;
            let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &final_path)?;
        if let Ok(dir) = File::open(&self.root) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

impl GameStorage for FileStorage {
    type Error = StorageError;

    fn load_document<T>(&self, key: &str) -> Result<Option<T>, Self::Error>
    where
        T: DeserializeOwned,
    {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => decode(key, &text).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn save_document<T>(&self, key: &str, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        self.path_for(key)?;
        let text = encode(key, value)?;
        self.write_atomic(key, &text)
            .map_err(|source| StorageError::Io {
                key: key.to_string(),
                source,
            })
    }

    fn delete_document(&self, key: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

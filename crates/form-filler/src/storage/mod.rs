//! Storage collaborators: where filled documents go and where templates come from.

pub mod templates;

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

pub use templates::{
    CachedTemplateSource, FilesystemTemplateSource, TemplateSource, TemplateSourceError,
};

/// Document bytes read back from a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StoredDocument {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Durable sink for generated documents.
///
/// `store` receives a suggested path and returns the path actually used.
pub trait DocumentStore: Send + Sync {
    fn store(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;
    fn load(&self, path: &str) -> Result<StoredDocument, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage path `{0}`")]
    InvalidPath(String),
    #[error("no document stored at `{0}`")]
    NotFound(String),
    #[error("storage i/o failed for `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Normalizes a logical path (`/content/filled-forms/x.pdf`) into relative
/// segments, refusing anything that would climb out of the store.
fn logical_segments(path: &str) -> Result<Vec<&str>, StorageError> {
    let mut segments = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(segment) => match segment.to_str() {
                Some(segment) => segments.push(segment),
                None => return Err(StorageError::InvalidPath(path.to_string())),
            },
            Component::ParentDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidPath(path.to_string()))
            }
        }
    }
    if segments.is_empty() {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn canonical_path(path: &str) -> Result<String, StorageError> {
    Ok(format!("/{}", logical_segments(path)?.join("/")))
}

/// Attempts made before giving up on finding a free name.
const MAX_NAME_ATTEMPTS: usize = 100;

/// `attempt` 0 is `path` itself; later attempts suffix the file stem
/// (`form1040_1.pdf` -> `form1040_1-2.pdf`).
fn candidate_path(path: &str, attempt: usize) -> String {
    if attempt == 0 {
        return path.to_string();
    }
    let (directory, file) = match path.rsplit_once('/') {
        Some((directory, file)) => (Some(directory), file),
        None => (None, path),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}-{attempt}.{extension}"),
        _ => format!("{file}-{attempt}"),
    };
    match directory {
        Some(directory) => format!("{directory}/{file}"),
        None => file,
    }
}

/// Writes documents beneath a root directory, mirroring the logical path.
#[derive(Debug, Clone)]
pub struct FilesystemDocumentStore {
    root: PathBuf,
}

impl FilesystemDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        resolved.extend(logical_segments(path)?);
        Ok(resolved)
    }
}

impl DocumentStore for FilesystemDocumentStore {
    fn store(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        let io_error = |source| StorageError::Io {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let requested = canonical_path(path)?;
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let stored = candidate_path(&requested, attempt);
            let target = self.resolve(&stored)?;
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(io_error(err)),
            };
            file.write_all(bytes).map_err(io_error)?;

            info!(path = %stored, file = %target.display(), content_type, size = bytes.len(), "stored document");
            return Ok(stored);
        }

        Err(io_error(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free file name left for document",
        )))
    }

    fn load(&self, path: &str) -> Result<StoredDocument, StorageError> {
        let target = self.resolve(path)?;
        let bytes = fs::read(&target).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })?;
        let content_type = mime_guess::from_path(&target)
            .first_or_octet_stream()
            .to_string();

        Ok(StoredDocument {
            path: canonical_path(path)?,
            content_type,
            bytes,
        })
    }
}

/// Process-local store, handy for tests and throwaway deployments.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    documents: Arc<Mutex<HashMap<String, StoredDocument>>>,
}

impl InMemoryDocumentStore {
    pub fn paths(&self) -> Vec<String> {
        let guard = self.documents.lock().expect("document store mutex poisoned");
        let mut paths: Vec<String> = guard.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.documents
            .lock()
            .expect("document store mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn store(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        let requested = canonical_path(path)?;
        let mut guard = self.documents.lock().expect("document store mutex poisoned");
        let stored = (0..MAX_NAME_ATTEMPTS)
            .map(|attempt| candidate_path(&requested, attempt))
            .find(|candidate| !guard.contains_key(candidate))
            .ok_or_else(|| StorageError::Io {
                path: path.to_string(),
                source: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "no free file name left for document",
                ),
            })?;
        guard.insert(
            stored.clone(),
            StoredDocument {
                path: stored.clone(),
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(stored)
    }

    fn load(&self, path: &str) -> Result<StoredDocument, StorageError> {
        let key = canonical_path(path)?;
        let guard = self.documents.lock().expect("document store mutex poisoned");
        guard
            .get(&key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

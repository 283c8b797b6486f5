use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Read-only lookup of named template resources (PDF templates, HTML pages).
pub trait TemplateSource: Send + Sync {
    fn load_template(&self, name: &str) -> Result<Arc<[u8]>, TemplateSourceError>;

    /// Human-readable location of `name`, used in error pages and logs.
    fn describe(&self, name: &str) -> String {
        name.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateSourceError {
    #[error("template `{0}` was not found")]
    NotFound(String),
    #[error("template name `{0}` is not a plain file name")]
    InvalidName(String),
    #[error("failed to read template `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Templates stored as files directly inside one directory.
#[derive(Debug, Clone)]
pub struct FilesystemTemplateSource {
    directory: PathBuf,
}

impl FilesystemTemplateSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, TemplateSourceError> {
        let trimmed = name.trim_start_matches('/');
        let mut components = Path::new(trimmed).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.directory.join(trimmed)),
            _ => Err(TemplateSourceError::InvalidName(name.to_string())),
        }
    }
}

impl TemplateSource for FilesystemTemplateSource {
    fn load_template(&self, name: &str) -> Result<Arc<[u8]>, TemplateSourceError> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(template = name, path = %path.display(), size = bytes.len(), "loaded template");
                Ok(Arc::from(bytes))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(TemplateSourceError::NotFound(name.to_string()))
            }
            Err(source) => Err(TemplateSourceError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn describe(&self, name: &str) -> String {
        match self.path_for(name) {
            Ok(path) => path.display().to_string(),
            Err(_) => name.to_string(),
        }
    }
}

/// Keeps every successfully loaded template in memory.
///
/// Failures are not cached, so a template dropped into place later is picked up.
pub struct CachedTemplateSource<S> {
    inner: S,
    cache: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl<S: TemplateSource> CachedTemplateSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().expect("template cache mutex poisoned").len()
    }
}

impl<S: TemplateSource> TemplateSource for CachedTemplateSource<S> {
    fn load_template(&self, name: &str) -> Result<Arc<[u8]>, TemplateSourceError> {
        if let Some(bytes) = self
            .cache
            .lock()
            .expect("template cache mutex poisoned")
            .get(name)
        {
            return Ok(Arc::clone(bytes));
        }

        let bytes = self.inner.load_template(name)?;
        self.cache
            .lock()
            .expect("template cache mutex poisoned")
            .insert(name.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    fn describe(&self, name: &str) -> String {
        self.inner.describe(name)
    }
}

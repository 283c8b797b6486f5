use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use form_filler::forms::FormFillEngine;
use form_filler::storage::{
    CachedTemplateSource, FilesystemDocumentStore, FilesystemTemplateSource, TemplateSource,
};
use form_filler::submissions::{
    Form1040Service, RepositoryError, SubmissionId, SubmissionRecord, SubmissionRepository,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type FilesystemFormService =
    Form1040Service<InMemorySubmissionRepository, FilesystemDocumentStore>;

#[derive(Default, Clone)]
pub(crate) struct InMemorySubmissionRepository {
    records: Arc<Mutex<HashMap<SubmissionId, SubmissionRecord>>>,
}

impl SubmissionRepository for InMemorySubmissionRepository {
    fn insert(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn attach_pdf(&self, id: &SubmissionId, pdf_path: &str) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.get_mut(id) {
            Some(record) => {
                record.pdf_path = Some(pdf_path.to_string());
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

/// Template and storage locations for one service instance.
#[derive(Debug, Clone)]
pub(crate) struct ServiceLayout {
    pub(crate) template_dir: PathBuf,
    pub(crate) template_name: String,
    pub(crate) storage_root: PathBuf,
    pub(crate) output_dir: String,
    pub(crate) cache_templates: bool,
}

pub(crate) fn template_source(directory: PathBuf, cache: bool) -> Arc<dyn TemplateSource> {
    let source = FilesystemTemplateSource::new(directory);
    if cache {
        Arc::new(CachedTemplateSource::new(source))
    } else {
        Arc::new(source)
    }
}

pub(crate) fn build_form_service(
    layout: ServiceLayout,
) -> (FilesystemFormService, Arc<InMemorySubmissionRepository>) {
    let repository = Arc::new(InMemorySubmissionRepository::default());
    let documents = Arc::new(FilesystemDocumentStore::new(layout.storage_root));
    let templates = template_source(layout.template_dir, layout.cache_templates);
    let engine = Arc::new(FormFillEngine::new(layout.output_dir));
    let service = Form1040Service::new(
        repository.clone(),
        documents,
        templates,
        layout.template_name,
        engine,
    );
    (service, repository)
}

/// Parses a `key=value` command-line pair.
pub(crate) fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::forms::pdf::sample::TemplateBuilder;
use crate::forms::{Clock, FormFillEngine, LopdfCodec, SubmissionData, DEFAULT_OUTPUT_DIR};
use crate::storage::{InMemoryDocumentStore, TemplateSource, TemplateSourceError};
use crate::submissions::repository::{
    RepositoryError, SubmissionId, SubmissionRecord, SubmissionRepository,
};
use crate::submissions::{form1040_router, Form1040Service, FORM_1040_PAGE};

pub(super) const TEMPLATE_NAME: &str = "f1040.pdf";
pub(super) const START_MILLIS: i64 = 1_700_000_000_000;

pub(super) type TestService = Form1040Service<MemoryRepository, InMemoryDocumentStore>;

pub(super) fn jane_doe() -> SubmissionData {
    [
        ("firstName", "Jane"),
        ("lastName", "Doe"),
        ("ssn", "123-45-6789"),
        ("wages", "50000"),
        ("filingStatus", "single"),
    ]
    .into_iter()
    .collect()
}

/// Advances one millisecond per reading.
pub(super) struct SteppedClock(AtomicI64);

impl Clock for SteppedClock {
    fn now_millis(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Never advances.
pub(super) struct FrozenClock(pub(super) i64);

impl Clock for FrozenClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

pub(super) fn engine() -> Arc<FormFillEngine> {
    Arc::new(FormFillEngine::with_codec(
        LopdfCodec,
        DEFAULT_OUTPUT_DIR,
        Arc::new(SteppedClock(AtomicI64::new(START_MILLIS))),
    ))
}

#[derive(Default)]
pub(super) struct MemoryTemplates {
    entries: HashMap<String, Arc<[u8]>>,
}

impl MemoryTemplates {
    pub(super) fn with(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries
            .insert(name.to_string(), Arc::from(bytes.into()));
        self
    }
}

impl TemplateSource for MemoryTemplates {
    fn load_template(&self, name: &str) -> Result<Arc<[u8]>, TemplateSourceError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateSourceError::NotFound(name.to_string()))
    }

    fn describe(&self, name: &str) -> String {
        format!("memory://{name}")
    }
}

pub(super) fn form1040_templates() -> MemoryTemplates {
    let template = TemplateBuilder::form1040().build().expect("sample template builds");
    MemoryTemplates::default().with(TEMPLATE_NAME, template)
}

pub(super) fn pages() -> Arc<dyn TemplateSource> {
    Arc::new(MemoryTemplates::default().with(
        FORM_1040_PAGE,
        "<form method='post' action='/bin/1040'></form>",
    ))
}

pub(super) fn build_service_with(
    templates: MemoryTemplates,
) -> (TestService, Arc<MemoryRepository>, Arc<InMemoryDocumentStore>) {
    let repository = Arc::new(MemoryRepository::default());
    let documents = Arc::new(InMemoryDocumentStore::default());
    let service = Form1040Service::new(
        repository.clone(),
        documents.clone(),
        Arc::new(templates),
        TEMPLATE_NAME,
        engine(),
    );
    (service, repository, documents)
}

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<InMemoryDocumentStore>) {
    build_service_with(form1040_templates())
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    form1040_router(Arc::new(service), pages())
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<SubmissionId, SubmissionRecord>>>,
}

impl MemoryRepository {
    pub(super) fn records(&self) -> Vec<SubmissionRecord> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        guard.values().cloned().collect()
    }
}

impl SubmissionRepository for MemoryRepository {
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
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        record.pdf_path = Some(pdf_path.to_string());
        Ok(())
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

pub(super) struct UnavailableRepository;

impl SubmissionRepository for UnavailableRepository {
    fn insert(&self, _record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("repository offline".to_string()))
    }

    fn attach_pdf(&self, _id: &SubmissionId, _pdf_path: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("repository offline".to_string()))
    }

    fn fetch(&self, _id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("repository offline".to_string()))
    }
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

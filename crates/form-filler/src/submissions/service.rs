use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::repository::{RepositoryError, SubmissionId, SubmissionRecord, SubmissionRepository};
use crate::forms::{
    FillWarning, FormCodec, FormFillEngine, FormFillError, LopdfCodec, MonotonicStamp,
    SubmissionData,
};
use crate::storage::{DocumentStore, StorageError, StoredDocument, TemplateSource};

/// Records a 1040 submission, fills the template, and stores the result.
pub struct Form1040Service<R, D, C = LopdfCodec> {
    repository: Arc<R>,
    documents: Arc<D>,
    templates: Arc<dyn TemplateSource>,
    template_name: String,
    engine: Arc<FormFillEngine<C>>,
    record_stamps: MonotonicStamp,
}

/// Result handed back to the intake layer after a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub submission_id: SubmissionId,
    pub pdf_path: String,
    pub warnings: Vec<FillWarning>,
    pub fields_written: usize,
}

impl<R, D, C> Form1040Service<R, D, C>
where
    R: SubmissionRepository + 'static,
    D: DocumentStore + 'static,
    C: FormCodec + 'static,
{
    pub fn new(
        repository: Arc<R>,
        documents: Arc<D>,
        templates: Arc<dyn TemplateSource>,
        template_name: impl Into<String>,
        engine: Arc<FormFillEngine<C>>,
    ) -> Self {
        Self {
            repository,
            documents,
            templates,
            template_name: template_name.into(),
            engine,
            record_stamps: MonotonicStamp::new(),
        }
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Persist the raw submission, then fill and store its PDF.
    ///
    /// The record is written before the fill, so a failed fill leaves a record
    /// without a `pdf_path`.
    pub fn submit(&self, data: SubmissionData) -> Result<SubmissionOutcome, SubmissionServiceError> {
        let millis = self.record_stamps.next(self.engine.clock().now_millis());
        let record = self.repository.insert(SubmissionRecord::new(data, millis))?;
        info!(submission = %record.id, fields = record.data.len(), "recorded submission");

        let filled = self
            .engine
            .fill_from_source(self.templates.as_ref(), &self.template_name, &record.data)
            .map_err(|err| {
                error!(submission = %record.id, error = %err, "form fill failed");
                err
            })?;

        let content_type = filled.content_type();
        let pdf_path = self
            .documents
            .store(&filled.path, &filled.bytes, content_type.as_ref())
            .map_err(|err| {
                error!(submission = %record.id, error = %err, "storing filled form failed");
                err
            })?;
        self.repository.attach_pdf(&record.id, &pdf_path)?;

        info!(
            submission = %record.id,
            pdf_path = %pdf_path,
            warnings = filled.warnings.len(),
            "submission complete"
        );
        Ok(SubmissionOutcome {
            submission_id: record.id,
            pdf_path,
            warnings: filled.warnings,
            fields_written: filled.fields_written,
        })
    }

    /// Fetch a submission record for API responses.
    pub fn get(&self, id: &SubmissionId) -> Result<SubmissionRecord, SubmissionServiceError> {
        let record = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn download(&self, path: &str) -> Result<StoredDocument, SubmissionServiceError> {
        Ok(self.documents.load(path)?)
    }
}

/// Error raised by the submission service.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionServiceError {
    #[error(transparent)]
    Fill(#[from] FormFillError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

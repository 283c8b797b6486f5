use super::common::*;
use std::sync::Arc;

use crate::forms::{
    FillWarning, FormFillEngine, FormFillError, LopdfCodec, PdfForm, SubmissionData,
    DEFAULT_OUTPUT_DIR,
};
use crate::storage::{DocumentStore, InMemoryDocumentStore};
use crate::submissions::repository::{RepositoryError, SubmissionId, SubmissionRepository};
use crate::submissions::{Form1040Service, SubmissionServiceError};

#[test]
fn submit_records_fills_and_attaches_the_pdf_path() {
    let (service, repository, documents) = build_service();

    let outcome = service.submit(jane_doe()).expect("submission succeeds");

    assert_eq!(outcome.submission_id.as_str(), "Jane_Doe_1700000000000");
    assert_eq!(
        outcome.pdf_path,
        "/content/filled-forms/form1040_1700000000001.pdf"
    );
    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.fields_written, 5);

    let record = repository
        .fetch(&outcome.submission_id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(record.pdf_path.as_deref(), Some(outcome.pdf_path.as_str()));
    assert_eq!(record.data, jane_doe());

    let stored = documents.load(&outcome.pdf_path).expect("pdf stored");
    assert_eq!(stored.content_type, "application/pdf");
    let form = PdfForm::load(&stored.bytes).expect("stored bytes are a form");
    assert_eq!(
        form.text_value("topmostSubform[0].Page1[0].f1_04[0]").as_deref(),
        Some("Jane")
    );
    assert!(form.is_checked("topmostSubform[0].Page1[0].c1_3[0]"));
}

#[test]
fn missing_template_keeps_the_record_without_a_pdf() {
    let (service, repository, documents) = build_service_with(MemoryTemplates::default());

    match service.submit(jane_doe()) {
        Err(SubmissionServiceError::Fill(FormFillError::TemplateMissing(_))) => {}
        other => panic!("expected missing template, got {other:?}"),
    }

    let records = repository.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].pdf_path.is_none());
    assert!(documents.is_empty());
}

#[test]
fn invalid_template_bytes_write_nothing_to_storage() {
    let templates = MemoryTemplates::default().with(TEMPLATE_NAME, "<html>not a form</html>");
    let (service, _, documents) = build_service_with(templates);

    match service.submit(jane_doe()) {
        Err(SubmissionServiceError::Fill(FormFillError::TemplateError(_))) => {}
        other => panic!("expected template error, got {other:?}"),
    }
    assert!(documents.is_empty());
}

#[test]
fn repository_failures_stop_before_filling() {
    let documents = Arc::new(InMemoryDocumentStore::default());
    let service = Form1040Service::new(
        Arc::new(UnavailableRepository),
        documents.clone(),
        Arc::new(form1040_templates()),
        TEMPLATE_NAME,
        engine(),
    );

    match service.submit(jane_doe()) {
        Err(SubmissionServiceError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected unavailable repository, got {other:?}"),
    }
    assert!(documents.is_empty());
}

#[test]
fn partial_submissions_complete_with_warnings() {
    let (service, _, _) = build_service();
    let data: SubmissionData = [("wages", "1200"), ("filingStatus", "divorced"), ("dependents", "2")]
        .into_iter()
        .collect();

    let outcome = service.submit(data).expect("submission succeeds");

    assert!(outcome
        .submission_id
        .as_str()
        .starts_with("unknown_unknown_"));
    assert_eq!(outcome.fields_written, 1);
    assert!(outcome.warnings.contains(&FillWarning::UnknownFilingStatus {
        value: "divorced".to_string()
    }));
    assert!(outcome.warnings.contains(&FillWarning::FieldNotFound {
        key: "dependents".to_string(),
        field: "dependents".to_string(),
    }));
}

#[test]
fn consecutive_submissions_get_distinct_records_and_paths() {
    let (service, repository, documents) = build_service();

    let first = service.submit(jane_doe()).expect("first succeeds");
    let second = service.submit(jane_doe()).expect("second succeeds");

    assert_ne!(first.submission_id, second.submission_id);
    assert_ne!(first.pdf_path, second.pdf_path);
    assert_eq!(repository.records().len(), 2);
    assert_eq!(documents.len(), 2);
}

#[test]
fn same_name_submissions_within_one_millisecond_are_both_recorded() {
    let repository = Arc::new(MemoryRepository::default());
    let documents = Arc::new(InMemoryDocumentStore::default());
    let service = Form1040Service::new(
        repository.clone(),
        documents.clone(),
        Arc::new(form1040_templates()),
        TEMPLATE_NAME,
        Arc::new(FormFillEngine::with_codec(
            LopdfCodec,
            DEFAULT_OUTPUT_DIR,
            Arc::new(FrozenClock(START_MILLIS)),
        )),
    );

    let first = service.submit(jane_doe()).expect("first succeeds");
    let second = service.submit(jane_doe()).expect("second succeeds");
    let anonymous = service
        .submit([("wages", "10")].into_iter().collect())
        .expect("blank names succeed");
    let anonymous_again = service
        .submit([("wages", "20")].into_iter().collect())
        .expect("repeated blank names succeed");

    assert_eq!(first.submission_id.as_str(), "Jane_Doe_1700000000000");
    assert_eq!(second.submission_id.as_str(), "Jane_Doe_1700000000001");
    assert_ne!(anonymous.submission_id, anonymous_again.submission_id);
    assert_ne!(first.pdf_path, second.pdf_path);
    assert_eq!(repository.records().len(), 4);
    assert_eq!(documents.len(), 4);
}

#[test]
fn get_propagates_not_found() {
    let (service, _, _) = build_service();

    match service.get(&SubmissionId("Nobody_Here_1".to_string())) {
        Err(SubmissionServiceError::Repository(RepositoryError::NotFound)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

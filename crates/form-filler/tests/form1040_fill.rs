use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use form_filler::forms::pdf::sample::TemplateBuilder;
use form_filler::forms::{
    fields, filing_status, FillWarning, FilingStatus, FormFillEngine, FormFillError, PdfForm,
    SubmissionData,
};
use form_filler::storage::{
    CachedTemplateSource, DocumentStore, FilesystemDocumentStore, FilesystemTemplateSource,
};
use form_filler::submissions::{
    Form1040Service, RepositoryError, SubmissionId, SubmissionRecord, SubmissionRepository,
    SubmissionServiceError,
};

const FIRST_NAME: &str = "topmostSubform[0].Page1[0].f1_04[0]";
const LAST_NAME: &str = "topmostSubform[0].Page1[0].f1_05[0]";
const SSN: &str = "topmostSubform[0].Page1[0].f1_06[0]";
const WAGES: &str = "topmostSubform[0].Page1[0].f1_31[0]";

fn status_box(index: usize) -> String {
    format!("topmostSubform[0].Page1[0].c1_3[{index}]")
}

fn jane_doe() -> SubmissionData {
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

fn template() -> Vec<u8> {
    TemplateBuilder::form1040()
        .build()
        .expect("sample template builds")
}

fn checked_boxes(form: &PdfForm) -> Vec<usize> {
    (0..5).filter(|index| form.is_checked(&status_box(*index))).collect()
}

#[test]
fn jane_doe_fills_every_page_one_field() {
    let engine = FormFillEngine::new("/content/filled-forms");

    let filled = engine.fill(&template(), &jane_doe()).expect("fill succeeds");

    assert!(filled.warnings.is_empty(), "{:?}", filled.warnings);
    assert!(filled.path.starts_with("/content/filled-forms/form1040_"));
    assert!(filled.path.ends_with(".pdf"));

    let form = PdfForm::load(&filled.bytes).expect("output is a fillable PDF");
    assert_eq!(form.text_value(FIRST_NAME).as_deref(), Some("Jane"));
    assert_eq!(form.text_value(LAST_NAME).as_deref(), Some("Doe"));
    assert_eq!(form.text_value(SSN).as_deref(), Some("123-45-6789"));
    assert_eq!(form.text_value(WAGES).as_deref(), Some("50000"));
    assert_eq!(checked_boxes(&form), vec![0]);
}

#[test]
fn each_filing_status_checks_only_its_box() {
    let engine = FormFillEngine::new("/content/filled-forms");
    let template = template();

    for status in FilingStatus::ALL {
        let data: SubmissionData = [("filingStatus", status.as_str())].into_iter().collect();
        let filled = engine.fill(&template, &data).expect("fill succeeds");

        let form = PdfForm::load(&filled.bytes).expect("reloads");
        assert_eq!(
            checked_boxes(&form),
            vec![status.checkbox_index()],
            "{}",
            status.as_str()
        );
        assert_eq!(
            filing_status::encode(status.as_str()),
            Some(status_box(status.checkbox_index()))
        );
    }
}

#[test]
fn unrecognized_status_checks_nothing() {
    let engine = FormFillEngine::new("/content/filled-forms");
    let mut data = jane_doe();
    data.insert("filingStatus", "Single ");

    let filled = engine.fill(&template(), &data).expect("fill completes");

    assert_eq!(
        filled.warnings,
        vec![FillWarning::UnknownFilingStatus {
            value: "Single ".to_string()
        }]
    );
    let form = PdfForm::load(&filled.bytes).expect("reloads");
    assert!(checked_boxes(&form).is_empty());
    assert_eq!(form.text_value(FIRST_NAME).as_deref(), Some("Jane"));
}

#[test]
fn absent_field_leaves_the_rest_of_the_form_intact() {
    let engine = FormFillEngine::new("/content/filled-forms");
    let template = TemplateBuilder::form1040()
        .without_field("f1_31[0]")
        .build()
        .expect("template builds");

    let filled = engine.fill(&template, &jane_doe()).expect("fill completes");

    assert_eq!(
        filled.warnings,
        vec![FillWarning::FieldNotFound {
            key: "wages".to_string(),
            field: fields::resolve("wages").to_string(),
        }]
    );
    let form = PdfForm::load(&filled.bytes).expect("reloads");
    assert_eq!(form.text_value(FIRST_NAME).as_deref(), Some("Jane"));
    assert_eq!(form.text_value(LAST_NAME).as_deref(), Some("Doe"));
    assert_eq!(form.text_value(SSN).as_deref(), Some("123-45-6789"));
    assert_eq!(checked_boxes(&form), vec![0]);
}

#[test]
fn missing_filing_status_box_is_reported_and_text_still_filled() {
    let engine = FormFillEngine::new("/content/filled-forms");
    let template = TemplateBuilder::form1040()
        .without_field("c1_3[0]")
        .build()
        .expect("template builds");

    let filled = engine.fill(&template, &jane_doe()).expect("fill completes");

    assert_eq!(
        filled.warnings,
        vec![FillWarning::FieldNotFound {
            key: "filingStatus".to_string(),
            field: status_box(0),
        }]
    );
    assert_eq!(filled.fields_written, 4);
    let form = PdfForm::load(&filled.bytes).expect("reloads");
    assert!(checked_boxes(&form).is_empty());
    assert_eq!(form.text_value(FIRST_NAME).as_deref(), Some("Jane"));
    assert_eq!(form.text_value(LAST_NAME).as_deref(), Some("Doe"));
    assert_eq!(form.text_value(SSN).as_deref(), Some("123-45-6789"));
    assert_eq!(form.text_value(WAGES).as_deref(), Some("50000"));
}

#[test]
fn fills_from_a_cached_filesystem_template() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("f1040.pdf"), template()).expect("write template");
    let source = CachedTemplateSource::new(FilesystemTemplateSource::new(dir.path()));
    let engine = FormFillEngine::new("/content/filled-forms");

    let first = engine
        .fill_from_source(&source, "f1040.pdf", &jane_doe())
        .expect("first fill");
    std::fs::remove_file(dir.path().join("f1040.pdf")).expect("remove template");
    let second = engine
        .fill_from_source(&source, "f1040.pdf", &jane_doe())
        .expect("second fill served from cache");

    assert_ne!(first.path, second.path);
    assert!(matches!(
        engine.fill_from_source(&source, "f1040-2019.pdf", &jane_doe()),
        Err(FormFillError::TemplateMissing(_))
    ));
}

#[derive(Default)]
struct Records(Mutex<HashMap<SubmissionId, SubmissionRecord>>);

impl SubmissionRepository for Records {
    fn insert(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        let mut guard = self.0.lock().expect("records mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn attach_pdf(&self, id: &SubmissionId, pdf_path: &str) -> Result<(), RepositoryError> {
        let mut guard = self.0.lock().expect("records mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        record.pdf_path = Some(pdf_path.to_string());
        Ok(())
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Ok(self.0.lock().expect("records mutex poisoned").get(id).cloned())
    }
}

fn filesystem_service(
    templates: &std::path::Path,
    storage_root: &std::path::Path,
) -> Form1040Service<Records, FilesystemDocumentStore> {
    Form1040Service::new(
        Arc::new(Records::default()),
        Arc::new(FilesystemDocumentStore::new(storage_root)),
        Arc::new(FilesystemTemplateSource::new(templates)),
        "f1040.pdf",
        Arc::new(FormFillEngine::new("/content/filled-forms")),
    )
}

#[test]
fn submission_is_written_under_the_storage_root() {
    let templates = tempfile::tempdir().expect("tempdir");
    let storage = tempfile::tempdir().expect("tempdir");
    std::fs::write(templates.path().join("f1040.pdf"), template()).expect("write template");
    let service = filesystem_service(templates.path(), storage.path());

    let outcome = service.submit(jane_doe()).expect("submission succeeds");

    assert!(outcome.submission_id.as_str().starts_with("Jane_Doe_"));
    let relative = outcome.pdf_path.trim_start_matches('/');
    let on_disk = std::fs::read(storage.path().join(relative)).expect("pdf on disk");
    let form = PdfForm::load(&on_disk).expect("stored PDF reloads");
    assert_eq!(form.text_value(WAGES).as_deref(), Some("50000"));

    let record = service.get(&outcome.submission_id).expect("record stored");
    assert_eq!(record.pdf_path.as_deref(), Some(outcome.pdf_path.as_str()));
}

#[test]
fn corrupt_template_is_fatal_and_stores_nothing() {
    let templates = tempfile::tempdir().expect("tempdir");
    let storage = tempfile::tempdir().expect("tempdir");
    std::fs::write(templates.path().join("f1040.pdf"), b"%PDF-1.5 truncated").expect("write");
    let service = filesystem_service(templates.path(), storage.path());

    match service.submit(jane_doe()) {
        Err(SubmissionServiceError::Fill(FormFillError::TemplateError(_))) => {}
        other => panic!("expected template error, got {other:?}"),
    }
    let entries = std::fs::read_dir(storage.path()).expect("storage root readable");
    assert_eq!(entries.count(), 0);

    let store = FilesystemDocumentStore::new(storage.path());
    assert!(store.load("/content/filled-forms").is_err());
}

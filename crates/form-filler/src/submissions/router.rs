use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use super::repository::{download_url, percent_encode, RepositoryError, SubmissionId, SubmissionRepository};
use super::service::{Form1040Service, SubmissionOutcome, SubmissionServiceError};
use crate::forms::{FormCodec, SubmissionData};
use crate::storage::{DocumentStore, StorageError, TemplateSource};

pub const FORM_1040_PAGE: &str = "1040-form-template.html";
pub const FORM_1040EZ_PAGE: &str = "1040ez-form-template.html";
pub const SUBMISSION_FAILED_MESSAGE: &str =
    "An error occurred while processing your submission. Please try again later.";

/// Shared state behind the 1040 intake routes.
pub struct FormRouterState<R, D, C> {
    pub service: Arc<Form1040Service<R, D, C>>,
    pub pages: Arc<dyn TemplateSource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadQuery {
    path: Option<String>,
}

/// Router builder exposing the form pages, intake, download, and lookup endpoints.
pub fn form1040_router<R, D, C>(
    service: Arc<Form1040Service<R, D, C>>,
    pages: Arc<dyn TemplateSource>,
) -> Router
where
    R: SubmissionRepository + 'static,
    D: DocumentStore + 'static,
    C: FormCodec + 'static,
{
    let state = Arc::new(FormRouterState { service, pages });
    Router::new()
        .route(
            "/bin/1040",
            get(form1040_page_handler::<R, D, C>).post(submit_handler::<R, D, C>),
        )
        .route("/bin/1040ez", get(form1040ez_page_handler::<R, D, C>))
        .route("/bin/download-pdf", get(download_handler::<R, D, C>))
        .route(
            "/api/v1/submissions/:submission_id",
            get(submission_handler::<R, D, C>),
        )
        .with_state(state)
}

pub(crate) async fn form1040_page_handler<R, D, C>(
    State(state): State<Arc<FormRouterState<R, D, C>>>,
) -> Response
where
    R: SubmissionRepository + 'static,
    D: DocumentStore + 'static,
    C: FormCodec + 'static,
{
    page_response(state.pages.as_ref(), FORM_1040_PAGE)
}

pub(crate) async fn form1040ez_page_handler<R, D, C>(
    State(state): State<Arc<FormRouterState<R, D, C>>>,
) -> Response
where
    R: SubmissionRepository + 'static,
    D: DocumentStore + 'static,
    C: FormCodec + 'static,
{
    page_response(state.pages.as_ref(), FORM_1040EZ_PAGE)
}

fn page_response(pages: &dyn TemplateSource, name: &str) -> Response {
    match pages.load_template(name) {
        Ok(bytes) => Html(String::from_utf8_lossy(&bytes).into_owned()).into_response(),
        Err(err) => {
            warn!(page = name, error = %err, "form page unavailable");
            Html(format!(
                "<h1>Error: Form template not found</h1><p>Template path: {}</p>",
                escape_html(&pages.describe(name))
            ))
            .into_response()
        }
    }
}

pub(crate) async fn submit_handler<R, D, C>(
    State(state): State<Arc<FormRouterState<R, D, C>>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response
where
    R: SubmissionRepository + 'static,
    D: DocumentStore + 'static,
    C: FormCodec + 'static,
{
    let data: SubmissionData = fields.into_iter().collect();
    let service = Arc::clone(&state.service);

    match tokio::task::spawn_blocking(move || service.submit(data)).await {
        Ok(Ok(outcome)) => Html(confirmation_page(&outcome)).into_response(),
        Ok(Err(err)) => {
            error!(error = %err, "1040 submission failed");
            submission_failed()
        }
        Err(err) => {
            error!(error = %err, "1040 submission task aborted");
            submission_failed()
        }
    }
}

fn confirmation_page(outcome: &SubmissionOutcome) -> String {
    format!(
        "<h1>Form Submitted Successfully</h1>\
         <p>Thank you for submitting your 1040 form.</p>\
         <p>You can download your filled PDF <a href='{}'>here</a>.</p>",
        escape_html(&download_url(&outcome.pdf_path))
    )
}

fn submission_failed() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, SUBMISSION_FAILED_MESSAGE).into_response()
}

pub(crate) async fn download_handler<R, D, C>(
    State(state): State<Arc<FormRouterState<R, D, C>>>,
    Query(query): Query<DownloadQuery>,
) -> Response
where
    R: SubmissionRepository + 'static,
    D: DocumentStore + 'static,
    C: FormCodec + 'static,
{
    let Some(path) = query.path.filter(|path| !path.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing `path` query parameter").into_response();
    };
    let service = Arc::clone(&state.service);

    match tokio::task::spawn_blocking(move || service.download(&path)).await {
        Ok(Ok(document)) => {
            let disposition = attachment_disposition(document.file_name());
            (
                [
                    (header::CONTENT_TYPE, document.content_type.clone()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                document.bytes,
            )
                .into_response()
        }
        Ok(Err(SubmissionServiceError::Storage(StorageError::NotFound(_)))) => {
            (StatusCode::NOT_FOUND, "document not found").into_response()
        }
        Ok(Err(SubmissionServiceError::Storage(StorageError::InvalidPath(_)))) => {
            (StatusCode::BAD_REQUEST, "invalid document path").into_response()
        }
        Ok(Err(err)) => {
            error!(error = %err, "document download failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            error!(error = %err, "document download task aborted");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) async fn submission_handler<R, D, C>(
    State(state): State<Arc<FormRouterState<R, D, C>>>,
    Path(submission_id): Path<String>,
) -> Response
where
    R: SubmissionRepository + 'static,
    D: DocumentStore + 'static,
    C: FormCodec + 'static,
{
    let id = SubmissionId(submission_id);
    match state.service.get(&id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(SubmissionServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "submission_id": id.0,
                "error": "submission not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            error!(submission = %id, error = %other, "submission lookup failed");
            let payload = json!({
                "error": "submission lookup failed",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

/// `attachment` disposition with a quoted ASCII fallback name, plus an RFC 5987
/// `filename*` when the real name is not plain ASCII.
fn attachment_disposition(file_name: &str) -> String {
    let mut fallback = String::with_capacity(file_name.len());
    for ch in file_name.chars() {
        match ch {
            '"' | '\\' => {
                fallback.push('\\');
                fallback.push(ch);
            }
            ch if ch.is_ascii() && !ch.is_ascii_control() => fallback.push(ch),
            _ => fallback.push('_'),
        }
    }

    if file_name.chars().all(|ch| ch.is_ascii() && !ch.is_ascii_control()) {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            percent_encode(file_name)
        )
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

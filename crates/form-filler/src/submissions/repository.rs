use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::forms::SubmissionData;

/// Identifier of a stored submission: `<first>_<last>_<millis>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    pub fn for_submission(data: &SubmissionData, millis: i64) -> Self {
        Self(format!("{}_{millis}", data.applicant_label()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw submitted values plus the path of the filled PDF once it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub data: SubmissionData,
    pub submitted_at: DateTime<Utc>,
    pub pdf_path: Option<String>,
}

impl SubmissionRecord {
    pub fn new(data: SubmissionData, millis: i64) -> Self {
        let submitted_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            id: SubmissionId::for_submission(&data, millis),
            data,
            submitted_at,
            pdf_path: None,
        }
    }

    pub fn view(&self) -> SubmissionView {
        SubmissionView {
            submission_id: self.id.clone(),
            submitted_at: self.submitted_at,
            fields: self.data.clone(),
            pdf_path: self.pdf_path.clone(),
            download_url: self.pdf_path.as_deref().map(download_url),
        }
    }
}

/// Link served by the download route for a stored document path.
pub fn download_url(path: &str) -> String {
    format!("/bin/download-pdf?path={}", percent_encode(path))
}

pub(super) fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(char::from(byte))
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

/// Storage abstraction for submission records.
pub trait SubmissionRepository: Send + Sync {
    fn insert(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError>;
    fn attach_pdf(&self, id: &SubmissionId, pdf_path: &str) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// JSON shape returned by the submission lookup route.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub submission_id: SubmissionId,
    pub submitted_at: DateTime<Utc>,
    pub fields: SubmissionData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

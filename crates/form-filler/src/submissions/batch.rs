use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::repository::SubmissionRepository;
use super::service::{Form1040Service, SubmissionOutcome};
use crate::forms::{FormCodec, SubmissionData};
use crate::storage::DocumentStore;

#[derive(Debug)]
pub enum BatchError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Io(err) => write!(f, "failed to read submission batch: {err}"),
            BatchError::Csv(err) => write!(f, "invalid submission CSV data: {err}"),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Io(err) => Some(err),
            BatchError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for BatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for BatchError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Per-row result of a batch run. Rows are numbered from 1, excluding the header.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub completed: Vec<SubmissionOutcome>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub row: usize,
    pub error: String,
}

/// Reads submissions from CSV: the header row names semantic keys, blank cells are skipped.
pub fn read_submissions<R: Read>(reader: R) -> Result<Vec<SubmissionData>, BatchError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut submissions = Vec::new();

    for row in csv_reader.deserialize::<HashMap<String, String>>() {
        let data: SubmissionData = row?
            .into_iter()
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .collect();
        submissions.push(data);
    }

    Ok(submissions)
}

pub fn read_submissions_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<SubmissionData>, BatchError> {
    let file = std::fs::File::open(path)?;
    read_submissions(file)
}

/// Submits every row, continuing past rows whose fill or storage fails.
pub fn submit_all<R, D, C>(
    service: &Form1040Service<R, D, C>,
    submissions: Vec<SubmissionData>,
) -> BatchReport
where
    R: SubmissionRepository + 'static,
    D: DocumentStore + 'static,
    C: FormCodec + 'static,
{
    let mut report = BatchReport {
        completed: Vec::new(),
        failed: Vec::new(),
    };

    for (index, data) in submissions.into_iter().enumerate() {
        let row = index + 1;
        match service.submit(data) {
            Ok(outcome) => report.completed.push(outcome),
            Err(err) => {
                warn!(row, error = %err, "batch row failed");
                report.failed.push(BatchFailure {
                    row,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        "submission batch finished"
    );
    report
}

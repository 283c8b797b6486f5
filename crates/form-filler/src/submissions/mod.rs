//! 1040 submission intake: records, the fill-and-store service, HTTP routes, and CSV batches.

pub mod batch;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use batch::{read_submissions, read_submissions_from_path, submit_all, BatchError, BatchReport};
pub use repository::{
    download_url, RepositoryError, SubmissionId, SubmissionRecord, SubmissionRepository,
    SubmissionView,
};
pub use router::{form1040_router, FORM_1040EZ_PAGE, FORM_1040_PAGE, SUBMISSION_FAILED_MESSAGE};
pub use service::{Form1040Service, SubmissionOutcome, SubmissionServiceError};

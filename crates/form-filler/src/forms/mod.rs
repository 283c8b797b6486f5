//! Form 1040 fill engine: key resolution, filing status encoding, and the PDF backend.

pub mod document;
pub mod engine;
pub mod fields;
pub mod filing_status;
pub mod pdf;
pub mod submission;

pub use document::{FieldKind, FieldWriteError, FormCodec, FormDocument};
pub use engine::{
    Clock, FillWarning, FilledForm, FormFillEngine, FormFillError, MonotonicStamp, SystemClock,
    DEFAULT_OUTPUT_DIR,
};
pub use filing_status::FilingStatus;
pub use pdf::{LopdfCodec, PdfForm};
pub use submission::SubmissionData;

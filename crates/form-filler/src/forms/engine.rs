use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::document::{FieldWriteError, FormCodec, FormDocument};
use super::fields::{self, FILING_STATUS};
use super::filing_status;
use super::pdf::LopdfCodec;
use super::submission::SubmissionData;
use crate::storage::templates::TemplateSource;

pub const DEFAULT_OUTPUT_DIR: &str = "/content/filled-forms";
const OUTPUT_PREFIX: &str = "form1040_";
const OUTPUT_EXTENSION: &str = "pdf";

/// Fatal fill failures. Everything else is reported as a [`FillWarning`].
#[derive(Debug, thiserror::Error)]
pub enum FormFillError {
    #[error("form template could not be loaded: {0}")]
    TemplateMissing(String),
    #[error("form template has no usable form structure: {0}")]
    TemplateError(String),
    #[error("failed to serialize filled form: {0}")]
    Output(String),
}

/// Non-fatal events recorded while writing fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillWarning {
    FieldNotFound { key: String, field: String },
    UnknownFilingStatus { value: String },
    FieldKindMismatch { key: String, field: String },
}

impl fmt::Display for FillWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillWarning::FieldNotFound { key, field } => {
                write!(f, "field not found: {field} (from `{key}`)")
            }
            FillWarning::UnknownFilingStatus { value } => {
                write!(f, "unknown filing status: {value}")
            }
            FillWarning::FieldKindMismatch { key, field } => {
                write!(f, "field {field} cannot take the value of `{key}`")
            }
        }
    }
}

/// Output of one fill: the document bytes and the path it should be stored at.
#[derive(Debug, Clone)]
pub struct FilledForm {
    pub bytes: Vec<u8>,
    pub path: String,
    pub warnings: Vec<FillWarning>,
    pub fields_written: usize,
}

impl FilledForm {
    pub fn content_type(&self) -> mime::Mime {
        mime::APPLICATION_PDF
    }
}

/// Millisecond wall clock used to stamp output paths.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hands out millisecond stamps that never repeat, even when the clock has not
/// ticked between readings.
#[derive(Debug, Default)]
pub struct MonotonicStamp {
    last_issued: AtomicI64,
}

impl MonotonicStamp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now: i64) -> i64 {
        let previous = self
            .last_issued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

struct OutputNamer {
    directory: String,
    stamps: MonotonicStamp,
}

impl OutputNamer {
    fn new(directory: String) -> Self {
        Self {
            directory,
            stamps: MonotonicStamp::new(),
        }
    }

    fn next(&self, now: i64) -> String {
        let stamp = self.stamps.next(now);

        let file_name = format!("{OUTPUT_PREFIX}{stamp}.{OUTPUT_EXTENSION}");
        let directory = self.directory.trim_end_matches('/');
        if directory.is_empty() && !self.directory.starts_with('/') {
            file_name
        } else {
            format!("{directory}/{file_name}")
        }
    }
}

/// Writes submission values into a fillable template.
///
/// The engine keeps no state between fills beyond the output stamp guard, so a
/// single instance can be shared across request threads.
pub struct FormFillEngine<C = LopdfCodec> {
    codec: C,
    clock: Arc<dyn Clock>,
    namer: OutputNamer,
}

impl FormFillEngine<LopdfCodec> {
    pub fn new(output_dir: impl Into<String>) -> Self {
        Self::with_codec(LopdfCodec, output_dir, Arc::new(SystemClock))
    }
}

impl<C: FormCodec> FormFillEngine<C> {
    pub fn with_codec(codec: C, output_dir: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec,
            clock,
            namer: OutputNamer::new(output_dir.into()),
        }
    }

    pub fn output_dir(&self) -> &str {
        &self.namer.directory
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Fill `template` with `data`.
    ///
    /// Only an unreadable template is fatal. Missing fields, unknown filing
    /// statuses, and type mismatches are collected into the result.
    pub fn fill(
        &self,
        template: &[u8],
        data: &SubmissionData,
    ) -> Result<FilledForm, FormFillError> {
        if template.is_empty() {
            return Err(FormFillError::TemplateMissing(
                "template source returned no bytes".to_string(),
            ));
        }

        let mut document = self.codec.open(template)?;
        let mut warnings = Vec::new();
        let mut fields_written = 0;

        for (key, value) in data.iter() {
            let outcome = if key == FILING_STATUS {
                write_filing_status(&mut document, value)
            } else {
                write_text(&mut document, key, value)
            };

            match outcome {
                Ok(()) => fields_written += 1,
                Err(warning) => {
                    warn!(%warning, "skipped form field");
                    warnings.push(warning);
                }
            }
        }

        let bytes = document.finish()?;
        let path = self.namer.next(self.clock.now_millis());

        info!(
            %path,
            fields_written,
            warnings = warnings.len(),
            "filled form template"
        );

        Ok(FilledForm {
            bytes,
            path,
            warnings,
            fields_written,
        })
    }

    /// Load `template_name` from `source`, then fill it.
    pub fn fill_from_source<S>(
        &self,
        source: &S,
        template_name: &str,
        data: &SubmissionData,
    ) -> Result<FilledForm, FormFillError>
    where
        S: TemplateSource + ?Sized,
    {
        let template = source
            .load_template(template_name)
            .map_err(|err| FormFillError::TemplateMissing(err.to_string()))?;
        self.fill(&template, data)
    }
}

fn write_filing_status<D: FormDocument>(document: &mut D, value: &str) -> Result<(), FillWarning> {
    let Some(checkbox) = filing_status::encode(value) else {
        return Err(FillWarning::UnknownFilingStatus {
            value: value.to_string(),
        });
    };

    document
        .check(&checkbox)
        .map_err(|err| field_warning(err, FILING_STATUS, &checkbox))?;
    debug!(field = %checkbox, "checked filing status box");
    Ok(())
}

fn write_text<D: FormDocument>(document: &mut D, key: &str, value: &str) -> Result<(), FillWarning> {
    let field = fields::resolve(key);
    document
        .set_text(field, value)
        .map_err(|err| field_warning(err, key, field))?;
    debug!(%field, "set form field");
    Ok(())
}

fn field_warning(err: FieldWriteError, key: &str, field: &str) -> FillWarning {
    match err {
        FieldWriteError::NotFound => FillWarning::FieldNotFound {
            key: key.to_string(),
            field: field.to_string(),
        },
        FieldWriteError::KindMismatch { .. } => FillWarning::FieldKindMismatch {
            key: key.to_string(),
            field: field.to_string(),
        },
    }
}

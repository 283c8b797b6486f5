use crate::infra::{build_form_service, parse_field, ServiceLayout};
use clap::Args;
use form_filler::error::AppError;
use form_filler::forms::pdf::sample::TemplateBuilder;
use form_filler::forms::{FillWarning, SubmissionData, DEFAULT_OUTPUT_DIR};
use form_filler::submissions::{read_submissions_from_path, submit_all, SubmissionServiceError};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct FillArgs {
    /// Fillable PDF template to fill
    #[arg(long)]
    pub(crate) template: PathBuf,
    /// Directory that output paths are resolved under
    #[arg(long, default_value = "./data")]
    pub(crate) storage_root: PathBuf,
    /// Logical directory the filled form is named into
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub(crate) output_dir: String,
    /// Field value as key=value (repeatable), e.g. --field firstName=Jane
    #[arg(long = "field", value_parser = parse_field)]
    pub(crate) fields: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// Fillable PDF template to fill
    #[arg(long)]
    pub(crate) template: PathBuf,
    /// Directory that output paths are resolved under
    #[arg(long, default_value = "./data")]
    pub(crate) storage_root: PathBuf,
    /// Logical directory the filled forms are named into
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub(crate) output_dir: String,
    /// CSV file whose header row names the semantic keys
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct SampleTemplateArgs {
    /// Where to write the generated template
    #[arg(long, default_value = "./assets/f1040.pdf")]
    pub(crate) out: PathBuf,
}

fn layout_for(template: &Path, storage_root: PathBuf, output_dir: String) -> Result<ServiceLayout, AppError> {
    let template_name = template
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("template path '{}' has no file name", template.display()),
            )
        })?
        .to_string();
    let template_dir = template
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(ServiceLayout {
        template_dir,
        template_name,
        storage_root,
        output_dir,
        cache_templates: false,
    })
}

fn print_warnings(warnings: &[FillWarning]) {
    for warning in warnings {
        println!("  warning: {warning}");
    }
}

pub(crate) fn run_fill(args: FillArgs) -> Result<(), AppError> {
    let FillArgs {
        template,
        storage_root,
        output_dir,
        fields,
    } = args;

    let layout = layout_for(&template, storage_root.clone(), output_dir)?;
    let (service, _) = build_form_service(layout);
    let data: SubmissionData = fields.into_iter().collect();

    let outcome = service.submit(data)?;
    println!("Filled {} field(s) for {}", outcome.fields_written, outcome.submission_id);
    println!(
        "- stored at {} (under {})",
        outcome.pdf_path,
        storage_root.display()
    );
    print_warnings(&outcome.warnings);
    Ok(())
}

pub(crate) fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let BatchArgs {
        template,
        storage_root,
        output_dir,
        csv,
    } = args;

    let submissions = read_submissions_from_path(&csv)?;
    let layout = layout_for(&template, storage_root, output_dir)?;
    let (service, _) = build_form_service(layout);

    let report = submit_all(&service, submissions);
    println!(
        "Batch {}: {} filled, {} failed",
        csv.display(),
        report.completed.len(),
        report.failed.len()
    );
    for outcome in &report.completed {
        println!("- {} -> {}", outcome.submission_id, outcome.pdf_path);
        print_warnings(&outcome.warnings);
    }
    for failure in &report.failed {
        println!("- row {} failed: {}", failure.row, failure.error);
    }
    Ok(())
}

pub(crate) fn run_sample_template(args: SampleTemplateArgs) -> Result<(), AppError> {
    let bytes = TemplateBuilder::form1040()
        .build()
        .map_err(SubmissionServiceError::from)?;

    if let Some(parent) = args.out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.out, bytes)?;
    println!("Wrote sample 1040 template to {}", args.out.display());
    Ok(())
}

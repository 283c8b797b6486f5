use crate::commands::{
    run_batch, run_fill, run_sample_template, BatchArgs, FillArgs, SampleTemplateArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use form_filler::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Form 1040 Filler",
    about = "Serve the 1040 intake form or fill the 1040 template from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Fill the template once from --field key=value pairs
    Fill(FillArgs),
    /// Fill one document per row of a CSV file
    Batch(BatchArgs),
    /// Write a minimal fillable 1040-shaped template for local runs
    SampleTemplate(SampleTemplateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Fill(args) => run_fill(args),
        Command::Batch(args) => run_batch(args),
        Command::SampleTemplate(args) => run_sample_template(args),
    }
}

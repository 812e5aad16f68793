use crate::server;
use clap::{Args, Parser, Subcommand};
use skrubb_waitlist::error::AppError;
use skrubb_waitlist::waitlist::{RawSubmission, ValidationReport};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "Skrubb waiting list",
    about = "Serve the waiting-list signup relay or check a submission offline",
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
    /// Validate a JSON submission file and list every invalid field
    Check(CheckArgs),
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

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// Path to a JSON body as the landing page would post it
    file: PathBuf,
    /// Print the report as JSON instead of a listing
    #[arg(long)]
    json: bool,
}

pub(crate) async fn run() -> Result<ExitCode, AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await.map(|_| ExitCode::SUCCESS),
        Command::Check(args) => run_check(args),
    }
}

fn run_check(args: CheckArgs) -> Result<ExitCode, AppError> {
    let contents = std::fs::read_to_string(&args.file)?;
    let raw: RawSubmission = serde_json::from_str(&contents)?;
    let report = ValidationReport::for_submission(&raw);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn render_report(report: &ValidationReport) -> String {
    if report.valid {
        return "Submission is valid\n".to_string();
    }

    let mut out = format!("{} invalid field(s)\n", report.violations.len());
    for violation in &report.violations {
        out.push_str(&format!(
            "- {} [{}]: {}\n",
            violation.field,
            violation.code,
            violation.message()
        ));
    }
    out
}

//! Analyze command - run a batch of receipts through the OCR service.

use std::fs;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use quanto_core::{BatchInput, BatchReport, FailurePolicy, flatten};

use crate::render;

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Receipt files or glob patterns (PNG, JPEG, PDF)
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "full")]
    format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to do when a document fails
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Number of documents analyzed at a time
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Report totals that do not add up
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Line-item table
    Table,
    /// Raw receipt records
    Json,
    /// Line-item table as CSV
    Csv,
    /// Table followed by the raw records
    Full,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Skip failed documents and list them afterwards
    Skip,
    /// Stop at the first failure and discard partial results
    Abort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Skip => FailurePolicy::SkipAndReport,
            PolicyArg::Abort => FailurePolicy::Abort,
        }
    }
}

pub async fn run(args: AnalyzeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(policy) = args.policy {
        config.batch.failure_policy = policy.into();
    }
    if let Some(jobs) = args.jobs {
        config.batch.concurrency = jobs.max(1);
    }

    // Secrets are checked before any document is read.
    let orchestrator = super::build_orchestrator(&config)?;

    let files = super::expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No supported files matched: {}", args.inputs.join(" "));
    }
    let loaded = super::load_documents(&files);
    let inputs: Vec<BatchInput<'_>> = loaded.iter().map(BatchInput::from).collect();
    info!(
        "Loaded {} of {} documents",
        loaded.iter().filter(|l| l.is_ok()).count(),
        inputs.len()
    );

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let report = orchestrator
        .run_inputs(&inputs, |event| {
            pb.set_message(event.name.to_string());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    let content = render_report(&report, args.format)?;
    match args.output {
        Some(ref path) => {
            fs::write(path, &content)?;
            debug!("Wrote output to {}", path.display());
            eprintln!("{} Output written to {}", style("✓").green(), path.display());
        }
        None => print!("{}", content),
    }

    eprintln!();
    eprintln!("{}", render::format_summary(&report));

    if args.validate {
        let issues = render::format_issues(&report);
        if !issues.is_empty() {
            eprintln!();
            eprintln!("{}", style("Receipts that do not add up:").yellow());
            eprint!("{}", issues);
        }
    }

    if !report.failures.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed documents:").red());
        eprint!("{}", render::format_failures(&report.failures));
        anyhow::bail!(
            "{} of {} documents failed",
            report.failures.len(),
            report.submitted
        );
    }

    Ok(())
}

/// Render a report in the requested format.
pub fn render_report(report: &BatchReport, format: OutputFormat) -> anyhow::Result<String> {
    let rows = flatten(report.records());

    let content = match format {
        OutputFormat::Table => render::format_table(&rows),
        OutputFormat::Csv => render::format_csv(&rows)?,
        OutputFormat::Json => format!("{}\n", render::format_json(report.records())?),
        OutputFormat::Full => format!(
            "{}\n{}\n",
            render::format_table(&rows),
            render::format_json(report.records())?
        ),
    };

    Ok(content)
}

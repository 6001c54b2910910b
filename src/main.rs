//! CLI entry point for the marks reconciler.
//!
//! Provides subcommands for reconciling a single class, running a batch of
//! classes against one finals workbook, and checking the grade rule.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use marks_reconciler::analyzers::aggregate::Aggregator;
use marks_reconciler::analyzers::analyzer::{
    ReconcileOptions, reconcile_batch, reconcile_class, reconcile_logged,
};
use marks_reconciler::analyzers::grade::recommended_grade;
use marks_reconciler::analyzers::types::MarkValue;
use marks_reconciler::config::LayoutConfig;
use marks_reconciler::output::print_json;
use marks_reconciler::summary::ClassSummary;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "marks_reconciler")]
#[command(about = "Cross-checks period averages against final grades", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunArgs {
    /// Workbook with the final grades of every class
    #[arg(short, long, value_name = "FILE")]
    finals: PathBuf,

    /// Directory with the averages workbooks (defaults to the finals' directory)
    #[arg(short, long)]
    averages_dir: Option<PathBuf>,

    /// Directory to write result workbooks to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Skip the discrepancy sheet
    #[arg(long, default_value_t = false)]
    no_report: bool,

    /// JSON file overriding the workbook layout
    #[arg(long)]
    layout: Option<PathBuf>,

    /// CSV file to append one record per class to
    #[arg(long)]
    run_log: Option<PathBuf>,
}

impl RunArgs {
    fn options(&self) -> Result<ReconcileOptions> {
        let layout = LayoutConfig::load_or_default(self.layout.as_deref())
            .context("failed to load layout file")?;
        Ok(ReconcileOptions {
            finals: self.finals.clone(),
            averages_dir: self.averages_dir.clone(),
            output_dir: self.output_dir.clone(),
            include_report: !self.no_report,
            layout,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one class and write its result workbook
    Reconcile {
        /// Class label, grade level and letter separated by a hyphen (e.g. 7-А)
        #[arg(short, long)]
        class: String,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Reconcile several classes, continuing past failures
    Batch {
        /// Comma-separated class labels (e.g. 7-А,7-Б,10-А)
        #[arg(short, long, value_delimiter = ',', required = true)]
        classes: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the recommended grade for an average
    Grade {
        #[arg(value_name = "AVERAGE")]
        average: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/marks_reconciler.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("marks_reconciler.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile { class, run } => {
            let options = run.options()?;
            let mut aggregator = Aggregator::new();

            let summary = match run.run_log.as_deref() {
                Some(run_log) => reconcile_logged(&mut aggregator, &class, &options, Some(run_log)),
                None => match reconcile_class(&mut aggregator, &class, &options) {
                    Ok(summary) => summary,
                    Err(e) => bail!("{class}: {e}"),
                },
            };
            if let Some(message) = &summary.error_message {
                bail!("{class}: {message}");
            }

            print_json(&summary)?;
            info!(
                class = %summary.class,
                output = summary.output.as_deref().unwrap_or_default(),
                discrepancies = summary.discrepancies,
                elapsed_secs = summary.elapsed_ms as f64 / 1000.0,
                "Result workbook created"
            );
        }
        Commands::Batch { classes, run } => {
            let options = run.options()?;
            let summaries = reconcile_batch(&classes, &options, run.run_log.as_deref());

            for summary in summaries.iter().filter(|s| !s.is_ok()) {
                error!(
                    class = %summary.class,
                    error = summary.error_message.as_deref().unwrap_or_default(),
                    "Class skipped"
                );
            }
            report_batch(&summaries);
        }
        Commands::Grade { average } => {
            let mark = MarkValue::parse(&average);
            println!("{}", recommended_grade(&mark));
        }
    }

    Ok(())
}

/// Logs a one-line outcome per class once a batch is done.
fn report_batch(summaries: &[ClassSummary]) {
    for summary in summaries {
        if summary.is_ok() {
            info!(
                class = %summary.class,
                discrepancies = summary.discrepancies,
                output = summary.output.as_deref().unwrap_or_default(),
                "Done"
            );
        }
    }
}

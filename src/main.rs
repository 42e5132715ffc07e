//! CLI entry point for the student performance dashboard.
//!
//! `analyze` prints every derived table as JSON, `export` writes one table
//! as a PDF report, `serve` exposes both over HTTP.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use student_dashboard::analytics::DEFAULT_TOP_N;
use student_dashboard::api::start_api;
use student_dashboard::cluster::{DEFAULT_CLUSTERS, DEFAULT_SEED};
use student_dashboard::dashboard::{Dashboard, TableKind};
use student_dashboard::report::{write_report, DEFAULT_REPORT_FILE, DEFAULT_REPORT_TITLE};
use student_dashboard::suggestions::DEFAULT_TARGETS;
use student_dashboard::{RecordFilter, RecordSet, Settings};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "student_dashboard")]
#[command(about = "Analyze student exam marks and export PDF reports", long_about = None)]
struct Cli {
    /// Write logs as JSON lines instead of plain text
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every analysis on a marks file and print the result as JSON
    Analyze {
        /// CSV or spreadsheet with Name, Class, Subject, Exam, Marks columns
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Export one derived table as a PDF report
    Export {
        #[arg(short, long)]
        input: PathBuf,

        /// records, class_summary, student_summary, exam_trends, subject_summary,
        /// top, bottom, clusters, declining, suggestions or distribution:<subject>
        #[arg(short, long, default_value = "records")]
        table: String,

        #[arg(long, default_value = DEFAULT_REPORT_TITLE)]
        title: String,

        #[arg(short, long, default_value = DEFAULT_REPORT_FILE)]
        out: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Serve the dashboard API over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Keep only these classes (repeatable)
    #[arg(long = "class")]
    classes: Vec<String>,

    /// Keep only these students (repeatable)
    #[arg(long = "student")]
    students: Vec<String>,

    /// Keep only these exams (repeatable)
    #[arg(long = "exam")]
    exams: Vec<String>,
}

impl From<FilterArgs> for RecordFilter {
    fn from(args: FilterArgs) -> Self {
        RecordFilter {
            classes: args.classes,
            students: args.students,
            exams: args.exams,
        }
    }
}

#[derive(Args)]
struct AnalysisArgs {
    /// Size of the top and bottom student lists
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    top_n: usize,

    /// Number of score clusters
    #[arg(short = 'k', long, default_value_t = DEFAULT_CLUSTERS)]
    clusters: usize,

    /// Target averages for suggestions, comma-separated
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_TARGETS)]
    targets: Vec<f64>,

    /// Seed for cluster initialisation
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

impl AnalysisArgs {
    fn settings(self) -> Result<Settings> {
        let settings = Settings {
            top_n: self.top_n,
            clusters: self.clusters,
            targets: self.targets,
            seed: self.seed,
            ..Settings::default()
        };
        settings.validate()?;
        Ok(settings)
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_filtered(input: &Path, filter: FilterArgs) -> Result<RecordSet> {
    let set = RecordSet::load(input)
        .with_context(|| format!("failed to load marks from {}", input.display()))?;
    let filtered = set.filter(&filter.into());
    if filtered.is_empty() {
        warn!("no records left after filtering");
    }
    Ok(filtered)
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Commands::Analyze {
            input,
            filter,
            analysis,
        } => {
            let settings = analysis.settings()?;
            let set = load_filtered(&input, filter)?;
            let dashboard = Dashboard::run(&set, &settings);
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
        Commands::Export {
            input,
            table,
            title,
            out,
            filter,
            analysis,
        } => {
            let settings = analysis.settings()?;
            let kind: TableKind = table.parse()?;
            let set = load_filtered(&input, filter)?;
            let table = kind
                .build(&set, &settings)
                .with_context(|| format!("failed to build table {:?}", kind))?;
            write_report(&out, &table, &title)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve {
            host,
            port,
            analysis,
        } => {
            let settings = analysis.settings()?;
            info!("visit http://{}:{}/health to check the api", host, port);
            start_api(settings, &host, port).await?;
        }
    }

    Ok(())
}

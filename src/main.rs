use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn, Level};
use uuid::Uuid;

mod api;
mod class;
mod db;
mod error;
mod exam;
mod export;
mod models;
mod policy;
mod report;
mod score;
mod telemetry;
mod transcript;
mod trend;

use api::{ClassAnalysisResponse, StudentAnalysisResponse};
use policy::GradingPolicy;

#[derive(Parser)]
#[command(name = "marks-analytics")]
#[command(about = "Performance analytics over recorded exam marks", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import mark rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print a student's performance analysis as JSON
    Student {
        #[arg(long)]
        student_id: Uuid,
    },
    /// Print a class's subject performance as JSON
    Class {
        #[arg(long)]
        department_id: Uuid,
        #[arg(long)]
        semester_id: Uuid,
        #[arg(long)]
        section_id: Option<Uuid>,
    },
    /// Export joined mark rows as CSV
    Export {
        #[arg(long)]
        department_id: Option<Uuid>,
        #[arg(long)]
        semester_id: Option<Uuid>,
        #[arg(long)]
        subject_id: Option<Uuid>,
        #[arg(long, default_value = "student_performance_report.csv")]
        out: PathBuf,
    },
    /// Show or change the grading policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Print a student's semester-wise marks summary as JSON
    Transcript {
        #[arg(long)]
        student_id: Uuid,
    },
    /// Generate a markdown report for a student or a class
    #[command(group(
        ArgGroup::new("scope")
            .args(["student_id", "department_id"])
            .required(true)
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        student_id: Option<Uuid>,
        #[arg(long, requires = "semester_id")]
        department_id: Option<Uuid>,
        #[arg(long)]
        semester_id: Option<Uuid>,
        #[arg(long)]
        section_id: Option<Uuid>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    Show,
    Set {
        #[arg(long)]
        pass_percentage: f64,
        #[arg(long)]
        weak_threshold: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.json_logs, level);

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} marks from {}.", csv.display());
        }
        Commands::Student { student_id } => {
            let policy = db::fetch_policy(&pool).await?;
            db::fetch_student(&pool, student_id).await?;
            let response = student_analysis(&pool, student_id, &policy).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Class {
            department_id,
            semester_id,
            section_id,
        } => {
            let policy = db::fetch_policy(&pool).await?;
            let response =
                class_analysis(&pool, department_id, semester_id, section_id, &policy).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Export {
            department_id,
            semester_id,
            subject_id,
            out,
        } => {
            let policy = db::fetch_policy(&pool).await?;
            let filter = export::ExportFilter {
                department_id,
                semester_id,
                subject_id,
            };
            let marks = db::fetch_labeled_marks(&pool, &filter).await?;
            let rows = export::build_rows(&marks, &filter, &policy);
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            export::write_csv(&rows, file)?;
            info!(rows = rows.len(), path = %out.display(), "export written");
            println!("Exported {} rows to {}.", rows.len(), out.display());
        }
        Commands::Policy { action } => match action {
            PolicyAction::Show => {
                let policy = db::fetch_policy(&pool).await?;
                println!("{}", serde_json::to_string_pretty(&policy)?);
            }
            PolicyAction::Set {
                pass_percentage,
                weak_threshold,
            } => {
                let policy = GradingPolicy::new(pass_percentage, weak_threshold)?;
                db::put_policy(&pool, &policy).await?;
                info!(pass_percentage, weak_threshold, "grading policy updated");
                println!("{}", serde_json::to_string_pretty(&policy)?);
            }
        },
        Commands::Transcript { student_id } => {
            let policy = db::fetch_policy(&pool).await?;
            db::fetch_student(&pool, student_id).await?;
            let records = db::fetch_student_marks(&pool, student_id).await?;
            let subjects = db::fetch_subjects(&pool).await?;
            let semesters = transcript::build_transcript(&records, &subjects, &policy);
            println!("{}", serde_json::to_string_pretty(&semesters)?);
        }
        Commands::Report {
            student_id,
            department_id,
            semester_id,
            section_id,
            out,
        } => {
            let policy = db::fetch_policy(&pool).await?;
            let report = if let Some(student_id) = student_id {
                let (name, roll_number) = db::fetch_student(&pool, student_id).await?;
                let analysis = student_analysis(&pool, student_id, &policy).await?;
                let label = format!("{name} ({roll_number})");
                report::build_student_report(&label, &policy, &analysis)
            } else {
                let department_id = department_id.context("--department-id is required")?;
                let semester_id = semester_id.context("--semester-id is required")?;
                let label = db::fetch_cohort_label(&pool, department_id, semester_id).await?;
                let analysis =
                    class_analysis(&pool, department_id, semester_id, section_id, &policy).await?;
                report::build_class_report(&label, &policy, &analysis)
            };
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn student_analysis(
    pool: &sqlx::PgPool,
    student_id: Uuid,
    policy: &GradingPolicy,
) -> anyhow::Result<StudentAnalysisResponse> {
    let records = db::fetch_student_marks(pool, student_id).await?;
    let subjects = db::fetch_subjects(pool).await?;
    let analysis = trend::analyze_student(&records, policy);
    if analysis.skipped_records > 0 {
        warn!(
            %student_id,
            skipped = analysis.skipped_records,
            "excluded malformed mark records"
        );
    }
    info!(
        %student_id,
        records = records.len(),
        trend = ?analysis.overall_trend,
        "student analysis complete"
    );
    Ok(StudentAnalysisResponse::new(analysis, &subjects))
}

async fn class_analysis(
    pool: &sqlx::PgPool,
    department_id: Uuid,
    semester_id: Uuid,
    section_id: Option<Uuid>,
    policy: &GradingPolicy,
) -> anyhow::Result<ClassAnalysisResponse> {
    let marks = db::fetch_cohort_marks(pool, department_id, semester_id).await?;
    let subjects = db::fetch_subjects(pool).await?;
    let analysis = class::analyze_cohort(&marks, section_id, policy);
    if analysis.skipped_records > 0 {
        warn!(
            %department_id,
            %semester_id,
            skipped = analysis.skipped_records,
            "excluded malformed mark records"
        );
    }
    info!(
        %department_id,
        %semester_id,
        section_id = ?section_id,
        subjects = analysis.subject_performance.len(),
        "class analysis complete"
    );
    Ok(ClassAnalysisResponse::new(&analysis, &subjects))
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ward_core::{
    admission::format_timestamp, store::FileStore, CoreConfig, DischargeReport, DischargeRequest,
    DischargeService, PatientService, StepOutcome,
};

#[derive(Parser)]
#[command(name = "ward")]
#[command(about = "Ward admissions CLI")]
#[command(
    after_help = "The file store is only safe for one process at a time. Stop ward-run before \
running discharge, resume or delete-patient against the same data directory."
)]
struct Cli {
    /// Data directory for the file-backed store (overrides WARD_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an admission's status
    Status {
        /// Admission identifier
        admission_id: String,
    },
    /// Discharge an admission and archive its records
    Discharge {
        /// Admission identifier
        admission_id: String,
        /// Final diagnosis
        #[arg(long)]
        diagnosis: String,
        /// ICD code for the final diagnosis
        #[arg(long)]
        icd_code: String,
        /// delivered, referred or died
        #[arg(long)]
        result_status: String,
        /// improved or unimproved
        #[arg(long)]
        result_condition: String,
    },
    /// Re-run archival for a discharged admission
    Resume {
        /// Admission identifier
        admission_id: String,
    },
    /// Delete a patient's root record
    DeletePatient {
        /// Patient identifier
        patient_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ward_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'ward --help' for commands");
        return Ok(());
    };

    let cfg = CoreConfig::from_env()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| cfg.data_dir().to_path_buf());
    let store = Arc::new(
        FileStore::open(&data_dir)
            .await
            .with_context(|| format!("opening data directory {}", data_dir.display()))?,
    );

    match command {
        Commands::Status { admission_id } => {
            let status = DischargeService::new(store)
                .admission_status(&admission_id)
                .await?;
            println!("{admission_id}: {}", status.as_str());
        }
        Commands::Discharge {
            admission_id,
            diagnosis,
            icd_code,
            result_status,
            result_condition,
        } => {
            let request = DischargeRequest {
                final_diagnosis: diagnosis,
                final_diagnosis_icd_code: icd_code,
                result_status,
                result_condition,
            };
            let report = DischargeService::new(store)
                .attempt_discharge(&admission_id, &request)
                .await?;
            print_report(&report);
        }
        Commands::Resume { admission_id } => {
            let report = DischargeService::new(store)
                .resume_archival(&admission_id)
                .await?;
            print_report(&report);
        }
        Commands::DeletePatient { patient_id } => {
            let removed = PatientService::new(store)
                .delete_patient(&patient_id)
                .await?;
            println!("Deleted patient {patient_id} ({removed} rows)");
        }
    }

    Ok(())
}

fn print_report(report: &DischargeReport) {
    match (report.discharged_at, report.length_of_stay_hours) {
        (Some(at), Some(hours)) => println!(
            "Admission {} discharged at {} after {hours} hours",
            report.admission_id,
            format_timestamp(at)
        ),
        _ => println!("Admission {}", report.admission_id),
    }
    for step in &report.steps {
        let label = step.step.label();
        match &step.outcome {
            StepOutcome::Archived { archived, removed } => {
                println!("  {label}: archived {archived}, removed {removed}")
            }
            StepOutcome::NothingToDo => println!("  {label}: nothing to do"),
            StepOutcome::Degraded(warning) => println!("  {label}: {}", warning.message(step.step)),
        }
    }
    if !report.is_complete() {
        println!("Archival incomplete; run 'ward resume {}'", report.admission_id);
    }
}

//! Oncodesk: practitioner admission and patient records.
//!
//! Command-line front end over the application services.
//!
//! # Usage
//!
//! ```bash
//! oncodesk init
//! oncodesk signup <form.json>
//! oncodesk pending
//! oncodesk link <url-or-query>
//! oncodesk login <username>                      < password
//! oncodesk diagnose <username> <request.json>    < password
//! oncodesk patients <username>                   < password
//! oncodesk delete <username> <patient_id>        < password
//! oncodesk plan <username> <patient_id> <text>   < password
//! oncodesk progress <username> <patient_id> <Planned|Ongoing|Completed> <note>  < password
//! oncodesk stats <username>                      < password
//! ```
//!
//! Doctor commands read the password from the first line of stdin.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zeroize::Zeroizing;

use oncodesk::adapters::mail::{DisabledNotifier, OutboxNotifier};
use oncodesk::adapters::model::LogisticModel;
use oncodesk::adapters::sanitize::SanitizingMakeWriter;
use oncodesk::adapters::sqlite::SqliteStorage;
use oncodesk::application::{
    ApplicationRegistry, DiagnosisRequest, DiagnosisService, DoctorDirectory, LinkOutcome,
    PatientStore, StatisticsService,
};
use oncodesk::config::Settings;
use oncodesk::domain::{Doctor, ProgressStatus, SignupForm, TokenAuthority};
use oncodesk::ports::Notifier;

const USAGE: &str = "Usage: oncodesk <command> [args]\n\n\
Commands:\n  \
init                                   create the database and seed demo accounts\n  \
signup <form.json>                     submit a registration request\n  \
pending                                list pending applications\n  \
link <url-or-query>                    follow an approval link\n  \
login <username>                       check a password (read from stdin)\n  \
diagnose <username> <request.json>     classify and store a patient\n  \
patients <username>                    list your patients\n  \
delete <username> <patient_id>         delete one of your patients\n  \
plan <username> <patient_id> <text>    replace a treatment plan\n  \
progress <username> <patient_id> <status> <note>\n                                         append a progress entry\n  \
stats <username>                       practice statistics";

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_mode = std::env::var("ONCODESK_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, guard) = if log_mode == "file" {
        let log_file = std::env::var("ONCODESK_LOG_FILE")
            .unwrap_or_else(|_| "oncodesk.log".to_string());

        if let Some(parent) = Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as an open error below.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Failed to open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    Ok(guard)
}

/// Opened database plus settings, shared by all commands.
struct Desk {
    settings: Settings,
    storage: Arc<SqliteStorage>,
}

impl Desk {
    fn open(settings: Settings) -> Result<Self> {
        let storage = SqliteStorage::new(&settings.db_path)
            .with_context(|| format!("Failed to open database {:?}", settings.db_path))?;
        Ok(Self {
            settings,
            storage: Arc::new(storage),
        })
    }

    fn directory(&self) -> DoctorDirectory<SqliteStorage> {
        DoctorDirectory::new(Arc::clone(&self.storage))
    }

    fn patients(&self) -> PatientStore<SqliteStorage> {
        PatientStore::new(Arc::clone(&self.storage))
    }

    fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        let notifier: Arc<dyn Notifier> = match &self.settings.outbox_dir {
            Some(dir) => Arc::new(
                OutboxNotifier::new(dir)
                    .with_context(|| format!("Failed to create outbox {dir:?}"))?,
            ),
            None => Arc::new(DisabledNotifier),
        };
        Ok(notifier)
    }

    fn registry(&self) -> Result<ApplicationRegistry<SqliteStorage, dyn Notifier>> {
        let secret = self.settings.load_secret()?;
        Ok(ApplicationRegistry::new(
            Arc::clone(&self.storage),
            TokenAuthority::new(secret),
            self.notifier()?,
            self.settings.base_url.clone(),
            self.settings.admin_email.clone(),
        ))
    }

    /// Authenticate with the password on the first line of stdin.
    fn sign_in(&self, username: &str) -> Result<Doctor> {
        let mut line = Zeroizing::new(String::new());
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password from stdin")?;
        let password = line.trim_end_matches(['\r', '\n']);
        Ok(self.directory().authenticate(username, password)?)
    }
}

fn arg(args: &[String], idx: usize, name: &str) -> Result<String> {
    args.get(idx)
        .cloned()
        .with_context(|| format!("Missing <{name}>\n\n{USAGE}"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {path}"))
}

fn run(command: &str, args: &[String]) -> Result<()> {
    let desk = Desk::open(Settings::from_env())?;

    match command {
        "init" => {
            let created = desk.directory().seed()?;
            println!(
                "Database ready at {:?} ({created} demo accounts created)",
                desk.settings.db_path
            );
        }
        "signup" => {
            let form: SignupForm = read_json(&arg(args, 0, "form.json")?)?;
            let submission = desk.registry()?.submit(&form)?;
            println!("Application {} submitted", submission.application_id);
            if !submission.delivery.is_sent() {
                println!("Administrator notice not delivered; links:");
                println!("  accept: {}", submission.links.accept);
                println!("  reject: {}", submission.links.reject);
            }
        }
        "pending" => {
            let registry = desk.registry()?;
            for application in registry.pending()? {
                println!(
                    "{}  {}  {}  {}  {}",
                    application.application_id,
                    application.formatted_date(),
                    application.username,
                    application.name,
                    application.specialization
                );
            }
        }
        "link" => match desk.registry()?.handle_link(&arg(args, 0, "url-or-query")?)? {
            LinkOutcome::Ignored => println!("Nothing to do"),
            LinkOutcome::Decided { decision, delivery } => {
                println!(
                    "Application {} {} ({})",
                    decision.application_id, decision.outcome, decision.username
                );
                if !delivery.is_sent() {
                    println!("Applicant notice not delivered");
                }
            }
        },
        "login" => {
            let doctor = desk.sign_in(&arg(args, 0, "username")?)?;
            println!(
                "Welcome, {} ({})",
                doctor.name,
                doctor.specialization.as_deref().unwrap_or("-")
            );
        }
        "diagnose" => {
            let doctor = desk.sign_in(&arg(args, 0, "username")?)?;
            let request: DiagnosisRequest = read_json(&arg(args, 1, "request.json")?)?;
            let classifier = LogisticModel::load(&desk.settings.model_path)?;
            let service = DiagnosisService::new(Arc::new(classifier), desk.patients());
            let patient = service.diagnose(&doctor.username, &request)?;
            println!(
                "{}: {} ({:.1}% confidence)",
                patient.patient_id, patient.record.diagnosis, patient.record.confidence
            );
        }
        "patients" => {
            let doctor = desk.sign_in(&arg(args, 0, "username")?)?;
            for patient in desk.patients().list_by_doctor(&doctor.username)? {
                let record = &patient.record;
                println!(
                    "{}  {}  {}  {}  {}  {:.1}%  {} progress entries",
                    patient.patient_id,
                    record.created_at.format("%Y-%m-%d"),
                    record.name,
                    record.age,
                    record.diagnosis,
                    record.confidence,
                    record.progress.len()
                );
            }
        }
        "delete" => {
            let doctor = desk.sign_in(&arg(args, 0, "username")?)?;
            let patient_id = arg(args, 1, "patient_id")?;
            if desk.patients().delete_patient(&doctor.username, &patient_id)? {
                println!("Deleted {patient_id}");
            } else {
                bail!("No patient {patient_id} in your records");
            }
        }
        "plan" => {
            let doctor = desk.sign_in(&arg(args, 0, "username")?)?;
            let patient_id = arg(args, 1, "patient_id")?;
            let plan = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
            desk.patients()
                .update_treatment_plan(&doctor.username, &patient_id, &plan)?;
            println!("Treatment plan updated for {patient_id}");
        }
        "progress" => {
            let doctor = desk.sign_in(&arg(args, 0, "username")?)?;
            let patient_id = arg(args, 1, "patient_id")?;
            let status: ProgressStatus = arg(args, 2, "status")?
                .parse()
                .map_err(anyhow::Error::msg)?;
            let note = args.get(3..).map(|rest| rest.join(" ")).unwrap_or_default();
            let entry = desk
                .patients()
                .add_progress(&doctor.username, &patient_id, &note, status)?;
            println!("Progress recorded at {}", entry.timestamp.to_rfc3339());
        }
        "stats" => {
            let doctor = desk.sign_in(&arg(args, 0, "username")?)?;
            let stats =
                StatisticsService::new(Arc::clone(&desk.storage)).for_doctor(&doctor.username)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        other => bail!("Unknown command: {other}\n\n{USAGE}"),
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    if matches!(command.as_str(), "-h" | "--help" | "help") {
        println!("{USAGE}");
        return Ok(());
    }

    let _guard = init_logging()?;
    tracing::debug!("Running command {command}");

    run(command, rest)
}

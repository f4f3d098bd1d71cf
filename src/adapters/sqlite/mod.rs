//! SQLite adapter: Implementation of Storage.
//!
//! Provides local persistence for doctors, pending applications and patients.
//!
//! # Connection Behavior
//!
//! The adapter keeps only the database path. Each operation opens its own
//! connection, runs one statement, and drops the connection, so atomicity is
//! per statement. Callers that read, modify and write back (progress
//! appends, check-then-insert) can race with other writers; the last write
//! wins.
//!
//! # Sub-documents
//!
//! The feature map, probability pair and progress timeline are stored as JSON
//! text columns. `REAL` columns and JSON numbers keep full `f64` precision.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::{
    application::APPLICATION_DATE_FORMAT, ApplicationId, Doctor, PasswordDigest, Patient,
    PatientRecord, PendingApplication, Username,
};
use crate::ports::Storage;

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// SQLite storage adapter.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    path: PathBuf,
}

impl SqliteStorage {
    /// Open (creating if needed) the database at `path` and ensure the schema exists.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let storage = Self {
            path: path.as_ref().to_path_buf(),
        };
        storage.init_schema()?;
        tracing::debug!("Opened SQLite store at {:?}", storage.path);
        Ok(storage)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS doctors (
                username TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                specialization TEXT,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pending_applications (
                application_id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT,
                specialization TEXT,
                experience INTEGER NOT NULL,
                license TEXT,
                hospital TEXT,
                password_hash TEXT NOT NULL,
                notes TEXT,
                application_date TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS patients (
                patient_id TEXT PRIMARY KEY,
                doctor_username TEXT NOT NULL,
                name TEXT NOT NULL,
                age INTEGER NOT NULL,
                gender TEXT NOT NULL,
                diagnosis TEXT NOT NULL,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL,
                features_json TEXT NOT NULL,
                proba_json TEXT NOT NULL,
                treatment_plan TEXT NOT NULL DEFAULT '',
                progress_json TEXT NOT NULL DEFAULT '[]'
            );

            CREATE INDEX IF NOT EXISTS idx_patients_doctor
                ON patients(doctor_username);
            ",
        )?;

        Ok(())
    }
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
}

/// Naive layouts found in older databases, read as UTC.
const LEGACY_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

fn parse_utc(idx: usize, s: &str) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&chrono::Utc));
    }
    LEGACY_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(s, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| conversion_error(idx, format!("unrecognized timestamp {s:?}")))
}

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    let username: String = row.get(0)?;
    let name: String = row.get(1)?;
    let email: Option<String> = row.get(2)?;
    let specialization: Option<String> = row.get(3)?;
    let password_hash: String = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(Doctor {
        username: Username::new(&username),
        name,
        email,
        specialization,
        password_hash: PasswordDigest::from_stored(password_hash),
        created_at: parse_utc(5, &created_at)?,
    })
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<PendingApplication> {
    let experience: i64 = row.get(6)?;
    let application_date: String = row.get(11)?;
    let application_date =
        chrono::NaiveDateTime::parse_from_str(&application_date, APPLICATION_DATE_FORMAT)
            .map_err(|e| conversion_error(11, e))?;
    let password_hash: String = row.get(9)?;

    Ok(PendingApplication {
        application_id: ApplicationId::new(row.get::<_, String>(0)?),
        username: Username::new(&row.get::<_, String>(1)?),
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        specialization: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        experience: u32::try_from(experience).map_err(|e| conversion_error(6, e))?,
        license: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        hospital: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        password_hash: PasswordDigest::from_stored(password_hash),
        notes: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        application_date,
    })
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    let patient_id: String = row.get(0)?;
    let doctor_username: String = row.get(1)?;
    let age: i64 = row.get(3)?;
    let gender: String = row.get(4)?;
    let diagnosis: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let features_json: String = row.get(8)?;
    let proba_json: String = row.get(9)?;
    let progress_json: String = row.get(11)?;

    let record = PatientRecord {
        name: row.get(2)?,
        age: u32::try_from(age).map_err(|e| conversion_error(3, e))?,
        gender: gender.parse().map_err(|e: String| conversion_error(4, e))?,
        diagnosis: diagnosis.parse().map_err(|e: String| conversion_error(5, e))?,
        confidence: row.get(6)?,
        created_at: parse_utc(7, &created_at)?,
        features: serde_json::from_str(&features_json).map_err(|e| conversion_error(8, e))?,
        probabilities: serde_json::from_str(&proba_json).map_err(|e| conversion_error(9, e))?,
        treatment_plan: row.get(10)?,
        progress: serde_json::from_str(&progress_json).map_err(|e| conversion_error(11, e))?,
    };

    Ok(Patient {
        patient_id,
        doctor_username: Username::new(&doctor_username),
        record,
    })
}

const APPLICATION_COLUMNS: &str = "application_id, username, name, email, phone, specialization, \
     experience, license, hospital, password_hash, notes, application_date";

const PATIENT_COLUMNS: &str = "patient_id, doctor_username, name, age, gender, diagnosis, \
     confidence, created_at, features_json, proba_json, treatment_plan, progress_json";

impl Storage for SqliteStorage {
    type Error = StorageError;

    fn get_doctor(&self, username: &Username) -> Result<Option<Doctor>, Self::Error> {
        let conn = self.connect()?;
        let doctor = conn
            .query_row(
                "SELECT username, name, email, specialization, password_hash, created_at \
                 FROM doctors WHERE username = ?1",
                params![username.as_str()],
                doctor_from_row,
            )
            .optional()?;
        Ok(doctor)
    }

    fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), Self::Error> {
        let conn = self.connect()?;
        conn.execute(
            r"
            INSERT OR REPLACE INTO doctors (
                username, name, email, specialization, password_hash, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                doctor.username.as_str(),
                doctor.name,
                doctor.email,
                doctor.specialization,
                doctor.password_hash.as_str(),
                doctor.created_at.to_rfc3339(),
            ],
        )?;

        tracing::debug!("Upserted doctor {}", doctor.username);
        Ok(())
    }

    fn count_doctors(&self) -> Result<usize, Self::Error> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM doctors", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn save_application(&self, application: &PendingApplication) -> Result<(), Self::Error> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO pending_applications ({APPLICATION_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                application.application_id.as_str(),
                application.username.as_str(),
                application.name,
                application.email,
                application.phone,
                application.specialization,
                i64::from(application.experience),
                application.license,
                application.hospital,
                application.password_hash.as_str(),
                application.notes,
                application.formatted_date(),
            ],
        )?;

        tracing::debug!("Saved pending application {}", application.application_id);
        Ok(())
    }

    fn get_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<PendingApplication>, Self::Error> {
        let conn = self.connect()?;
        let application = conn
            .query_row(
                &format!(
                    "SELECT {APPLICATION_COLUMNS} FROM pending_applications \
                     WHERE application_id = ?1"
                ),
                params![id.as_str()],
                application_from_row,
            )
            .optional()?;
        Ok(application)
    }

    fn list_applications(&self) -> Result<Vec<PendingApplication>, Self::Error> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM pending_applications \
             ORDER BY application_date ASC, application_id ASC"
        ))?;

        let applications = stmt
            .query_map([], application_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(applications)
    }

    fn delete_application(&self, id: &ApplicationId) -> Result<bool, Self::Error> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM pending_applications WHERE application_id = ?1",
            params![id.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn upsert_patient(
        &self,
        doctor: &Username,
        patient_id: &str,
        record: &PatientRecord,
    ) -> Result<(), Self::Error> {
        let features_json = serde_json::to_string(&record.features)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let proba_json = serde_json::to_string(&record.probabilities)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let progress_json = serde_json::to_string(&record.progress)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let conn = self.connect()?;
        conn.execute(
            &format!(
                r"
                INSERT INTO patients ({PATIENT_COLUMNS})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(patient_id) DO UPDATE SET
                    doctor_username = excluded.doctor_username,
                    name = excluded.name,
                    age = excluded.age,
                    gender = excluded.gender,
                    diagnosis = excluded.diagnosis,
                    confidence = excluded.confidence,
                    created_at = excluded.created_at,
                    features_json = excluded.features_json,
                    proba_json = excluded.proba_json,
                    treatment_plan = excluded.treatment_plan,
                    progress_json = excluded.progress_json
                "
            ),
            params![
                patient_id,
                doctor.as_str(),
                record.name,
                i64::from(record.age),
                record.gender.as_str(),
                record.diagnosis.as_str(),
                record.confidence,
                record.created_at.to_rfc3339(),
                features_json,
                proba_json,
                record.treatment_plan,
                progress_json,
            ],
        )?;

        tracing::debug!("Upserted patient record for {}", doctor);
        Ok(())
    }

    fn get_patient(
        &self,
        doctor: &Username,
        patient_id: &str,
    ) -> Result<Option<Patient>, Self::Error> {
        let conn = self.connect()?;
        let patient = conn
            .query_row(
                &format!(
                    "SELECT {PATIENT_COLUMNS} FROM patients \
                     WHERE patient_id = ?1 AND doctor_username = ?2"
                ),
                params![patient_id, doctor.as_str()],
                patient_from_row,
            )
            .optional()?;
        Ok(patient)
    }

    fn list_patients(&self, doctor: &Username) -> Result<Vec<Patient>, Self::Error> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients \
             WHERE doctor_username = ?1 \
             ORDER BY created_at ASC, patient_id ASC"
        ))?;

        let patients = stmt
            .query_map(params![doctor.as_str()], patient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patients)
    }

    fn delete_patient(&self, doctor: &Username, patient_id: &str) -> Result<bool, Self::Error> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM patients WHERE patient_id = ?1 AND doctor_username = ?2",
            params![patient_id, doctor.as_str()],
        )?;
        Ok(removed > 0)
    }
}

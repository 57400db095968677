//! Persistent SQLite database for health records and chat transcripts.

use crate::chatbot::model::{
    Appointment, ChatSession, ChatTurn, ConditionKind, DiseaseKnowledge, HealthCondition,
    Medication, Sender, UserId,
};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Error)]
pub enum DataError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database connection lock poisoned")]
    Poisoned,
    #[error("invalid stored value in {column}: {value:?}")]
    InvalidValue { column: &'static str, value: String },
}

/// Read access to a patient's health records.
pub trait HealthData {
    fn chronic_conditions(&self, user_id: UserId) -> Result<Vec<HealthCondition>, DataError>;

    /// Medications with no end date or an end date on/after `today`, by name.
    fn active_medications(&self, user_id: UserId, today: NaiveDate) -> Result<Vec<Medication>, DataError>;

    /// The `limit` soonest appointments on/after `today`, by date then time.
    fn upcoming_appointments(
        &self,
        user_id: UserId,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Appointment>, DataError>;

    /// First disease whose name contains `key`, case-insensitively.
    fn find_guidelines(&self, key: &str) -> Result<Option<DiseaseKnowledge>, DataError>;
}

/// Chat session and transcript persistence.
pub trait ChatStore {
    fn create_session(&self, session: &ChatSession) -> Result<(), DataError>;
    fn session(&self, session_id: &str) -> Result<Option<ChatSession>, DataError>;
    /// Most recently updated first.
    fn sessions_for(&self, user_id: UserId) -> Result<Vec<ChatSession>, DataError>;
    fn rename_session(&self, session_id: &str, title: &str, updated_at: &str) -> Result<bool, DataError>;
    /// Deleting a session also deletes its messages.
    fn delete_session(&self, session_id: &str) -> Result<bool, DataError>;
    /// Store a user message and the bot's reply and bump the session's
    /// `updated_at`, all or nothing.
    fn record_exchange(
        &self,
        session_id: &str,
        user_text: &str,
        bot_text: &str,
        timestamp: &str,
    ) -> Result<(ChatTurn, ChatTurn), DataError>;
    /// Oldest first.
    fn turns(&self, session_id: &str) -> Result<Vec<ChatTurn>, DataError>;
}

/// Persistent SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn new() -> Result<Self, DataError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, DataError> {
        let existed = path.exists();
        let db = Self::from_connection(Connection::open(path)?)?;
        let (sessions, messages) = db.counts()?;
        if existed {
            info!("Loaded database from {:?} ({} sessions, {} messages)", path, sessions, messages);
        } else {
            info!("Created database at {:?}", path);
        }
        Ok(db)
    }

    fn from_connection(conn: Connection) -> Result<Self, DataError> {
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DataError> {
        self.conn.lock().map_err(|_| DataError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), DataError> {
        let conn = self.conn()?;

        conn.execute_batch(r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS health_conditions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT 'other'
            );

            CREATE TABLE IF NOT EXISTS medications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                dosage TEXT,
                frequency TEXT,
                start_date TEXT,
                end_date TEXT
            );

            CREATE TABLE IF NOT EXISTS appointments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                provider_name TEXT NOT NULL,
                specialty TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS disease_knowledge (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                disease_name TEXT NOT NULL UNIQUE,
                management_guidelines TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conditions_user ON health_conditions(user_id);
            CREATE INDEX IF NOT EXISTS idx_medications_user ON medications(user_id);
            CREATE INDEX IF NOT EXISTS idx_appointments_user_date ON appointments(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON chat_sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_messages_session ON chat_messages(session_id);
        "#)?;
        Ok(())
    }

    fn counts(&self) -> Result<(usize, usize), DataError> {
        let conn = self.conn()?;
        let sessions: i64 = conn.query_row("SELECT COUNT(*) FROM chat_sessions", [], |row| row.get(0))?;
        let messages: i64 = conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))?;
        Ok((sessions as usize, messages as usize))
    }

    // ==================== IMPORT METHODS ====================

    pub fn add_condition(&self, user_id: UserId, condition: &HealthCondition) -> Result<(), DataError> {
        self.conn()?.execute(
            "INSERT INTO health_conditions (user_id, name, type) VALUES (?1, ?2, ?3)",
            params![user_id.0, condition.name, condition.kind.as_str()],
        )?;
        Ok(())
    }

    pub fn add_medication(&self, user_id: UserId, med: &Medication) -> Result<(), DataError> {
        self.conn()?.execute(
            "INSERT INTO medications (user_id, name, dosage, frequency, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id.0,
                med.name,
                med.dosage,
                med.frequency,
                med.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
                med.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )?;
        Ok(())
    }

    pub fn add_appointment(&self, user_id: UserId, appt: &Appointment) -> Result<(), DataError> {
        self.conn()?.execute(
            "INSERT INTO appointments (user_id, date, start_time, provider_name, specialty)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id.0,
                appt.date.format(DATE_FORMAT).to_string(),
                appt.start_time.format(TIME_FORMAT).to_string(),
                appt.provider_name,
                appt.specialty,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace guidelines for a disease.
    pub fn upsert_disease(&self, disease: &DiseaseKnowledge) -> Result<(), DataError> {
        self.conn()?.execute(
            "INSERT INTO disease_knowledge (disease_name, management_guidelines) VALUES (?1, ?2)
             ON CONFLICT(disease_name) DO UPDATE SET management_guidelines = ?2",
            params![disease.disease_name, disease.management_guidelines],
        )?;
        Ok(())
    }
}

fn parse_date(column: &'static str, value: String) -> Result<NaiveDate, DataError> {
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|_| DataError::InvalidValue { column, value })
}

fn parse_time(column: &'static str, value: String) -> Result<NaiveTime, DataError> {
    // Accept both "14:30" and "14:30:00".
    NaiveTime::parse_from_str(&value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M:%S"))
        .map_err(|_| DataError::InvalidValue { column, value })
}

fn insert_turn(
    conn: &Connection,
    session_id: &str,
    sender: Sender,
    content: &str,
    timestamp: &str,
) -> Result<ChatTurn, DataError> {
    conn.execute(
        "INSERT INTO chat_messages (session_id, sender, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![session_id, sender.as_str(), content, timestamp],
    )?;
    Ok(ChatTurn {
        id: conn.last_insert_rowid(),
        session_id: session_id.to_string(),
        sender,
        content: content.to_string(),
        timestamp: timestamp.to_string(),
    })
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        title: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl HealthData for Database {
    fn chronic_conditions(&self, user_id: UserId) -> Result<Vec<HealthCondition>, DataError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, type FROM health_conditions WHERE user_id = ?1 AND type = 'chronic' ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id.0], |row| {
            Ok(HealthCondition {
                name: row.get(0)?,
                kind: ConditionKind::from_str(&row.get::<_, String>(1)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn active_medications(&self, user_id: UserId, today: NaiveDate) -> Result<Vec<Medication>, DataError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, dosage, frequency, start_date, end_date FROM medications
             WHERE user_id = ?1 AND (end_date IS NULL OR end_date >= ?2)
             ORDER BY name ASC",
        )?;
        let rows = stmt.query_map(params![user_id.0, today.format(DATE_FORMAT).to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut meds = Vec::new();
        for row in rows {
            let (name, dosage, frequency, start, end) = row?;
            meds.push(Medication {
                name,
                dosage,
                frequency,
                start_date: start.map(|s| parse_date("medications.start_date", s)).transpose()?,
                end_date: end.map(|s| parse_date("medications.end_date", s)).transpose()?,
            });
        }
        Ok(meds)
    }

    fn upcoming_appointments(
        &self,
        user_id: UserId,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Appointment>, DataError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT date, start_time, provider_name, specialty FROM appointments
             WHERE user_id = ?1 AND date >= ?2
             ORDER BY date ASC, start_time ASC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![user_id.0, today.format(DATE_FORMAT).to_string(), limit as i64],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )?;

        let mut appointments = Vec::new();
        for row in rows {
            let (date, time, provider_name, specialty) = row?;
            appointments.push(Appointment {
                date: parse_date("appointments.date", date)?,
                start_time: parse_time("appointments.start_time", time)?,
                provider_name,
                specialty,
            });
        }
        Ok(appointments)
    }

    fn find_guidelines(&self, key: &str) -> Result<Option<DiseaseKnowledge>, DataError> {
        let conn = self.conn()?;
        let pattern = format!("%{}%", key.to_lowercase());
        let found = conn
            .query_row(
                "SELECT disease_name, management_guidelines FROM disease_knowledge
                 WHERE LOWER(disease_name) LIKE ?1 ORDER BY id LIMIT 1",
                params![pattern],
                |row| {
                    Ok(DiseaseKnowledge {
                        disease_name: row.get(0)?,
                        management_guidelines: row.get(1)?,
                    })
                },
            )
            .optional()?;
        debug!("Guidelines lookup for {:?}: {}", key, found.is_some());
        Ok(found)
    }
}

impl ChatStore for Database {
    fn create_session(&self, session: &ChatSession) -> Result<(), DataError> {
        self.conn()?.execute(
            "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session.id, session.user_id.0, session.title, session.created_at, session.updated_at],
        )?;
        Ok(())
    }

    fn session(&self, session_id: &str) -> Result<Option<ChatSession>, DataError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT id, user_id, title, created_at, updated_at FROM chat_sessions WHERE id = ?1",
                params![session_id],
                session_from_row,
            )
            .optional()?)
    }

    fn sessions_for(&self, user_id: UserId) -> Result<Vec<ChatSession>, DataError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, created_at, updated_at FROM chat_sessions
             WHERE user_id = ?1 ORDER BY updated_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id.0], session_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn rename_session(&self, session_id: &str, title: &str, updated_at: &str) -> Result<bool, DataError> {
        let n = self.conn()?.execute(
            "UPDATE chat_sessions SET title = ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, title, updated_at],
        )?;
        Ok(n > 0)
    }

    fn delete_session(&self, session_id: &str) -> Result<bool, DataError> {
        let n = self.conn()?.execute("DELETE FROM chat_sessions WHERE id = ?1", params![session_id])?;
        Ok(n > 0)
    }

    fn record_exchange(
        &self,
        session_id: &str,
        user_text: &str,
        bot_text: &str,
        timestamp: &str,
    ) -> Result<(ChatTurn, ChatTurn), DataError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let user_turn = insert_turn(&tx, session_id, Sender::User, user_text, timestamp)?;
        let bot_turn = insert_turn(&tx, session_id, Sender::Bot, bot_text, timestamp)?;
        tx.execute(
            "UPDATE chat_sessions SET updated_at = ?2 WHERE id = ?1",
            params![session_id, timestamp],
        )?;

        tx.commit()?;
        Ok((user_turn, bot_turn))
    }

    fn turns(&self, session_id: &str) -> Result<Vec<ChatTurn>, DataError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, sender, content, timestamp FROM chat_messages
             WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (id, session_id, sender, content, timestamp) = row?;
            let sender = Sender::from_str(&sender)
                .ok_or(DataError::InvalidValue { column: "chat_messages.sender", value: sender })?;
            turns.push(ChatTurn { id, session_id, sender, content, timestamp });
        }
        Ok(turns)
    }
}

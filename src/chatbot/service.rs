//! Chat session actions: the engine plus transcript persistence.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chatbot::cache::RequestCache;
use crate::chatbot::database::{ChatStore, DataError, Database};
use crate::chatbot::engine::{ChatEngine, EngineError};
use crate::chatbot::model::{ChatSession, ChatTurn, UserId};

const DEFAULT_TITLE: &str = "New Chat";

/// Max chars kept from a user-supplied session title.
const MAX_TITLE_LENGTH: usize = 100;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Both sides of one `send_message` call.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub user_message: ChatTurn,
    pub bot_message: ChatTurn,
}

impl Exchange {
    pub fn response(&self) -> &str {
        &self.bot_message.content
    }
}

pub struct ChatService {
    database: Database,
    engine: ChatEngine,
    cache_enabled: bool,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn clean_title(title: &str) -> Option<String> {
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some(title.chars().take(MAX_TITLE_LENGTH).collect())
}

impl ChatService {
    pub fn new(database: Database, engine: ChatEngine) -> Self {
        Self { database, engine, cache_enabled: true }
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Load a session, treating other users' sessions as missing.
    fn owned_session(&self, user_id: UserId, session_id: &str) -> Result<ChatSession, ServiceError> {
        match self.database.session(session_id)? {
            Some(session) if session.user_id == user_id => Ok(session),
            Some(_) => {
                warn!("User {} asked for session {} owned by someone else", user_id, session_id);
                Err(ServiceError::SessionNotFound(session_id.to_string()))
            }
            None => Err(ServiceError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Whether `session_id` exists and belongs to `user_id`. Data failures
    /// are errors, not `false`.
    pub fn owns_session(&self, user_id: UserId, session_id: &str) -> Result<bool, ServiceError> {
        match self.owned_session(user_id, session_id) {
            Ok(_) => Ok(true),
            Err(ServiceError::SessionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn start_session(&self, user_id: UserId, title: Option<&str>) -> Result<ChatSession, ServiceError> {
        let timestamp = now();
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            user_id,
            title: title.and_then(clean_title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };
        self.database.create_session(&session)?;
        info!("🆕 Started session {} for user {}", session.id, user_id);
        Ok(session)
    }

    pub fn send_message(&self, user_id: UserId, session_id: &str, text: &str) -> Result<Exchange, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyMessage);
        }
        self.owned_session(user_id, session_id)?;

        // One cache per request; it is dropped with this frame.
        let mut cache = if self.cache_enabled { RequestCache::new() } else { RequestCache::disabled() };
        let response = self.engine.respond(&self.database, &mut cache, user_id, text)?;

        let (user_message, bot_message) =
            self.database.record_exchange(session_id, text, &response, &now())?;

        Ok(Exchange { user_message, bot_message })
    }

    pub fn get_sessions(&self, user_id: UserId) -> Result<Vec<ChatSession>, ServiceError> {
        Ok(self.database.sessions_for(user_id)?)
    }

    pub fn get_messages(&self, user_id: UserId, session_id: &str) -> Result<Vec<ChatTurn>, ServiceError> {
        self.owned_session(user_id, session_id)?;
        Ok(self.database.turns(session_id)?)
    }

    pub fn update_session(&self, user_id: UserId, session_id: &str, title: &str) -> Result<ChatSession, ServiceError> {
        let title = clean_title(title).ok_or(ServiceError::EmptyTitle)?;
        let mut session = self.owned_session(user_id, session_id)?;
        let timestamp = now();
        self.database.rename_session(session_id, &title, &timestamp)?;
        session.title = title;
        session.updated_at = timestamp;
        Ok(session)
    }

    pub fn delete_session(&self, user_id: UserId, session_id: &str) -> Result<(), ServiceError> {
        self.owned_session(user_id, session_id)?;
        self.database.delete_session(session_id)?;
        info!("🗑️ Deleted session {} for user {}", session_id, user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::model::{Medication, Sender};
    use chrono::NaiveDate;

    fn service() -> ChatService {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        ChatService::new(Database::new().unwrap(), ChatEngine::with_today(today))
    }

    #[test]
    fn test_send_message_persists_both_turns() {
        let svc = service();
        let user = UserId(1);
        let session = svc.start_session(user, None).unwrap();
        assert_eq!(session.title, "New Chat");

        let exchange = svc.send_message(user, &session.id, "  hello  ").unwrap();
        assert_eq!(exchange.user_message.content, "hello");
        assert!(exchange.response().starts_with("Hello! "));

        let turns = svc.get_messages(user, &session.id).unwrap();
        let senders: Vec<_> = turns.iter().map(|t| t.sender).collect();
        assert_eq!(senders, vec![Sender::User, Sender::Bot]);
    }

    #[test]
    fn test_send_message_bumps_session() {
        let svc = service();
        let user = UserId(1);
        let session = svc.start_session(user, None).unwrap();

        let exchange = svc.send_message(user, &session.id, "hi").unwrap();
        assert_eq!(exchange.user_message.timestamp, exchange.bot_message.timestamp);
        let stored = svc.database().session(&session.id).unwrap().unwrap();
        assert_eq!(stored.updated_at, exchange.bot_message.timestamp);
        assert_eq!(stored.created_at, session.created_at);
    }

    #[test]
    fn test_empty_message_rejected() {
        let svc = service();
        let session = svc.start_session(UserId(1), None).unwrap();
        let err = svc.send_message(UserId(1), &session.id, "   ").unwrap_err();
        assert!(matches!(err, ServiceError::EmptyMessage));
        assert!(svc.get_messages(UserId(1), &session.id).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_session_is_not_found() {
        let svc = service();
        let session = svc.start_session(UserId(1), Some("Mine")).unwrap();

        let err = svc.get_messages(UserId(2), &session.id).unwrap_err();
        assert!(matches!(err, ServiceError::SessionNotFound(_)));
        let err = svc.send_message(UserId(2), &session.id, "hi").unwrap_err();
        assert!(matches!(err, ServiceError::SessionNotFound(_)));
        let err = svc.delete_session(UserId(2), &session.id).unwrap_err();
        assert!(matches!(err, ServiceError::SessionNotFound(_)));
        assert!(svc.get_sessions(UserId(2)).unwrap().is_empty());
    }

    #[test]
    fn test_owns_session_surfaces_data_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carebot.db");
        let svc = ChatService::new(Database::open(&path).unwrap(), ChatEngine::new());
        let session = svc.start_session(UserId(1), None).unwrap();

        assert!(svc.owns_session(UserId(1), &session.id).unwrap());
        assert!(!svc.owns_session(UserId(2), &session.id).unwrap());
        assert!(!svc.owns_session(UserId(1), "missing").unwrap());

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE chat_messages; DROP TABLE chat_sessions;")
            .unwrap();
        assert!(matches!(
            svc.owns_session(UserId(1), &session.id),
            Err(ServiceError::Data(_))
        ));
    }

    #[test]
    fn test_update_and_delete_session() {
        let svc = service();
        let user = UserId(1);
        let session = svc.start_session(user, None).unwrap();
        svc.send_message(user, &session.id, "hi").unwrap();

        let renamed = svc.update_session(user, &session.id, "  Knee pain  ").unwrap();
        assert_eq!(renamed.title, "Knee pain");
        assert!(matches!(
            svc.update_session(user, &session.id, " ").unwrap_err(),
            ServiceError::EmptyTitle
        ));

        svc.delete_session(user, &session.id).unwrap();
        assert!(svc.get_sessions(user).unwrap().is_empty());
        assert!(svc.database().turns(&session.id).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_data_each_request() {
        let svc = service();
        let user = UserId(1);
        let session = svc.start_session(user, None).unwrap();

        let first = svc.send_message(user, &session.id, "my medications").unwrap();
        assert!(first.response().contains("don't have any active medications"));

        svc.database()
            .add_medication(
                user,
                &Medication {
                    name: "Metformin".to_string(),
                    dosage: Some("500mg".to_string()),
                    frequency: None,
                    start_date: None,
                    end_date: None,
                },
            )
            .unwrap();

        let second = svc.send_message(user, &session.id, "my medications").unwrap();
        assert!(second.response().contains("• **Metformin** (500mg)"));
    }
}

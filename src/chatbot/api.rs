//! JSON action contract for chat sessions.
//!
//! Requests look like `{"action": "send_message", "session_id": "...", "message": "hi"}`.
//! Responses always carry `success`; failures carry a user-facing `error` and
//! never expose internal detail.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::chatbot::model::{ChatSession, ChatTurn, UserId};
use crate::chatbot::service::{ChatService, ServiceError};

pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    StartSession {
        #[serde(default)]
        title: Option<String>,
    },
    SendMessage {
        session_id: String,
        message: String,
    },
    GetSessions,
    GetMessages {
        session_id: String,
    },
    UpdateSession {
        session_id: String,
        title: String,
    },
    DeleteSession {
        session_id: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Session { session: ChatSession },
    Message { session_id: String, response: String, user_message: ChatTurn, bot_message: ChatTurn },
    Sessions { sessions: Vec<ChatSession> },
    Messages { session_id: String, messages: Vec<ChatTurn> },
    Deleted { session_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(flatten)]
    pub payload: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn ok(payload: Payload) -> Self {
        Self { success: true, payload: Some(payload), error: None }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { success: false, payload: None, error: Some(message.into()) }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"success":false,"error":"{}"}}"#, GENERIC_ERROR)
        })
    }
}

/// Parse a raw JSON request; malformed input becomes a failed response.
pub fn parse_request(json: &str) -> Result<Request, Response> {
    serde_json::from_str(json).map_err(|e| {
        warn!("Rejected malformed request: {e}");
        Response::failed("Invalid request")
    })
}

/// Turn a service error into the user-facing message.
fn failure(user_id: UserId, err: ServiceError) -> Response {
    match err {
        ServiceError::EmptyMessage => Response::failed("Message cannot be empty"),
        ServiceError::EmptyTitle => Response::failed("Title cannot be empty"),
        ServiceError::SessionNotFound(_) => Response::failed("Session not found"),
        ServiceError::Engine(e) => {
            error!("Chatbot failed for user {}: {}", user_id, e);
            Response::failed(GENERIC_ERROR)
        }
        ServiceError::Data(e) => {
            error!("Data error for user {}: {}", user_id, e);
            Response::failed(GENERIC_ERROR)
        }
    }
}

pub fn dispatch(service: &ChatService, user_id: UserId, request: Request) -> Response {
    let result = match request {
        Request::StartSession { title } => service
            .start_session(user_id, title.as_deref())
            .map(|session| Payload::Session { session }),
        Request::SendMessage { session_id, message } => service
            .send_message(user_id, &session_id, &message)
            .map(|exchange| Payload::Message {
                session_id,
                response: exchange.bot_message.content.clone(),
                user_message: exchange.user_message,
                bot_message: exchange.bot_message,
            }),
        Request::GetSessions => service
            .get_sessions(user_id)
            .map(|sessions| Payload::Sessions { sessions }),
        Request::GetMessages { session_id } => service
            .get_messages(user_id, &session_id)
            .map(|messages| Payload::Messages { session_id, messages }),
        Request::UpdateSession { session_id, title } => service
            .update_session(user_id, &session_id, &title)
            .map(|session| Payload::Session { session }),
        Request::DeleteSession { session_id } => service
            .delete_session(user_id, &session_id)
            .map(|()| Payload::Deleted { session_id }),
    };

    match result {
        Ok(payload) => Response::ok(payload),
        Err(e) => failure(user_id, e),
    }
}

/// Parse, dispatch and serialize in one step.
pub fn handle_json(service: &ChatService, user_id: UserId, json: &str) -> String {
    match parse_request(json) {
        Ok(request) => dispatch(service, user_id, request).to_json(),
        Err(response) => response.to_json(),
    }
}

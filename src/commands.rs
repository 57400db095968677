//! Telegram slash-commands, mapped onto chat session actions.

use regex::Regex;
use std::sync::LazyLock;

use crate::chatbot::api::Request;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());

pub const HELP: &str = "Commands:\n\
/new [title] - start a new conversation\n\
/sessions - list your conversations\n\
/use <id> - switch to a conversation\n\
/history - show the current conversation\n\
/rename <title> - rename the current conversation\n\
/end - delete the current conversation\n\
\n\
Anything else is sent to the assistant.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New(Option<String>),
    Sessions,
    Use(String),
    History,
    Rename(String),
    End,
    Help,
    /// Plain text for the assistant.
    Chat(String),
}

/// Parse a DM. Unknown commands and commands missing their argument get help.
pub fn parse(text: &str) -> Command {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('/') else {
        return Command::Chat(text.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    // "/new@carebot" when addressed explicitly
    let name = name.split('@').next().unwrap_or(name).to_lowercase();
    let arg = (!arg.is_empty()).then(|| arg.to_string());

    match (name.as_str(), arg) {
        ("new" | "start", arg) => Command::New(arg),
        ("sessions", _) => Command::Sessions,
        ("use", Some(id)) => Command::Use(id),
        ("history", _) => Command::History,
        ("rename", Some(title)) => Command::Rename(title),
        ("end", _) => Command::End,
        _ => Command::Help,
    }
}

impl Command {
    /// The session action this command performs, given the active session.
    ///
    /// `None` means the command needs an active session and there is none, or
    /// it is handled locally (help, switching sessions).
    pub fn to_request(&self, active_session: Option<&str>) -> Option<Request> {
        match (self, active_session) {
            (Command::New(title), _) => Some(Request::StartSession { title: title.clone() }),
            (Command::Sessions, _) => Some(Request::GetSessions),
            (Command::History, Some(id)) => Some(Request::GetMessages { session_id: id.to_string() }),
            (Command::Rename(title), Some(id)) => Some(Request::UpdateSession {
                session_id: id.to_string(),
                title: title.clone(),
            }),
            (Command::End, Some(id)) => Some(Request::DeleteSession { session_id: id.to_string() }),
            (Command::Chat(message), Some(id)) => Some(Request::SendMessage {
                session_id: id.to_string(),
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

/// Render reply text for Telegram's HTML parse mode.
///
/// `<`, `>` and `&` are escaped; `**text**` becomes `<b>text</b>`.
pub fn to_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            _ => escaped.push(c),
        }
    }
    BOLD.replace_all(&escaped, "<b>${1}</b>").into_owned()
}

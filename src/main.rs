use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use teloxide::prelude::*;
use teloxide::types::{ChatKind, ParseMode};
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use carebot::chatbot::api::{self, Payload, Request, Response};
use carebot::chatbot::{ChatEngine, ChatService, Database};
use carebot::commands::{self, Command};
use carebot::config::Config;

const NO_ACTIVE_SESSION: &str = "No active conversation. Send a message or use /new to start one.";

struct BotState {
    config: Config,
    service: ChatService,
    /// Active session per Telegram user.
    active: Mutex<HashMap<UserId, String>>,
    dm_denied: Mutex<HashSet<UserId>>,
}

impl BotState {
    async fn active_session(&self, user: UserId) -> Option<String> {
        self.active.lock().await.get(&user).cloned()
    }

    async fn set_active(&self, user: UserId, session_id: Option<String>) {
        let mut active = self.active.lock().await;
        match session_id {
            Some(id) => active.insert(user, id),
            None => active.remove(&user),
        };
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "carebot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("carebot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting carebot...");
    info!("Loaded config from {config_path}");
    info!("{} patient(s) configured", config.patients.len());

    let database = match Database::open(&config.database_path()) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };
    let service = ChatService::new(database, ChatEngine::new()).with_cache(config.cache_enabled);

    let bot = Bot::new(&config.telegram_bot_token);
    let state = Arc::new(BotState {
        config,
        service,
        active: Mutex::new(HashMap::new()),
        dm_denied: Mutex::new(HashSet::new()),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        return Ok(());
    }
    let Some(ref user) = msg.from else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let Some(patient) = state.config.patient_for(user.id) else {
        let mut denied = state.dm_denied.lock().await;
        if denied.insert(user.id) {
            info!("DM from unknown user {} - denial", user.id);
            bot.send_message(msg.chat.id, "Access denied.").await.ok();
        }
        return Ok(());
    };

    let command = commands::parse(text);
    let reply = run_command(&state, user.id, patient, command).await;
    bot.send_message(msg.chat.id, commands::to_html(&reply))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn run_command(
    state: &BotState,
    user: UserId,
    patient: carebot::chatbot::UserId,
    command: Command,
) -> String {
    let mut active = state.active_session(user).await;

    match &command {
        Command::Help => return commands::HELP.to_string(),
        Command::Use(id) => {
            let owned = match state.service.owns_session(patient, id) {
                Ok(owned) => owned,
                Err(e) => {
                    error!("Failed to look up session {} for user {}: {}", id, patient, e);
                    return api::GENERIC_ERROR.to_string();
                }
            };
            if !owned {
                return "Conversation not found.".to_string();
            }
            state.set_active(user, Some(id.clone())).await;
            return format!("Switched to conversation {id}.");
        }
        Command::Chat(_) if active.is_none() => {
            // First message starts a conversation.
            let response = api::dispatch(&state.service, patient, Request::StartSession { title: None });
            if let Some(Payload::Session { session }) = response.payload {
                state.set_active(user, Some(session.id.clone())).await;
                active = Some(session.id);
            }
        }
        _ => {}
    }

    let Some(request) = command.to_request(active.as_deref()) else {
        return NO_ACTIVE_SESSION.to_string();
    };
    let response = api::dispatch(&state.service, patient, request);

    match (&command, &response.payload) {
        (Command::New(_), Some(Payload::Session { session })) => {
            state.set_active(user, Some(session.id.clone())).await;
        }
        (Command::End, Some(Payload::Deleted { .. })) => state.set_active(user, None).await,
        _ => {}
    }

    render(&command, response)
}

fn render(command: &Command, response: Response) -> String {
    if !response.success {
        return response.error.unwrap_or_else(|| api::GENERIC_ERROR.to_string());
    }
    match response.payload {
        Some(Payload::Message { response, .. }) => response,
        Some(Payload::Session { session }) => match command {
            Command::Rename(_) => format!("Renamed to \"{}\".", session.title),
            _ => format!("Started \"{}\" ({}).", session.title, session.id),
        },
        Some(Payload::Sessions { sessions }) if sessions.is_empty() => "No conversations yet.".to_string(),
        Some(Payload::Sessions { sessions }) => sessions
            .iter()
            .map(|s| format!("• {} ({})", s.title, s.id))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Payload::Messages { messages, .. }) if messages.is_empty() => "Nothing here yet.".to_string(),
        Some(Payload::Messages { messages, .. }) => messages
            .iter()
            .map(|m| format!("[{}] {}", m.sender.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n"),
        Some(Payload::Deleted { .. }) => "Conversation deleted.".to_string(),
        None => api::GENERIC_ERROR.to_string(),
    }
}

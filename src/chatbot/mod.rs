//! Chatbot module - answers patient questions from their health records.

pub mod api;
pub mod cache;
pub mod database;
pub mod engine;
pub mod model;
pub mod reply;
pub mod service;
pub mod symptoms;

pub use cache::RequestCache;
pub use database::{ChatStore, DataError, Database, HealthData};
pub use engine::{ChatEngine, EngineError, Intent, classify};
pub use model::UserId;
pub use service::{ChatService, ServiceError};

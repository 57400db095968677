//! carebot - a rule-based health assistant over a patient's records.

pub mod chatbot;
pub mod commands;
pub mod config;

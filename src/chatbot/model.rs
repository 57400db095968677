//! Health records and chat transcript types.
//!
//! Everything here is owned and persisted by the data layer. The engine only
//! reads these.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Patient identity, as resolved by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Chronic,
    Acute,
    Other,
}

impl ConditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::Chronic => "chronic",
            ConditionKind::Acute => "acute",
            ConditionKind::Other => "other",
        }
    }

    /// Unknown values are stored as `Other`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "chronic" => ConditionKind::Chronic,
            "acute" => ConditionKind::Acute,
            _ => ConditionKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCondition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ConditionKind,
}

impl HealthCondition {
    pub fn chronic(name: &str) -> Self {
        Self { name: name.to_string(), kind: ConditionKind::Chronic }
    }

    pub fn is_chronic(&self) -> bool {
        self.kind == ConditionKind::Chronic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Medication {
    /// A medication is active until the day after its end date.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.end_date.is_none_or(|end| end >= today)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub provider_name: String,
    pub specialty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseKnowledge {
    pub disease_name: String,
    pub management_guidelines: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "bot" => Some(Sender::Bot),
            _ => None,
        }
    }
}

/// One side of a chat exchange, as stored in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: i64,
    pub session_id: String,
    pub sender: Sender,
    pub content: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: UserId,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

//! Chatbot engine - classifies a message and builds the reply.
//!
//! Classification is first-match-wins over [`RULES`], evaluated top to bottom
//! against the lower-cased, trimmed message. Earlier rules shadow later ones:
//! "this is an emergency, I have a headache" is a symptom report because the
//! symptom rule comes before the emergency rule.

use chrono::{Local, NaiveDate};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::chatbot::cache::RequestCache;
use crate::chatbot::database::{DataError, HealthData};
use crate::chatbot::model::UserId;
use crate::chatbot::reply::Reply;
use crate::chatbot::symptoms::SymptomReport;

/// How many upcoming appointments to list.
const MAX_APPOINTMENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Medication,
    Symptom,
    Appointment,
    Advice,
    Emergency,
    Fallback,
}

/// Ordered classification table. `Fallback` has no pattern.
pub static RULES: LazyLock<Vec<(Intent, Regex)>> = LazyLock::new(|| {
    [
        (Intent::Greeting, r"\b(hello|hi|hey|greetings|good (morning|afternoon|evening))\b"),
        (Intent::Medication, r"medication|prescription|drug|pill|medicine"),
        (Intent::Symptom, r"symptom|pain|ache|feel|experience|have|hurts?|hurting|discomfort"),
        (Intent::Appointment, r"appointment|schedule|see (a|my) (doctor|provider|physician)|visit|check.?up"),
        (Intent::Advice, r"advice|recommendation|suggestion|tip|help with|how to|what should i do"),
        (Intent::Emergency, r"emergency|911|urgent|can't breathe|severe pain|chest pain|passing out|fainting"),
    ]
    .into_iter()
    .map(|(intent, pattern)| (intent, Regex::new(pattern).unwrap()))
    .collect()
});

/// Classify an already lower-cased, trimmed message.
pub fn classify(text: &str) -> Intent {
    RULES
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Fallback)
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("processing failed: {0}")]
    DataUnavailable(#[from] DataError),
}

/// Builds replies from a user's health records.
///
/// Holds no per-user state. Lookups go through the caller's [`RequestCache`].
#[derive(Debug, Clone, Default)]
pub struct ChatEngine {
    /// Fixed date for "today"; the local date when unset.
    today: Option<NaiveDate>,
}

impl ChatEngine {
    pub fn new() -> Self {
        Self { today: None }
    }

    /// An engine that treats `today` as the current date.
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Reply to `message` using a fresh cache.
    pub fn respond_uncached(
        &self,
        data: &dyn HealthData,
        user_id: UserId,
        message: &str,
    ) -> Result<String, EngineError> {
        self.respond(data, &mut RequestCache::new(), user_id, message)
    }

    pub fn respond(
        &self,
        data: &dyn HealthData,
        cache: &mut RequestCache,
        user_id: UserId,
        message: &str,
    ) -> Result<String, EngineError> {
        let text = message.trim().to_lowercase();
        let intent = classify(&text);
        info!("💬 User {} intent: {:?}", user_id, intent);

        let reply = self.build_reply(data, cache, user_id, intent, &text)?;
        Ok(reply.to_string())
    }

    fn build_reply(
        &self,
        data: &dyn HealthData,
        cache: &mut RequestCache,
        user_id: UserId,
        intent: Intent,
        text: &str,
    ) -> Result<Reply, EngineError> {
        let reply = match intent {
            Intent::Greeting => {
                let conditions = cache.chronic_conditions(data, user_id)?;
                Reply::Greeting {
                    chronic_conditions: conditions.into_iter().map(|c| c.name).collect(),
                }
            }
            Intent::Medication => {
                Reply::Medications(cache.active_medications(data, user_id, self.today())?)
            }
            Intent::Symptom => {
                let report = SymptomReport::extract(text);
                debug!("Symptom report: {:?}", report);
                Reply::Symptom(report)
            }
            Intent::Appointment => Reply::Appointments(cache.upcoming_appointments(
                data,
                user_id,
                self.today(),
                MAX_APPOINTMENTS,
            )?),
            Intent::Advice => self.advice(data, cache, user_id, text)?,
            Intent::Emergency => Reply::Emergency,
            Intent::Fallback => Reply::Menu,
        };
        Ok(reply)
    }

    fn advice(
        &self,
        data: &dyn HealthData,
        cache: &mut RequestCache,
        user_id: UserId,
        text: &str,
    ) -> Result<Reply, EngineError> {
        let conditions = cache.chronic_conditions(data, user_id)?;
        if conditions.is_empty() {
            return Ok(Reply::WellnessTips);
        }

        let names: Vec<String> = conditions.into_iter().map(|c| c.name).collect();
        let key = condition_key(&names, text);
        if key.is_empty() {
            return Ok(Reply::ChronicTips);
        }

        match cache.guidelines(data, user_id, &key)? {
            Some(found) if !found.management_guidelines.trim().is_empty() => Ok(Reply::Guidelines {
                disease_name: found.disease_name,
                guidelines: found.management_guidelines,
            }),
            _ => Ok(Reply::ChronicTips),
        }
    }
}

/// Lower-cased words of the condition names that appear in `text`, joined
/// with spaces in first-seen order.
pub fn condition_key(condition_names: &[String], text: &str) -> String {
    let mut seen = BTreeSet::new();
    let mut matched = Vec::new();
    for name in condition_names {
        for word in name.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() || !seen.insert(word.to_string()) {
                continue;
            }
            if text.contains(word) {
                matched.push(word.to_string());
            }
        }
    }
    matched.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_order_is_fixed() {
        let order: Vec<Intent> = RULES.iter().map(|(intent, _)| *intent).collect();
        assert_eq!(
            order,
            vec![
                Intent::Greeting,
                Intent::Medication,
                Intent::Symptom,
                Intent::Appointment,
                Intent::Advice,
                Intent::Emergency,
            ]
        );
    }

    #[test]
    fn test_classify_each_intent() {
        assert_eq!(classify("good morning"), Intent::Greeting);
        assert_eq!(classify("what pills am i taking"), Intent::Medication);
        assert_eq!(classify("my back hurts"), Intent::Symptom);
        assert_eq!(classify("when is my next appointment"), Intent::Appointment);
        assert_eq!(classify("i need to see a doctor"), Intent::Appointment);
        assert_eq!(classify("any tips for sleep"), Intent::Advice);
        assert_eq!(classify("this is an emergency"), Intent::Emergency);
        assert_eq!(classify("what's the weather"), Intent::Fallback);
    }

    #[test]
    fn test_greeting_is_word_anchored() {
        // "hi" inside "this" or "which" is not a greeting
        assert_eq!(classify("which one is this"), Intent::Fallback);
        assert_eq!(classify("hi"), Intent::Greeting);
    }

    #[test]
    fn test_earlier_rules_shadow_later_ones() {
        assert_eq!(classify("hello, what medications am i on"), Intent::Greeting);
        assert_eq!(classify("i think this is an emergency, i have a headache"), Intent::Symptom);
        assert_eq!(classify("chest pain"), Intent::Symptom);
        assert_eq!(classify("i can't breathe"), Intent::Emergency);
        assert_eq!(classify("call 911"), Intent::Emergency);
    }

    #[test]
    fn test_condition_key_collects_matching_words() {
        let names = vec!["Type 2 Diabetes".to_string(), "Chronic Kidney Disease".to_string()];
        assert_eq!(condition_key(&names, "advice for my diabetes"), "diabetes");
        assert_eq!(condition_key(&names, "tips for kidney disease"), "kidney disease");
        assert_eq!(condition_key(&names, "general tips"), "");
    }

    #[test]
    fn test_condition_key_dedups_words() {
        let names = vec!["Heart Disease".to_string(), "Kidney Disease".to_string()];
        assert_eq!(condition_key(&names, "how to manage heart disease"), "heart disease");
    }
}

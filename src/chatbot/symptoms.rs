//! Symptom report extraction: symptom name, severity and duration.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Recognised symptoms, in match priority order.
const SYMPTOMS: &[&str] = &[
    "headache",
    "migraine",
    "nausea",
    "dizziness",
    "fatigue",
    "shortness of breath",
    "chest pain",
];

static SEVERITY_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(mild|moderate|severe|extreme)\s+(?:[a-z]+\s+)?(?:pain|discomfort)\b").unwrap()
});

static PAIN_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pain level\s*(?:of\s*|:\s*)?(\d+)").unwrap());

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:for|since)\s+(\d+)\s+(minute|hour|day|week|month|year)s?\b").unwrap()
});

/// Matched against the raw message independently of the severity.
static EMERGENCY_SYMPTOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"chest pain|difficulty breathing|severe pain").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Extreme,
}

impl Severity {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "mild" => Some(Severity::Mild),
            "moderate" => Some(Severity::Moderate),
            "severe" => Some(Severity::Severe),
            "extreme" => Some(Severity::Extreme),
            _ => None,
        }
    }

    /// Pain level bands: 7 and up is severe, 4 to 6 moderate, anything lower mild.
    pub fn from_pain_level(level: u32) -> Self {
        match level {
            7.. => Severity::Severe,
            4..=6 => Severity::Moderate,
            _ => Severity::Mild,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Extreme => "extreme",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duration {
    pub amount: u32,
    pub unit: &'static str,
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.amount > 1 { "s" } else { "" };
        write!(f, "{} {}{}", self.amount, self.unit, plural)
    }
}

/// What could be pulled out of a symptom message. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomReport {
    pub symptom: Option<&'static str>,
    pub severity: Option<Severity>,
    pub duration: Option<Duration>,
    /// The message separately names an emergency symptom.
    pub emergency_mentioned: bool,
}

impl SymptomReport {
    /// Extract from a lower-cased message.
    pub fn extract(text: &str) -> Self {
        let symptom = SYMPTOMS.iter().copied().find(|s| text.contains(s));

        let severity = SEVERITY_WORD
            .captures(text)
            .and_then(|c| Severity::from_word(&c[1]))
            .or_else(|| {
                PAIN_LEVEL
                    .captures(text)
                    // All digits, so a failed parse can only be overflow.
                    .map(|c| c[1].parse::<u32>().unwrap_or(u32::MAX))
                    .map(Severity::from_pain_level)
            });

        let duration = DURATION.captures(text).and_then(|c| {
            // Amounts past u32 are not a real duration; leave it out of the reply.
            let amount = c[1].parse::<u32>().ok()?;
            let unit = match &c[2] {
                "minute" => "minute",
                "hour" => "hour",
                "day" => "day",
                "week" => "week",
                "month" => "month",
                _ => "year",
            };
            Some(Duration { amount, unit })
        });

        Self {
            symptom,
            severity,
            duration,
            emergency_mentioned: EMERGENCY_SYMPTOM.is_match(text),
        }
    }

    pub fn needs_urgent_care(&self) -> bool {
        self.severity == Some(Severity::Severe) || self.emergency_mentioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severe_chest_pain() {
        let report = SymptomReport::extract("i have severe chest pain");
        assert_eq!(report.symptom, Some("chest pain"));
        assert_eq!(report.severity, Some(Severity::Severe));
        assert!(report.needs_urgent_care());
    }

    #[test]
    fn test_headache_with_duration() {
        let report = SymptomReport::extract("i've had a headache for 3 days");
        assert_eq!(report.symptom, Some("headache"));
        assert_eq!(report.severity, None);
        assert_eq!(report.duration.as_ref().map(|d| d.to_string()), Some("3 days".to_string()));
        assert!(!report.needs_urgent_care());
    }

    #[test]
    fn test_pain_level_bands() {
        let level = |msg: &str| SymptomReport::extract(msg).severity;
        assert_eq!(level("my pain level 8 today"), Some(Severity::Severe));
        assert_eq!(level("pain level 7"), Some(Severity::Severe));
        assert_eq!(level("pain level 5"), Some(Severity::Moderate));
        assert_eq!(level("pain level 4"), Some(Severity::Moderate));
        assert_eq!(level("pain level 2"), Some(Severity::Mild));
        assert_eq!(level("pain level of 9"), Some(Severity::Severe));
    }

    #[test]
    fn test_oversized_pain_level_is_severe() {
        let report = SymptomReport::extract("my pain level 99999999999");
        assert_eq!(report.severity, Some(Severity::Severe));
        assert!(report.needs_urgent_care());
    }

    #[test]
    fn test_oversized_duration_is_dropped() {
        let report = SymptomReport::extract("headache for 99999999999 days");
        assert_eq!(report.symptom, Some("headache"));
        assert_eq!(report.duration, None);
    }

    #[test]
    fn test_adjective_beats_pain_level() {
        let report = SymptomReport::extract("mild pain, pain level 9");
        assert_eq!(report.severity, Some(Severity::Mild));
    }

    #[test]
    fn test_adjective_needs_pain_or_discomfort() {
        assert_eq!(SymptomReport::extract("a severe headache").severity, None);
        assert_eq!(
            SymptomReport::extract("moderate discomfort in my back").severity,
            Some(Severity::Moderate)
        );
        assert_eq!(
            SymptomReport::extract("extreme stomach pain").severity,
            Some(Severity::Extreme)
        );
    }

    #[test]
    fn test_extreme_is_not_urgent_by_itself() {
        let report = SymptomReport::extract("extreme back pain");
        assert!(!report.needs_urgent_care());
    }

    #[test]
    fn test_duration_singular_and_since() {
        let report = SymptomReport::extract("nausea since 1 week");
        assert_eq!(report.duration.map(|d| d.to_string()), Some("1 week".to_string()));

        let report = SymptomReport::extract("dizzy for 2 hour");
        assert_eq!(report.duration.map(|d| d.to_string()), Some("2 hours".to_string()));
    }

    #[test]
    fn test_symptom_priority_order() {
        // headache is listed before chest pain
        let report = SymptomReport::extract("headache and chest pain");
        assert_eq!(report.symptom, Some("headache"));
        assert!(report.emergency_mentioned);
    }

    #[test]
    fn test_difficulty_breathing_is_urgent() {
        let report = SymptomReport::extract("i feel difficulty breathing");
        assert_eq!(report.symptom, None);
        assert!(report.needs_urgent_care());
    }
}

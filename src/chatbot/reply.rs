//! Reply templates.
//!
//! Each `Reply` variant carries the typed values its template needs; the text
//! itself only exists in the `Display` impl.

use chrono::{NaiveDate, NaiveTime};
use std::fmt;

use crate::chatbot::model::{Appointment, Medication};
use crate::chatbot::symptoms::SymptomReport;

pub const NO_MEDICATIONS: &str = "You don't have any active medications on file. \
Would you like to add a medication so I can help you keep track of it?";

pub const EMERGENCY: &str = "⚠️ This sounds like it could be a medical emergency. \
Please call 911 or your local emergency number immediately, or go to the nearest emergency room. \
Do not wait for an online response.";

pub const MENU: &str = "I'm not sure I understand. I can help you with:\n\
• Your current medications\n\
• Reporting symptoms\n\
• Upcoming appointments\n\
• Health advice and tips\n\
\n\
What would you like to know?";

const CHRONIC_TIPS: &str = "Here are some general tips for managing chronic conditions:\n\
• Take your medications exactly as prescribed\n\
• Eat a balanced diet and stay well hydrated\n\
• Stay physically active within your limits\n\
• Keep up with your regular appointments\n\
• Monitor your symptoms and report any changes to your provider";

const WELLNESS_TIPS: &str = "Here are some general wellness tips:\n\
• Aim for 7-9 hours of sleep each night\n\
• Drink plenty of water throughout the day\n\
• Eat a balanced diet rich in fruits and vegetables\n\
• Get at least 30 minutes of exercise most days\n\
• Take time to reduce stress, for example with breathing exercises or a walk\n\
• Schedule regular checkups with your healthcare provider";

const PROVIDER_DISCLAIMER: &str =
    "Please consult your healthcare provider before making any changes to your care plan.";

/// `Jan 15, 2024`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// `2:30 PM`
pub fn format_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// `X`, `X and Y`, `X, Y and Z`.
pub fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} and {}", rest.join(", "), last),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Greeting { chronic_conditions: Vec<String> },
    Medications(Vec<Medication>),
    Symptom(SymptomReport),
    Appointments(Vec<Appointment>),
    Guidelines { disease_name: String, guidelines: String },
    ChronicTips,
    WellnessTips,
    Emergency,
    Menu,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Greeting { chronic_conditions } => {
                f.write_str("Hello! I'm your health assistant.")?;
                if chronic_conditions.is_empty() {
                    f.write_str(" How can I help you today?")
                } else {
                    write!(
                        f,
                        " I see you're managing {}. How are you feeling today? \
                         I can help with your medications, symptoms, appointments or advice for your conditions.",
                        join_names(chronic_conditions)
                    )
                }
            }
            Reply::Medications(meds) if meds.is_empty() => f.write_str(NO_MEDICATIONS),
            Reply::Medications(meds) => {
                writeln!(f, "Here are your active medications:")?;
                for med in meds {
                    write_medication(f, med)?;
                }
                write!(f, "\nWould you like me to set up reminders or tell you more about any of these?")
            }
            Reply::Symptom(report) => write_symptom(f, report),
            Reply::Appointments(appointments) => {
                if !appointments.is_empty() {
                    writeln!(f, "Here are your upcoming appointments:")?;
                    for appt in appointments {
                        writeln!(
                            f,
                            "• **{}** ({}) on {} at {}",
                            appt.provider_name,
                            appt.specialty,
                            format_date(appt.date),
                            format_time(appt.start_time)
                        )?;
                    }
                    f.write_str("\n")?;
                } else {
                    f.write_str("You don't have any upcoming appointments. ")?;
                }
                f.write_str(
                    "To schedule a new appointment or change an existing one, \
                     please use the Appointments section.",
                )
            }
            Reply::Guidelines { disease_name, guidelines } => {
                write!(
                    f,
                    "Here are some management guidelines for {}:\n\n{}\n\n{}",
                    disease_name, guidelines, PROVIDER_DISCLAIMER
                )
            }
            Reply::ChronicTips => write!(f, "{}\n\n{}", CHRONIC_TIPS, PROVIDER_DISCLAIMER),
            Reply::WellnessTips => f.write_str(WELLNESS_TIPS),
            Reply::Emergency => f.write_str(EMERGENCY),
            Reply::Menu => f.write_str(MENU),
        }
    }
}

fn write_medication(f: &mut fmt::Formatter<'_>, med: &Medication) -> fmt::Result {
    write!(f, "• **{}**", med.name)?;
    if let Some(dosage) = &med.dosage {
        write!(f, " ({})", dosage)?;
    }
    if let Some(frequency) = &med.frequency {
        write!(f, ", {}", frequency)?;
    }
    if let Some(start) = med.start_date {
        write!(f, " (since {})", format_date(start))?;
    }
    writeln!(f)
}

fn write_symptom(f: &mut fmt::Formatter<'_>, report: &SymptomReport) -> fmt::Result {
    f.write_str("I'm sorry to hear you're experiencing ")?;
    match (report.severity, report.symptom) {
        (Some(severity), Some(symptom)) => write!(f, "{} {}", severity, symptom)?,
        (None, Some(symptom)) => write!(f, "{}", symptom)?,
        (Some(severity), None) => write!(f, "{} symptoms", severity)?,
        (None, None) => f.write_str("these symptoms")?,
    }
    if let Some(duration) = &report.duration {
        write!(f, " for the past {}", duration)?;
    }
    f.write_str(".")?;

    if report.needs_urgent_care() {
        f.write_str(
            " Based on what you've described, please seek medical attention right away. \
             If your symptoms are severe or getting worse, call 911 or go to the nearest emergency room.",
        )
    } else {
        f.write_str(
            " Could you tell me more, such as when it started and what makes it better or worse? \
             I can also log this symptom so you can share it with your healthcare provider.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_join_names() {
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(join_names(&names(&[])), "");
        assert_eq!(join_names(&names(&["Asthma"])), "Asthma");
        assert_eq!(join_names(&names(&["Asthma", "Diabetes"])), "Asthma and Diabetes");
        assert_eq!(join_names(&names(&["X", "Y", "Z"])), "X, Y and Z");
    }

    #[test]
    fn test_date_and_time_formats() {
        assert_eq!(format_date(date("2024-01-15")), "Jan 15, 2024");
        assert_eq!(format_date(date("2026-11-03")), "Nov 3, 2026");
        assert_eq!(format_time(NaiveTime::from_hms_opt(14, 30, 0).unwrap()), "2:30 PM");
        assert_eq!(format_time(NaiveTime::from_hms_opt(9, 5, 0).unwrap()), "9:05 AM");
        assert_eq!(format_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap()), "12:00 AM");
    }

    #[test]
    fn test_medication_optional_fields_omitted() {
        let meds = vec![Medication {
            name: "Ibuprofen".to_string(),
            dosage: None,
            frequency: Some("as needed".to_string()),
            start_date: None,
            end_date: None,
        }];
        let text = Reply::Medications(meds).to_string();
        assert!(text.contains("• **Ibuprofen**, as needed\n"));
        assert!(!text.contains("since"));
    }

    #[test]
    fn test_symptom_fallback_phrasing() {
        let report = SymptomReport {
            symptom: None,
            severity: None,
            duration: None,
            emergency_mentioned: false,
        };
        let text = Reply::Symptom(report).to_string();
        assert!(text.starts_with("I'm sorry to hear you're experiencing these symptoms."));
        assert!(text.contains("log this symptom"));
    }
}

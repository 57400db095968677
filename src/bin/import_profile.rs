//! Import a patient profile and disease knowledge into the carebot database.
//!
//! Usage: cargo run --bin import_profile <profile.json> <carebot.db>
//!
//! Profile format:
//! ```json
//! {
//!   "user_id": 1,
//!   "conditions": [{"name": "Type 2 Diabetes", "type": "chronic"}],
//!   "medications": [{"name": "Metformin", "dosage": "500mg", "frequency": "twice daily", "start_date": "2024-01-15"}],
//!   "appointments": [{"date": "2026-11-02", "start_time": "14:30:00", "provider_name": "Dr. Lee", "specialty": "Endocrinology"}],
//!   "diseases": [{"disease_name": "Type 2 Diabetes", "management_guidelines": "..."}]
//! }
//! ```
//! Every section is optional; `user_id` is only needed for patient records.

use serde::Deserialize;
use std::path::Path;

use carebot::chatbot::Database;
use carebot::chatbot::model::{Appointment, DiseaseKnowledge, HealthCondition, Medication, UserId};

#[derive(Deserialize)]
struct Profile {
    user_id: Option<i64>,
    #[serde(default)]
    conditions: Vec<HealthCondition>,
    #[serde(default)]
    medications: Vec<Medication>,
    #[serde(default)]
    appointments: Vec<Appointment>,
    #[serde(default)]
    diseases: Vec<DiseaseKnowledge>,
}

fn import(profile: &Profile, db: &Database) -> Result<(), String> {
    let has_records = !profile.conditions.is_empty()
        || !profile.medications.is_empty()
        || !profile.appointments.is_empty();

    if has_records {
        let user = profile
            .user_id
            .map(UserId)
            .ok_or("user_id is required when importing conditions, medications or appointments")?;

        for condition in &profile.conditions {
            db.add_condition(user, condition).map_err(|e| e.to_string())?;
        }
        for med in &profile.medications {
            db.add_medication(user, med).map_err(|e| e.to_string())?;
        }
        for appt in &profile.appointments {
            db.add_appointment(user, appt).map_err(|e| e.to_string())?;
        }
    }

    for disease in &profile.diseases {
        db.upsert_disease(disease).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <profile.json> <carebot.db>", args[0]);
        eprintln!();
        eprintln!("Import health records and disease guidelines into the carebot database.");
        std::process::exit(1);
    }

    let json = match std::fs::read_to_string(&args[1]) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to read {}: {}", args[1], e);
            std::process::exit(1);
        }
    };
    let profile: Profile = match serde_json::from_str(&json) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to parse {}: {}", args[1], e);
            std::process::exit(1);
        }
    };

    let db = match Database::open(Path::new(&args[2])) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = import(&profile, &db) {
        eprintln!("Import failed: {}", e);
        std::process::exit(1);
    }

    println!(
        "Imported {} condition(s), {} medication(s), {} appointment(s), {} disease(s)",
        profile.conditions.len(),
        profile.medications.len(),
        profile.appointments.len(),
        profile.diseases.len()
    );
}

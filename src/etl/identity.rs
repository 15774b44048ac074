use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use rusqlite::{params, Connection};

use super::EtlError;
use crate::config;
use crate::db::repository;
use crate::models::enums::Gender;
use crate::models::{Patient, StudyRecord};

/// Resolve every distinct external patient id in the batch to an operational
/// patient id, creating missing patients in bulk.
///
/// Existing patients are matched by their correlation token; new ids are
/// synthesized from the current maximum numeric suffix with a sequential
/// in-batch counter, so ids assigned earlier in the same batch are accounted
/// for without re-querying. Returns the merged mapping and the number of
/// patients created.
pub fn resolve_patients(
    conn: &Connection,
    records: &[StudyRecord],
    today: NaiveDate,
) -> Result<(HashMap<String, String>, usize), EtlError> {
    // Dedupe by external id, first occurrence wins.
    let mut unique: Vec<&StudyRecord> = Vec::new();
    let mut seen = HashSet::new();
    for record in records {
        if seen.insert(record.patient_id.as_str()) {
            unique.push(record);
        }
    }

    if unique.is_empty() {
        return Ok((HashMap::new(), 0));
    }

    let emails: Vec<String> = unique.iter().map(|r| r.correlation_email()).collect();
    let existing = repository::find_patients_by_email(conn, &emails)?;

    let mut next_suffix = repository::max_patient_suffix(conn, config::PATIENT_ID_PREFIX)?
        .unwrap_or(config::PATIENT_ID_FLOOR);

    let mut map = HashMap::new();
    let mut created = 0;

    let mut insert = conn.prepare(
        "INSERT INTO patients (patient_id, date_of_birth, gender, contact_email,
                               address_city, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for record in unique {
        let email = record.correlation_email();

        if let Some(patient_id) = existing.get(&email) {
            map.insert(record.patient_id.clone(), patient_id.clone());
            continue;
        }

        next_suffix += 1;
        let patient = Patient {
            patient_id: format!("{}{:07}", config::PATIENT_ID_PREFIX, next_suffix),
            date_of_birth: today - Duration::days(record.patient_age * 365),
            gender: match record.patient_gender.as_str() {
                "M" => Gender::Male,
                "F" => Gender::Female,
                _ => Gender::Other,
            },
            contact_email: Some(email),
            address_city: None,
            is_active: true,
        };

        insert.execute(params![
            patient.patient_id,
            patient.date_of_birth,
            patient.gender.as_str(),
            patient.contact_email,
            patient.address_city,
            patient.is_active,
        ])?;
        map.insert(record.patient_id.clone(), patient.patient_id);
        created += 1;
    }

    Ok((map, created))
}

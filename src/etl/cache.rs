use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;

use super::EtlError;
use crate::db::repository;

/// Reference data loaded once per engine run: the diagnosis catalog mapping
/// and the hospital roster. Read-only after construction; both sets are
/// small and consulted once per record.
pub struct ReferenceCache {
    diagnosis_ids: HashMap<String, String>,
    hospital_ids: Vec<String>,
}

impl ReferenceCache {
    pub fn load(conn: &Connection) -> Result<Self, EtlError> {
        let diagnosis_ids = repository::load_diagnosis_codes(conn)?;
        let hospital_ids = repository::load_hospital_facility_ids(conn)?;

        if diagnosis_ids.is_empty() {
            tracing::warn!("Diagnosis catalog is empty; no diagnosis assignments will be produced");
        }
        if hospital_ids.is_empty() {
            tracing::warn!("No hospital facilities found; no encounters will be produced");
        }

        tracing::info!(
            diagnoses = diagnosis_ids.len(),
            hospitals = hospital_ids.len(),
            "Reference cache loaded"
        );

        Ok(Self { diagnosis_ids, hospital_ids })
    }

    /// Operational diagnosis_id for an ICD-10 code, if cataloged.
    pub fn diagnosis_id(&self, code: &str) -> Option<&str> {
        self.diagnosis_ids.get(code).map(String::as_str)
    }

    pub fn diagnosis_count(&self) -> usize {
        self.diagnosis_ids.len()
    }

    pub fn hospital_count(&self) -> usize {
        self.hospital_ids.len()
    }

    /// Pseudo-random eligible facility, `None` when the roster is empty.
    pub fn random_hospital<R: Rng>(&self, rng: &mut R) -> Option<&str> {
        self.hospital_ids.choose(rng).map(String::as_str)
    }
}

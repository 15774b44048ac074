use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::{EncounterType, Gender, Modality, ReportStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub contact_email: Option<String>,
    pub address_city: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub encounter_id: String,
    pub patient_id: String,
    pub facility_id: String,
    pub encounter_date: NaiveDate,
    pub encounter_datetime: NaiveDateTime,
    pub encounter_type: EncounterType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingProcedure {
    pub encounter_id: String,
    pub procedure_code: String,
    pub procedure_name: String,
    pub body_part: Option<String>,
    pub view_position: Option<String>,
    pub modality: Modality,
    pub procedure_datetime: Option<NaiveDateTime>,
}

/// Catalog entry, natural-keyed (`DIAG…`), loaded once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    pub diagnosis_id: String,
    pub diagnosis_code: String,
    pub diagnosis_name: String,
    pub diagnosis_category: Option<String>,
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisAssignment {
    pub encounter_id: String,
    pub diagnosis_id: String,
    pub diagnosis_rank: i64,
    pub is_primary: bool,
    pub diagnosis_datetime: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub encounter_id: String,
    pub report_type: String,
    pub report_status: ReportStatus,
    pub report_text: String,
    pub findings: Option<String>,
    pub impression: Option<String>,
    pub recommendations: Option<String>,
    pub dictated_datetime: Option<NaiveDateTime>,
    pub signed_datetime: Option<NaiveDateTime>,
}

use serde::{Deserialize, Serialize};

use crate::config;

/// One row of the source feed: a single imaging study plus the report
/// fields synthesized upstream (consumed verbatim, never re-generated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRecord {
    pub patient_id: String,
    pub patient_age: i64,
    pub patient_gender: String,
    pub study_id: String,
    pub view_position: String,
    /// Pipe-delimited finding labels, e.g. "Effusion|Cardiomegaly".
    pub finding_labels: String,
    pub report_text: String,
    #[serde(default)]
    pub findings: Option<String>,
    #[serde(default)]
    pub impression: Option<String>,
    #[serde(default)]
    pub recommendations: Option<String>,
    pub report_type: String,
    pub report_status: String,
}

impl StudyRecord {
    /// Study identifier with any file extension dropped.
    pub fn study_stem(&self) -> &str {
        self.study_id.split('.').next().unwrap_or(&self.study_id)
    }

    /// Natural key of the study's procedure row; also the external-origin
    /// marker the incremental filter matches on.
    pub fn procedure_code(&self) -> String {
        format!("{}{}", config::EXTERNAL_CODE_PREFIX, self.study_stem())
    }

    /// Natural key of the study's encounter row.
    pub fn encounter_id(&self) -> String {
        format!("{}{}_ENC", config::EXTERNAL_CODE_PREFIX, self.study_stem())
    }

    /// Correlation token stored in patients.contact_email.
    pub fn correlation_email(&self) -> String {
        config::correlation_email(&self.patient_id)
    }

    pub fn finding_list(&self) -> Vec<&str> {
        self.finding_labels
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

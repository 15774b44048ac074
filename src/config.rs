use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "radmart";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix marking rows that originated from the external feed. The
/// incremental filter matches procedure codes against it.
pub const EXTERNAL_CODE_PREFIX: &str = "EXT_";

/// Prefix of operational patient identifiers (`PAT` + 7 digits).
pub const PATIENT_ID_PREFIX: &str = "PAT";

/// Numeric floor for synthesized patient ids; the first feed-originated
/// patient in an empty store becomes PAT0005001, above the reserved range.
pub const PATIENT_ID_FLOOR: i64 = 5000;

/// At most this many ranked diagnoses are assigned per encounter.
pub const MAX_DIAGNOSES_PER_ENCOUNTER: usize = 3;

/// Records per load transaction.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Synthesized encounter datetimes fall within this many trailing days.
pub const ENCOUNTER_WINDOW_DAYS: i64 = 730;

/// Engine configuration, passed explicitly into each component.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_path: PathBuf,
    pub batch_size: usize,
}

impl EngineConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Correlation token stored in patients.contact_email for feed-originated
/// patients; the identity resolver looks patients up by it.
pub fn correlation_email(external_id: &str) -> String {
    format!("source_patient_{external_id}@external.com")
}

/// Map a source finding label to its (ICD-10 code, display name).
/// Labels outside this table produce no diagnosis assignment.
pub fn finding_to_icd10(label: &str) -> Option<(&'static str, &'static str)> {
    let mapped = match label {
        "Atelectasis" => ("J98.11", "Atelectasis"),
        "Cardiomegaly" => ("I51.7", "Cardiomegaly"),
        "Effusion" => ("J94.8", "Pleural Effusion"),
        "Infiltration" => ("J98.4", "Other Disorders of Lung"),
        "Mass" => ("D49.2", "Neoplasm of Uncertain Behavior"),
        "Nodule" => ("R91.8", "Abnormal Lung Finding"),
        "Pneumonia" => ("J18.9", "Pneumonia"),
        "Pneumothorax" => ("J93.0", "Spontaneous Tension Pneumothorax"),
        "Consolidation" => ("J18.1", "Lobar Pneumonia"),
        "Edema" => ("J81.0", "Acute Pulmonary Edema"),
        "Emphysema" => ("J43.9", "Emphysema"),
        "Fibrosis" => ("J84.9", "Interstitial Lung Disease"),
        "Pleural_Thickening" => ("J94.8", "Pleural Effusion"),
        "Hernia" => ("K44.9", "Diaphragmatic Hernia"),
        // Default for normal studies
        "No Finding" => ("R91.8", "Abnormal Lung Finding"),
        _ => return None,
    };
    Some(mapped)
}

/// Map a feed view position to a modality allowed by the procedures CHECK
/// constraint. Unknown positions default to X-Ray.
pub fn modality_for_view(view_position: &str) -> &'static str {
    match view_position {
        "DX" | "CR" | "PA" | "AP" => "X-Ray",
        "CT" => "CT",
        "MR" => "MRI",
        "US" => "Ultrasound",
        _ => "X-Ray",
    }
}

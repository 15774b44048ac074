use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Fail,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Error => "ERROR",
        }
    }
}

/// Outcome of one predicate: id, description, status and, on FAIL, the
/// offending rows, bounded by the query itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaCheck {
    pub id: u32,
    pub description: String,
    pub status: CheckStatus,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub error: Option<String>,
}

/// Inert result data: reported, never fed back into the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaReport {
    pub checks: Vec<QaCheck>,
}

impl QaReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.status == CheckStatus::Pass)
    }

    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| c.status != CheckStatus::Pass).count()
    }

    /// Reviewer-friendly markdown summary, one section per predicate.
    pub fn to_markdown(&self) -> String {
        let mut md = String::from("# Warehouse QA Results\n\n");
        for check in &self.checks {
            md.push_str(&format!(
                "## {}. {} — {}\n\n",
                check.id,
                check.description,
                check.status.as_str()
            ));
            match check.status {
                CheckStatus::Pass => md.push_str("_No rows returned — OK_\n\n"),
                CheckStatus::Error => {
                    let message = check.error.as_deref().unwrap_or("unknown error");
                    md.push_str(&format!("Query failed: {message}\n\n"));
                }
                CheckStatus::Fail => {
                    md.push_str(&format!("| {} |\n", check.columns.join(" | ")));
                    md.push_str(&format!(
                        "|{}|\n",
                        check
                            .columns
                            .iter()
                            .map(|c| format!(":{}", "-".repeat(c.len().max(3))))
                            .collect::<Vec<_>>()
                            .join("|")
                    ));
                    for row in &check.rows {
                        md.push_str(&format!("| {} |\n", row.join(" | ")));
                    }
                    md.push('\n');
                }
            }
        }
        md
    }
}

/// The fixed predicate battery. Each query returns zero rows when its
/// invariant holds.
const CHECKS: &[(u32, &str, &str)] = &[
    (
        1,
        "Duplicate patient ids in dim_patient",
        "SELECT patient_id, COUNT(*) AS occurrences FROM dim_patient
         GROUP BY patient_id HAVING COUNT(*) > 1",
    ),
    (
        2,
        "Missing patient demographics in dim_patient",
        "SELECT patient_id, age_group, sex FROM dim_patient
         WHERE age_group IS NULL OR sex IS NULL",
    ),
    (
        3,
        "Fact rows whose patient key does not resolve",
        "SELECT f.encounter_id FROM fact_encounters f
         LEFT JOIN dim_patient dp ON f.patient_key = dp.patient_key
         WHERE dp.patient_key IS NULL",
    ),
    (
        4,
        "Duplicate encounter ids in fact_encounters",
        "SELECT encounter_id, COUNT(*) AS occurrences FROM fact_encounters
         GROUP BY encounter_id HAVING COUNT(*) > 1",
    ),
    (
        5,
        "Fact rows with a null time key",
        "SELECT encounter_id FROM fact_encounters WHERE date_id IS NULL",
    ),
    (
        6,
        "Fact rows whose time key does not resolve",
        "SELECT f.encounter_id, f.date_id FROM fact_encounters f
         LEFT JOIN dim_time t ON f.date_id = t.date_id
         WHERE f.date_id IS NOT NULL AND t.date_id IS NULL",
    ),
    (
        7,
        "Bridge procedure rows whose procedure key does not resolve",
        "SELECT bp.encounter_key, bp.procedure_key FROM bridge_encounter_procedures bp
         LEFT JOIN dim_procedure dp ON bp.procedure_key = dp.procedure_key
         WHERE dp.procedure_key IS NULL",
    ),
    (
        8,
        "Bridge procedure rows whose fact key does not resolve",
        "SELECT bp.encounter_key, bp.procedure_key FROM bridge_encounter_procedures bp
         LEFT JOIN fact_encounters f ON bp.encounter_key = f.encounter_key
         WHERE f.encounter_key IS NULL",
    ),
    (
        9,
        "Bridge diagnosis rows whose diagnosis key does not resolve",
        "SELECT bd.encounter_key, bd.diagnosis_key FROM bridge_encounter_diagnoses bd
         LEFT JOIN dim_diagnosis dd ON bd.diagnosis_key = dd.diagnosis_key
         WHERE dd.diagnosis_key IS NULL",
    ),
    (
        10,
        "Duplicate procedure ids in dim_procedure",
        "SELECT procedure_id, COUNT(*) AS occurrences FROM dim_procedure
         GROUP BY procedure_id HAVING COUNT(*) > 1",
    ),
    (
        11,
        "Duplicate diagnosis ids in dim_diagnosis",
        "SELECT diagnosis_id, COUNT(*) AS occurrences FROM dim_diagnosis
         GROUP BY diagnosis_id HAVING COUNT(*) > 1",
    ),
    (
        12,
        "Duplicate procedure codes in dim_procedure",
        "SELECT procedure_code, COUNT(*) AS occurrences FROM dim_procedure
         GROUP BY procedure_code HAVING COUNT(*) > 1",
    ),
];

/// Run the whole battery. A predicate that itself errors is reported as
/// ERROR and the remaining predicates still run; each predicate executes in
/// its own statement, so one bad query cannot poison the rest.
pub fn run_checks(conn: &Connection) -> QaReport {
    let mut checks = Vec::with_capacity(CHECKS.len());

    for &(id, description, sql) in CHECKS {
        let check = match run_check(conn, id, description, sql) {
            Ok(check) => check,
            Err(e) => {
                tracing::warn!(check = id, error = %e, "QA predicate errored");
                QaCheck {
                    id,
                    description: description.to_string(),
                    status: CheckStatus::Error,
                    columns: Vec::new(),
                    rows: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        tracing::info!(check = id, status = check.status.as_str(), description);
        checks.push(check);
    }

    QaReport { checks }
}

fn run_check(
    conn: &Connection,
    id: u32,
    description: &str,
    sql: &str,
) -> Result<QaCheck, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = Vec::new();
    let mut result = stmt.query([])?;
    while let Some(row) = result.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(render_value(row.get_ref(index)?));
        }
        rows.push(values);
    }

    let status = if rows.is_empty() { CheckStatus::Pass } else { CheckStatus::Fail };
    Ok(QaCheck {
        id,
        description: description.to_string(),
        status,
        columns,
        rows,
        error: None,
    })
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(_) => "<blob>".to_string(),
    }
}

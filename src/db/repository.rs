use std::collections::{HashMap, HashSet};

use rusqlite::{params, params_from_iter, Connection};

use super::DatabaseError;
use crate::models::DiagnosisEntry;

/// SQLite caps bound parameters per statement; membership queries chunk
/// their IN lists well below it.
const IN_CHUNK_SIZE: usize = 500;

// ═══════════════════════════════════════════
// Reference data
// ═══════════════════════════════════════════

/// Complete diagnosis_code → diagnosis_id mapping.
pub fn load_diagnosis_codes(conn: &Connection) -> Result<HashMap<String, String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT diagnosis_code, diagnosis_id FROM diagnoses")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let (code, id) = row?;
        map.insert(code, id);
    }
    Ok(map)
}

/// Full diagnosis catalog, for the diagnosis dimension.
pub fn load_diagnosis_catalog(conn: &Connection) -> Result<Vec<DiagnosisEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT diagnosis_id, diagnosis_code, diagnosis_name, diagnosis_category, severity
         FROM diagnoses ORDER BY diagnosis_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DiagnosisEntry {
            diagnosis_id: row.get(0)?,
            diagnosis_code: row.get(1)?,
            diagnosis_name: row.get(2)?,
            diagnosis_category: row.get(3)?,
            severity: row.get(4)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Facility ids of every hospital-type facility.
pub fn load_hospital_facility_ids(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT facility_id FROM facilities WHERE facility_type = 'Hospital' ORDER BY facility_id",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

// ═══════════════════════════════════════════
// Incremental-load lookups
// ═══════════════════════════════════════════

/// Natural keys of every feed-originated procedure already loaded,
/// identified by the external-origin prefix on procedure_code.
pub fn existing_external_codes(
    conn: &Connection,
    prefix: &str,
) -> Result<HashSet<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT procedure_code FROM procedures WHERE procedure_code LIKE ?1 || '%'",
    )?;
    let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;

    let mut codes = HashSet::new();
    for row in rows {
        codes.insert(row?);
    }
    Ok(codes)
}

/// contact_email → patient_id for every given correlation token that
/// already exists, queried in chunks.
pub fn find_patients_by_email(
    conn: &Connection,
    emails: &[String],
) -> Result<HashMap<String, String>, DatabaseError> {
    let mut found = HashMap::new();

    for chunk in emails.chunks(IN_CHUNK_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT contact_email, patient_id FROM patients WHERE contact_email IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (email, id) = row?;
            found.insert(email, id);
        }
    }

    Ok(found)
}

/// Highest numeric suffix among patient ids under the given prefix.
/// Relies on the fixed-width zero-padded id convention, which makes the
/// lexicographic MAX the numeric max.
pub fn max_patient_suffix(conn: &Connection, prefix: &str) -> Result<Option<i64>, DatabaseError> {
    let max_id: Option<String> = conn.query_row(
        "SELECT MAX(patient_id) FROM patients WHERE patient_id LIKE ?1 || '%'",
        params![prefix],
        |row| row.get(0),
    )?;

    Ok(max_id
        .and_then(|id| id.strip_prefix(prefix).map(str::to_owned))
        .and_then(|suffix| suffix.parse().ok()))
}

// ═══════════════════════════════════════════
// Counters
// ═══════════════════════════════════════════

/// Row count of one of the engine's fixed tables.
pub fn table_row_count(conn: &Connection, table: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn setup_db() -> Connection {
        open_memory_database().expect("Failed to open test DB")
    }

    fn insert_diagnosis(conn: &Connection, id: &str, code: &str) {
        conn.execute(
            "INSERT INTO diagnoses (diagnosis_id, diagnosis_code, diagnosis_name)
             VALUES (?1, ?2, 'Test')",
            params![id, code],
        )
        .unwrap();
    }

    fn insert_facility(conn: &Connection, id: &str, kind: &str) {
        conn.execute(
            "INSERT INTO facilities (facility_id, facility_name, facility_type)
             VALUES (?1, 'F', ?2)",
            params![id, kind],
        )
        .unwrap();
    }

    fn insert_patient(conn: &Connection, id: &str, email: Option<&str>) {
        conn.execute(
            "INSERT INTO patients (patient_id, date_of_birth, gender, contact_email)
             VALUES (?1, '1980-06-01', 'F', ?2)",
            params![id, email],
        )
        .unwrap();
    }

    #[test]
    fn diagnosis_codes_map() {
        let conn = setup_db();
        insert_diagnosis(&conn, "DIAG0001", "J18.9");
        insert_diagnosis(&conn, "DIAG0002", "I51.7");

        let map = load_diagnosis_codes(&conn).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("J18.9").unwrap(), "DIAG0001");
    }

    #[test]
    fn hospital_roster_excludes_clinics() {
        let conn = setup_db();
        insert_facility(&conn, "FAC001", "Hospital");
        insert_facility(&conn, "FAC002", "Clinic");
        insert_facility(&conn, "FAC003", "Hospital");

        let ids = load_hospital_facility_ids(&conn).unwrap();
        assert_eq!(ids, vec!["FAC001".to_string(), "FAC003".to_string()]);
    }

    #[test]
    fn external_codes_prefix_scan() {
        let conn = setup_db();
        insert_facility(&conn, "FAC001", "Hospital");
        insert_patient(&conn, "PAT0000001", None);
        conn.execute_batch(
            "INSERT INTO encounters (encounter_id, patient_id, facility_id,
                                     encounter_date, encounter_datetime, encounter_type)
             VALUES ('EXT_1_ENC', 'PAT0000001', 'FAC001',
                     '2024-01-01', '2024-01-01 08:00:00', 'Outpatient');
             INSERT INTO procedures (encounter_id, procedure_code, procedure_name, modality)
             VALUES ('EXT_1_ENC', 'EXT_1', 'X-Ray Chest', 'X-Ray');
             INSERT INTO procedures (encounter_id, procedure_code, procedure_name, modality)
             VALUES ('EXT_1_ENC', 'CPT71045', 'X-Ray Chest', 'X-Ray');",
        )
        .unwrap();

        let codes = existing_external_codes(&conn, "EXT_").unwrap();
        assert_eq!(codes.len(), 1);
        assert!(codes.contains("EXT_1"));
    }

    #[test]
    fn email_lookup_finds_only_existing() {
        let conn = setup_db();
        insert_patient(&conn, "PAT0005001", Some("source_patient_7@external.com"));

        let emails = vec![
            "source_patient_7@external.com".to_string(),
            "source_patient_8@external.com".to_string(),
        ];
        let found = find_patients_by_email(&conn, &emails).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["source_patient_7@external.com"], "PAT0005001");
    }

    #[test]
    fn email_lookup_chunks_large_input() {
        let conn = setup_db();
        insert_patient(&conn, "PAT0005001", Some("source_patient_42@external.com"));

        // More tokens than one IN chunk holds.
        let mut emails: Vec<String> =
            (0..1200).map(|i| format!("source_patient_m{i}@external.com")).collect();
        emails.push("source_patient_42@external.com".to_string());

        let found = find_patients_by_email(&conn, &emails).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn max_suffix_empty_store() {
        let conn = setup_db();
        assert_eq!(max_patient_suffix(&conn, "PAT").unwrap(), None);
    }

    #[test]
    fn max_suffix_reads_highest() {
        let conn = setup_db();
        insert_patient(&conn, "PAT0000009", None);
        insert_patient(&conn, "PAT0005002", None);
        assert_eq!(max_patient_suffix(&conn, "PAT").unwrap(), Some(5002));
    }
}

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::TransformError;
use crate::db::repository;
use crate::models::enums::{AgeGroup, DiagnosisType};
use crate::models::natural_key_digits;

/// Row counts per warehouse table after a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransformStats {
    pub dim_time_rows: i64,
    pub dim_patient_rows: i64,
    pub dim_procedure_rows: i64,
    pub dim_diagnosis_rows: i64,
    pub fact_rows: i64,
    pub bridge_procedure_rows: i64,
    pub bridge_diagnosis_rows: i64,
}

/// Deterministically rebuild the warehouse from the operational store.
///
/// Not incremental: every run clears the warehouse tables in dependency
/// order and repopulates from scratch, each stage in its own committed
/// transaction, stages strictly ordered because later ones join against
/// earlier ones. Inserts stay conflict-safe on their derived keys even
/// though the preceding clear already guarantees a clean slate, so a rerun
/// after a mid-sequence failure converges instead of erroring.
pub fn rebuild(conn: &mut Connection) -> Result<TransformStats, TransformError> {
    let mut stats = TransformStats::default();

    tracing::info!("Clearing warehouse tables");
    let tx = conn.transaction()?;
    clear_warehouse(&tx)?;
    tx.commit()?;

    let tx = conn.transaction()?;
    stats.dim_time_rows = populate_dim_time(&tx)?;
    tx.commit()?;

    let tx = conn.transaction()?;
    stats.dim_patient_rows = populate_dim_patient(&tx)?;
    tx.commit()?;

    let tx = conn.transaction()?;
    stats.dim_procedure_rows = populate_dim_procedure(&tx)?;
    tx.commit()?;

    let tx = conn.transaction()?;
    stats.dim_diagnosis_rows = populate_dim_diagnosis(&tx)?;
    tx.commit()?;

    let tx = conn.transaction()?;
    stats.fact_rows = populate_fact_encounters(&tx)?;
    tx.commit()?;

    let tx = conn.transaction()?;
    stats.bridge_procedure_rows = populate_bridge_procedures(&tx)?;
    tx.commit()?;

    let tx = conn.transaction()?;
    stats.bridge_diagnosis_rows = populate_bridge_diagnoses(&tx)?;
    tx.commit()?;

    tracing::info!(
        dim_time = stats.dim_time_rows,
        dim_patient = stats.dim_patient_rows,
        dim_procedure = stats.dim_procedure_rows,
        dim_diagnosis = stats.dim_diagnosis_rows,
        fact = stats.fact_rows,
        bridge_procedures = stats.bridge_procedure_rows,
        bridge_diagnoses = stats.bridge_diagnosis_rows,
        "Warehouse rebuilt"
    );

    Ok(stats)
}

/// Clear in FK dependency order: bridges → fact → dimensions.
fn clear_warehouse(tx: &Connection) -> Result<(), TransformError> {
    for table in [
        "bridge_encounter_diagnoses",
        "bridge_encounter_procedures",
        "fact_encounters",
        "dim_diagnosis",
        "dim_procedure",
        "dim_patient",
        "dim_time",
    ] {
        tx.execute(&format!("DELETE FROM {table}"), [])?;
    }
    Ok(())
}

/// One row per calendar day from the minimum to the maximum observed
/// encounter date inclusive. Every date in range appears even if no
/// encounter fell on it.
fn populate_dim_time(tx: &Connection) -> Result<i64, TransformError> {
    let range: (Option<NaiveDate>, Option<NaiveDate>) = tx.query_row(
        "SELECT MIN(encounter_date), MAX(encounter_date) FROM encounters",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let (Some(min_date), Some(max_date)) = range else {
        tracing::warn!("No encounter dates found; time dimension left empty");
        return Ok(0);
    };

    let mut stmt = tx.prepare(
        "INSERT INTO dim_time (date_id, full_date, year, quarter, month, month_name,
                               week, day_of_month, day_of_week, day_name, is_weekend,
                               is_holiday, fiscal_year, fiscal_quarter)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?13)
         ON CONFLICT (date_id) DO NOTHING",
    )?;

    let mut day = min_date;
    while day <= max_date {
        let quarter = (day.month0() / 3 + 1) as i64;
        let day_of_week = day.weekday().number_from_monday() as i64;
        stmt.execute(params![
            date_id(day),
            day,
            day.year(),
            quarter,
            day.month(),
            day.format("%B").to_string(),
            day.iso_week().week(),
            day.day(),
            day_of_week,
            day.format("%A").to_string(),
            day_of_week >= 6,
            day.year(),
            quarter,
        ])?;
        day = day + Duration::days(1);
    }

    Ok(repository::table_row_count(tx, "dim_time")?)
}

/// One row per operational patient. Age is computed as of the patient's
/// earliest encounter date, not today; patients without encounters carry a
/// NULL age and land in the Elderly bucket.
fn populate_dim_patient(tx: &Connection) -> Result<i64, TransformError> {
    let mut select = tx.prepare(
        "SELECT p.patient_id, p.date_of_birth, p.gender, p.address_city,
                MIN(e.encounter_date)
         FROM patients p
         LEFT JOIN encounters e ON e.patient_id = p.patient_id
         GROUP BY p.patient_id, p.date_of_birth, p.gender, p.address_city",
    )?;

    let rows = select.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, NaiveDate>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<NaiveDate>>(4)?,
        ))
    })?;

    let mut insert = tx.prepare(
        "INSERT INTO dim_patient (patient_id, age, sex, age_group, location)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (patient_id) DO NOTHING",
    )?;

    for row in rows {
        let (patient_id, date_of_birth, gender, city, first_encounter) = row?;
        let Some(key) = natural_key_digits(&patient_id) else {
            tracing::warn!(patient_id = %patient_id, "Patient id carries no digits; excluded from dimension");
            continue;
        };

        let age = first_encounter
            .and_then(|d| d.years_since(date_of_birth))
            .map(i64::from);

        insert.execute(params![
            key,
            age,
            gender,
            AgeGroup::from_age(age).as_str(),
            city.as_deref().unwrap_or("Unknown"),
        ])?;
    }

    Ok(repository::table_row_count(tx, "dim_patient")?)
}

/// One row per operational procedure, keyed by the row's own integer id
/// since procedure codes are not globally unique across encounters.
fn populate_dim_procedure(tx: &Connection) -> Result<i64, TransformError> {
    tx.execute(
        "INSERT INTO dim_procedure (procedure_id, procedure_code, procedure_name,
                                    modality, projection, body_part)
         SELECT DISTINCT procedure_id, procedure_code, procedure_name,
                         modality, view_position, body_part
         FROM procedures
         WHERE procedure_id IS NOT NULL
         ON CONFLICT (procedure_id) DO NOTHING",
        [],
    )?;

    Ok(repository::table_row_count(tx, "dim_procedure")?)
}

/// One row per catalog diagnosis entry.
fn populate_dim_diagnosis(tx: &Connection) -> Result<i64, TransformError> {
    let catalog = repository::load_diagnosis_catalog(tx)?;

    let mut insert = tx.prepare(
        "INSERT INTO dim_diagnosis (diagnosis_id, diagnosis_code, diagnosis_name,
                                    category, severity)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (diagnosis_id) DO NOTHING",
    )?;

    for entry in catalog {
        let Some(key) = natural_key_digits(&entry.diagnosis_id) else {
            tracing::warn!(
                diagnosis_id = %entry.diagnosis_id,
                "Diagnosis id carries no digits; excluded from dimension"
            );
            continue;
        };
        insert.execute(params![
            key,
            entry.diagnosis_code,
            entry.diagnosis_name,
            entry.diagnosis_category,
            entry.severity,
        ])?;
    }

    Ok(repository::table_row_count(tx, "dim_diagnosis")?)
}

/// One fact row per operational encounter. The patient dimension join is
/// required: an encounter whose patient has no dimension row is excluded,
/// not null-padded. Counts come from independent COUNT(DISTINCT …)
/// subqueries so the joins cannot fan out into double-counting.
fn populate_fact_encounters(tx: &Connection) -> Result<i64, TransformError> {
    let patient_keys = dimension_key_map(tx, "SELECT patient_id, patient_key FROM dim_patient")?;
    let known_dates: HashSet<i64> = {
        let mut stmt = tx.prepare("SELECT date_id FROM dim_time")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut set = HashSet::new();
        for row in rows {
            set.insert(row?);
        }
        set
    };

    let mut select = tx.prepare(
        "SELECT e.encounter_id, e.patient_id, e.facility_id, e.encounter_date,
                e.encounter_type,
                (SELECT COUNT(DISTINCT p.procedure_id)
                 FROM procedures p WHERE p.encounter_id = e.encounter_id),
                (SELECT COUNT(DISTINCT ed.diagnosis_id)
                 FROM encounter_diagnoses ed WHERE ed.encounter_id = e.encounter_id),
                (SELECT COUNT(DISTINCT r.report_id)
                 FROM reports r WHERE r.encounter_id = e.encounter_id)
         FROM encounters e",
    )?;

    let rows = select.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, NaiveDate>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, i64>(6)?,
            row.get::<_, i64>(7)?,
        ))
    })?;

    let mut insert = tx.prepare(
        "INSERT INTO fact_encounters (encounter_id, patient_key, date_id, facility_id,
                                      encounter_type, procedure_count, diagnosis_count,
                                      report_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (encounter_id) DO NOTHING",
    )?;

    let mut excluded = 0usize;
    for row in rows {
        let (encounter_id, patient_id, facility_id, date, encounter_type, procedures, diagnoses, reports) =
            row?;

        let Some(encounter_key) = natural_key_digits(&encounter_id) else {
            excluded += 1;
            continue;
        };
        let patient_key = natural_key_digits(&patient_id).and_then(|k| patient_keys.get(&k));
        let Some(patient_key) = patient_key else {
            excluded += 1;
            continue;
        };

        let day_key = date_id(date);
        let day_key = known_dates.contains(&day_key).then_some(day_key);

        insert.execute(params![
            encounter_key,
            patient_key,
            day_key,
            natural_key_digits(&facility_id),
            encounter_type,
            procedures,
            diagnoses,
            reports,
        ])?;
    }

    if excluded > 0 {
        tracing::warn!(excluded, "Encounters without a resolvable patient dimension row excluded");
    }

    Ok(repository::table_row_count(tx, "fact_encounters")?)
}

/// Resolve every (encounter, procedure) pair into surrogate-key pairs.
fn populate_bridge_procedures(tx: &Connection) -> Result<i64, TransformError> {
    let encounter_keys = dimension_key_map(tx, "SELECT encounter_id, encounter_key FROM fact_encounters")?;
    let procedure_keys = dimension_key_map(tx, "SELECT procedure_id, procedure_key FROM dim_procedure")?;

    let mut select = tx.prepare(
        "SELECT p.encounter_id, p.procedure_id FROM procedures p",
    )?;
    let rows = select.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut insert = tx.prepare(
        "INSERT INTO bridge_encounter_procedures (encounter_key, procedure_key)
         VALUES (?1, ?2)
         ON CONFLICT (encounter_key, procedure_key) DO NOTHING",
    )?;

    for row in rows {
        let (encounter_id, procedure_id) = row?;
        let encounter_key =
            natural_key_digits(&encounter_id).and_then(|k| encounter_keys.get(&k));
        let (Some(encounter_key), Some(procedure_key)) =
            (encounter_key, procedure_keys.get(&procedure_id))
        else {
            continue;
        };
        insert.execute(params![encounter_key, procedure_key])?;
    }

    Ok(repository::table_row_count(tx, "bridge_encounter_procedures")?)
}

/// Resolve every (encounter, diagnosis) pair, tagging rows Primary or
/// Secondary from the operational is_primary flag.
fn populate_bridge_diagnoses(tx: &Connection) -> Result<i64, TransformError> {
    let encounter_keys = dimension_key_map(tx, "SELECT encounter_id, encounter_key FROM fact_encounters")?;
    let diagnosis_keys = dimension_key_map(tx, "SELECT diagnosis_id, diagnosis_key FROM dim_diagnosis")?;

    let mut select = tx.prepare(
        "SELECT ed.encounter_id, ed.diagnosis_id, ed.is_primary FROM encounter_diagnoses ed",
    )?;
    let rows = select.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, bool>(2)?,
        ))
    })?;

    let mut insert = tx.prepare(
        "INSERT INTO bridge_encounter_diagnoses (encounter_key, diagnosis_key, diagnosis_type)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (encounter_key, diagnosis_key) DO NOTHING",
    )?;

    for row in rows {
        let (encounter_id, diagnosis_id, is_primary) = row?;
        let encounter_key =
            natural_key_digits(&encounter_id).and_then(|k| encounter_keys.get(&k));
        let diagnosis_key =
            natural_key_digits(&diagnosis_id).and_then(|k| diagnosis_keys.get(&k));
        let (Some(encounter_key), Some(diagnosis_key)) = (encounter_key, diagnosis_key) else {
            continue;
        };
        let diagnosis_type =
            if is_primary { DiagnosisType::Primary } else { DiagnosisType::Secondary };
        insert.execute(params![encounter_key, diagnosis_key, diagnosis_type.as_str()])?;
    }

    Ok(repository::table_row_count(tx, "bridge_encounter_diagnoses")?)
}

/// YYYYMMDD integer key of a calendar date.
fn date_id(date: NaiveDate) -> i64 {
    date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64
}

/// natural-id → surrogate-key mapping of an already-populated table.
fn dimension_key_map(tx: &Connection, sql: &str) -> Result<HashMap<i64, i64>, TransformError> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;

    let mut map = HashMap::new();
    for row in rows {
        let (id, key) = row?;
        map.insert(id, key);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn setup_db() -> Connection {
        open_memory_database().expect("Failed to open test DB")
    }

    fn seed_reference(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO facilities (facility_id, facility_name, facility_type)
             VALUES ('FAC001', 'Central Hospital', 'Hospital');
             INSERT INTO diagnoses (diagnosis_id, diagnosis_code, diagnosis_name, diagnosis_category, severity)
             VALUES ('DIAG0001', 'J94.8', 'Pleural Effusion', 'Respiratory', 'Moderate');",
        )
        .unwrap();
    }

    fn insert_patient(conn: &Connection, id: &str, dob: &str) {
        conn.execute(
            "INSERT INTO patients (patient_id, date_of_birth, gender)
             VALUES (?1, ?2, 'F')",
            params![id, dob],
        )
        .unwrap();
    }

    fn insert_encounter(conn: &Connection, id: &str, patient: &str, date: &str) {
        conn.execute(
            "INSERT INTO encounters (encounter_id, patient_id, facility_id,
                                     encounter_date, encounter_datetime, encounter_type)
             VALUES (?1, ?2, 'FAC001', ?3, ?3 || ' 09:00:00', 'Outpatient')",
            params![id, patient, date],
        )
        .unwrap();
    }

    fn insert_procedure(conn: &Connection, encounter: &str, code: &str) {
        conn.execute(
            "INSERT INTO procedures (encounter_id, procedure_code, procedure_name, modality)
             VALUES (?1, ?2, 'X-Ray Chest', 'X-Ray')",
            params![encounter, code],
        )
        .unwrap();
    }

    fn insert_primary_diagnosis(conn: &Connection, encounter: &str) {
        conn.execute(
            "INSERT INTO encounter_diagnoses (encounter_id, diagnosis_id, diagnosis_rank, is_primary)
             VALUES (?1, 'DIAG0001', 1, 1)",
            params![encounter],
        )
        .unwrap();
    }

    /// 2 patients, 3 encounters over 2024-01-01..03, one procedure and one
    /// primary diagnosis each.
    fn seed_star_scenario(conn: &Connection) {
        seed_reference(conn);
        insert_patient(conn, "PAT0000001", "1980-03-15");
        insert_patient(conn, "PAT0000002", "2010-07-01");
        insert_encounter(conn, "EXT_1_ENC", "PAT0000001", "2024-01-01");
        insert_encounter(conn, "EXT_2_ENC", "PAT0000002", "2024-01-02");
        insert_encounter(conn, "EXT_3_ENC", "PAT0000001", "2024-01-03");
        for (enc, code) in [("EXT_1_ENC", "EXT_1"), ("EXT_2_ENC", "EXT_2"), ("EXT_3_ENC", "EXT_3")] {
            insert_procedure(conn, enc, code);
            insert_primary_diagnosis(conn, enc);
        }
    }

    #[test]
    fn star_scenario_row_counts() {
        let mut conn = setup_db();
        seed_star_scenario(&conn);

        let stats = rebuild(&mut conn).unwrap();
        assert_eq!(stats.dim_time_rows, 3);
        assert_eq!(stats.dim_patient_rows, 2);
        assert_eq!(stats.dim_procedure_rows, 3);
        assert_eq!(stats.dim_diagnosis_rows, 1);
        assert_eq!(stats.fact_rows, 3);
        assert_eq!(stats.bridge_procedure_rows, 3);
        assert_eq!(stats.bridge_diagnosis_rows, 3);

        let primary_rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bridge_encounter_diagnoses WHERE diagnosis_type = 'Primary'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(primary_rows, 3);
    }

    #[test]
    fn time_dimension_is_contiguous() {
        let mut conn = setup_db();
        seed_reference(&conn);
        insert_patient(&conn, "PAT0000001", "1980-03-15");
        insert_encounter(&conn, "EXT_1_ENC", "PAT0000001", "2024-02-10");
        insert_encounter(&conn, "EXT_2_ENC", "PAT0000001", "2024-03-05");

        let stats = rebuild(&mut conn).unwrap();
        // 2024-02-10 ..= 2024-03-05 inclusive
        assert_eq!(stats.dim_time_rows, 25);

        let gaps: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM dim_time t
                 WHERE t.full_date < (SELECT MAX(full_date) FROM dim_time)
                   AND NOT EXISTS (
                     SELECT 1 FROM dim_time n WHERE n.full_date = date(t.full_date, '+1 day'))",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(gaps, 0);
    }

    #[test]
    fn time_dimension_calendar_attributes() {
        let mut conn = setup_db();
        seed_reference(&conn);
        insert_patient(&conn, "PAT0000001", "1980-03-15");
        // A Saturday
        insert_encounter(&conn, "EXT_1_ENC", "PAT0000001", "2024-01-06");

        rebuild(&mut conn).unwrap();

        let (day_name, is_weekend, quarter, week): (String, bool, i64, i64) = conn
            .query_row(
                "SELECT day_name, is_weekend, quarter, week FROM dim_time WHERE date_id = 20240106",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(day_name, "Saturday");
        assert!(is_weekend);
        assert_eq!(quarter, 1);
        assert_eq!(week, 1);
    }

    #[test]
    fn patient_age_is_as_of_first_encounter() {
        let mut conn = setup_db();
        seed_star_scenario(&conn);

        rebuild(&mut conn).unwrap();

        // Born 1980-03-15, first encounter 2024-01-01 → 43, Middle Age.
        let (age, group): (i64, String) = conn
            .query_row(
                "SELECT age, age_group FROM dim_patient WHERE patient_id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(age, 43);
        assert_eq!(group, "Middle Age");

        // Born 2010-07-01, encounter 2024-01-02 → 13, Pediatric.
        let group: String = conn
            .query_row("SELECT age_group FROM dim_patient WHERE patient_id = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(group, "Pediatric");
    }

    #[test]
    fn patient_without_encounters_gets_null_age() {
        let mut conn = setup_db();
        seed_reference(&conn);
        insert_patient(&conn, "PAT0000009", "1990-01-01");

        let stats = rebuild(&mut conn).unwrap();
        assert_eq!(stats.dim_patient_rows, 1);
        assert_eq!(stats.dim_time_rows, 0);
        assert_eq!(stats.fact_rows, 0);

        let (age, group): (Option<i64>, String) = conn
            .query_row(
                "SELECT age, age_group FROM dim_patient WHERE patient_id = 9",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(age, None);
        assert_eq!(group, "Elderly");
    }

    #[test]
    fn fact_counts_do_not_fan_out() {
        let mut conn = setup_db();
        seed_reference(&conn);
        insert_patient(&conn, "PAT0000001", "1980-03-15");
        insert_encounter(&conn, "EXT_1_ENC", "PAT0000001", "2024-01-01");
        // Two procedures, one diagnosis, three reports on one encounter.
        insert_procedure(&conn, "EXT_1_ENC", "EXT_1a1");
        insert_procedure(&conn, "EXT_1_ENC", "EXT_1a2");
        insert_primary_diagnosis(&conn, "EXT_1_ENC");
        for _ in 0..3 {
            conn.execute(
                "INSERT INTO reports (encounter_id, report_type, report_status, report_text)
                 VALUES ('EXT_1_ENC', 'Radiology Report', 'Final', 'text')",
                [],
            )
            .unwrap();
        }

        rebuild(&mut conn).unwrap();

        let (procedures, diagnoses, reports): (i64, i64, i64) = conn
            .query_row(
                "SELECT procedure_count, diagnosis_count, report_count FROM fact_encounters",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!((procedures, diagnoses, reports), (2, 1, 3));
    }

    #[test]
    fn rebuild_is_deterministic() {
        let mut conn = setup_db();
        seed_star_scenario(&conn);

        let first = rebuild(&mut conn).unwrap();
        let second = rebuild(&mut conn).unwrap();

        assert_eq!(first.dim_time_rows, second.dim_time_rows);
        assert_eq!(first.dim_patient_rows, second.dim_patient_rows);
        assert_eq!(first.dim_procedure_rows, second.dim_procedure_rows);
        assert_eq!(first.dim_diagnosis_rows, second.dim_diagnosis_rows);
        assert_eq!(first.fact_rows, second.fact_rows);
        assert_eq!(first.bridge_procedure_rows, second.bridge_procedure_rows);
        assert_eq!(first.bridge_diagnosis_rows, second.bridge_diagnosis_rows);
    }

    #[test]
    fn fact_and_bridge_keys_resolve() {
        let mut conn = setup_db();
        seed_star_scenario(&conn);
        rebuild(&mut conn).unwrap();

        let orphan_facts: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM fact_encounters f
                 LEFT JOIN dim_patient dp ON f.patient_key = dp.patient_key
                 WHERE dp.patient_key IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphan_facts, 0);

        let orphan_bridges: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bridge_encounter_procedures bp
                 LEFT JOIN dim_procedure dp ON bp.procedure_key = dp.procedure_key
                 LEFT JOIN fact_encounters f ON bp.encounter_key = f.encounter_key
                 WHERE dp.procedure_key IS NULL OR f.encounter_key IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphan_bridges, 0);

        let null_dates: i64 = conn
            .query_row("SELECT COUNT(*) FROM fact_encounters WHERE date_id IS NULL", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(null_dates, 0);
    }

    #[test]
    fn surrogate_keys_unique_per_dimension() {
        let mut conn = setup_db();
        seed_star_scenario(&conn);
        rebuild(&mut conn).unwrap();

        for (table, column) in [
            ("dim_patient", "patient_id"),
            ("dim_procedure", "procedure_id"),
            ("dim_diagnosis", "diagnosis_id"),
            ("fact_encounters", "encounter_id"),
        ] {
            let duplicates: i64 = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM (SELECT {column} FROM {table}
                         GROUP BY {column} HAVING COUNT(*) > 1)"
                    ),
                    [],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(duplicates, 0, "duplicate {column} in {table}");
        }
    }
}

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{Duration, Local, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::cache::ReferenceCache;
use super::{filter, identity, EtlError};
use crate::config::{self, EngineConfig};
use crate::db::repository;
use crate::models::enums::{EncounterType, Modality, ReportStatus};
use crate::models::{
    DiagnosisAssignment, Encounter, ImagingProcedure, Report, StudyRecord,
};

/// Counters logged after a load run and returned to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadStats {
    pub records_processed: usize,
    pub records_skipped: usize,
    pub patients_created: usize,
    pub encounters_created: usize,
    pub procedures_created: usize,
    pub diagnoses_assigned: usize,
    pub reports_created: usize,
}

/// Transactionally materializes batches of new feed records into the five
/// operational tables, preserving referential order: encounters before the
/// procedure, diagnosis and report rows that reference them.
pub struct LoadEngine {
    cache: ReferenceCache,
    batch_size: usize,
    now: NaiveDateTime,
}

impl LoadEngine {
    pub fn new(conn: &Connection, engine_config: &EngineConfig) -> Result<Self, EtlError> {
        Ok(Self {
            cache: ReferenceCache::load(conn)?,
            batch_size: engine_config.batch_size,
            now: Local::now().naive_local(),
        })
    }

    /// Load the feed incrementally: records whose natural key already exists
    /// are skipped, the rest are inserted batch by batch, one transaction
    /// per batch. A failing batch rolls back alone; committed batches stay.
    pub fn run(
        &self,
        conn: &mut Connection,
        records: Vec<StudyRecord>,
    ) -> Result<LoadStats, EtlError> {
        let mut stats = LoadStats::default();

        let existing = repository::existing_external_codes(conn, config::EXTERNAL_CODE_PREFIX)?;
        tracing::info!(existing = existing.len(), "Scanned already-loaded natural keys");

        let (fresh, skipped) = filter::filter_new_records(records, &existing);
        stats.records_skipped = skipped;

        if fresh.is_empty() {
            tracing::info!(skipped, "No new records to process");
            return Ok(stats);
        }

        stats.records_processed = fresh.len();
        let total_batches = fresh.len().div_ceil(self.batch_size);

        for (index, batch) in fresh.chunks(self.batch_size).enumerate() {
            tracing::info!(
                batch = index + 1,
                total_batches,
                size = batch.len(),
                "Loading batch"
            );
            let tx = conn.transaction()?;
            self.load_batch(&tx, batch, &mut stats)?;
            tx.commit()?;
        }

        tracing::info!(
            processed = stats.records_processed,
            skipped = stats.records_skipped,
            patients = stats.patients_created,
            encounters = stats.encounters_created,
            "Load complete"
        );

        Ok(stats)
    }

    fn load_batch(
        &self,
        tx: &Connection,
        batch: &[StudyRecord],
        stats: &mut LoadStats,
    ) -> Result<(), EtlError> {
        let (patient_map, created) = identity::resolve_patients(tx, batch, self.now.date())?;
        stats.patients_created += created;

        if self.cache.hospital_count() == 0 {
            tracing::warn!("No eligible facilities; producing no encounter rows for this batch");
            return Ok(());
        }

        let rows = self.assemble_rows(batch, &patient_map, &mut rand::thread_rng())?;

        stats.encounters_created += insert_encounters(tx, &rows.encounters)?;
        stats.procedures_created += insert_procedures(tx, &rows.procedures)?;
        stats.diagnoses_assigned += insert_diagnoses(tx, &rows.diagnoses)?;
        stats.reports_created += insert_reports(tx, &rows.reports)?;

        Ok(())
    }

    /// Turn feed records into operational rows: each record gets its
    /// resolved patient, a pseudo-random eligible facility and a synthesized
    /// visit datetime inside the trailing two-year window; its labels become
    /// ranked diagnosis assignments through the cache.
    fn assemble_rows<R: Rng>(
        &self,
        batch: &[StudyRecord],
        patient_map: &HashMap<String, String>,
        rng: &mut R,
    ) -> Result<BatchRows, EtlError> {
        const TYPES: [EncounterType; 3] = [
            EncounterType::Inpatient,
            EncounterType::Outpatient,
            EncounterType::Emergency,
        ];

        let mut rows = BatchRows::default();

        for record in batch {
            let Some(patient_id) = patient_map.get(&record.patient_id) else {
                continue;
            };
            let Some(facility_id) = self.cache.random_hospital(rng) else {
                continue;
            };

            let datetime = self.now
                - Duration::days(rng.gen_range(0..config::ENCOUNTER_WINDOW_DAYS))
                - Duration::hours(rng.gen_range(0..24));
            let encounter_id = record.encounter_id();

            rows.encounters.push(Encounter {
                encounter_id: encounter_id.clone(),
                patient_id: patient_id.clone(),
                facility_id: facility_id.to_string(),
                encounter_date: datetime.date(),
                encounter_datetime: datetime,
                encounter_type: *TYPES.choose(rng).unwrap_or(&EncounterType::Outpatient),
            });

            let modality = Modality::from_str(config::modality_for_view(&record.view_position))?;
            rows.procedures.push(ImagingProcedure {
                encounter_id: encounter_id.clone(),
                procedure_code: record.procedure_code(),
                procedure_name: format!("{} Chest", modality.as_str()),
                body_part: Some("Chest".to_string()),
                view_position: Some(record.view_position.clone()),
                modality,
                procedure_datetime: Some(datetime),
            });

            let resolved = record
                .finding_list()
                .into_iter()
                .filter_map(config::finding_to_icd10)
                .filter_map(|(code, _)| self.cache.diagnosis_id(code))
                .take(config::MAX_DIAGNOSES_PER_ENCOUNTER);
            for (index, diagnosis_id) in resolved.enumerate() {
                let rank = index as i64 + 1;
                rows.diagnoses.push(DiagnosisAssignment {
                    encounter_id: encounter_id.clone(),
                    diagnosis_id: diagnosis_id.to_string(),
                    diagnosis_rank: rank,
                    is_primary: rank == 1,
                    diagnosis_datetime: Some(datetime),
                });
            }

            rows.reports.push(Report {
                encounter_id,
                report_type: record.report_type.clone(),
                report_status: ReportStatus::from_str(&record.report_status)?,
                report_text: record.report_text.clone(),
                findings: record.findings.clone(),
                impression: record.impression.clone(),
                recommendations: record.recommendations.clone(),
                dictated_datetime: Some(datetime),
                signed_datetime: Some(datetime + Duration::hours(2)),
            });
        }

        Ok(rows)
    }
}

#[derive(Default)]
struct BatchRows {
    encounters: Vec<Encounter>,
    procedures: Vec<ImagingProcedure>,
    diagnoses: Vec<DiagnosisAssignment>,
    reports: Vec<Report>,
}

fn insert_encounters(tx: &Connection, encounters: &[Encounter]) -> Result<usize, EtlError> {
    let mut stmt = tx.prepare(
        "INSERT INTO encounters (encounter_id, patient_id, facility_id,
                                 encounter_date, encounter_datetime, encounter_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (encounter_id) DO NOTHING",
    )?;

    let mut inserted = 0;
    for encounter in encounters {
        inserted += stmt.execute(params![
            encounter.encounter_id,
            encounter.patient_id,
            encounter.facility_id,
            encounter.encounter_date,
            encounter.encounter_datetime,
            encounter.encounter_type.as_str(),
        ])?;
    }
    Ok(inserted)
}

fn insert_procedures(tx: &Connection, procedures: &[ImagingProcedure]) -> Result<usize, EtlError> {
    let mut stmt = tx.prepare(
        "INSERT INTO procedures (encounter_id, procedure_code, procedure_name,
                                 body_part, view_position, modality, procedure_datetime)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (encounter_id, procedure_code) DO NOTHING",
    )?;

    let mut inserted = 0;
    for procedure in procedures {
        inserted += stmt.execute(params![
            procedure.encounter_id,
            procedure.procedure_code,
            procedure.procedure_name,
            procedure.body_part,
            procedure.view_position,
            procedure.modality.as_str(),
            procedure.procedure_datetime,
        ])?;
    }
    Ok(inserted)
}

fn insert_diagnoses(
    tx: &Connection,
    assignments: &[DiagnosisAssignment],
) -> Result<usize, EtlError> {
    let mut stmt = tx.prepare(
        "INSERT INTO encounter_diagnoses (encounter_id, diagnosis_id, diagnosis_rank,
                                          is_primary, diagnosis_datetime)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (encounter_id, diagnosis_id) DO NOTHING",
    )?;

    let mut inserted = 0;
    for assignment in assignments {
        inserted += stmt.execute(params![
            assignment.encounter_id,
            assignment.diagnosis_id,
            assignment.diagnosis_rank,
            assignment.is_primary,
            assignment.diagnosis_datetime,
        ])?;
    }
    Ok(inserted)
}

fn insert_reports(tx: &Connection, reports: &[Report]) -> Result<usize, EtlError> {
    let mut stmt = tx.prepare(
        "INSERT INTO reports (encounter_id, report_type, report_status, report_text,
                              findings, impression, recommendations,
                              dictated_datetime, signed_datetime)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    let mut inserted = 0;
    for report in reports {
        inserted += stmt.execute(params![
            report.encounter_id,
            report.report_type,
            report.report_status.as_str(),
            report.report_text,
            report.findings,
            report.impression,
            report.recommendations,
            report.dictated_datetime,
            report.signed_datetime,
        ])?;
    }
    Ok(inserted)
}

use std::collections::HashSet;

use crate::models::StudyRecord;

/// Drop candidates whose derived natural key is already in the operational
/// store. Pure set difference, no writes; an empty existing set (fresh
/// database) passes everything through.
pub fn filter_new_records(
    records: Vec<StudyRecord>,
    existing_codes: &HashSet<String>,
) -> (Vec<StudyRecord>, usize) {
    if existing_codes.is_empty() {
        return (records, 0);
    }

    let total = records.len();
    let fresh: Vec<StudyRecord> = records
        .into_iter()
        .filter(|r| !existing_codes.contains(&r.procedure_code()))
        .collect();
    let skipped = total - fresh.len();

    (fresh, skipped)
}

use std::collections::HashSet;

use crate::models::SubmissionRecord;

/// Sorts a school's records by timestamp and keeps the earliest record for
/// each (class, section) pair. The sort is stable, so equal timestamps keep
/// their fetch order.
pub fn order_and_dedup(mut records: Vec<SubmissionRecord>) -> Vec<SubmissionRecord> {
    records.sort_by_key(|record| record.timestamp);

    let mut seen = HashSet::new();
    records.retain(|record| {
        seen.insert((
            record.school_id,
            record.class.clone(),
            record.section.clone(),
        ))
    });
    records
}

//! Priority scoring for a school's submissions on one date.
//!
//! Each accessible record gets a priority between 1 (most suspicious) and 8
//! from a left fold over the timestamp-ordered sequence. The fold state only
//! remembers the previous accessible record.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use crate::images::{ImageStore, PhotoFacts};
use crate::models::{SchoolId, SubmissionRecord};

pub const DATE_MISMATCH: u8 = 1;
pub const SCREENSHOT: u8 = 2;
pub const EMPTY_FILE: u8 = 3;
pub const LIVE_RAPID: u8 = 4;
pub const LIVE_SAME_UPLOADER: u8 = 5;
pub const GALLERY_SAME_UPLOADER: u8 = 6;
pub const GALLERY_RAPID: u8 = 7;
pub const UNREMARKABLE: u8 = 8;

/// Two uploads closer together than this are treated as rushed.
pub const RAPID_GAP_MINUTES: f64 = 10.0;

/// State carried from one record to the next. Start a fresh one for every
/// (school, date) sequence.
#[derive(Debug, Clone, Default)]
pub struct FoldState {
    pub prev_timestamp: Option<NaiveDateTime>,
    pub prev_green: bool,
    pub prev_orange: bool,
    pub prev_uploader: Option<String>,
}

impl FoldState {
    pub fn gap_minutes(&self, timestamp: NaiveDateTime) -> Option<f64> {
        self.prev_timestamp
            .map(|prev| (timestamp - prev).num_seconds() as f64 / 60.0)
    }

    pub fn same_uploader(&self, uploader: &str) -> bool {
        self.prev_uploader.as_deref() == Some(uploader)
    }

    pub fn advance(&mut self, record: &SubmissionRecord, green: bool, orange: bool) {
        self.prev_timestamp = Some(record.timestamp);
        self.prev_green = green;
        self.prev_orange = orange;
        self.prev_uploader = Some(record.uploaded_by.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordPriority {
    /// Position of the record in the input sequence.
    pub index: usize,
    pub priority: u8,
}

/// Scores one record against the previous one. Rules accumulate with `min`.
pub fn score_record(
    state: &FoldState,
    record: &SubmissionRecord,
    photo: &PhotoFacts,
) -> (u8, bool, bool) {
    let gap = state.gap_minutes(record.timestamp);
    let rapid = gap.is_some_and(|minutes| minutes < RAPID_GAP_MINUTES);
    let mut priority = u8::MAX;
    let mut orange = false;
    let mut green = false;

    if photo.date_mismatch(record.date()) {
        priority = priority.min(DATE_MISMATCH);
    } else if photo.is_screenshot() {
        priority = priority.min(SCREENSHOT);
    } else if photo.is_empty() {
        priority = priority.min(EMPTY_FILE);
    } else {
        orange = true;
    }

    // Live-capture names are green even when a red rule already fired.
    if photo.is_live_capture() {
        green = true;
        if state.prev_green && rapid {
            priority = priority.min(LIVE_RAPID);
        } else if state.same_uploader(&record.uploaded_by) {
            priority = priority.min(LIVE_SAME_UPLOADER);
        }
    }

    if state.prev_orange && orange {
        if state.same_uploader(&record.uploaded_by) {
            priority = priority.min(GALLERY_SAME_UPLOADER);
        } else if rapid {
            priority = priority.min(GALLERY_RAPID);
        }
    }

    if priority == u8::MAX {
        priority = UNREMARKABLE;
    }
    (priority, green, orange)
}

/// Scores every accessible record of an ordered sequence.
pub fn score_sequence(
    records: &[SubmissionRecord],
    images: &impl ImageStore,
) -> Vec<RecordPriority> {
    let (_, scores) = records.iter().enumerate().fold(
        (FoldState::default(), Vec::with_capacity(records.len())),
        |(mut state, mut scores), (index, record)| {
            let Some(photo) = PhotoFacts::inspect(record, images) else {
                return (state, scores);
            };
            let (priority, green, orange) = score_record(&state, record, &photo);
            state.advance(record, green, orange);
            scores.push(RecordPriority { index, priority });
            (state, scores)
        },
    );
    scores
}

/// Per-school priority map. Every scored record writes its priority under
/// its school's key, so a school maps to its last accessible record's score.
pub fn school_priorities(
    records: &[SubmissionRecord],
    images: &impl ImageStore,
) -> BTreeMap<SchoolId, u8> {
    score_sequence(records, images)
        .into_iter()
        .map(|scored| (records[scored.index].school_id, scored.priority))
        .collect()
}

/// The score a school is ranked by: the first entry of its priority map.
/// Schools with no accessible photos have none.
pub fn representative_priority(
    records: &[SubmissionRecord],
    images: &impl ImageStore,
) -> Option<u8> {
    school_priorities(records, images).into_values().next()
}

/// Orders schools most suspicious first. Unscored schools go last and ties
/// keep the input order.
pub fn rank_schools(school_ids: &[SchoolId], scores: &HashMap<SchoolId, u8>) -> Vec<SchoolId> {
    let mut ranked = school_ids.to_vec();
    ranked.sort_by_key(|id| scores.get(id).copied().unwrap_or(u8::MAX));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::memory::MemoryImageStore;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 5)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    fn record(pic: &str, uploader: &str, timestamp: NaiveDateTime) -> SubmissionRecord {
        SubmissionRecord {
            school_id: 1001001,
            class: "5".to_string(),
            section: "A".to_string(),
            uploaded_by: uploader.to_string(),
            timestamp,
            class_pic: pic.to_string(),
            films: [None, None, None],
        }
    }

    fn store(paths: &[&str]) -> MemoryImageStore {
        paths
            .iter()
            .fold(MemoryImageStore::default(), |store, path| store.with(path, 4096))
    }

    fn priorities(records: &[SubmissionRecord], images: &MemoryImageStore) -> Vec<u8> {
        score_sequence(records, images)
            .into_iter()
            .map(|scored| scored.priority)
            .collect()
    }

    #[test]
    fn consecutive_live_captures_within_ten_minutes() {
        let records = vec![
            record("image - Ravi.jpg", "Ravi", at(9, 0)),
            record("image - Usha.jpg", "Usha", at(9, 7)),
        ];
        let images = store(&["image - Ravi.jpg", "image - Usha.jpg"]);
        assert_eq!(priorities(&records, &images), vec![8, LIVE_RAPID]);
    }

    #[test]
    fn live_capture_by_same_uploader_after_gap() {
        let records = vec![
            record("image - a.jpg", "Ravi", at(9, 0)),
            record("image - b.jpg", "Ravi", at(9, 30)),
        ];
        let images = store(&["image - a.jpg", "image - b.jpg"]);
        assert_eq!(priorities(&records, &images), vec![8, LIVE_SAME_UPLOADER]);
    }

    #[test]
    fn red_rules_take_precedence() {
        let records = vec![
            record("IMG20250304101010 - X.jpg", "A", at(9, 0)),
            record("Screenshot_1.png", "B", at(10, 0)),
            record("empty.jpg", "C", at(11, 0)),
        ];
        let images = store(&["IMG20250304101010 - X.jpg", "Screenshot_1.png"]).with("empty.jpg", 0);
        assert_eq!(
            priorities(&records, &images),
            vec![DATE_MISMATCH, SCREENSHOT, EMPTY_FILE]
        );
    }

    #[test]
    fn gallery_uploads_by_same_uploader_then_rapid() {
        let records = vec![
            record("IMG20250305090000 - a.jpg", "Ravi", at(9, 0)),
            record("IMG20250305090500 - b.jpg", "Ravi", at(9, 30)),
            record("IMG20250305091000 - c.jpg", "Usha", at(9, 35)),
            record("IMG20250305091500 - d.jpg", "Seema", at(10, 0)),
        ];
        let images = store(&[
            "IMG20250305090000 - a.jpg",
            "IMG20250305090500 - b.jpg",
            "IMG20250305091000 - c.jpg",
            "IMG20250305091500 - d.jpg",
        ]);
        assert_eq!(
            priorities(&records, &images),
            vec![8, GALLERY_SAME_UPLOADER, GALLERY_RAPID, 8]
        );
    }

    #[test]
    fn missing_images_do_not_advance_the_fold() {
        let records = vec![
            record("image - a.jpg", "Ravi", at(9, 0)),
            record("gone.jpg", "Usha", at(9, 3)),
            record("image - b.jpg", "Seema", at(9, 6)),
        ];
        let images = store(&["image - a.jpg", "image - b.jpg"]);
        let scores = score_sequence(&records, &images);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[1].index, 2);
        assert_eq!(scores[1].priority, LIVE_RAPID);
    }

    #[test]
    fn live_capture_stays_green_even_when_red() {
        let records = vec![
            record("image - Screenshot.png", "Ravi", at(9, 0)),
            record("image - b.jpg", "Usha", at(9, 5)),
        ];
        let images = store(&["image - Screenshot.png", "image - b.jpg"]);
        assert_eq!(priorities(&records, &images), vec![SCREENSHOT, LIVE_RAPID]);
    }

    #[test]
    fn scorer_looks_up_paths_verbatim() {
        let records = vec![
            record(" image - a.jpg ", "Ravi", at(9, 0)),
            record("image - b.jpg", "Usha", at(9, 5)),
        ];
        let images = store(&["image - a.jpg", "image - b.jpg"]);
        let scores = score_sequence(&records, &images);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].index, 1);
        assert_eq!(scores[0].priority, UNREMARKABLE);
    }

    #[test]
    fn red_records_reset_color_state() {
        let records = vec![
            record("plain-a.jpg", "Ravi", at(9, 0)),
            record("Screenshot_2.png", "Ravi", at(9, 1)),
            record("plain-b.jpg", "Ravi", at(9, 2)),
        ];
        let images = store(&["plain-a.jpg", "Screenshot_2.png", "plain-b.jpg"]);
        assert_eq!(priorities(&records, &images), vec![8, SCREENSHOT, 8]);
    }

    #[test]
    fn scores_stay_in_range() {
        let names = [
            "image - a.jpg",
            "plain.jpg",
            "Screenshot_x.png",
            "20250101 - old.jpg",
            "1234567890123456789012345.jpg",
            "image - b.jpg",
        ];
        let records: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| record(name, if i % 2 == 0 { "A" } else { "B" }, at(9, i as u32 * 3)))
            .collect();
        let images = store(&names);
        for scored in score_sequence(&records, &images) {
            assert!((1..=8).contains(&scored.priority));
        }
    }

    #[test]
    fn school_score_is_its_map_entry() {
        let records = vec![
            record("Screenshot_1.png", "Ravi", at(9, 0)),
            record("plain.jpg", "Usha", at(10, 0)),
        ];
        let images = store(&["Screenshot_1.png", "plain.jpg"]);
        let map = school_priorities(&records, &images);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1001001), Some(&8));
        assert_eq!(representative_priority(&records, &images), Some(8));
        assert_eq!(representative_priority(&records, &MemoryImageStore::default()), None);
    }

    #[test]
    fn ranking_is_stable_with_unscored_last() {
        let ids = vec![10, 20, 30, 40];
        let scores = HashMap::from([(10, 8), (20, 2), (40, 8)]);
        assert_eq!(rank_schools(&ids, &scores), vec![20, 10, 40, 30]);
    }
}

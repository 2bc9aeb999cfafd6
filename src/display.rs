//! Render-time classification of a school's records.
//!
//! Reruns the color decision per record to pick a border color, and marks
//! the time gap and uploader in a warning color when two neighbouring
//! photos of the same color look rushed.

use crate::images::{ImageStore, PhotoFacts};
use crate::misreport::{self, MisreportCheck};
use crate::models::{ColorClass, SubmissionRecord};
use crate::priority::{FoldState, RAPID_GAP_MINUTES};

#[derive(Debug, Clone)]
pub struct RecordView<'a> {
    pub record: &'a SubmissionRecord,
    pub color: ColorClass,
    pub size_kib: f64,
    /// Minutes since the previous displayed record, rounded to hundredths.
    pub gap_minutes: Option<f64>,
    pub gap_warning: bool,
    pub uploader_warning: bool,
    pub misreport: MisreportCheck,
}

#[derive(Debug, Clone)]
pub enum DisplayRow<'a> {
    Shown(RecordView<'a>),
    /// The photo is not accessible; the row is skipped by the fold.
    MissingImage(&'a SubmissionRecord),
}

/// Green wins over red here, unlike the scorer's precedence.
pub fn classify(photo: &PhotoFacts, record: &SubmissionRecord) -> ColorClass {
    if photo.is_live_capture() {
        ColorClass::Green
    } else if photo.is_screenshot() || photo.date_mismatch(record.date()) || photo.is_empty() {
        ColorClass::Red
    } else {
        ColorClass::Orange
    }
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn view_record<'a>(
    state: &FoldState,
    record: &'a SubmissionRecord,
    photo: &PhotoFacts,
) -> RecordView<'a> {
    let color = classify(photo, record);
    let green = color == ColorClass::Green;
    let orange = color == ColorClass::Orange;
    let gap_minutes = state.gap_minutes(record.timestamp).map(round_hundredths);
    let rapid = gap_minutes.is_some_and(|minutes| minutes < RAPID_GAP_MINUTES);
    let same_uploader = state.same_uploader(&record.uploaded_by);

    let mut gap_warning = false;
    let mut uploader_warning = false;

    if state.prev_green && green {
        if rapid {
            gap_warning = true;
        } else if same_uploader {
            uploader_warning = true;
        }
    }

    if state.prev_orange && orange {
        if rapid {
            gap_warning = true;
        }
        if rapid || same_uploader {
            uploader_warning = true;
        }
    }

    RecordView {
        record,
        color,
        size_kib: photo.size_kib,
        gap_minutes,
        gap_warning,
        uploader_warning,
        misreport: misreport::check(record),
    }
}

pub fn display_rows<'a>(
    records: &'a [SubmissionRecord],
    images: &impl ImageStore,
) -> Vec<DisplayRow<'a>> {
    let mut state = FoldState::default();
    records
        .iter()
        // Stored paths can carry stray whitespace from the upload form.
        .map(|record| match PhotoFacts::inspect_at(record.class_pic.trim(), images) {
            Some(photo) => {
                let view = view_record(&state, record, &photo);
                state.advance(
                    record,
                    view.color == ColorClass::Green,
                    view.color == ColorClass::Orange,
                );
                DisplayRow::Shown(view)
            }
            None => DisplayRow::MissingImage(record),
        })
        .collect()
}

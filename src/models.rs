use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

pub type SchoolId = i64;

/// One classroom-photo upload as stored in `kant.form_response_data`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub school_id: SchoolId,
    pub class: String,
    pub section: String,
    pub uploaded_by: String,
    pub timestamp: NaiveDateTime,
    pub class_pic: String,
    /// Raw film slots; absent or non-numeric values mean "not filmed".
    pub films: [Option<String>; 3],
}

impl SubmissionRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn class_section(&self) -> String {
        format!("{}{}", self.class, self.section)
    }
}

/// Three-way color decision shared by the scorer and the display pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorClass {
    Green,
    Orange,
    Red,
}

impl ColorClass {
    pub fn label(self) -> &'static str {
        match self {
            ColorClass::Green => "green",
            ColorClass::Orange => "orange",
            ColorClass::Red => "red",
        }
    }

    pub fn css(self) -> &'static str {
        match self {
            ColorClass::Green => "#32CD32",
            ColorClass::Orange => "orange",
            ColorClass::Red => "red",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedSchool {
    pub school_id: SchoolId,
    pub school_name: String,
    pub priority: Option<u8>,
    pub record_count: usize,
}

#[derive(Debug, Clone)]
pub struct SuspectEntry {
    pub school_id: SchoolId,
    pub class: String,
    pub section: String,
    pub uploaded_by: String,
    pub timestamp: NaiveDateTime,
    pub class_pic: String,
    pub issues: String,
}

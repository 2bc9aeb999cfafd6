//! Filename heuristics used by both the priority scorer and the display pass.
//!
//! Camera apps embed the capture date in the photo name in a handful of
//! conventions. The patterns are tried most specific first and the first
//! match decides the outcome, even when its digits are not a valid date.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // 20250305_170517 - Usha Kumari.jpg
        r"^(\d{8})_\d{6}",
        // IMG_20250305_144929 - Ravi Gujjar.jpg
        r"^IMG_(\d{8})_\d{6}",
        // IMG20250305141842 - R. Sanwat.jpg
        r"^IMG(\d{14})",
        // 20250219 - Seema Gaur.jpg
        r"^(\d{8})\s-\s",
        r"^(\d{8})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static date pattern"))
    .collect()
});

static LONG_DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{25,}").expect("static digit-run pattern"));

/// Returns the capture date embedded in a photo's basename, if any.
pub fn extract_date(basename: &str) -> Option<NaiveDate> {
    let captured = DATE_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(basename))?;
    parse_yyyymmdd(captured.get(1)?.as_str())
}

fn parse_yyyymmdd(digits: &str) -> Option<NaiveDate> {
    // \d is unicode-aware; only ASCII digits form a date.
    if digits.len() < 8 || !digits.is_ascii() {
        return None;
    }
    let year = digits[0..4].parse().ok()?;
    let month = digits[4..6].parse().ok()?;
    let day = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn is_screenshot(basename: &str) -> bool {
    basename.contains("Screenshot")
}

/// In-app captures are named `image - <name>` or carry a long numeric id.
pub fn is_live_capture(basename: &str) -> bool {
    basename.contains("image - ") || LONG_DIGIT_RUN.is_match(basename)
}

pub fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn extracts_dates_from_camera_conventions() {
        assert_eq!(extract_date("IMG20250305141842 - R. Sanwat.jpg"), date(2025, 3, 5));
        assert_eq!(extract_date("20250305_170517 - Usha Kumari.jpg"), date(2025, 3, 5));
        assert_eq!(extract_date("IMG_20250305_144929 - Ravi Gujjar.jpg"), date(2025, 3, 5));
        assert_eq!(extract_date("20250219 - Seema Gaur.jpg"), date(2025, 2, 19));
        assert_eq!(extract_date("20250305WA0012 - Name.jpg"), date(2025, 3, 5));
    }

    #[test]
    fn unmatched_names_have_no_date() {
        assert_eq!(extract_date("random.jpg"), None);
        assert_eq!(extract_date("image - Seema.jpg"), None);
        assert_eq!(extract_date("IMG-2025.jpg"), None);
    }

    #[test]
    fn first_matching_pattern_wins_even_when_invalid() {
        assert_eq!(extract_date("20251345_101010.jpg"), None);
        assert_eq!(extract_date("IMG20259999000000.jpg"), None);
    }

    #[test]
    fn live_capture_signatures() {
        assert!(is_live_capture("image - Ravi.jpg"));
        assert!(is_live_capture("1741170000000123456789012345.jpg"));
        assert!(!is_live_capture("174117000000012345678901.jpg"));
        assert!(!is_live_capture("IMG20250305141842 - R. Sanwat.jpg"));
    }

    #[test]
    fn screenshot_is_case_sensitive() {
        assert!(is_screenshot("Screenshot_2025-03-05.png"));
        assert!(!is_screenshot("screenshot.png"));
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("/data/uploads/IMG1.jpg"), "IMG1.jpg");
        assert_eq!(basename("IMG1.jpg"), "IMG1.jpg");
    }
}

//! Consistency check between a record's declared classes and film numbers.
//!
//! A film number carries its class level in the leading digits
//! (`film` floor-divided by 10). A film is acceptable for a declared class
//! when it matches it exactly or sits at most two levels below it.

use crate::models::SubmissionRecord;

pub const INVALID_CLASS: &str = "Invalid Class Data";
pub const DUPLICATE_FILMS: &str = "Duplicate films detected";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisreportCheck {
    pub is_valid: bool,
    pub issues: Vec<String>,
    /// Offending films, in slot order; a film flagged as both too high and
    /// too old appears twice.
    pub misreported_films: Vec<i64>,
}

impl MisreportCheck {
    fn valid() -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
            misreported_films: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        if self.is_valid {
            "No issues".to_string()
        } else {
            self.issues.join(", ")
        }
    }

    /// Text persisted alongside a suspect entry.
    pub fn issues_text(&self) -> String {
        self.issues.join(", ")
    }

    pub fn is_misreported(&self, film: i64) -> bool {
        self.misreported_films.contains(&film)
    }
}

/// Comma-separated class list; tokens that are not plain digits are dropped.
pub fn parse_classes(raw: &str) -> Vec<i64> {
    raw.trim()
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// Film slot value; anything missing or non-numeric means "not filmed" (0).
pub fn parse_film(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim) else {
        return 0;
    };
    if let Ok(value) = raw.parse::<i64>() {
        return value;
    }
    // Numeric columns can arrive as "53.0".
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value.trunc() as i64,
        _ => 0,
    }
}

pub fn check(record: &SubmissionRecord) -> MisreportCheck {
    let films = record.films.each_ref().map(|slot| parse_film(slot.as_deref()));
    check_films(&record.class, films)
}

pub fn check_films(class_field: &str, films: [i64; 3]) -> MisreportCheck {
    let classes = parse_classes(class_field);
    if classes.is_empty() {
        return MisreportCheck {
            is_valid: false,
            issues: vec![INVALID_CLASS.to_string()],
            misreported_films: Vec::new(),
        };
    }

    let filmed: Vec<i64> = films.iter().copied().filter(|&film| film != 0).collect();
    let mut distinct = films.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let duplicate = filmed.len() == 3 && distinct.len() < 3;

    let mut too_old = Vec::new();
    let mut too_high = Vec::new();
    let mut misreported_films = Vec::new();

    // Level differences span the full i64 range of both operands.
    let classes: Vec<i128> = classes.into_iter().map(i128::from).collect();

    for &film in &filmed {
        let film_class = i128::from(film.div_euclid(10));
        let fits = classes
            .iter()
            .any(|&cls| film_class == cls || (cls - film_class <= 2 && film_class <= cls));
        if fits {
            continue;
        }

        // Both buckets are checked independently.
        if classes.iter().any(|&cls| film_class - cls > 1) {
            too_high.push(film);
            misreported_films.push(film);
        }
        if classes.iter().any(|&cls| cls - film_class > 2) {
            too_old.push(film);
            misreported_films.push(film);
        }
    }

    let mut issues = Vec::new();
    if duplicate {
        issues.push(DUPLICATE_FILMS.to_string());
    }
    if !too_old.is_empty() {
        issues.push(format!("Film {} too old for this class.", join(&too_old)));
    }
    if !too_high.is_empty() {
        issues.push(format!("Film {} too high for this class", join(&too_high)));
    }

    if issues.is_empty() {
        return MisreportCheck::valid();
    }
    MisreportCheck {
        is_valid: false,
        issues,
        misreported_films,
    }
}

fn join(films: &[i64]) -> String {
    films
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn matching_films_are_valid() {
        let result = check_films("5", [53, 54, 55]);
        assert!(result.is_valid);
        assert!(result.issues.is_empty());
        assert_eq!(result.summary(), "No issues");
    }

    #[test]
    fn films_two_levels_below_are_valid() {
        assert!(check_films("5", [31, 41, 0]).is_valid);
    }

    #[test]
    fn three_identical_films_are_duplicates() {
        let result = check_films("5", [53, 53, 53]);
        assert!(!result.is_valid);
        assert_eq!(result.issues, vec![DUPLICATE_FILMS.to_string()]);
        assert!(result.misreported_films.is_empty());
    }

    #[test]
    fn duplicates_need_all_three_slots() {
        assert!(check_films("5", [53, 53, 0]).is_valid);
    }

    #[test]
    fn film_for_higher_class() {
        let result = check_films("2", [85, 0, 0]);
        assert!(!result.is_valid);
        assert_eq!(result.issues, vec!["Film 85 too high for this class".to_string()]);
        assert_eq!(result.misreported_films, vec![85]);
    }

    #[test]
    fn film_too_old_for_class() {
        let result = check_films("9", [31, 0, 0]);
        assert!(!result.is_valid);
        assert_eq!(result.issues, vec!["Film 31 too old for this class.".to_string()]);
        assert_eq!(result.misreported_films, vec![31]);
    }

    #[test]
    fn film_can_be_flagged_both_ways() {
        // Class 2 sees 55 as too high, class 9 sees it as too old.
        let result = check_films("2,9", [55, 0, 0]);
        assert_eq!(
            result.issues,
            vec![
                "Film 55 too old for this class.".to_string(),
                "Film 55 too high for this class".to_string(),
            ]
        );
        assert_eq!(result.misreported_films, vec![55, 55]);
    }

    #[test]
    fn issues_are_ordered_duplicate_old_high() {
        let result = check_films("6", [11, 11, 95]);
        assert_eq!(
            result.issues,
            vec![
                DUPLICATE_FILMS.to_string(),
                "Film 11, 11 too old for this class.".to_string(),
                "Film 95 too high for this class".to_string(),
            ]
        );
        assert_eq!(
            result.summary(),
            "Duplicate films detected, Film 11, 11 too old for this class., Film 95 too high for this class"
        );
    }

    #[test]
    fn negative_films_floor_to_a_lower_class() {
        let result = check_films("2", [-1, 0, 0]);
        assert!(!result.is_valid);
        assert_eq!(result.issues, vec!["Film -1 too old for this class.".to_string()]);
        assert_eq!(result.misreported_films, vec![-1]);
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        let result = check_films(&i64::MAX.to_string(), [i64::MIN, i64::MAX, 0]);
        assert!(!result.is_valid);
        assert_eq!(result.misreported_films, vec![i64::MIN, i64::MAX]);
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].ends_with("too old for this class."));
    }

    #[test]
    fn empty_class_short_circuits() {
        let result = check_films(" , A, ", [85, 85, 85]);
        assert!(!result.is_valid);
        assert_eq!(result.issues, vec![INVALID_CLASS.to_string()]);
        assert!(result.misreported_films.is_empty());
    }

    #[test]
    fn class_tokens_are_trimmed_and_filtered() {
        assert_eq!(parse_classes(" 5, 6 ,x,7.0"), vec![5, 6]);
    }

    #[test]
    fn malformed_films_count_as_not_filmed() {
        assert_eq!(parse_film(None), 0);
        assert_eq!(parse_film(Some("abc")), 0);
        assert_eq!(parse_film(Some("NaN")), 0);
        assert_eq!(parse_film(Some(" 53 ")), 53);
        assert_eq!(parse_film(Some("53.0")), 53);
    }

    #[test]
    fn slot_order_does_not_matter() {
        let permutations = [
            [31, 95, 53],
            [31, 53, 95],
            [95, 31, 53],
            [95, 53, 31],
            [53, 31, 95],
            [53, 95, 31],
        ];
        let baseline = check_films("5", permutations[0]);
        for films in permutations {
            let result = check_films("5", films);
            assert_eq!(result.is_valid, baseline.is_valid);
            let flagged: BTreeSet<_> = result.misreported_films.iter().collect();
            let expected: BTreeSet<_> = baseline.misreported_films.iter().collect();
            assert_eq!(flagged, expected);
        }
        assert!(!baseline.is_valid);
    }

    #[test]
    fn checks_record_film_slots() {
        let record = SubmissionRecord {
            school_id: 1,
            class: "9".to_string(),
            section: "B".to_string(),
            uploaded_by: "Usha".to_string(),
            timestamp: chrono::NaiveDate::from_ymd_opt(2025, 3, 5)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .unwrap(),
            class_pic: "a.jpg".to_string(),
            films: [Some("31".to_string()), None, Some("n/a".to_string())],
        };
        let result = check(&record);
        assert!(result.is_misreported(31));
        assert_eq!(result.issues_text(), "Film 31 too old for this class.");
    }
}

// Utility helpers for cell coercion, text cleanup and basic statistics.
//
// This module centralizes all the "dirty" spreadsheet value handling so the
// rest of the code can assume clean, typed values. Every function here is
// total: unparseable input degrades to `None` or an empty string, it never
// errors. Spreadsheet exports are messy by nature and a single bad cell must
// not abort a workbook load.
use calamine::Data;
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Tolerant text-to-number conversion.
///
/// - Trims whitespace.
/// - Accepts a comma as the decimal separator (`"12,5"` -> 12.5).
/// - Strips every character that is not a digit, a period or a minus sign,
///   so unit suffixes and currency symbols pass through (`"12,5 h"` -> 12.5).
/// - Returns `None` when nothing parseable remains (`""`, `"—"`, `"n/a"`).
pub fn coerce_number_str(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");
    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if kept.is_empty() {
        return None;
    }
    kept.parse::<f64>().ok()
}

/// Convert a spreadsheet cell into a number, or `None` for a missing value.
///
/// Already-numeric cells cast directly; text goes through
/// [`coerce_number_str`]; date cells yield their serial value.
pub fn coerce_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => Some(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => coerce_number_str(s),
        Data::Empty | Data::Error(_) => None,
    }
}

/// Convert a spreadsheet cell into its textual content ("" for empty cells).
pub fn coerce_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Trim a text field and collapse the literal null markers left over from
/// upstream coercion ("nan", "None") to the empty string.
pub fn clean_text(s: &str) -> String {
    let t = s.trim();
    if t == "nan" || t == "None" {
        String::new()
    } else {
        t.to_string()
    }
}

/// [`clean_text`] plus newline removal and whitespace-run collapsing, for
/// single-line fields like subject and responsible names.
pub fn clean_text_oneline(s: &str) -> String {
    let t = clean_text(s);
    t.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a semester value towards the canonical `S<n>` form.
///
/// Recognized spellings: a bare number ("1" -> "S1"), "Semestre 2",
/// "Sem1", "S 3", "S01". Unrecognized input is returned trimmed and
/// upper-cased but otherwise unchanged.
pub fn normalize_semestre(raw: &str) -> String {
    let s = raw.trim().to_uppercase();
    if s.is_empty() {
        return s;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        let n = s.trim_start_matches('0');
        return format!("S{}", if n.is_empty() { "0" } else { n });
    }
    let s = s.replace("SEMESTRE", "S").replace("SEM", "S");
    let chars: Vec<char> = s.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c != 'S' {
            continue;
        }
        let mut j = i + 1;
        while j < chars.len() && chars[j] == ' ' {
            j += 1;
        }
        let start = j;
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }
        let digits: String = chars[start..j].iter().collect();
        let n = digits.trim_start_matches('0');
        if !n.is_empty() {
            return format!("S{}", n);
        }
    }
    s
}

/// Best-effort, day-first parse of a planned start/end date. The pipeline
/// stores these fields as free text; parsing only happens at alerting time.
pub fn parse_date_dayfirst(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// Arithmetic mean; 0 for an empty slice to avoid NaNs in report tables.
pub fn average(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Fixed-decimal formatting with locale-aware thousands separators in the
/// integer part (e.g. `1,234.5`). Used by the console/report layer only.
pub fn format_number(n: f64, decimals: usize) -> String {
    let rounded = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match rounded.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rounded.as_str(), None),
    };
    let mut out = int_part
        .parse::<i64>()
        .unwrap_or(0)
        .to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    if n.is_sign_negative() && rounded.chars().any(|c| c != '0' && c != '.') {
        out.insert(0, '-');
    }
    out
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_unit_suffixed_text() {
        assert_eq!(coerce_number_str("12,5 h"), Some(12.5));
        assert_eq!(coerce_number_str(" 1 234,75 "), Some(1234.75));
        assert_eq!(coerce_number_str("-3"), Some(-3.0));
    }

    #[test]
    fn coerces_missing_markers_to_none() {
        assert_eq!(coerce_number_str(""), None);
        assert_eq!(coerce_number_str("—"), None);
        assert_eq!(coerce_number_str("n/a"), None);
    }

    #[test]
    fn coerces_numeric_cells_directly() {
        assert_eq!(coerce_number(&Data::Int(7)), Some(7.0));
        assert_eq!(coerce_number(&Data::Float(2.5)), Some(2.5));
        assert_eq!(coerce_number(&Data::Empty), None);
        assert_eq!(coerce_number(&Data::String("12,5 h".into())), Some(12.5));
    }

    #[test]
    fn cleans_null_markers() {
        assert_eq!(clean_text(" nan "), "");
        assert_eq!(clean_text("None"), "");
        assert_eq!(clean_text("  Dupont "), "Dupont");
        assert_eq!(clean_text_oneline("Analyse\nnumérique  II"), "Analyse numérique II");
    }

    #[test]
    fn normalizes_semestre_spellings() {
        for raw in ["semestre 1", "Sem1", "1", "S01", " s1 "] {
            assert_eq!(normalize_semestre(raw), "S1", "input {raw:?}");
        }
        assert_eq!(normalize_semestre("Semestre 12"), "S12");
        assert_eq!(normalize_semestre(""), "");
        assert_eq!(normalize_semestre(" annuel "), "ANNUEL");
    }

    #[test]
    fn parses_dayfirst_dates() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(parse_date_dayfirst("14/03/2025"), Some(d));
        assert_eq!(parse_date_dayfirst("2025-03-14"), Some(d));
        assert_eq!(parse_date_dayfirst("mi-mars"), None);
    }

    #[test]
    fn formats_numbers_with_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-42.0, 0), "-42");
        assert_eq!(format_number(0.0, 1), "0.0");
    }
}

// Per-row metric derivation and the two read-only projections of the
// consolidated table (period-scoped copy, long format).
//
// The derived fields are always a pure function of (monthly hours over the
// active range, planned hours); they are never stored independently of that
// rule. The long table is strictly derived from the wide one and joins back
// on `row_id`.
use crate::types::{LongRow, Row, Status, MOIS};
use crate::util::{clean_text, clean_text_oneline, normalize_semestre};
use std::ops::RangeInclusive;

/// Full academic cycle, for load-time derivation.
pub fn full_range() -> RangeInclusive<usize> {
    0..=MOIS.len() - 1
}

/// Status is NotStarted as soon as nothing was realized, even when nothing
/// was planned either (VHP = 0, VHR = 0 is NotStarted, not Done).
pub fn status_for(realized: f64, planned: f64) -> Status {
    if realized <= 0.0 {
        Status::NotStarted
    } else if realized < planned {
        Status::InProgress
    } else {
        Status::Done
    }
}

/// VHR / VHP, with the deliberate convention that VHP = 0 yields 0 rather
/// than an undefined or infinite rate.
pub fn completion_rate(realized: f64, planned: f64) -> f64 {
    if planned == 0.0 {
        0.0
    } else {
        realized / planned
    }
}

/// Recompute the derived aggregates of one row over the given inclusive
/// month-index range. Monthly hours and planned hours are left untouched.
pub fn apply_derived(row: &mut Row, months: RangeInclusive<usize>) {
    let vhr: f64 = row.monthly_hours[months.clone()].iter().sum();
    row.realized_hours = vhr;
    row.gap = vhr - row.planned_hours;
    row.completion_rate = completion_rate(vhr, row.planned_hours);
    row.status = status_for(vhr, row.planned_hours);
}

/// Metric Deriver: normalize the text fields of a freshly-loaded row and
/// compute its full-cycle derived fields. Total — never fails, dirty input
/// degrades to empty strings and zeros.
pub fn derive_row(row: &mut Row) {
    row.subject = clean_text_oneline(&row.subject);
    row.responsible = clean_text_oneline(&row.responsible);
    row.contact = clean_text(&row.contact).to_lowercase();
    row.semester = normalize_semestre(&clean_text(&row.semester));
    row.notes = clean_text(&row.notes);
    row.planned_start = clean_text(&row.planned_start);
    row.planned_end = clean_text(&row.planned_end);
    row.subject_is_blank = row.subject.is_empty() || row.subject.eq_ignore_ascii_case("nan");
    apply_derived(row, full_range());
}

/// Period Reprojector: copy of the table with the derived fields recomputed
/// over `start..=end` (month indices into [`MOIS`]). Identity fields, month
/// values and `row_id`s are carried over verbatim, so reprojecting over the
/// full range reproduces the load-time table exactly.
pub fn reproject_period(rows: &[Row], start: usize, end: usize) -> Vec<Row> {
    debug_assert!(start <= end && end < MOIS.len());
    rows.iter()
        .map(|r| {
            let mut r = r.clone();
            apply_derived(&mut r, start..=end);
            r
        })
        .collect()
}

/// Long-Format Transposer: one output entry per (row, month), identifying
/// fields copied verbatim, plus the month's fixed 1-based ordinal for
/// chronological sorting.
pub fn unpivot_months(rows: &[Row]) -> Vec<LongRow> {
    let mut long = Vec::with_capacity(rows.len() * MOIS.len());
    for r in rows {
        for (i, month) in MOIS.iter().copied().enumerate() {
            long.push(LongRow {
                row_id: r.row_id,
                class_id: r.class_id.clone(),
                semester: r.semester.clone(),
                subject: r.subject.clone(),
                responsible: r.responsible.clone(),
                planned_hours: r.planned_hours,
                realized_hours: r.realized_hours,
                gap: r.gap,
                completion_rate: r.completion_rate,
                status: r.status,
                notes: r.notes.clone(),
                month,
                month_idx: i + 1,
                hours: r.monthly_hours[i],
            });
        }
    }
    long
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(id: usize, planned: f64, monthly: [f64; 11]) -> Row {
        let mut r = Row {
            row_id: id,
            class_id: "L1-Info".to_string(),
            subject: "Algèbre".to_string(),
            semester: "S1".to_string(),
            responsible: "Mme Diallo".to_string(),
            contact: "diallo@example.edu".to_string(),
            planned_hours: planned,
            monthly_hours: monthly,
            planned_start: String::new(),
            planned_end: String::new(),
            notes: String::new(),
            realized_hours: 0.0,
            gap: 0.0,
            completion_rate: 0.0,
            status: Status::NotStarted,
            subject_is_blank: false,
        };
        derive_row(&mut r);
        r
    }

    #[test]
    fn status_is_total_over_hour_pairs() {
        for &planned in &[0.0, 1.0, 5.0, 20.0] {
            for &realized in &[0.0, 0.5, 5.0, 20.0, 25.0] {
                let s = status_for(realized, planned);
                if realized <= 0.0 {
                    assert_eq!(s, Status::NotStarted);
                } else if realized >= planned {
                    assert_eq!(s, Status::Done);
                } else {
                    assert_eq!(s, Status::InProgress);
                }
            }
        }
    }

    #[test]
    fn zero_planned_yields_zero_rate_and_not_started() {
        assert_eq!(completion_rate(0.0, 0.0), 0.0);
        assert_eq!(completion_rate(8.0, 0.0), 0.0);
        let r = row(0, 0.0, [0.0; 11]);
        assert_eq!(r.completion_rate, 0.0);
        assert_eq!(r.status, Status::NotStarted);
    }

    #[test]
    fn derive_cleans_text_fields() {
        let mut r = row(0, 10.0, [0.0; 11]);
        r.subject = "nan".to_string();
        r.contact = " Prof.Dupont@Univ.FR ".to_string();
        r.semester = "semestre 2".to_string();
        r.responsible = "Dupont\n Jean".to_string();
        derive_row(&mut r);
        assert!(r.subject_is_blank);
        assert_eq!(r.subject, "");
        assert_eq!(r.contact, "prof.dupont@univ.fr");
        assert_eq!(r.semester, "S2");
        assert_eq!(r.responsible, "Dupont Jean");
    }

    #[test]
    fn full_range_reprojection_is_identity() {
        let mut monthly = [0.0; 11];
        monthly[0] = 4.0;
        monthly[3] = 2.5;
        monthly[10] = 1.0;
        let rows = vec![row(0, 12.0, monthly), row(1, 0.0, [0.0; 11])];
        let again = reproject_period(&rows, 0, MOIS.len() - 1);
        for (a, b) in rows.iter().zip(&again) {
            assert_eq!(a.row_id, b.row_id);
            assert_eq!(a.realized_hours, b.realized_hours);
            assert_eq!(a.gap, b.gap);
            assert_eq!(a.completion_rate, b.completion_rate);
            assert_eq!(a.status, b.status);
            assert_eq!(a.monthly_hours, b.monthly_hours);
        }
    }

    #[test]
    fn period_reprojection_only_counts_selected_months() {
        let mut monthly = [0.0; 11];
        monthly[0] = 5.0; // Oct
        monthly[1] = 5.0; // Nov
        monthly[5] = 3.0; // Mars
        let rows = vec![row(0, 20.0, monthly)];
        let scoped = reproject_period(&rows, 0, 1);
        assert_eq!(scoped[0].realized_hours, 10.0);
        assert_eq!(scoped[0].gap, -10.0);
        assert_eq!(scoped[0].completion_rate, 0.5);
        assert_eq!(scoped[0].status, Status::InProgress);
        // source months unchanged
        assert_eq!(scoped[0].monthly_hours, monthly);
        assert_eq!(rows[0].realized_hours, 13.0);
    }

    #[test]
    fn long_format_round_trips_realized_hours() {
        let mut m1 = [0.0; 11];
        m1[2] = 7.0;
        m1[6] = 2.0;
        let mut m2 = [0.0; 11];
        m2[9] = 1.5;
        let rows = vec![row(0, 10.0, m1), row(1, 4.0, m2), row(2, 3.0, [0.0; 11])];
        let long = unpivot_months(&rows);
        assert_eq!(long.len(), rows.len() * MOIS.len());

        let mut sums: HashMap<usize, f64> = HashMap::new();
        for e in &long {
            *sums.entry(e.row_id).or_insert(0.0) += e.hours;
        }
        for r in &rows {
            assert_eq!(sums[&r.row_id], r.realized_hours);
        }
    }

    #[test]
    fn long_entries_copy_identity_fields_verbatim() {
        let rows = vec![row(3, 10.0, [1.0; 11])];
        let long = unpivot_months(&rows);
        for (i, e) in long.iter().enumerate() {
            assert_eq!(e.row_id, 3);
            assert_eq!(e.class_id, rows[0].class_id);
            assert_eq!(e.subject, rows[0].subject);
            assert_eq!(e.responsible, rows[0].responsible);
            assert_eq!(e.month, MOIS[i]);
            assert_eq!(e.month_idx, i + 1);
        }
    }
}

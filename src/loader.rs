// Workbook ingestion: every sheet is one class, every data row one subject.
//
// Sheets are loaded independently; a structurally broken sheet (unreadable,
// missing required columns) is recorded in the quality report and skipped,
// it never aborts the load of the other sheets. Zero surviving sheets is a
// valid outcome: the caller gets an empty table plus the diagnostics and
// decides how to present the "no usable data" state.
use crate::columns::{self, COL_MATIERE, COL_VHP};
use crate::metrics;
use crate::types::{QualityReport, Row, Status, GLOBAL_SCOPE, MOIS};
use crate::util::{clean_text, coerce_number, coerce_text};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::io::Cursor;

/// One sheet as parsed from the workbook container, before any
/// normalization. First row of the sheet is the header row.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

/// Parse workbook bytes and consolidate every readable sheet.
///
/// Only an unusable container (not a spreadsheet at all) returns `Err`;
/// anything wrong with individual sheets or cells ends up in the
/// [`QualityReport`] instead.
pub fn load_workbook_bytes(bytes: &[u8]) -> Result<(Vec<Row>, QualityReport), Box<dyn Error>> {
    let mut report = QualityReport::default();
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let mut sheets: Vec<RawSheet> = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        match workbook.worksheet_range(&name) {
            Ok(range) => sheets.push(raw_sheet_from_range(&name, &range)),
            Err(e) => report.note(&name, format!("Lecture impossible: {e}")),
        }
    }

    let rows = consolidate(&sheets, &mut report);
    Ok((rows, report))
}

fn raw_sheet_from_range(name: &str, range: &Range<Data>) -> RawSheet {
    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .map(|r| r.iter().map(coerce_text).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<Data>> = rows_iter.map(|r| r.to_vec()).collect();
    RawSheet {
        name: name.to_string(),
        headers,
        rows,
    }
}

/// Consolidate parsed sheets into the canonical table: normalize headers,
/// validate per-sheet structure, tag rows with their class, derive metrics
/// over the full cycle and assign stable row ids.
pub fn consolidate(sheets: &[RawSheet], report: &mut QualityReport) -> Vec<Row> {
    let mut all_rows: Vec<Row> = Vec::new();

    for sheet in sheets {
        let headers = columns::normalize_headers(&sheet.headers);

        let missing: Vec<&str> = [COL_MATIERE, COL_VHP]
            .into_iter()
            .filter(|c| !headers.iter().any(|h| h == c))
            .collect();
        if !missing.is_empty() {
            report.note(
                &sheet.name,
                format!("Colonnes manquantes: {}", missing.join(", ")),
            );
            continue;
        }

        let mut seen = HashSet::new();
        if headers.iter().any(|h| !seen.insert(h.clone())) {
            report.note(&sheet.name, "Colonnes dupliquées détectées.".to_string());
        }

        // First occurrence wins when a name is duplicated.
        let mut col_at: HashMap<&str, usize> = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            col_at.entry(h.as_str()).or_insert(i);
        }
        // Absent month columns simply contribute 0 to every row.
        let month_cols: Vec<Option<usize>> =
            MOIS.iter().map(|m| col_at.get(m).copied()).collect();

        let data_rows: Vec<&Vec<Data>> = sheet
            .rows
            .iter()
            .filter(|cells| !cells.iter().all(|c| matches!(c, Data::Empty)))
            .collect();

        if !data_rows.is_empty() {
            let blank = data_rows
                .iter()
                .filter(|cells| {
                    text_at(cells, col_at.get(COL_MATIERE).copied()).trim().is_empty()
                })
                .count();
            if blank as f64 / data_rows.len() as f64 > 0.20 {
                report.note(
                    &sheet.name,
                    "Beaucoup de valeurs manquantes dans 'Matière' (>20%).".to_string(),
                );
            }
        }

        for cells in data_rows {
            let mut monthly = [0.0f64; 11];
            for (i, idx) in month_cols.iter().enumerate() {
                monthly[i] = number_at(cells, *idx);
            }
            all_rows.push(Row {
                row_id: 0, // assigned below, over the concatenated order
                class_id: sheet.name.clone(),
                subject: text_at(cells, col_at.get(COL_MATIERE).copied()),
                semester: text_at(cells, col_at.get(columns::COL_SEMESTRE).copied()),
                responsible: text_at(cells, col_at.get(columns::COL_RESPONSABLE).copied()),
                contact: text_at(cells, col_at.get(columns::COL_EMAIL).copied()),
                planned_hours: number_at(cells, col_at.get(COL_VHP).copied()),
                monthly_hours: monthly,
                planned_start: text_at(cells, col_at.get(columns::COL_DEBUT).copied()),
                planned_end: text_at(cells, col_at.get(columns::COL_FIN).copied()),
                notes: text_at(cells, col_at.get(columns::COL_OBSERVATIONS).copied()),
                realized_hours: 0.0,
                gap: 0.0,
                completion_rate: 0.0,
                status: Status::NotStarted,
                subject_is_blank: false,
            });
        }
    }

    for (i, row) in all_rows.iter_mut().enumerate() {
        metrics::derive_row(row);
        row.row_id = i;
    }

    if !all_rows.is_empty() {
        let n = all_rows.len() as f64;
        let blank = all_rows.iter().filter(|r| r.subject_is_blank).count() as f64;
        if blank / n > 0.05 {
            report.note(
                GLOBAL_SCOPE,
                "Plus de 5% de lignes ont une 'Matière' vide/invalides.".to_string(),
            );
        }
        let no_plan = all_rows.iter().filter(|r| r.planned_hours <= 0.0).count() as f64;
        if no_plan / n > 0.10 {
            report.note(
                GLOBAL_SCOPE,
                "Plus de 10% de lignes ont VHP <= 0 (à vérifier).".to_string(),
            );
        }
    }

    all_rows
}

fn text_at(cells: &[Data], idx: Option<usize>) -> String {
    idx.and_then(|i| cells.get(i))
        .map(|c| clean_text(&coerce_text(c)))
        .unwrap_or_default()
}

fn number_at(cells: &[Data], idx: Option<usize>) -> f64 {
    idx.and_then(|i| cells.get(i))
        .and_then(coerce_number)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn sheet(name: &str, headers: &[&str], rows: Vec<Vec<Data>>) -> RawSheet {
        RawSheet {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn two_sheet_scenario_with_one_broken_sheet() {
        let class_a = sheet(
            "ClassA",
            &["Matière", "VHP", "Oct", "Nov"],
            vec![vec![s("Math"), Data::Int(20), Data::Int(5), Data::Int(5)]],
        );
        // No VHP column at all: the sheet contributes zero rows.
        let class_b = sheet("ClassB", &["Matière", "Oct"], vec![vec![s("Histoire"), Data::Int(3)]]);

        let mut report = QualityReport::default();
        let rows = consolidate(&[class_a, class_b], &mut report);

        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.class_id, "ClassA");
        assert_eq!(r.subject, "Math");
        assert_eq!(r.realized_hours, 10.0);
        assert_eq!(r.gap, -10.0);
        assert_eq!(r.completion_rate, 0.5);
        assert_eq!(r.status, Status::InProgress);

        assert_eq!(report.for_scope("ClassB"), ["Colonnes manquantes: VHP"]);
        assert!(report.for_scope("ClassA").is_empty());
    }

    #[test]
    fn row_ids_are_contiguous_across_sheets() {
        let a = sheet(
            "A",
            &["Matière", "VHP"],
            vec![vec![s("M1"), Data::Int(10)], vec![s("M2"), Data::Int(12)]],
        );
        let b = sheet("B", &["Matière", "VHP"], vec![vec![s("M3"), Data::Int(8)]]);
        let mut report = QualityReport::default();
        let rows = consolidate(&[a, b], &mut report);
        let ids: Vec<usize> = rows.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(rows[2].class_id, "B");
    }

    #[test]
    fn missing_month_columns_default_to_zero() {
        let a = sheet(
            "A",
            &["Matière", "VHP", "Fév"],
            vec![vec![s("Chimie"), s("30"), s("4,5")]],
        );
        let mut report = QualityReport::default();
        let rows = consolidate(&[a], &mut report);
        let r = &rows[0];
        assert_eq!(r.planned_hours, 30.0);
        assert_eq!(r.monthly_hours[4], 4.5); // Fév
        assert_eq!(r.realized_hours, 4.5);
        let others: f64 = r
            .monthly_hours
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 4)
            .map(|(_, h)| h)
            .sum();
        assert_eq!(others, 0.0);
    }

    #[test]
    fn header_aliases_and_dirty_cells_are_tolerated() {
        let a = sheet(
            "A",
            &["Matiere", "VHP ", "Enseignant", "Mail", "Oct"],
            vec![vec![s(" Physique "), s("12,5 h"), s("Ndiaye"), s(" A.Ndiaye@Univ.SN "), s("—")]],
        );
        let mut report = QualityReport::default();
        let rows = consolidate(&[a], &mut report);
        let r = &rows[0];
        assert_eq!(r.subject, "Physique");
        assert_eq!(r.planned_hours, 12.5);
        assert_eq!(r.responsible, "Ndiaye");
        assert_eq!(r.contact, "a.ndiaye@univ.sn");
        assert_eq!(r.monthly_hours[0], 0.0);
        assert!(report.is_empty());
    }

    #[test]
    fn duplicate_columns_are_flagged_but_not_fatal() {
        let a = sheet(
            "A",
            &["Matière", "VHP", "VHP"],
            vec![vec![s("SVT"), Data::Int(10), Data::Int(99)]],
        );
        let mut report = QualityReport::default();
        let rows = consolidate(&[a], &mut report);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].planned_hours, 10.0); // first occurrence wins
        assert_eq!(report.for_scope("A"), ["Colonnes dupliquées détectées."]);
    }

    #[test]
    fn blank_subject_sheet_diagnostic() {
        let a = sheet(
            "A",
            &["Matière", "VHP"],
            vec![
                vec![Data::Empty, Data::Int(10)],
                vec![s("Math"), Data::Int(10)],
                vec![Data::Empty, Data::Int(10)],
            ],
        );
        let mut report = QualityReport::default();
        consolidate(&[a], &mut report);
        assert_eq!(
            report.for_scope("A"),
            ["Beaucoup de valeurs manquantes dans 'Matière' (>20%)."]
        );
    }

    #[test]
    fn global_warnings_on_blank_subjects_and_missing_plans() {
        let a = sheet(
            "A",
            &["Matière", "VHP"],
            vec![
                vec![Data::Empty, Data::Int(0)],
                vec![s("M1"), Data::Int(10)],
                vec![s("M2"), Data::Int(10)],
            ],
        );
        let mut report = QualityReport::default();
        consolidate(&[a], &mut report);
        let global = report.for_scope(GLOBAL_SCOPE);
        assert!(global.iter().any(|m| m.contains("5%")), "{global:?}");
        assert!(global.iter().any(|m| m.contains("10%")), "{global:?}");
    }

    #[test]
    fn all_sheets_rejected_yields_empty_table() {
        let a = sheet("A", &["Libellé"], vec![vec![s("x")]]);
        let mut report = QualityReport::default();
        let rows = consolidate(&[a], &mut report);
        assert!(rows.is_empty());
        assert_eq!(report.for_scope("A"), ["Colonnes manquantes: Matière, VHP"]);
        assert!(report.for_scope(GLOBAL_SCOPE).is_empty());
    }

    #[test]
    fn fully_empty_rows_are_dropped() {
        let a = sheet(
            "A",
            &["Matière", "VHP"],
            vec![
                vec![s("Math"), Data::Int(10)],
                vec![Data::Empty, Data::Empty],
            ],
        );
        let mut report = QualityReport::default();
        let rows = consolidate(&[a], &mut report);
        assert_eq!(rows.len(), 1);
        assert!(report.is_empty());
    }
}

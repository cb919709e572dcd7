use crate::types::{Row, MOIS};
use serde::Serialize;
use std::error::Error;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Export the consolidated wide table, one column per month. Written by
/// hand because the month columns live in an array, not in named fields.
pub fn write_rows_csv(path: &str, rows: &[Row]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header: Vec<String> = ["RowId", "Classe", "Semestre", "Matière", "Responsable", "Email", "VHP"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(MOIS.iter().map(|m| m.to_string()));
    header.extend(
        ["VHR", "Écart", "Taux", "Statut", "Début prévu", "Fin prévue", "Observations"]
            .iter()
            .map(|s| s.to_string()),
    );
    wtr.write_record(&header)?;

    for r in rows {
        let mut record: Vec<String> = vec![
            r.row_id.to_string(),
            r.class_id.clone(),
            r.semester.clone(),
            r.subject.clone(),
            r.responsible.clone(),
            r.contact.clone(),
            r.planned_hours.to_string(),
        ];
        record.extend(r.monthly_hours.iter().map(|h| h.to_string()));
        record.extend([
            r.realized_hours.to_string(),
            r.gap.to_string(),
            format!("{:.4}", r.completion_rate),
            r.status.label().to_string(),
            r.planned_start.clone(),
            r.planned_end.clone(),
            r.notes.clone(),
        ]);
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Print the first `max_rows` rows of a report as a markdown table.
pub fn preview_table<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(aucune ligne)\n");
        return;
    }
    let table = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table);
}

// Presentation aggregates over the consolidated table. Everything here is a
// read-only consumer of the pipeline output plus the alert thresholds; the
// pipeline itself never looks at thresholds.
use crate::types::{
    AlertRow, ClassSummaryRow, LongRow, MonthlyTotalRow, ResponsibleSummaryRow, Row, Status,
    SummaryStats, Thresholds, MOIS,
};
use crate::util::{average, format_number, parse_date_dayfirst};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Display label for rows with no responsible assigned. Presentation-only:
/// the table itself keeps the empty sentinel.
const UNASSIGNED: &str = "Non assigné";

pub fn summary_stats(rows: &[Row], thresholds: &Thresholds) -> SummaryStats {
    let mut classes: Vec<&str> = rows.iter().map(|r| r.class_id.as_str()).collect();
    classes.sort_unstable();
    classes.dedup();

    let rates: Vec<f64> = rows.iter().map(|r| r.completion_rate).collect();
    SummaryStats {
        subjects: rows.len(),
        classes: classes.len(),
        total_planned_hours: rows.iter().map(|r| r.planned_hours).sum(),
        total_realized_hours: rows.iter().map(|r| r.realized_hours).sum(),
        mean_completion_rate: average(&rates),
        done: rows.iter().filter(|r| r.status == Status::Done).count(),
        in_progress: rows.iter().filter(|r| r.status == Status::InProgress).count(),
        not_started: rows.iter().filter(|r| r.status == Status::NotStarted).count(),
        on_track: rows
            .iter()
            .filter(|r| r.completion_rate >= thresholds.taux_vert)
            .count(),
        at_risk: rows
            .iter()
            .filter(|r| r.completion_rate < thresholds.taux_orange)
            .count(),
    }
}

/// Per-class synthesis: one line per class, sorted by class name.
pub fn class_summary(rows: &[Row], thresholds: &Thresholds) -> Vec<ClassSummaryRow> {
    #[derive(Default)]
    struct Acc {
        rates: Vec<f64>,
        planned: f64,
        realized: f64,
        backlog: f64,
        done: usize,
        not_started: usize,
    }

    let mut by_class: BTreeMap<&str, Acc> = BTreeMap::new();
    for r in rows {
        let acc = by_class.entry(r.class_id.as_str()).or_default();
        acc.rates.push(r.completion_rate);
        acc.planned += r.planned_hours;
        acc.realized += r.realized_hours;
        if r.gap < 0.0 {
            acc.backlog += r.gap;
        }
        match r.status {
            Status::Done => acc.done += 1,
            Status::NotStarted => acc.not_started += 1,
            Status::InProgress => {}
        }
    }

    by_class
        .into_iter()
        .map(|(class_id, acc)| {
            let subjects = acc.rates.len();
            let nd_fraction = acc.not_started as f64 / subjects as f64;
            ClassSummaryRow {
                class_id: class_id.to_string(),
                subjects,
                mean_rate: format!("{:.1}%", average(&acc.rates) * 100.0),
                total_planned: format_number(acc.planned, 0),
                total_realized: format_number(acc.realized, 0),
                backlog_hours: format_number(acc.backlog, 0),
                done: acc.done,
                not_started: acc.not_started,
                flag: if nd_fraction > thresholds.max_non_demarre {
                    format!("Non démarré > {:.0}%", thresholds.max_non_demarre * 100.0)
                } else {
                    String::new()
                },
            }
        })
        .collect()
}

/// Per-responsible synthesis, sorted by name; the empty sentinel shows as
/// "Non assigné".
pub fn responsible_summary(rows: &[Row]) -> Vec<ResponsibleSummaryRow> {
    #[derive(Default)]
    struct Acc {
        rates: Vec<f64>,
        planned: f64,
        realized: f64,
        not_started: usize,
    }

    let mut by_resp: BTreeMap<&str, Acc> = BTreeMap::new();
    for r in rows {
        let name = if r.responsible.is_empty() {
            UNASSIGNED
        } else {
            r.responsible.as_str()
        };
        let acc = by_resp.entry(name).or_default();
        acc.rates.push(r.completion_rate);
        acc.planned += r.planned_hours;
        acc.realized += r.realized_hours;
        if r.status == Status::NotStarted {
            acc.not_started += 1;
        }
    }

    by_resp
        .into_iter()
        .map(|(name, acc)| ResponsibleSummaryRow {
            responsible: name.to_string(),
            subjects: acc.rates.len(),
            mean_rate: format!("{:.1}%", average(&acc.rates) * 100.0),
            total_planned: format_number(acc.planned, 0),
            total_realized: format_number(acc.realized, 0),
            not_started: acc.not_started,
        })
        .collect()
}

/// Rule-based alert list, highest priority first, ties broken by the most
/// negative gap. Date rules parse the free-text planned dates best-effort
/// (day first); an unparseable date never triggers a date rule.
pub fn alerts(rows: &[Row], thresholds: &Thresholds, today: NaiveDate) -> Vec<AlertRow> {
    let mut flagged: Vec<(i32, f64, AlertRow)> = Vec::new();

    for r in rows {
        let start = parse_date_dayfirst(&r.planned_start);
        let end = parse_date_dayfirst(&r.planned_end);

        let end_passed = r.status != Status::Done && end.is_some_and(|d| d < today);
        let critical_gap = r.gap <= thresholds.ecart_critique;
        let not_started =
            r.status == Status::NotStarted && start.map_or(true, |d| d <= today);

        let mut reasons = Vec::new();
        if end_passed {
            reasons.push("Fin dépassée");
        }
        if critical_gap {
            reasons.push("Retard critique");
        }
        if not_started {
            reasons.push("Non démarré");
        }
        if reasons.is_empty() {
            continue;
        }

        let priority = (end_passed as i32) * 3 + (critical_gap as i32) * 2 + (not_started as i32);
        flagged.push((
            priority,
            r.gap,
            AlertRow {
                class_id: r.class_id.clone(),
                subject: r.subject.clone(),
                responsible: r.responsible.clone(),
                planned_hours: r.planned_hours,
                realized_hours: r.realized_hours,
                gap: r.gap,
                rate_pct: format!("{:.1}%", r.completion_rate * 100.0),
                status: r.status,
                reason: reasons.join(" • "),
            },
        ));
    }

    flagged.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    });
    flagged.into_iter().map(|(_, _, row)| row).collect()
}

/// Hours per month over the long table, in fixed chronological order.
pub fn monthly_totals(long: &[LongRow]) -> Vec<MonthlyTotalRow> {
    let mut sums = [0.0f64; 11];
    for e in long {
        if e.month_idx >= 1 && e.month_idx <= MOIS.len() {
            sums[e.month_idx - 1] += e.hours;
        }
    }
    MOIS.iter()
        .copied()
        .zip(sums)
        .map(|(month, hours)| MonthlyTotalRow {
            month,
            hours: format_number(hours, 1),
        })
        .collect()
}

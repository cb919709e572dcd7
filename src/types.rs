use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

/// Fixed academic-year month cycle, October through August (11 entries).
/// Column order here is the canonical chronological order everywhere else.
pub const MOIS: [&str; 11] = [
    "Oct", "Nov", "Déc", "Jan", "Fév", "Mars", "Avril", "Mai", "Juin", "Juil", "Août",
];

/// Position of a month name inside [`MOIS`], or `None` for an unknown name.
pub fn mois_index(name: &str) -> Option<usize> {
    MOIS.iter().position(|m| *m == name)
}

/// Scope key used for workbook-wide diagnostics in a [`QualityReport`].
pub const GLOBAL_SCOPE: &str = "__GLOBAL__";

/// Automatic progress classification, a pure function of (VHR, VHP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NotStarted,
    InProgress,
    Done,
}

impl Status {
    /// Display label used in exports and console tables.
    pub fn label(&self) -> &'static str {
        match self {
            Status::NotStarted => "Non démarré",
            Status::InProgress => "En cours",
            Status::Done => "Terminé",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// One class×subject record of the consolidated table.
///
/// `monthly_hours` is index-aligned with [`MOIS`] and always fully populated;
/// absent or unparseable cells are 0. The derived fields (`realized_hours`,
/// `gap`, `completion_rate`, `status`) are recomputed whenever the active
/// month range changes, everything else is fixed at load time.
#[derive(Debug, Clone)]
pub struct Row {
    /// Unique, contiguous from 0, assigned once over the final concatenated
    /// order. Stable join key between the wide table and its long projection.
    pub row_id: usize,
    /// Source sheet name.
    pub class_id: String,
    pub subject: String,
    pub semester: String,
    pub responsible: String,
    pub contact: String,
    pub planned_hours: f64,
    pub monthly_hours: [f64; 11],
    pub planned_start: String,
    pub planned_end: String,
    pub notes: String,
    pub realized_hours: f64,
    pub gap: f64,
    pub completion_rate: f64,
    pub status: Status,
    pub subject_is_blank: bool,
}

/// One (row, month) pair of the long-format projection. Identifying fields
/// are copied verbatim from the parent [`Row`].
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct LongRow {
    #[serde(rename = "RowId")]
    #[tabled(rename = "RowId")]
    pub row_id: usize,
    #[serde(rename = "Classe")]
    #[tabled(rename = "Classe")]
    pub class_id: String,
    #[serde(rename = "Semestre")]
    #[tabled(rename = "Semestre")]
    pub semester: String,
    #[serde(rename = "Matière")]
    #[tabled(rename = "Matière")]
    pub subject: String,
    #[serde(rename = "Responsable")]
    #[tabled(rename = "Responsable")]
    pub responsible: String,
    #[serde(rename = "VHP")]
    #[tabled(rename = "VHP")]
    pub planned_hours: f64,
    #[serde(rename = "VHR")]
    #[tabled(rename = "VHR")]
    pub realized_hours: f64,
    #[serde(rename = "Écart")]
    #[tabled(rename = "Écart")]
    pub gap: f64,
    #[serde(rename = "Taux")]
    #[tabled(rename = "Taux")]
    pub completion_rate: f64,
    #[serde(rename = "Statut")]
    #[tabled(rename = "Statut")]
    pub status: Status,
    #[serde(rename = "Observations")]
    #[tabled(rename = "Observations")]
    pub notes: String,
    #[serde(rename = "Mois")]
    #[tabled(rename = "Mois")]
    pub month: &'static str,
    /// 1-based fixed ordinal of the month, for chronological sorting
    /// independent of any locale string order.
    #[serde(rename = "MoisIdx")]
    #[tabled(rename = "MoisIdx")]
    pub month_idx: usize,
    #[serde(rename = "Heures")]
    #[tabled(rename = "Heures")]
    pub hours: f64,
}

/// Structural data-quality diagnostics collected during a workbook load,
/// keyed by sheet name or [`GLOBAL_SCOPE`]. Purely informational: the load
/// itself succeeds even when every sheet is rejected.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    issues: BTreeMap<String, Vec<String>>,
}

impl QualityReport {
    pub fn note(&mut self, scope: &str, message: String) {
        self.issues.entry(scope.to_string()).or_default().push(message);
    }

    pub fn for_scope(&self, scope: &str) -> &[String] {
        self.issues.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.issues.iter()
    }
}

/// Alert thresholds consumed by the reporting layer. The pipeline itself
/// never enforces them.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Completion rate at or above which a row counts as on track.
    pub taux_vert: f64,
    /// Completion rate below which a row is in alert.
    pub taux_orange: f64,
    /// Gap (hours) at or below which a row is critically behind.
    pub ecart_critique: f64,
    /// Not-started fraction above which a class is flagged.
    pub max_non_demarre: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            taux_vert: 0.90,
            taux_orange: 0.60,
            ecart_critique: -6.0,
            max_non_demarre: 0.25,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ClassSummaryRow {
    #[serde(rename = "Classe")]
    #[tabled(rename = "Classe")]
    pub class_id: String,
    #[serde(rename = "Matieres")]
    #[tabled(rename = "Matieres")]
    pub subjects: usize,
    #[serde(rename = "TauxMoyen")]
    #[tabled(rename = "TauxMoyen")]
    pub mean_rate: String,
    #[serde(rename = "VHPTotal")]
    #[tabled(rename = "VHPTotal")]
    pub total_planned: String,
    #[serde(rename = "VHRTotal")]
    #[tabled(rename = "VHRTotal")]
    pub total_realized: String,
    #[serde(rename = "RetardH")]
    #[tabled(rename = "RetardH")]
    pub backlog_hours: String,
    #[serde(rename = "Terminees")]
    #[tabled(rename = "Terminees")]
    pub done: usize,
    #[serde(rename = "NonDemarre")]
    #[tabled(rename = "NonDemarre")]
    pub not_started: usize,
    #[serde(rename = "Alerte")]
    #[tabled(rename = "Alerte")]
    pub flag: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ResponsibleSummaryRow {
    #[serde(rename = "Responsable")]
    #[tabled(rename = "Responsable")]
    pub responsible: String,
    #[serde(rename = "Matieres")]
    #[tabled(rename = "Matieres")]
    pub subjects: usize,
    #[serde(rename = "TauxMoyen")]
    #[tabled(rename = "TauxMoyen")]
    pub mean_rate: String,
    #[serde(rename = "VHPTotal")]
    #[tabled(rename = "VHPTotal")]
    pub total_planned: String,
    #[serde(rename = "VHRTotal")]
    #[tabled(rename = "VHRTotal")]
    pub total_realized: String,
    #[serde(rename = "NonDemarre")]
    #[tabled(rename = "NonDemarre")]
    pub not_started: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AlertRow {
    #[serde(rename = "Classe")]
    #[tabled(rename = "Classe")]
    pub class_id: String,
    #[serde(rename = "Matière")]
    #[tabled(rename = "Matière")]
    pub subject: String,
    #[serde(rename = "Responsable")]
    #[tabled(rename = "Responsable")]
    pub responsible: String,
    #[serde(rename = "VHP")]
    #[tabled(rename = "VHP")]
    pub planned_hours: f64,
    #[serde(rename = "VHR")]
    #[tabled(rename = "VHR")]
    pub realized_hours: f64,
    #[serde(rename = "Écart")]
    #[tabled(rename = "Écart")]
    pub gap: f64,
    #[serde(rename = "Taux")]
    #[tabled(rename = "Taux")]
    pub rate_pct: String,
    #[serde(rename = "Statut")]
    #[tabled(rename = "Statut")]
    pub status: Status,
    #[serde(rename = "Raison")]
    #[tabled(rename = "Raison")]
    pub reason: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyTotalRow {
    #[serde(rename = "Mois")]
    #[tabled(rename = "Mois")]
    pub month: &'static str,
    #[serde(rename = "Heures")]
    #[tabled(rename = "Heures")]
    pub hours: String,
}

/// Global KPI snapshot exported as JSON alongside the CSV reports.
#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub subjects: usize,
    pub classes: usize,
    pub total_planned_hours: f64,
    pub total_realized_hours: f64,
    pub mean_completion_rate: f64,
    pub done: usize,
    pub in_progress: usize,
    pub not_started: usize,
    /// Rows at or above the green completion-rate threshold.
    pub on_track: usize,
    /// Rows below the amber completion-rate threshold.
    pub at_risk: usize,
}

// Entry point and high-level CLI flow.
//
// The binary drives the pipeline interactively:
// - Options [1]/[2] load a workbook (local file or URL) and print the
//   data-quality diagnostics collected during the load.
// - Option [3] restricts the derived metrics to a contiguous month range.
// - Option [4] generates the report tables, previews them and exports
//   CSV/JSON files next to the binary.
mod columns;
mod fetch;
mod loader;
mod metrics;
mod output;
mod reports;
mod types;
mod util;

use chrono::Local;
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::Mutex;
use types::{mois_index, QualityReport, Row, Thresholds, GLOBAL_SCOPE, MOIS};

// Minimum age before a URL reload bypasses the fetch cache when the server
// exposes no validator.
const REFRESH_SECS: u64 = 300;

// One loaded workbook per process; reports can be regenerated and the
// period changed without reloading.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        rows: None,
        quality: QualityReport::default(),
        period: (0, MOIS.len() - 1),
    })
});

struct AppState {
    rows: Option<Vec<Row>>,
    quality: QualityReport,
    /// Inclusive month-index range used for reporting.
    period: (usize, usize),
}

/// Read a single line of input after printing a prompt.
fn read_line(prompt: &str) -> String {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn print_quality(report: &QualityReport) {
    if report.is_empty() {
        println!("No data-quality issues detected.\n");
        return;
    }
    println!("Data-quality diagnostics:");
    for (scope, messages) in report.iter() {
        let label = if scope == GLOBAL_SCOPE { "(global)" } else { scope };
        for m in messages {
            println!("  {label}: {m}");
        }
    }
    println!();
}

fn store_loaded(rows: Vec<Row>, quality: QualityReport) {
    let classes: std::collections::BTreeSet<&str> =
        rows.iter().map(|r| r.class_id.as_str()).collect();
    println!(
        "Workbook loaded: {} subjects across {} classes.",
        util::format_int(rows.len() as i64),
        classes.len()
    );
    if rows.is_empty() {
        println!("No usable sheet in this workbook — see the diagnostics below.");
    }
    print_quality(&quality);

    let mut state = APP_STATE.lock().unwrap();
    state.rows = Some(rows);
    state.quality = quality;
    state.period = (0, MOIS.len() - 1);
}

/// Option [1]: load a workbook from a local file.
fn handle_load_file() {
    let path = read_line("Workbook path: ");
    if path.is_empty() {
        println!("No path given.\n");
        return;
    }
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to read {path}: {e}\n");
            return;
        }
    };
    match loader::load_workbook_bytes(&bytes) {
        Ok((rows, quality)) => store_loaded(rows, quality),
        Err(e) => eprintln!("Failed to load workbook: {e}\n"),
    }
}

/// Option [2]: download the workbook, reusing cached bytes when the remote
/// change signal is unchanged.
fn handle_load_url() {
    let url = read_line("Workbook URL: ");
    if url.is_empty() {
        println!("No URL given.\n");
        return;
    }
    let signal = fetch::change_signal(&url, REFRESH_SECS);
    let bytes = match fetch::fetch_if_changed(&url, &signal) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Download failed: {e}\n");
            return;
        }
    };
    println!("Fetched {} bytes (signal {signal}).", util::format_int(bytes.len() as i64));
    match loader::load_workbook_bytes(&bytes) {
        Ok((rows, quality)) => store_loaded(rows, quality),
        Err(e) => eprintln!("Failed to load workbook: {e}\n"),
    }
}

/// Option [3]: choose the contiguous month range the reports cover.
fn handle_select_period() {
    println!("Months: {}", MOIS.join(", "));
    let start = read_line("First month: ");
    let end = read_line("Last month: ");
    let (Some(s), Some(e)) = (mois_index(&start), mois_index(&end)) else {
        println!("Unknown month name. Use the fixed spellings listed above.\n");
        return;
    };
    if s > e {
        println!("The first month must not come after the last one.\n");
        return;
    }
    let mut state = APP_STATE.lock().unwrap();
    state.period = (s, e);
    println!("Period set to {} – {}.\n", MOIS[s], MOIS[e]);
}

/// Option [4]: reproject over the selected period, generate every report,
/// preview them and export CSV/JSON files.
fn handle_generate_reports() {
    let (rows, period) = {
        let state = APP_STATE.lock().unwrap();
        (state.rows.clone(), state.period)
    };
    let Some(rows) = rows else {
        println!("Error: no workbook loaded. Use option [1] or [2] first.\n");
        return;
    };
    if rows.is_empty() {
        println!("The loaded workbook contains no usable data.\n");
        return;
    }

    let thresholds = Thresholds::default();
    let scoped = metrics::reproject_period(&rows, period.0, period.1);
    let long = metrics::unpivot_months(&scoped);
    println!(
        "Generating reports for {} – {}...\n",
        MOIS[period.0], MOIS[period.1]
    );

    if let Err(e) = output::write_rows_csv("suivi_consolide.csv", &scoped) {
        eprintln!("Write error: {e}");
    }
    if let Err(e) = output::write_csv("suivi_mensuel_long.csv", &long) {
        eprintln!("Write error: {e}");
    }

    let synth = reports::class_summary(&scoped, &thresholds);
    if let Err(e) = output::write_csv("synthese_classes.csv", &synth) {
        eprintln!("Write error: {e}");
    }
    println!("Synthèse par classe:");
    output::preview_table(&synth, 10);

    let by_resp = reports::responsible_summary(&scoped);
    if let Err(e) = output::write_csv("synthese_responsables.csv", &by_resp) {
        eprintln!("Write error: {e}");
    }
    println!("Synthèse par responsable:");
    output::preview_table(&by_resp, 10);

    let today = Local::now().date_naive();
    let alert_list = reports::alerts(&scoped, &thresholds, today);
    if let Err(e) = output::write_csv("alertes.csv", &alert_list) {
        eprintln!("Write error: {e}");
    }
    println!("Alertes ({}):", alert_list.len());
    output::preview_table(&alert_list, 12);

    let totals = reports::monthly_totals(&long);
    println!("Heures par mois:");
    output::preview_table(&totals, MOIS.len());

    let stats = reports::summary_stats(&scoped, &thresholds);
    if let Err(e) = output::write_json("summary.json", &stats) {
        eprintln!("Write error: {e}");
    }
    println!(
        "Global: {} subjects, mean completion {:.1}%, VHR {} / VHP {} h.",
        stats.subjects,
        stats.mean_completion_rate * 100.0,
        util::format_number(stats.total_realized_hours, 0),
        util::format_number(stats.total_planned_hours, 0)
    );
    println!("(Exports: suivi_consolide.csv, suivi_mensuel_long.csv, synthese_classes.csv, synthese_responsables.csv, alertes.csv, summary.json)\n");
}

fn main() {
    loop {
        println!("Suivi pédagogique mensuel");
        println!("[1] Load workbook from file");
        println!("[2] Load workbook from URL");
        println!("[3] Select month period");
        println!("[4] Generate reports");
        println!("[5] Exit\n");
        match read_line("Enter choice: ").as_str() {
            "1" => handle_load_file(),
            "2" => handle_load_url(),
            "3" => handle_select_period(),
            "4" => handle_generate_reports(),
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1-5.\n"),
        }
    }
}

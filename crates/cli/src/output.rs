//! Terminal summaries

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use towel_runner::{Outcome, RunReport};

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Ok => "✓ OK",
        Outcome::Fail => "✗ FAIL",
        Outcome::Setup => "● SETUP",
    }
}

/// Per-case table followed by the totals line
pub fn print_report(report: &RunReport) {
    if report.total == 0 {
        println!("No requests were run.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Case", "Result", "Reason"]);

    for case in &report.cases {
        let label = outcome_label(case.outcome);
        let result = match case.outcome {
            Outcome::Ok => label.green().to_string(),
            Outcome::Fail => label.red().to_string(),
            Outcome::Setup => label.yellow().to_string(),
        };
        table.add_row(vec![
            case.index.to_string(),
            case.label.clone(),
            result,
            case.reason.clone().unwrap_or_default(),
        ]);
    }

    println!("{table}");
    println!("{}", summary_line(report));
}

fn summary_line(report: &RunReport) -> String {
    let counts = format!(
        "{} passed, {} failed, {} setup in {} ms",
        report.passed, report.failed, report.setups, report.duration_ms
    );
    if report.success() {
        format!("{} {}", "✓".green(), counts)
    } else {
        format!("{} {}", "✗".red(), counts.bold())
    }
}

/// Promoted golden files
pub fn print_fixated(promoted: &[std::path::PathBuf]) {
    if promoted.is_empty() {
        println!("Nothing to fixate.");
        return;
    }
    for path in promoted {
        println!("  {} {}", "→".cyan(), path.display());
    }
    println!("{} Fixated {} response(s)", "✓".green(), promoted.len());
}

use colored::*;
use imagescan_core::registry::ScanStatus;
use imagescan_core::{FindingsReport, ImageIdentifier, RunReport, ScanOutcome, ScanSpec};
use std::collections::BTreeMap;

const SEVERITY_ORDER: [&str; 6] = ["CRITICAL", "HIGH", "MEDIUM", "LOW", "INFORMATIONAL", "UNDEFINED"];

/// Print the result of a full registry run.
pub fn print_run_report(report: &RunReport) {
    println!();
    println!(
        "{}",
        format!(
            " imagescan v{} — Registry scan in {}",
            env!("CARGO_PKG_VERSION"),
            report.region
        )
        .bold()
    );
    println!();

    println!(" {}", "Run".bold().underline());
    println!(
        " {} {} repositories, {} images scanned",
        "|-".dimmed(),
        report.repositories.len(),
        report.scanned_count()
    );
    println!(
        " {} Findings available for {} images",
        "|-".dimmed(),
        report.findings_available()
    );
    println!();

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if report.images.is_empty() {
        println!(" {} No images were scanned.", "--".dimmed());
    }

    for record in &report.images {
        println!(
            " {} {}:{}",
            status_badge(record.scan.image_scan_status.as_ref()),
            record.repository.cyan(),
            record.image_id.display_name()
        );
        match (&record.findings, &record.findings_error) {
            (Some(findings), _) => print_severity_line(findings),
            (None, Some(error)) => {
                println!("   {} {}", "findings unavailable:".yellow(), error.dimmed())
            }
            (None, None) => {}
        }
    }

    if !report.skipped.is_empty() {
        println!();
        println!(" {}", "Skipped".bold().underline());
        for skipped in &report.skipped {
            let scope = skipped
                .repository
                .as_deref()
                .map(|r| format!(" [{}]", r))
                .unwrap_or_default();
            println!(
                " {} {}{}: {}",
                "|-".dimmed(),
                skipped.stage.label().yellow(),
                scope,
                skipped.message
            );
        }
    }

    println!();
    println!(" {}", "=".repeat(60).dimmed());
    println!();
    println!(" {}", "Summary".bold().underline());
    let totals = report.total_severity_counts();
    if totals.is_empty() {
        println!(" {} No findings reported yet", "|-".dimmed());
    } else {
        println!(" {} {}", "|-".dimmed(), severity_summary(&totals));
    }
    println!();
}

/// Print the scans started for a targeted spec.
pub fn print_scan_outcomes(spec: &ScanSpec, outcomes: &[ScanOutcome]) {
    println!();
    let target = if spec.scans_all_tags() {
        "all tagged images".to_string()
    } else {
        spec.tags.join(", ")
    };
    println!(
        " {} {} ({})",
        "Scanning".bold(),
        spec.repository.cyan(),
        target
    );
    println!();

    if outcomes.is_empty() {
        println!(" {} Nothing to scan.", "--".dimmed());
    }
    for outcome in outcomes {
        let description = outcome
            .result
            .image_scan_status
            .as_ref()
            .and_then(|s| s.description.clone())
            .unwrap_or_default();
        println!(
            " {} {} {}",
            status_badge(outcome.result.image_scan_status.as_ref()),
            outcome.image_id.display_name(),
            description.dimmed()
        );
    }
    println!();
}

/// Print the findings of one image.
pub fn print_findings(repository: &str, image: &ImageIdentifier, findings: &FindingsReport) {
    println!();
    println!(
        " {} {}:{}",
        status_badge(findings.scan_status().as_ref()),
        repository.cyan(),
        image.display_name()
    );
    print_severity_line(findings);
    println!(
        "   {} {} findings listed",
        "|-".dimmed(),
        findings.finding_count()
    );
    println!();
}

fn print_severity_line(findings: &FindingsReport) {
    let counts = findings.severity_counts();
    if counts.is_empty() {
        println!("   {} no findings", "|-".dimmed());
    } else {
        println!("   {} {}", "|-".dimmed(), severity_summary(&counts));
    }
}

fn status_badge(status: Option<&ScanStatus>) -> ColoredString {
    match status.map(|s| s.status.as_str()) {
        Some("COMPLETE") => "DONE".green().bold(),
        Some("IN_PROGRESS") | Some("PENDING") => "SCAN".blue().bold(),
        Some("FAILED") => "FAIL".red().bold(),
        Some(_) => "----".yellow().bold(),
        None => "????".dimmed(),
    }
}

fn severity_summary(counts: &BTreeMap<String, u64>) -> String {
    let mut parts: Vec<String> = SEVERITY_ORDER
        .iter()
        .filter_map(|severity| counts.get(*severity).map(|n| colorize(severity, *n)))
        .collect();

    parts.extend(
        counts
            .iter()
            .filter(|(severity, _)| !SEVERITY_ORDER.contains(&severity.as_str()))
            .map(|(severity, n)| format!("{} {}", n, severity)),
    );

    parts.join(", ")
}

fn colorize(severity: &str, count: u64) -> String {
    let text = format!("{} {}", count, severity);
    match severity {
        "CRITICAL" => text.red().bold().to_string(),
        "HIGH" => text.red().to_string(),
        "MEDIUM" => text.yellow().to_string(),
        "LOW" => text.blue().to_string(),
        _ => text.dimmed().to_string(),
    }
}

//! Plain-text console report.
//!
//! Three blocks, in print order: per-session article listings, the combined
//! word-frequency table, and a one-line-per-session summary.

use crate::analyzer::FrequencyReport;
use crate::models::{ConsolidatedReport, SessionResult, SessionStatus};
use std::fmt::Write;

const RULE_WIDTH: usize = 65;

fn banner(out: &mut String, heading: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "\n{rule}").unwrap();
    writeln!(out, "  {heading}").unwrap();
    writeln!(out, "{rule}").unwrap();
}

fn status_icon(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Passed => "✅ PASSED",
        SessionStatus::Failed => "❌ FAILED",
    }
}

/// Articles of one session with original and translated titles.
pub fn render_session(out: &mut String, session: &SessionResult) {
    let icon = if session.is_passed() { "✅" } else { "❌" };
    writeln!(
        out,
        "\n  {icon} Session {}: {} [{}]",
        session.id,
        session.capability.label,
        session.status.as_str().to_uppercase()
    )
    .unwrap();
    writeln!(out, "  {}", "-".repeat(60)).unwrap();

    if let Some(err) = &session.error {
        writeln!(out, "    Error: {err}").unwrap();
    }
    for (j, article) in session.articles.iter().enumerate() {
        writeln!(out, "    [{}] ES: {}", j + 1, or_dash(&article.title)).unwrap();
        writeln!(
            out,
            "         EN: {}",
            article.title_translated.as_deref().map(or_dash).unwrap_or("—")
        )
        .unwrap();
        writeln!(
            out,
            "         🖼  {}",
            article.image_path.as_deref().unwrap_or("(no image)")
        )
        .unwrap();
    }
    if session.is_passed() && session.articles.is_empty() {
        writeln!(out, "    (no articles found)").unwrap();
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "—" } else { s }
}

/// `WORD`/`COUNT` table, or a one-liner when nothing clears the threshold.
pub fn render_frequency(out: &mut String, report: &FrequencyReport) {
    if report.is_empty() {
        writeln!(
            out,
            "  No words appear more than {} time(s).",
            report.threshold
        )
        .unwrap();
        return;
    }
    writeln!(
        out,
        "  Words appearing more than {} time(s):\n",
        report.threshold
    )
    .unwrap();
    writeln!(out, "  {:<25} {:>5}", "WORD", "COUNT").unwrap();
    writeln!(out, "  {} {}", "-".repeat(25), "-".repeat(5)).unwrap();
    for wc in &report.words {
        writeln!(out, "  {:<25} {:>5}", wc.word, wc.count).unwrap();
    }
}

pub fn render_summary(out: &mut String, sessions: &[SessionResult]) {
    writeln!(out, "  {:<3} {:<35} {:>8} {}", "#", "Session", "Articles", "Status").unwrap();
    writeln!(
        out,
        "  {} {} {} {}",
        "-".repeat(3),
        "-".repeat(35),
        "-".repeat(8),
        "-".repeat(8)
    )
    .unwrap();
    for s in sessions {
        writeln!(
            out,
            "  {:<3} {:<35} {:>8} {}",
            s.id,
            s.capability.label,
            s.articles.len(),
            status_icon(s.status)
        )
        .unwrap();
    }
}

/// The whole console report.
pub fn render_report(report: &ConsolidatedReport) -> String {
    let mut out = String::new();

    banner(&mut out, "RESULTS");
    if report.sessions.is_empty() {
        writeln!(out, "\n  No sessions were run.").unwrap();
    }
    for session in &report.sessions {
        render_session(&mut out, session);
    }

    banner(&mut out, "WORD FREQUENCY (all sessions combined)");
    render_frequency(&mut out, &report.frequency);

    banner(&mut out, "SESSION SUMMARY");
    render_summary(&mut out, &report.sessions);
    writeln!(
        out,
        "  {} passed, {} failed",
        report.passed_count(),
        report.failed_count()
    )
    .unwrap();
    writeln!(out, "{}", "=".repeat(RULE_WIDTH)).unwrap();
    out
}

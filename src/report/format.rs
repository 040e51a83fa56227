// src/report/format.rs
// =============================================================================
// Turns check results into something a person can read.
//
// Three renderings:
// - format_text: a table for the terminal
// - format_html: the body of the e-mail report
// - format_json: machine-readable output for --json
//
// All of them are pure functions: same results in, same text out. The
// terminal table shows check times in the host's local timezone; the e-mail
// body is read on other machines, so it shows UTC.
// =============================================================================

use serde::Serialize;

use crate::batch::SummaryStats;
use crate::checker::{CheckResult, Status};

// Which columns the config asked us to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub show_ssl: bool,
    pub show_latency: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            show_ssl: true,
            show_latency: true,
        }
    }
}

const NOT_APPLICABLE: &str = "N/A";
const NOT_CHECKED: &str = "not checked";

// Bands used to label latency in the terminal table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBand {
    Fast,
    Slow,
    VerySlow,
}

impl LatencyBand {
    pub fn of(latency_ms: u64) -> Self {
        if latency_ms < 300 {
            LatencyBand::Fast
        } else if latency_ms < 1000 {
            LatencyBand::Slow
        } else {
            LatencyBand::VerySlow
        }
    }

    fn marker(self) -> &'static str {
        match self {
            LatencyBand::Fast => "",
            LatencyBand::Slow => " (slow)",
            LatencyBand::VerySlow => " (very slow)",
        }
    }
}

fn status_label(result: &CheckResult) -> &'static str {
    match (result.status, result.is_weak_signal()) {
        (Status::Up, false) => "UP",
        // Reachable, but the status code was never seen
        (Status::Up, true) => "UP?",
        (Status::Down, _) => "DOWN",
    }
}

fn latency_label(result: &CheckResult, options: &ReportOptions) -> String {
    match result.latency_ms {
        Some(ms) if options.show_latency && ms > 0 => format!("{}ms{}", ms, LatencyBand::of(ms).marker()),
        _ => NOT_APPLICABLE.to_string(),
    }
}

fn ssl_label(result: &CheckResult, options: &ReportOptions) -> &'static str {
    match (options.show_ssl, result.secure) {
        (false, _) => NOT_CHECKED,
        (true, true) => "HTTPS",
        (true, false) => "NO HTTPS",
    }
}

// Local wall-clock time, for the terminal only
fn time_label(result: &CheckResult) -> String {
    result
        .checked_at
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S")
        .to_string()
}

fn utc_time_label(result: &CheckResult) -> String {
    result.checked_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// The block printed under the table
fn format_summary(summary: &SummaryStats) -> String {
    let avg = summary
        .avg_latency_ms
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| NOT_APPLICABLE.to_string());

    format!(
        "📊 Summary:\n   ✅ Up: {}\n   ❌ Down: {}\n   📋 Total: {}\n   ⏱️  Avg latency: {}\n",
        summary.up, summary.down, summary.total, avg
    )
}

/// Renders results as a terminal table followed by the summary.
///
/// The output only depends on `results` and `options`, except for the
/// CHECKED column, which is rendered in the host's local timezone.
pub fn format_text(results: &[CheckResult], options: &ReportOptions) -> String {
    let mut out = format!(
        "{:<50} {:<6} {:<20} {:<12} {:<10}\n",
        "URL", "STATUS", "LATENCY", "SSL", "CHECKED"
    );
    out.push_str(&"=".repeat(102));
    out.push('\n');
    out.push_str(&format_rows(results, options));
    out.push('\n');
    out.push_str(&format_summary(&SummaryStats::from_results(results)));

    if results.iter().any(CheckResult::is_weak_signal) {
        out.push_str("\nUP? = answered the fallback request, status code not observed\n");
    }
    out
}

fn format_rows(results: &[CheckResult], options: &ReportOptions) -> String {
    let mut out = String::new();

    for result in results {
        // Truncate URL if too long for display
        let url_display = if result.url.chars().count() > 47 {
            format!("{}...", result.url.chars().take(47).collect::<String>())
        } else {
            result.url.clone()
        };

        out.push_str(&format!(
            "{:<50} {:<6} {:<20} {:<12} {:<10}\n",
            url_display,
            status_label(result),
            latency_label(result, options),
            ssl_label(result, options),
            time_label(result)
        ));
    }

    out
}

// Renders the e-mail body
//
// URLs come from a user-provided file, so they are escaped before going
// into HTML.
pub fn format_html(results: &[CheckResult]) -> String {
    let mut content = String::from("<h3>Check results:</h3><ul>");

    for result in results {
        let latency = result
            .latency_ms
            .filter(|&ms| ms > 0)
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| NOT_APPLICABLE.to_string());

        content.push_str(&format!("<li><strong>{}</strong>:<br>", escape_html(&result.url)));
        content.push_str(&format!("- Status: {}<br>", status_label(result)));
        content.push_str(&format!("- Latency: {}<br>", latency));
        content.push_str(&format!("- HTTPS: {}<br>", if result.secure { "yes" } else { "no" }));
        content.push_str(&format!("- Checked at: {}<br></li>", utc_time_label(result)));
    }

    content.push_str("</ul>");
    content
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Serialize)]
struct JsonReport<'a> {
    results: &'a [CheckResult],
    summary: SummaryStats,
}

pub fn format_json(results: &[CheckResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        results,
        summary: SummaryStats::from_results(results),
    })
}

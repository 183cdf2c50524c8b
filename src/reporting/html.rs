//! # HTML Reporting Module / HTML 报告模块
//!
//! This module renders a self-contained HTML report with run statistics, one
//! row per job and a collapsible step table with captured output.
//!
//! 此模块生成一个独立的 HTML 报告，包含运行统计、每个作业一行，以及可折叠的步骤表格和捕获的输出。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

use crate::core::models::{JobResult, StepStatus};
use crate::infra::t;

const HTML_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 2em; color: #24292f; }
h1 { margin-bottom: 0.2em; }
.meta { color: #57606a; margin-bottom: 1.5em; }
.stats span { display: inline-block; margin-right: 1.5em; font-weight: 600; }
table { border-collapse: collapse; width: 100%; margin-top: 1em; }
th, td { border: 1px solid #d0d7de; padding: 6px 10px; text-align: left; vertical-align: top; }
th { background: #f6f8fa; }
details summary { cursor: pointer; }
pre { background: #0d1117; color: #c9d1d9; padding: 0.8em; overflow-x: auto; max-height: 30em; }
.status-passed { color: #1a7f37; }
.status-failed { color: #cf222e; }
.status-timeout { color: #bc4c00; }
.status-allowed-failure { color: #9a6700; }
.status-skipped { color: #6e7781; }
"#;

/// Generates an HTML report from job results.
///
/// # Errors
/// Returns an error if the report cannot be written to `output_path`.
///
/// 从作业结果生成 HTML 报告。如果无法写入 `output_path` 则返回错误。
pub fn generate_html_report(results: &[JobResult], output_path: &Path, locale: &str) -> Result<()> {
    let markup = render_report(results, locale);
    fs::write(output_path, markup.into_string())
        .with_context(|| format!("Failed to write HTML report to {}", output_path.display()))
}

pub fn render_report(results: &[JobResult], locale: &str) -> Markup {
    let total = results.len();
    let passed = results
        .iter()
        .filter(|r| matches!(r, JobResult::Passed { .. }))
        .count();
    let failed = results.iter().filter(|r| r.is_unexpected_failure()).count();
    let allowed = results.iter().filter(|r| r.is_allowed_failure()).count();
    let skipped = total - passed - failed - allowed;
    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale)) }
                div.meta {
                    (t!("html_report.generated_at", locale = locale, time = &generated_at))
                    " · " (std::env::consts::OS) "/" (std::env::consts::ARCH)
                }
                div.stats {
                    span { (t!("html_report.total", locale = locale)) ": " (total) }
                    span.status-passed { (t!("html_report.passed", locale = locale)) ": " (passed) }
                    span.status-failed { (t!("html_report.failed", locale = locale)) ": " (failed) }
                    span.status-allowed-failure { (t!("html_report.allowed_failures", locale = locale)) ": " (allowed) }
                    span.status-skipped { (t!("html_report.skipped", locale = locale)) ": " (skipped) }
                }
                table {
                    thead {
                        tr {
                            th { "#" }
                            th { (t!("html_report.job", locale = locale)) }
                            th { (t!("html_report.status", locale = locale)) }
                            th { (t!("html_report.duration", locale = locale)) }
                            th { (t!("html_report.steps", locale = locale)) }
                        }
                    }
                    tbody {
                        @for result in results {
                            (render_job_row(result, locale))
                        }
                    }
                }
            }
        }
    }
}

fn render_job_row(result: &JobResult, locale: &str) -> Markup {
    let job = result.job();
    let duration = result
        .duration()
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string());

    html! {
        tr {
            td { (job.number) }
            td {
                strong { (job.name) }
                @if !job.env.is_empty() {
                    br;
                    code {
                        @for (key, value) in &job.env {
                            (key) "=" (value) " "
                        }
                    }
                }
            }
            td class=(result.status_class()) { (result.status_str(locale)) }
            td { (duration) }
            td {
                @if result.steps().is_empty() {
                    "-"
                } @else {
                    details open[result.is_unexpected_failure()] {
                        summary { (result.steps().len()) " " (t!("html_report.steps", locale = locale)) }
                        table {
                            @for step in result.steps() {
                                tr {
                                    td { (step.phase.as_str()) }
                                    td { (step.name) }
                                    td class=(step_class(&step.status)) { (step.status.status_str(locale)) }
                                    td { (format!("{:.2}s", step.duration.as_secs_f64())) }
                                }
                                @if !step.output.trim().is_empty() {
                                    tr {
                                        td colspan="4" {
                                            pre {
                                                @if !step.command.is_empty() { "$ " (step.command) "\n" }
                                                (step.output)
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn step_class(status: &StepStatus) -> &'static str {
    match status {
        StepStatus::Passed => "status-passed",
        StepStatus::Failed { .. } => "status-failed",
        StepStatus::Skipped | StepStatus::NotRun => "status-skipped",
    }
}

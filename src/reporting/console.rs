//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints the job summary, the details of unexpected failures and
//! the dry-run view of the matrix used by `list`.
//!
//! 此模块打印作业摘要、意外失败的详细信息以及 `list` 使用的矩阵预演视图。

use colored::*;

use crate::core::config::{Phase, PipelineConfig};
use crate::core::environment::{self, RunContext};
use crate::core::matrix::Job;
use crate::core::models::{JobResult, StepStatus};
use crate::infra::command::output_excerpt;
use crate::infra::t;

/// Lines of step output shown per failed step.
const FAILURE_OUTPUT_LINES: usize = 60;

/// Prints a formatted summary of job results to the console.
///
/// 在控制台打印格式化的作业结果摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Pipeline Summary ---
///   - Status           | #  | Job                                      |   Duration
///   - Passed           | 1  | PYTHON=3.5 NUMPY_VERSION=1.11            |      12.31s
///   - Failed           | 2  | PYTHON=3.5 NUMPY_VERSION=1.12            |       4.05s
///   - Skipped          | 3  | docs                                     |        N/A
/// ```
pub fn print_summary(results: &[JobResult], locale: &str) {
    println!("\n{}", t!("summary_banner", locale = locale).bold());

    for result in results {
        let status_str = result.status_str(locale);
        let duration_str = result
            .duration()
            .map(|d| format!("{:.2?}", d))
            .unwrap_or_else(|| "N/A".to_string());

        let retries_str = if result.attempts() > 1 {
            format!(
                " {}",
                t!("summary_retries", locale = locale, count = result.attempts() - 1)
            )
        } else {
            String::new()
        };

        let status_colored = match result {
            JobResult::Passed { .. } => status_str.green(),
            JobResult::Failed { .. } if result.is_allowed_failure() => status_str.yellow(),
            JobResult::Failed { .. } => status_str.red(),
            JobResult::Skipped { .. } => status_str.dimmed(),
        };

        println!(
            "  - {:<18} | {:<3} | {:<40} | {:>10}{}",
            status_colored,
            result.job().number,
            result.job_name(),
            duration_str,
            retries_str
        );
    }

    let passed = results
        .iter()
        .filter(|r| matches!(r, JobResult::Passed { .. }))
        .count();
    let failed = results.iter().filter(|r| r.is_failure()).count();
    let skipped = results.len() - passed - failed;
    println!(
        "\n{}",
        t!(
            "summary_counts",
            locale = locale,
            total = results.len(),
            passed = passed,
            failed = failed,
            skipped = skipped
        )
    );
}

/// Prints the failed steps of every unexpectedly failed job: the command and
/// the tail of its captured output.
///
/// 打印每个意外失败作业中失败的步骤：命令及其捕获输出的末尾部分。
pub fn print_unexpected_failure_details(unexpected_failures: &[&JobResult], locale: &str) {
    if unexpected_failures.is_empty() {
        return;
    }

    println!("\n{}", t!("unexpected_failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in unexpected_failures.iter().enumerate() {
        let reason = match result {
            JobResult::Failed { reason, .. } => format!("{:?}", reason),
            _ => continue,
        };
        println!(
            "[{}/{}] {} '{}' ({})",
            i + 1,
            unexpected_failures.len(),
            t!("report_header_failure", locale = locale).red(),
            result.job_name().cyan(),
            reason
        );

        for step in result.failed_steps() {
            println!(
                "\n--- {} {} / {} ---",
                t!("step_log", locale = locale).yellow(),
                step.phase,
                step.name
            );
            if !step.command.is_empty() {
                println!("$ {}", step.command);
            }
            println!("{}", output_excerpt(&step.output, FAILURE_OUTPUT_LINES));
        }
        if result.is_timeout() {
            println!("\n{}", t!("timeout_log", locale = locale).yellow());
        }
        println!("\n{}", "-".repeat(80));
    }
}

/// Prints every job with its matrix variables and, for each step, whether its
/// guard holds for that job. Nothing is executed.
///
/// 打印每个作业及其矩阵变量，并为每个步骤显示其守卫对该作业是否成立。不执行任何内容。
pub fn print_job_plan(jobs: &[Job], config: &PipelineConfig, ctx: &RunContext, locale: &str) {
    println!(
        "{}",
        t!("list.header", locale = locale, count = jobs.len()).bold()
    );

    for job in jobs {
        let env = environment::resolve(config, job, &ctx.project_root, ctx);
        let mut flags = Vec::new();
        if job.is_flaky_here() {
            flags.push(t!("list.allowed_to_fail", locale = locale).to_string());
        }
        if !job.runs_on_arch(std::env::consts::ARCH) {
            flags.push(t!("list.other_arch", locale = locale).to_string());
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };

        println!("\n#{} {}{}", job.number, job.name.cyan().bold(), flags.yellow());
        for (key, value) in &job.env {
            println!("    {}={}", key, value);
        }

        for phase in Phase::ALL {
            let steps = config.steps(phase);
            if steps.is_empty() {
                continue;
            }
            println!("  {}:", phase);
            for (index, step) in steps.iter().enumerate() {
                let name = step.display_name(index);
                let runs = match step.condition() {
                    Ok(Some(guard)) => guard.evaluate(&env),
                    Ok(None) => true,
                    Err(_) => false,
                };
                let marker = if runs {
                    StepStatus::Passed.status_marker().green()
                } else {
                    StepStatus::Skipped.status_marker().dimmed()
                };
                match &step.when {
                    Some(when) => println!("    {} {}  ({})", marker, name, when.dimmed()),
                    None => println!("    {} {}", marker, name),
                }
            }
        }
    }
}

impl StepStatus {
    fn status_marker(&self) -> &'static str {
        match self {
            StepStatus::Passed => "+",
            StepStatus::Failed { .. } => "x",
            StepStatus::Skipped => "-",
            StepStatus::NotRun => ".",
        }
    }
}

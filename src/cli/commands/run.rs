//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command, which expands the matrix and
//! executes every planned job.
//!
//! 此模块实现 `run` 命令，展开矩阵并执行计划中的每个作业。

use anyhow::Result;
use colored::*;
use std::{env, path::PathBuf, sync::Arc};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use super::{RunOptions, build_context, load_pipeline};
use crate::{
    core::{execution::run_matrix, matrix, planner},
    infra::t,
    reporting::{
        generate_html_report, print_summary, print_unexpected_failure_details, write_json_report,
    },
};

/// Arguments of the `run` command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub options: RunOptions,
    /// Number of jobs run in parallel.
    pub jobs: Option<usize>,
    /// Total number of distributed runners (for CI).
    pub total_runners: Option<usize>,
    /// Index of this runner (for CI).
    pub runner_index: Option<usize>,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub filter: Option<String>,
    pub no_fail_fast: bool,
}

/// Executes the run command.
///
/// # Returns
/// An error when the pipeline cannot be loaded or when any job failed
/// unexpectedly.
pub async fn execute(args: RunArgs, explicit_language: Option<String>) -> Result<()> {
    let (mut config, config_path, locale) =
        load_pipeline(&args.options, explicit_language.as_deref())?;
    if args.no_fail_fast {
        config.matrix.fail_fast = false;
    }

    let ctx = build_context(&args.options, &locale).await?;

    println!(
        "{}",
        t!("project_root_detected", locale = locale, path = ctx.project_root.display())
    );
    println!(
        "{}",
        t!("loading_pipeline", locale = locale, path = config_path.display())
    );
    println!(
        "{}",
        t!(
            "branch_detected",
            locale = locale,
            branch = ctx.branch.yellow(),
            pull_request = ctx.pull_request.as_deref().unwrap_or("false")
        )
    );

    let overall_stop_token = setup_signal_handler(&locale);

    let jobs = matrix::expand(&config)?;
    let matrix_size = jobs.len();
    let plan = planner::plan_execution(
        jobs,
        args.total_runners,
        args.runner_index,
        args.filter.as_deref(),
    )?;

    println!(
        "{}",
        t!("matrix_expanded", locale = locale, count = matrix_size).cyan()
    );
    if plan.filtered_arch_count > 0 {
        println!(
            "{}",
            t!(
                "filtered_arch_jobs",
                locale = locale,
                filtered = plan.filtered_arch_count,
                arch = env::consts::ARCH
            )
            .cyan()
        );
    }
    if plan.filtered_name_count > 0 {
        println!(
            "{}",
            t!("filtered_name_jobs", locale = locale, filtered = plan.filtered_name_count).cyan()
        );
    }

    println!(
        "{}",
        t!("current_os", locale = locale, os = env::consts::OS).cyan()
    );

    if plan.flaky_jobs_count > 0 {
        println!(
            "{}",
            t!("flaky_jobs_found", locale = locale, count = plan.flaky_jobs_count).yellow()
        );
    }

    if let (Some(total), Some(index)) = (args.total_runners, args.runner_index) {
        println!(
            "{}",
            t!(
                "running_as_split_runner",
                locale = locale,
                index = index + 1,
                total = total,
                count = plan.jobs_to_run.len()
            )
            .bold()
        );
    } else {
        println!("{}", t!("running_as_single_runner", locale = locale).bold());
    }

    if plan.jobs_to_run.is_empty() {
        println!("{}", t!("no_jobs_to_run", locale = locale).green());
        return Ok(());
    }

    let parallelism = args.jobs.unwrap_or(num_cpus::get() / 2 + 1);
    let results = run_matrix(
        plan.jobs_to_run,
        Arc::new(config),
        Arc::new(ctx),
        parallelism,
        overall_stop_token,
    )
    .await;

    print_summary(&results, &locale);

    if let Some(report_path) = &args.html {
        println!(
            "\n{}",
            t!("html_report_generating", locale = locale, path = report_path.display())
        );
        if let Err(e) = generate_html_report(&results, report_path, &locale) {
            eprintln!("{} {:#}", t!("report_failed", locale = locale).red(), e);
        }
    }
    if let Some(report_path) = &args.json {
        if let Err(e) = write_json_report(&results, report_path) {
            eprintln!("{} {:#}", t!("report_failed", locale = locale).red(), e);
        }
    }

    let unexpected_failures: Vec<_> = results
        .iter()
        .filter(|r| r.is_unexpected_failure())
        .collect();
    if unexpected_failures.is_empty() {
        println!("\n{}", t!("all_jobs_passed", locale = locale).green().bold());
        Ok(())
    } else {
        print_unexpected_failure_details(&unexpected_failures, &locale);
        anyhow::bail!(t!(
            "pipeline_failed",
            locale = locale,
            count = unexpected_failures.len()
        )
        .to_string());
    }
}

fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\n{}", t!("shutdown_signal", locale = &locale).yellow());
            token_clone.cancel();
        }
    });

    token
}

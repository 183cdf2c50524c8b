//! # Execution Planner Module / 执行计划模块
//!
//! This module decides which jobs of the expanded matrix this runner executes
//! and in what order: architecture filtering, name filtering, flaky jobs last,
//! and sharding across several runners.
//!
//! 此模块决定此运行器执行展开矩阵中的哪些作业以及执行顺序：
//! 按架构过滤、按名称过滤、不稳定作业置后，以及在多个运行器之间分片。

use anyhow::{Result, bail};
use std::env;

use crate::core::matrix::Job;

/// Represents a complete execution plan for a pipeline matrix.
/// 表示流水线矩阵的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// The jobs this runner executes, in order.
    /// 此运行器按顺序执行的作业。
    pub jobs_to_run: Vec<Job>,
    /// The number of jobs filtered out due to architecture constraints.
    /// 由于架构约束而被过滤掉的作业数量。
    pub filtered_arch_count: usize,
    /// The number of jobs filtered out by `--filter`.
    /// 被 `--filter` 过滤掉的作业数量。
    pub filtered_name_count: usize,
    /// The number of jobs that are allowed to fail on the current platform.
    /// 在当前平台上允许失败的作业数量。
    pub flaky_jobs_count: usize,
    /// Whether the jobs are distributed across multiple runners.
    /// 作业是否分布在多个运行器上。
    pub is_distributed: bool,
}

/// Creates an execution plan for the given jobs.
///
/// # Arguments
/// * `jobs` - The expanded matrix
/// * `total_runners` - Optional total number of runners for distributed execution
/// * `runner_index` - Optional index of this runner (0-based)
/// * `filter` - Optional substring a job name must contain
pub fn plan_execution(
    jobs: Vec<Job>,
    total_runners: Option<usize>,
    runner_index: Option<usize>,
    filter: Option<&str>,
) -> Result<ExecutionPlan> {
    let current_arch = env::consts::ARCH;
    let (arch_jobs, filtered_arch_jobs): (Vec<_>, Vec<_>) = jobs
        .into_iter()
        .partition(|job| job.runs_on_arch(current_arch));

    let (named_jobs, filtered_name_jobs): (Vec<_>, Vec<_>) = arch_jobs
        .into_iter()
        .partition(|job| filter.is_none_or(|f| job.name.contains(f)));

    let current_os = env::consts::OS;
    let (mut safe_jobs, mut flaky_jobs): (Vec<_>, Vec<_>) = named_jobs
        .into_iter()
        .partition(|job| !job.allows_failure_on(current_os));

    // Matrix order, not name order.
    safe_jobs.sort_by_key(|job| job.number);
    flaky_jobs.sort_by_key(|job| job.number);
    let flaky_jobs_count = flaky_jobs.len();

    let mut combined = safe_jobs;
    combined.extend(flaky_jobs);

    let (jobs_to_run, is_distributed) = match (total_runners, runner_index) {
        (Some(total), Some(index)) => {
            if total == 0 || index >= total {
                bail!("Runner index must be less than total runners.");
            }
            let distributed: Vec<_> = combined
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total == index)
                .map(|(_, job)| job)
                .collect();
            (distributed, true)
        }
        (None, None) => (combined, false),
        _ => bail!("Both --total-runners and --runner-index must be provided."),
    };

    Ok(ExecutionPlan {
        jobs_to_run,
        filtered_arch_count: filtered_arch_jobs.len(),
        filtered_name_count: filtered_name_jobs.len(),
        flaky_jobs_count,
        is_distributed,
    })
}

//! # Job Execution Engine Module / 作业执行引擎模块
//!
//! This module runs jobs: it prepares the workspace and environment, runs the
//! phases in order with their guards and abort rules, and wraps everything in
//! timeout, retry, fail-fast and cancellation handling.
//!
//! 此模块负责运行作业：准备工作区和环境，按顺序运行各阶段（包括守卫和中止规则），
//! 并为整个过程提供超时、重试、快速失败和取消处理。

use anyhow::{Context, Result};
use colored::*;
use futures::{StreamExt, stream};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::{Phase, PipelineConfig, Step},
        environment::{self, JobEnv, RunContext},
        matrix::Job,
        models::{FailureReason, JobResult, StepResult, StepStatus},
    },
    infra::{command, fs, t},
};

/// Runs every job with at most `parallelism` jobs at a time.
///
/// Non-flaky failures cancel the jobs that are still pending or running when
/// the matrix is fail-fast. Cancelling `stop_token` cancels everything.
/// Results come back in matrix order.
///
/// 以最多 `parallelism` 个并发运行所有作业。
/// 当矩阵启用快速失败时，非不稳定作业的失败会取消仍在等待或运行的作业。
/// 取消 `stop_token` 会取消所有作业。结果按矩阵顺序返回。
pub async fn run_matrix(
    jobs: Vec<Job>,
    config: Arc<PipelineConfig>,
    ctx: Arc<RunContext>,
    parallelism: usize,
    stop_token: CancellationToken,
) -> Vec<JobResult> {
    let fail_fast = config.matrix.fail_fast;
    let fail_fast_token = stop_token.child_token();

    let runs = jobs.into_iter().map(|job| {
        let config = Arc::clone(&config);
        let ctx = Arc::clone(&ctx);
        let is_flaky = job.is_flaky_here();
        // Flaky jobs only stop for Ctrl-C.
        let watch = if is_flaky {
            stop_token.clone()
        } else {
            fail_fast_token.clone()
        };
        let fail_fast_token = fail_fast_token.clone();

        async move {
            // A job whose turn comes after cancellation never starts.
            if watch.is_cancelled() {
                return JobResult::Skipped { job };
            }
            let fallback = job.clone();
            let mut handle = tokio::spawn(async move { run_job(job, &config, &ctx).await });

            let result = tokio::select! {
                biased;
                _ = watch.cancelled() => {
                    handle.abort();
                    JobResult::Skipped { job: fallback }
                }
                joined = &mut handle => match joined {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => internal_failure(fallback, format!("{:#}", e)),
                    Err(e) => internal_failure(fallback, e.to_string()),
                },
            };

            if fail_fast && !is_flaky && result.is_failure() {
                fail_fast_token.cancel();
            }
            result
        }
    });

    let mut results: Vec<JobResult> = stream::iter(runs)
        .buffer_unordered(parallelism.max(1))
        .collect()
        .await;
    results.sort_by_key(|r| r.job().number);
    results
}

/// The main entry point for running a single job.
/// It wraps the phase execution with timeout and retry handling.
///
/// # Returns
/// A `JobResult` indicating the outcome. `Err` is reserved for problems with
/// the pipeline itself, such as an unparsable guard.
pub async fn run_job(job: Job, config: &PipelineConfig, ctx: &RunContext) -> Result<JobResult> {
    let max_attempts = job.retries.saturating_add(1);
    let mut last_result: Option<JobResult> = None;

    for attempt in 1..=max_attempts {
        println!(
            "{}",
            t!("run.job_started", number = job.number, name = &job.name).blue()
        );

        let start_time = Instant::now();
        let mut steps = Vec::new();
        let execution = run_attempt(&job, config, ctx, &mut steps);

        let outcome = if let Some(secs) = job.timeout_secs {
            let limit = Duration::from_secs(secs);
            match tokio::time::timeout(limit, execution).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    println!(
                        "{}",
                        t!("run.job_timeout", name = &job.name, timeout = secs).red()
                    );
                    Ok(Some(FailureReason::Timeout))
                }
            }
        } else {
            execution.await
        };
        let duration = start_time.elapsed();

        let reason = outcome.with_context(|| format!("Critical error in job {}", job.name))?;
        let Some(reason) = reason else {
            if attempt > 1 {
                println!(
                    "{}",
                    t!("run.job_passed_on_retry", name = &job.name, retries = attempt - 1).green()
                );
            }
            println!(
                "{}",
                t!(
                    "run.job_passed",
                    name = &job.name,
                    duration = format!("{:.2}", duration.as_secs_f64())
                )
                .green()
            );
            return Ok(JobResult::Passed {
                job,
                steps,
                duration,
                attempts: attempt,
            });
        };

        println!(
            "{}",
            t!(
                "run.job_failed",
                name = &job.name,
                duration = format!("{:.2}", duration.as_secs_f64())
            )
            .red()
        );
        let result = JobResult::Failed {
            job: job.clone(),
            steps,
            reason,
            duration,
        };
        if reason == FailureReason::Timeout {
            return Ok(result);
        }
        if attempt < max_attempts {
            println!(
                "{}",
                t!(
                    "run.job_retrying",
                    name = &job.name,
                    attempt = attempt,
                    retries = max_attempts - 1
                )
                .yellow()
            );
        }
        last_result = Some(result);
    }

    Ok(last_result.unwrap_or(JobResult::Skipped { job }))
}

/// Runs all phases once. Step results are pushed into `steps` as they
/// complete so a timeout keeps the steps that already finished.
///
/// Returns the failure reason, or `None` when the job succeeded.
async fn run_attempt(
    job: &Job,
    config: &PipelineConfig,
    ctx: &RunContext,
    steps: &mut Vec<StepResult>,
) -> Result<Option<FailureReason>> {
    let workspace = match fs::create_job_workspace(&ctx.project_root, &job.name, config.isolate) {
        Ok(workspace) => workspace,
        Err(e) => {
            let mut step = StepResult::not_started(
                Phase::Install,
                "workspace".to_string(),
                StepStatus::Failed { code: None },
            );
            step.output = format!("{:#}", e);
            steps.push(step);
            return Ok(Some(FailureReason::Setup));
        }
    };
    let env = environment::resolve(config, job, &workspace.path, ctx);

    // Only an aborting install failure fails the job; other install steps are optional.
    let install = run_phase(Phase::Install, job, config, &env, &workspace.path, steps).await?;
    if install.aborted {
        mark_not_run(Phase::Script, config, steps);
        return Ok(Some(FailureReason::Install));
    }

    let script_ok = !run_phase(Phase::Script, job, config, &env, &workspace.path, steps)
        .await?
        .failed;

    // Follow-up phases never change the outcome of the job.
    let follow_up = if script_ok {
        Phase::AfterSuccess
    } else {
        Phase::AfterFailure
    };
    run_phase(follow_up, job, config, &env, &workspace.path, steps).await?;

    Ok(if script_ok {
        None
    } else {
        Some(FailureReason::Script)
    })
}

/// What happened while running one phase.
#[derive(Debug, Default, Clone, Copy)]
struct PhaseOutcome {
    /// At least one step failed.
    failed: bool,
    /// A failing step stopped the phase.
    aborted: bool,
}

/// Runs the steps of one phase.
async fn run_phase(
    phase: Phase,
    job: &Job,
    config: &PipelineConfig,
    env: &JobEnv,
    build_dir: &Path,
    steps: &mut Vec<StepResult>,
) -> Result<PhaseOutcome> {
    let mut outcome = PhaseOutcome::default();

    for (index, step) in config.steps(phase).iter().enumerate() {
        let name = step.display_name(index);
        if outcome.aborted {
            steps.push(StepResult::not_started(phase, name, StepStatus::NotRun));
            continue;
        }

        let guard = step
            .condition()
            .with_context(|| format!("Invalid guard on {} step '{}'", phase, name))?;
        if let Some(guard) = guard {
            if !guard.evaluate(env) {
                println!(
                    "{}",
                    t!(
                        "run.step_skipped",
                        job = &job.name,
                        phase = phase,
                        step = &name,
                        condition = guard
                    )
                    .dimmed()
                );
                steps.push(StepResult::not_started(phase, name, StepStatus::Skipped));
                continue;
            }
        }

        let result = run_step(phase, name, step, env, build_dir).await;
        if result.status.is_failure() {
            outcome.failed = true;
            outcome.aborted = step.aborts_on_failure(phase);
        }
        steps.push(result);
    }

    Ok(outcome)
}

async fn run_step(
    phase: Phase,
    name: String,
    step: &Step,
    env: &JobEnv,
    build_dir: &Path,
) -> StepResult {
    let workdir = match &step.workdir {
        Some(dir) => build_dir.join(env.expand(dir).as_ref()),
        None => build_dir.to_path_buf(),
    };

    // `sh` expands variables itself; `cmd` and direct commands are expanded here.
    let command_line = if step.shell && !cfg!(windows) {
        step.run.clone()
    } else {
        env.expand(&step.run).into_owned()
    };

    println!(
        "{}",
        t!("run.step_running", phase = phase, step = &name).cyan()
    );

    let start_time = Instant::now();
    let mut cmd = if step.shell {
        command::shell_command(&command_line)
    } else {
        match command::direct_command(&command_line) {
            Ok(cmd) => cmd,
            Err(e) => {
                return StepResult {
                    phase,
                    name,
                    command: command_line,
                    status: StepStatus::Failed { code: None },
                    duration: start_time.elapsed(),
                    output: format!("{:#}", e),
                };
            }
        }
    };
    cmd.env_clear()
        .envs(env.iter())
        .current_dir(&workdir)
        .kill_on_drop(true);

    let (status_res, output) = command::spawn_and_capture(cmd).await;
    let duration = start_time.elapsed();

    let status = match status_res {
        Ok(status) if status.success() => StepStatus::Passed,
        Ok(status) => StepStatus::Failed {
            code: status.code(),
        },
        Err(e) => {
            let output = format!(
                "{}\n{}",
                t!("run.spawn_failed", command = &command_line, error = e),
                output
            );
            return StepResult {
                phase,
                name,
                command: command_line,
                status: StepStatus::Failed { code: None },
                duration,
                output,
            };
        }
    };

    if status.is_failure() {
        println!(
            "{}",
            t!(
                "run.step_failed",
                phase = phase,
                step = &name,
                status = status.status_str(&rust_i18n::locale())
            )
            .red()
        );
    }

    StepResult {
        phase,
        name,
        command: command_line,
        status,
        duration,
        output,
    }
}

fn mark_not_run(phase: Phase, config: &PipelineConfig, steps: &mut Vec<StepResult>) {
    for (index, step) in config.steps(phase).iter().enumerate() {
        steps.push(StepResult::not_started(
            phase,
            step.display_name(index),
            StepStatus::NotRun,
        ));
    }
}

fn internal_failure(job: Job, message: String) -> JobResult {
    let mut step = StepResult::not_started(
        Phase::Install,
        "runner".to_string(),
        StepStatus::Failed { code: None },
    );
    step.output = message;
    JobResult::Failed {
        job,
        steps: vec![step],
        reason: FailureReason::Setup,
        duration: Duration::ZERO,
    }
}

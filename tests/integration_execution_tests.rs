//! # Job Execution Integration Tests / 作业执行集成测试
//!
//! These tests run real shell steps through `run_job` and `run_matrix` and
//! check phase ordering, guards, abort rules, timeouts, retries and fail-fast.
//!
//! 这些测试通过 `run_job` 和 `run_matrix` 运行真实的 shell 步骤，
//! 检查阶段顺序、守卫、中止规则、超时、重试和快速失败。

mod common;

use common::{context_for, pipeline_from};
use pipeline_matrix::config::{Phase, PipelineConfig};
use pipeline_matrix::core::environment::RunContext;
use pipeline_matrix::core::matrix::{self, Job};
use pipeline_matrix::execution::{run_job, run_matrix};
use pipeline_matrix::models::{FailureReason, JobResult, StepResult, StepStatus};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;

fn setup(content: &str) -> (TempDir, PipelineConfig, RunContext, Vec<Job>) {
    let dir = tempdir().expect("Failed to create temporary directory");
    let config = pipeline_from(content);
    let jobs = matrix::expand(&config).unwrap();
    let ctx = context_for(dir.path());
    (dir, config, ctx, jobs)
}

fn statuses(result: &JobResult) -> Vec<(Phase, String, StepStatus)> {
    result
        .steps()
        .iter()
        .map(|s: &StepResult| (s.phase, s.name.clone(), s.status))
        .collect()
}

#[cfg(all(test, unix))]
mod phase_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_job_runs_after_success() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[matrix.include]]
            name = "py35"
            env = { PYTHON_VERSION = "3.5", COVERALLS = "true" }

            [[install]]
            name = "env"
            run = "echo python=$PYTHON_VERSION"

            [[script]]
            name = "tests"
            run = "echo testing"
            when = "SKIP_TESTS != true"

            [[script]]
            name = "docs"
            run = "echo docs"
            when = "BUILD_DOCS == true"

            [[after_success]]
            name = "coverage"
            run = "echo uploading"
            when = "COVERALLS == true"

            [[after_failure]]
            name = "dump"
            run = "echo never"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(matches!(result, JobResult::Passed { attempts: 1, .. }));
        assert_eq!(
            statuses(&result),
            vec![
                (Phase::Install, "env".to_string(), StepStatus::Passed),
                (Phase::Script, "tests".to_string(), StepStatus::Passed),
                (Phase::Script, "docs".to_string(), StepStatus::Skipped),
                (Phase::AfterSuccess, "coverage".to_string(), StepStatus::Passed),
            ]
        );
        assert_eq!(result.steps()[0].output.trim(), "python=3.5");
        assert_eq!(result.steps()[0].command, "echo python=$PYTHON_VERSION");
    }

    #[tokio::test]
    async fn test_install_failure_stops_the_job() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[install]]
            name = "create-env"
            run = "echo broken >&2; exit 4"

            [[install]]
            name = "deps"
            run = "echo deps"

            [[script]]
            name = "tests"
            run = "echo testing"

            [[after_failure]]
            name = "dump"
            run = "echo dump"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(matches!(
            result,
            JobResult::Failed {
                reason: FailureReason::Install,
                ..
            }
        ));
        assert_eq!(
            statuses(&result),
            vec![
                (Phase::Install, "create-env".to_string(), StepStatus::Failed { code: Some(4) }),
                (Phase::Install, "deps".to_string(), StepStatus::NotRun),
                (Phase::Script, "tests".to_string(), StepStatus::NotRun),
            ]
        );
        assert!(result.steps()[0].output.contains("broken"));
        assert_eq!(result.failed_steps().count(), 1);
    }

    #[tokio::test]
    async fn test_optional_install_step_does_not_fail_the_job() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[install]]
            name = "optional-dep"
            run = "exit 1"
            abort_on_failure = false

            [[install]]
            name = "deps"
            run = "true"

            [[script]]
            name = "tests"
            run = "true"

            [[after_success]]
            name = "coverage"
            run = "true"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(matches!(result, JobResult::Passed { .. }), "{}", result);
        assert_eq!(
            statuses(&result),
            vec![
                (Phase::Install, "optional-dep".to_string(), StepStatus::Failed { code: Some(1) }),
                (Phase::Install, "deps".to_string(), StepStatus::Passed),
                (Phase::Script, "tests".to_string(), StepStatus::Passed),
                (Phase::AfterSuccess, "coverage".to_string(), StepStatus::Passed),
            ]
        );
    }

    #[tokio::test]
    async fn test_script_failure_runs_after_failure() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[script]]
            name = "tests"
            run = "exit 3"

            [[script]]
            name = "docs"
            run = "echo docs"

            [[after_success]]
            name = "coverage"
            run = "echo coverage"

            [[after_failure]]
            name = "dump"
            run = "echo dumping logs"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(matches!(
            result,
            JobResult::Failed {
                reason: FailureReason::Script,
                ..
            }
        ));
        assert_eq!(
            statuses(&result),
            vec![
                (Phase::Script, "tests".to_string(), StepStatus::Failed { code: Some(3) }),
                (Phase::Script, "docs".to_string(), StepStatus::NotRun),
                (Phase::AfterFailure, "dump".to_string(), StepStatus::Passed),
            ]
        );
    }

    #[tokio::test]
    async fn test_script_step_that_does_not_abort() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[script]]
            name = "tests"
            run = "false"
            abort_on_failure = false

            [[script]]
            name = "docs"
            run = "true"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(result.is_failure());
        assert_eq!(result.steps()[1].status, StepStatus::Passed);
    }

    #[tokio::test]
    async fn test_after_success_failure_keeps_job_passing() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[script]]
            run = "true"

            [[after_success]]
            name = "coverage"
            run = "exit 1"

            [[after_success]]
            name = "deploy"
            run = "echo deploy"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(matches!(result, JobResult::Passed { .. }));
        assert_eq!(result.steps()[1].status, StepStatus::Failed { code: Some(1) });
        // after_* steps do not abort their phase by default.
        assert_eq!(result.steps()[2].status, StepStatus::Passed);
    }

    #[tokio::test]
    async fn test_invalid_guard_is_an_error() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[script]]
            run = "true"
            when = "(("
            "#,
        );
        assert!(run_job(jobs[0].clone(), &config, &ctx).await.is_err());
    }
}

#[cfg(all(test, unix))]
mod step_tests {
    use super::*;

    #[tokio::test]
    async fn test_builtins_and_matrix_env_reach_steps() {
        let (dir, config, ctx, jobs) = setup(
            r#"
            builtin_prefix = "TRAVIS"

            [[matrix.include]]
            name = "docs"
            env = { BUILD_DOCS = "true" }

            [[script]]
            run = "echo $TRAVIS_BRANCH $TRAVIS_PULL_REQUEST $TRAVIS_JOB_NAME $BUILD_DOCS $TRAVIS_BUILD_DIR"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert_eq!(
            result.steps()[0].output.trim(),
            format!("master false docs true {}", dir.path().display())
        );
    }

    #[tokio::test]
    async fn test_workdir() {
        let (dir, config, ctx, jobs) = setup(
            r#"
            [[script]]
            run = "pwd"
            workdir = "doc"
            "#,
        );
        fs::create_dir(dir.path().join("doc")).unwrap();
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(result.steps()[0].output.trim().ends_with("/doc"));
    }

    #[tokio::test]
    async fn test_missing_workdir_fails_the_step() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[script]]
            run = "true"
            workdir = "missing"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert_eq!(result.steps()[0].status, StepStatus::Failed { code: None });
    }

    #[tokio::test]
    async fn test_direct_command_is_expanded() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [env]
            PYTHON_VERSION = "3.5"

            [[script]]
            run = "echo 'python ${PYTHON_VERSION}'"
            shell = false
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert_eq!(result.steps()[0].command, "echo 'python 3.5'");
        assert_eq!(result.steps()[0].output.trim(), "python 3.5");
    }

    #[tokio::test]
    async fn test_unknown_program_fails_the_step() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [[script]]
            run = "this_command_definitely_does_not_exist_12345"
            shell = false
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(result.is_failure());
        assert_eq!(result.steps()[0].status, StepStatus::Failed { code: None });
        assert!(!result.steps()[0].output.is_empty());
    }

    #[tokio::test]
    async fn test_isolated_workspace() {
        let (dir, config, ctx, jobs) = setup(
            r#"
            isolate = true

            [[script]]
            run = "test -f data.txt && touch created.txt && test ! -d target"
            "#,
        );
        fs::write(dir.path().join("data.txt"), "input").unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(matches!(result, JobResult::Passed { .. }), "{:?}", result);
        assert!(!dir.path().join("created.txt").exists());
    }
}

#[cfg(all(test, unix))]
mod timeout_and_retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_is_not_retried() {
        let (dir, config, ctx, jobs) = setup(
            r#"
            [job]
            timeout_secs = 1
            retries = 2

            [[script]]
            name = "quick"
            run = "echo attempt >> attempts.log"

            [[script]]
            name = "slow"
            run = "sleep 10"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(result.is_timeout());
        assert_eq!(result.status_class(), "status-timeout");
        // The step that finished before the limit is kept.
        assert_eq!(result.steps().len(), 1);
        assert_eq!(result.steps()[0].name, "quick");
        let attempts = fs::read_to_string(dir.path().join("attempts.log")).unwrap();
        assert_eq!(attempts.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_retried() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [job]
            retries = 1

            [[script]]
            run = "if [ -f marker ]; then exit 0; else touch marker; exit 1; fi"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(matches!(result, JobResult::Passed { attempts: 2, .. }));
        assert_eq!(result.attempts(), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [job]
            retries = 2

            [[script]]
            run = "exit 1"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert!(matches!(
            result,
            JobResult::Failed {
                reason: FailureReason::Script,
                ..
            }
        ));
    }
}

#[cfg(all(test, unix))]
mod matrix_run_tests {
    use super::*;

    const TWO_JOBS: &str = r#"
        [[matrix.include]]
        name = "broken"
        env = { FAIL = "1" }

        [[matrix.include]]
        name = "healthy"
        env = { FAIL = "0" }

        [[script]]
        name = "maybe-fail"
        run = "exit 1"
        when = "FAIL == 1"

        [[script]]
        name = "tests"
        run = "true"
    "#;

    async fn run_all(config: PipelineConfig, ctx: RunContext, jobs: Vec<Job>) -> Vec<JobResult> {
        run_matrix(
            jobs,
            Arc::new(config),
            Arc::new(ctx),
            1,
            CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_fail_fast_skips_remaining_jobs() {
        let (_dir, config, ctx, jobs) = setup(TWO_JOBS);
        assert!(config.matrix.fail_fast);
        let results = run_all(config, ctx, jobs).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_unexpected_failure());
        assert!(matches!(results[1], JobResult::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_without_fail_fast_every_job_runs() {
        let (_dir, mut config, ctx, jobs) = setup(TWO_JOBS);
        config.matrix.fail_fast = false;
        let results = run_all(config, ctx, jobs).await;

        assert!(results[0].is_failure());
        assert!(matches!(results[1], JobResult::Passed { .. }));
    }

    #[tokio::test]
    async fn test_flaky_failure_does_not_cancel() {
        let (_dir, config, ctx, mut jobs) = setup(TWO_JOBS);
        jobs[0].allow_failure = vec!["*".to_string()];
        let results = run_all(config, ctx, jobs).await;

        assert!(results[0].is_allowed_failure());
        assert!(!results[0].is_unexpected_failure());
        assert!(matches!(results[1], JobResult::Passed { .. }));
    }

    #[tokio::test]
    async fn test_results_in_matrix_order() {
        let (_dir, mut config, ctx, mut jobs) = setup(TWO_JOBS);
        config.matrix.fail_fast = false;
        jobs.reverse();
        let results = run_matrix(
            jobs,
            Arc::new(config),
            Arc::new(ctx),
            4,
            CancellationToken::new(),
        )
        .await;

        let numbers: Vec<_> = results.iter().map(|r| r.job().number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_everything() {
        let (_dir, config, ctx, jobs) = setup(TWO_JOBS);
        let token = CancellationToken::new();
        token.cancel();
        let results = run_matrix(jobs, Arc::new(config), Arc::new(ctx), 2, token).await;

        assert!(results.iter().all(|r| matches!(r, JobResult::Skipped { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_after_fail_fast_never_start() {
        for _ in 0..10 {
            let (dir, config, ctx, jobs) = setup(
                r#"
                [[matrix.axis]]
                name = "IDX"
                values = ["1", "2", "3", "4", "5", "6", "7", "8"]

                [[install]]
                name = "broken"
                run = "exit 1"
                when = "IDX == 1"

                [[install]]
                name = "mark"
                run = "touch ran_$CI_JOB_NUMBER"
                "#,
            );
            let results = run_all(config, ctx, jobs).await;

            assert!(results[0].is_unexpected_failure());
            assert!(results[1..].iter().all(|r| matches!(r, JobResult::Skipped { .. })));
            let marks: Vec<_> = fs::read_dir(dir.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with("ran_"))
                .map(|e| e.file_name())
                .collect();
            assert!(marks.is_empty(), "skipped jobs ran: {:?}", marks);
        }
    }

    #[tokio::test]
    async fn test_cancel_kills_running_step() {
        let (dir, config, ctx, jobs) = setup(
            r#"
            [[script]]
            name = "slow"
            run = "sleep 2; touch late.txt"
            "#,
        );
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                token.cancel();
            })
        };

        let start = Instant::now();
        let results = run_matrix(jobs, Arc::new(config), Arc::new(ctx), 1, token).await;
        canceller.await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(matches!(results[0], JobResult::Skipped { .. }));

        // The shell was killed, so its second command never runs.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("late.txt").exists());
    }
}

#[cfg(all(test, windows))]
mod windows_shell_tests {
    use super::*;

    #[tokio::test]
    async fn test_cmd_steps_are_expanded() {
        let (_dir, config, ctx, jobs) = setup(
            r#"
            [env]
            ENV_NAME = "testenv"

            [[script]]
            run = "echo $ENV_NAME"
            "#,
        );
        let result = run_job(jobs[0].clone(), &config, &ctx).await.unwrap();

        assert_eq!(result.steps()[0].command, "echo testenv");
        assert_eq!(result.steps()[0].output.trim(), "testenv");
    }
}

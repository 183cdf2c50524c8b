//! # Data Models Module / 数据模型模块
//!
//! This module defines the results produced by running a pipeline: the
//! outcome of every step, the outcome of every job and the reasons a job can
//! fail.
//!
//! 此模块定义运行流水线所产生的结果：每个步骤的结果、每个作业的结果以及作业失败的原因。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::core::config::Phase;
use crate::core::matrix::Job;
use crate::infra::t;

/// Enumerates the possible reasons for a job failure.
/// 枚举作业失败的可能原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum FailureReason {
    /// An `install` step failed; nothing after it ran.
    /// `install` 步骤失败；其后的内容都没有运行。
    Install,
    /// At least one `script` step failed.
    /// 至少一个 `script` 步骤失败。
    Script,
    /// The job exceeded its configured timeout.
    /// 作业超出了其配置的超时时间。
    Timeout,
    /// The job's workspace could not be prepared.
    /// 无法准备作业的工作区。
    Setup,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum StepStatus {
    Passed,
    /// `code` is `None` when the process could not be spawned or was killed by a signal.
    /// 当进程无法启动或被信号终止时，`code` 为 `None`。
    Failed {
        code: Option<i32>,
    },
    /// The step's guard evaluated to false.
    /// 步骤的守卫求值为假。
    Skipped,
    /// An earlier step aborted the phase.
    /// 之前的步骤中止了该阶段。
    NotRun,
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed { .. })
    }

    pub fn status_str(&self, locale: &str) -> String {
        match self {
            StepStatus::Passed => t!("step.status_passed", locale = locale).to_string(),
            StepStatus::Failed { code: Some(code) } => {
                t!("step.status_failed_code", locale = locale, code = code).to_string()
            }
            StepStatus::Failed { code: None } => {
                t!("step.status_failed", locale = locale).to_string()
            }
            StepStatus::Skipped => t!("step.status_skipped", locale = locale).to_string(),
            StepStatus::NotRun => t!("step.status_not_run", locale = locale).to_string(),
        }
    }
}

/// The outcome of one step of one job.
/// 一个作业中一个步骤的结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub phase: Phase,
    pub name: String,
    /// The command as handed to the process. `sh` steps keep their text since
    /// the shell expands it; other steps are shown after variable expansion.
    /// Empty for steps that never ran.
    /// 交给进程的命令。`sh` 步骤保留原文（由 shell 展开），其他步骤为变量展开后的结果。
    /// 对从未运行的步骤为空。
    pub command: String,
    pub status: StepStatus,
    pub duration: Duration,
    /// Combined stdout and stderr.
    /// 合并的 stdout 和 stderr。
    pub output: String,
}

impl StepResult {
    pub fn not_started(phase: Phase, name: String, status: StepStatus) -> Self {
        Self {
            phase,
            name,
            command: String::new(),
            status,
            duration: Duration::ZERO,
            output: String::new(),
        }
    }
}

/// Represents the final result of a single job.
///
/// 表示单个作业的最终结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobResult {
    Passed {
        job: Job,
        steps: Vec<StepResult>,
        duration: Duration,
        /// The number of attempts it took (1 means it passed on the first try).
        /// 所需的尝试次数（1 表示第一次尝试就通过）。
        attempts: u8,
    },
    Failed {
        job: Job,
        steps: Vec<StepResult>,
        reason: FailureReason,
        duration: Duration,
    },
    /// The job was cancelled before it finished (fail-fast or Ctrl-C).
    /// 作业在完成前被取消（快速失败或 Ctrl-C）。
    Skipped { job: Job },
}

impl JobResult {
    pub fn job(&self) -> &Job {
        match self {
            JobResult::Passed { job, .. }
            | JobResult::Failed { job, .. }
            | JobResult::Skipped { job } => job,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job().name
    }

    pub fn steps(&self) -> &[StepResult] {
        match self {
            JobResult::Passed { steps, .. } | JobResult::Failed { steps, .. } => steps,
            JobResult::Skipped { .. } => &[],
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobResult::Failed { .. })
    }

    /// A failure is "unexpected" unless the job allows failure on this OS.
    pub fn is_unexpected_failure(&self) -> bool {
        match self {
            JobResult::Failed { job, .. } => !job.is_flaky_here(),
            _ => false,
        }
    }

    pub fn is_allowed_failure(&self) -> bool {
        match self {
            JobResult::Failed { job, .. } => job.is_flaky_here(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            JobResult::Failed {
                reason: FailureReason::Timeout,
                ..
            }
        )
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            JobResult::Passed { duration, .. } | JobResult::Failed { duration, .. } => {
                Some(*duration)
            }
            JobResult::Skipped { .. } => None,
        }
    }

    pub fn attempts(&self) -> u8 {
        match self {
            JobResult::Passed { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps().iter().filter(|s| s.status.is_failure())
    }

    /// Gets the CSS class for the job status.
    pub fn status_class(&self) -> &'static str {
        match self {
            JobResult::Passed { .. } => "status-passed",
            JobResult::Failed { reason, .. } => {
                if self.is_allowed_failure() {
                    "status-allowed-failure"
                } else if *reason == FailureReason::Timeout {
                    "status-timeout"
                } else {
                    "status-failed"
                }
            }
            JobResult::Skipped { .. } => "status-skipped",
        }
    }

    /// Gets the status of the job as a string for display.
    /// 以字符串形式获取作业的状态以供显示。
    pub fn status_str(&self, locale: &str) -> String {
        match self {
            JobResult::Passed { .. } => t!("report.status_passed", locale = locale).to_string(),
            JobResult::Failed { reason, .. } => {
                if self.is_allowed_failure() {
                    t!("report.status_allowed_failure", locale = locale).to_string()
                } else if *reason == FailureReason::Timeout {
                    t!("report.status_timeout", locale = locale).to_string()
                } else {
                    t!("report.status_failed", locale = locale).to_string()
                }
            }
            JobResult::Skipped { .. } => t!("report.status_skipped", locale = locale).to_string(),
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobResult::Passed { job, attempts, .. } => {
                write!(f, "#{} {}: passed (attempts: {})", job.number, job.name, attempts)
            }
            JobResult::Failed { job, reason, .. } => {
                write!(f, "#{} {}: failed ({:?})", job.number, job.name, reason)
            }
            JobResult::Skipped { job } => write!(f, "#{} {}: skipped", job.number, job.name),
        }
    }
}

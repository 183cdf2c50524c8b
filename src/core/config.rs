//! # Pipeline Configuration Module / 流水线配置模块
//!
//! This module defines the structure of the pipeline file (`Pipeline.toml`):
//! the environment matrix, global environment variables, per-job defaults and
//! the four step phases (`install`, `script`, `after_success`, `after_failure`).
//!
//! 此模块定义流水线文件（`Pipeline.toml`）的结构：
//! 环境矩阵、全局环境变量、每个作业的默认值以及四个步骤阶段。

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::condition::Condition;
use crate::core::matrix;

/// The phases of a job, in execution order.
/// 作业的各个阶段，按执行顺序排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Environment creation and dependency installation.
    /// 环境创建和依赖安装。
    Install,
    /// The test and documentation steps.
    /// 测试和文档步骤。
    Script,
    /// Runs only when `install` and `script` succeeded (coverage upload, docs deploy).
    /// 仅当 `install` 和 `script` 成功时运行（覆盖率上传、文档部署）。
    AfterSuccess,
    /// Runs only when `script` failed.
    /// 仅当 `script` 失败时运行。
    AfterFailure,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Install,
        Phase::Script,
        Phase::AfterSuccess,
        Phase::AfterFailure,
    ];

    /// The key used for this phase in the pipeline file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Install => "install",
            Phase::Script => "script",
            Phase::AfterSuccess => "after_success",
            Phase::AfterFailure => "after_failure",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single command in one of the phases.
/// 某个阶段中的单个命令。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Step {
    /// Optional display name. Derived from the command when absent.
    /// 可选的显示名称。缺省时从命令推导。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The command line to execute.
    /// 要执行的命令行。
    pub run: String,
    /// A guard expression such as `BUILD_DOCS == true`. The step is skipped when it is false.
    /// 守卫表达式，例如 `BUILD_DOCS == true`。为假时跳过该步骤。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Working directory relative to the job's build directory.
    /// 相对于作业构建目录的工作目录。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    /// Run through the platform shell (`sh -c`). When `false` the command is
    /// split with shell-like quoting rules and executed directly.
    /// 通过平台 shell（`sh -c`）运行。为 `false` 时按 shell 引号规则拆分并直接执行。
    #[serde(default = "default_true")]
    pub shell: bool,
    /// Whether a failure of this step stops the remaining steps of its phase.
    /// 此步骤失败时是否停止其所在阶段的其余步骤。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_on_failure: Option<bool>,
}

impl Step {
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            name: None,
            run: run.into(),
            when: None,
            workdir: None,
            shell: true,
            abort_on_failure: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn when(mut self, guard: impl Into<String>) -> Self {
        self.when = Some(guard.into());
        self
    }

    /// Returns the name shown in logs and reports. `index` is 0-based.
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => {
                let program = self.run.split_whitespace().next().unwrap_or("step");
                format!("{}#{}", program, index + 1)
            }
        }
    }

    /// Install and script steps abort their phase on failure unless told otherwise.
    pub fn aborts_on_failure(&self, phase: Phase) -> bool {
        self.abort_on_failure
            .unwrap_or(matches!(phase, Phase::Install | Phase::Script))
    }

    /// Parses the guard, if any.
    pub fn condition(&self) -> Result<Option<Condition>> {
        self.when
            .as_deref()
            .map(Condition::parse)
            .transpose()
    }
}

/// One axis of the environment matrix, e.g. `NUMPY_VERSION = ["1.10", "1.11"]`.
/// 环境矩阵的一个轴。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<String>,
}

/// An explicit matrix entry appended after the cartesian product.
/// 追加在笛卡尔积之后的显式矩阵条目。
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MatrixEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_failure: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u8>,
}

/// Drops every product entry whose environment contains all of `env`.
/// 删除环境包含 `env` 全部键值的乘积条目。
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EnvPattern {
    pub env: BTreeMap<String, String>,
}

impl EnvPattern {
    pub fn matches(&self, env: &BTreeMap<String, String>) -> bool {
        self.env.iter().all(|(k, v)| env.get(k) == Some(v))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatrixConfig {
    /// Cancel the remaining jobs after the first unexpected failure.
    /// 在第一次意外失败后取消剩余作业。
    #[serde(default = "default_true")]
    pub fail_fast: bool,
    #[serde(default)]
    pub axis: Vec<Axis>,
    #[serde(default)]
    pub include: Vec<MatrixEntry>,
    #[serde(default)]
    pub exclude: Vec<EnvPattern>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            fail_fast: true,
            axis: vec![],
            include: vec![],
            exclude: vec![],
        }
    }
}

/// Options applied to every job unless a matrix entry overrides them.
/// 应用于每个作业的选项，除非矩阵条目覆盖它们。
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct JobDefaults {
    /// Wall-clock limit for one attempt of the job.
    /// 作业单次尝试的时间上限。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Extra attempts after a failure. Timeouts are never retried.
    /// 失败后的额外尝试次数。超时从不重试。
    #[serde(default)]
    pub retries: u8,
    /// Operating systems (`linux`, `macos`, `windows`, or `*`) on which a failure is tolerated.
    /// 容忍失败的操作系统（`linux`、`macos`、`windows` 或 `*`）。
    #[serde(default)]
    pub allow_failure: Vec<String>,
    /// CPU architectures the job runs on. Empty means all.
    /// 作业运行的 CPU 架构。为空表示全部。
    #[serde(default)]
    pub arch: Vec<String>,
}

/// The whole pipeline file.
/// 整个流水线文件。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,
    /// Prefix of the built-in variables (`CI_BRANCH`, `CI_BUILD_DIR`, ...).
    /// 内置变量的前缀（`CI_BRANCH`、`CI_BUILD_DIR` 等）。
    #[serde(default = "default_prefix")]
    pub builtin_prefix: String,
    /// Start every job from the runner's own process environment.
    /// 每个作业都从运行器自身的进程环境开始。
    #[serde(default = "default_true")]
    pub inherit_env: bool,
    /// Copy the project into a temporary directory for each job.
    /// 为每个作业将项目复制到临时目录中。
    #[serde(default)]
    pub isolate: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub job: JobDefaults,
    #[serde(default)]
    pub install: Vec<Step>,
    #[serde(default)]
    pub script: Vec<Step>,
    #[serde(default)]
    pub after_success: Vec<Step>,
    #[serde(default)]
    pub after_failure: Vec<Step>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            builtin_prefix: default_prefix(),
            inherit_env: true,
            isolate: false,
            env: BTreeMap::new(),
            matrix: MatrixConfig::default(),
            job: JobDefaults::default(),
            install: vec![],
            script: vec![],
            after_success: vec![],
            after_failure: vec![],
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse pipeline configuration")
    }

    pub fn steps(&self, phase: Phase) -> &[Step] {
        match phase {
            Phase::Install => &self.install,
            Phase::Script => &self.script,
            Phase::AfterSuccess => &self.after_success,
            Phase::AfterFailure => &self.after_failure,
        }
    }

    /// Checks everything that can be checked without running a job.
    ///
    /// 检查无需运行作业即可检查的所有内容。
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.builtin_prefix) {
            bail!(
                "builtin_prefix '{}' is not a valid variable name",
                self.builtin_prefix
            );
        }

        let mut axis_names = HashSet::new();
        for axis in &self.matrix.axis {
            if !is_identifier(&axis.name) {
                bail!("matrix axis name '{}' is not a valid variable name", axis.name);
            }
            if !axis_names.insert(axis.name.as_str()) {
                bail!("matrix axis '{}' is declared more than once", axis.name);
            }
            if axis.values.is_empty() {
                bail!("matrix axis '{}' has no values", axis.name);
            }
        }

        for phase in Phase::ALL {
            for (i, step) in self.steps(phase).iter().enumerate() {
                let name = step.display_name(i);
                if step.run.trim().is_empty() {
                    bail!("{} step '{}' has an empty command", phase, name);
                }
                step.condition()
                    .with_context(|| format!("Invalid guard on {} step '{}'", phase, name))?;
            }
        }

        let jobs = matrix::expand(self)?;
        if jobs.is_empty() {
            bail!("the matrix expands to zero jobs");
        }
        Ok(())
    }
}

/// Reads and parses a pipeline file, returning it with its canonical path.
///
/// 读取并解析流水线文件，并返回其规范路径。
pub fn load(path: &Path) -> Result<(PipelineConfig, PathBuf)> {
    let config_path = fs::canonicalize(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read pipeline file: {}", config_path.display()))?;
    let config = PipelineConfig::from_toml(&content)
        .with_context(|| format!("in {}", config_path.display()))?;
    Ok((config, config_path))
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn default_language() -> String {
    "en".to_string()
}

fn default_prefix() -> String {
    "CI".to_string()
}

fn default_true() -> bool {
    true
}

//! # Job Environment Module / 作业环境模块
//!
//! Builds the environment a job's steps run with. Layers are applied in
//! order, later ones overriding earlier ones:
//!
//! 构建作业步骤运行时使用的环境。各层按顺序应用，后面的覆盖前面的：
//!
//! 1. the runner's own process environment (when `inherit_env` is set),
//! 2. built-in variables (`CI`, `{P}_BRANCH`, `{P}_BUILD_DIR`, ...),
//! 3. the global `[env]` table,
//! 4. the job's matrix variables.
//!
//! Values from layers 3 and 4 may reference anything defined before them,
//! and entries of the same table may reference each other in any order.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::{Path, PathBuf};

use crate::core::config::PipelineConfig;
use crate::core::matrix::Job;

/// Information about the run that is the same for every job.
/// 对每个作业都相同的运行信息。
#[derive(Debug, Clone)]
pub struct RunContext {
    pub project_root: PathBuf,
    pub branch: String,
    /// The pull request number, or `None` for a push build.
    /// 拉取请求编号；推送构建时为 `None`。
    pub pull_request: Option<String>,
}

impl RunContext {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            branch: "unknown".to_string(),
            pull_request: None,
        }
    }
}

/// The fully resolved environment of one job.
/// 一个作业的完全解析后的环境。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobEnv {
    vars: BTreeMap<String, String>,
}

impl JobEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.vars.iter()
    }

    /// Expands `$VAR` and `${VAR}` against this environment. Unknown
    /// variables are left as written.
    ///
    /// 针对此环境展开 `$VAR` 和 `${VAR}`。未知变量保持原样。
    pub fn expand<'a>(&self, input: &'a str) -> Cow<'a, str> {
        shellexpand::env_with_context_no_errors(input, |var| self.vars.get(var))
    }
}

impl FromIterator<(String, String)> for JobEnv {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for JobEnv {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Resolves the environment of `job` running in `build_dir`.
///
/// 解析在 `build_dir` 中运行的 `job` 的环境。
pub fn resolve(config: &PipelineConfig, job: &Job, build_dir: &Path, ctx: &RunContext) -> JobEnv {
    let mut env = if config.inherit_env {
        std::env::vars().collect()
    } else {
        JobEnv::new()
    };

    for (name, value) in builtin_vars(&config.builtin_prefix, job, build_dir, ctx) {
        env.set(name, value);
    }

    apply_layer(&mut env, &config.env);
    apply_layer(&mut env, &job.env);

    env
}

/// Expands and sets one table of variables. An entry that references another
/// entry of the same table is expanded after it, so the order of the table
/// does not matter. A reference to the entry itself reads the value from the
/// layers below. Entries left in a reference cycle are expanded in name order.
fn apply_layer(env: &mut JobEnv, layer: &BTreeMap<String, String>) {
    let mut pending: BTreeMap<&str, &str> = layer
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();

    while !pending.is_empty() {
        let ready: Vec<&str> = pending
            .iter()
            .filter(|&(&name, &value)| {
                references(value)
                    .iter()
                    .all(|r| r.as_str() == name || !pending.contains_key(r.as_str()))
            })
            .map(|(&name, _)| name)
            .collect();
        let batch = if ready.is_empty() {
            pending.keys().copied().collect()
        } else {
            ready
        };

        for name in batch {
            if let Some(value) = pending.remove(name) {
                let expanded = env.expand(value).into_owned();
                env.set(name, expanded);
            }
        }
    }
}

/// Names of the variables `value` reads.
fn references(value: &str) -> Vec<String> {
    let mut names = Vec::new();
    let _ = shellexpand::env_with_context_no_errors(value, |name| {
        names.push(name.to_string());
        None::<&str>
    });
    names
}

/// The variables every job gets regardless of configuration.
/// 无论配置如何，每个作业都会获得的变量。
pub fn builtin_vars(
    prefix: &str,
    job: &Job,
    build_dir: &Path,
    ctx: &RunContext,
) -> Vec<(String, String)> {
    let pull_request = ctx
        .pull_request
        .clone()
        .unwrap_or_else(|| "false".to_string());
    let mut vars = vec![("CI".to_string(), "true".to_string())];
    if prefix != "CI" {
        vars.push((prefix.to_string(), "true".to_string()));
    }
    vars.extend([
        (format!("{prefix}_BUILD_DIR"), build_dir.display().to_string()),
        (format!("{prefix}_BRANCH"), ctx.branch.clone()),
        (format!("{prefix}_PULL_REQUEST"), pull_request),
        (format!("{prefix}_JOB_NUMBER"), job.number.to_string()),
        (format!("{prefix}_JOB_NAME"), job.name.clone()),
        (format!("{prefix}_OS_NAME"), std::env::consts::OS.to_string()),
    ]);
    vars
}

//! # Matrix Expansion Module / 矩阵展开模块
//!
//! Turns the `[matrix]` section into the ordered list of jobs: the cartesian
//! product of all axes (first axis varies slowest), minus excluded
//! combinations, followed by the explicit `include` entries.
//!
//! 将 `[matrix]` 部分转换为有序的作业列表：所有轴的笛卡尔积（第一个轴变化最慢），
//! 去掉排除的组合，然后追加显式的 `include` 条目。

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::core::config::{MatrixEntry, PipelineConfig};

/// One concrete job of the matrix.
/// 矩阵中的一个具体作业。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// 1-based position in the expanded matrix.
    /// 在展开矩阵中从 1 开始的位置。
    pub number: usize,
    pub name: String,
    /// The matrix variables of this job (not the full process environment).
    /// 此作业的矩阵变量（不是完整的进程环境）。
    pub env: BTreeMap<String, String>,
    pub allow_failure: Vec<String>,
    pub arch: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub retries: u8,
}

impl Job {
    /// A failure is tolerated on `os` when it is listed or `*` is listed.
    pub fn allows_failure_on(&self, os: &str) -> bool {
        self.allow_failure.iter().any(|s| s == os || s == "*")
    }

    pub fn runs_on_arch(&self, arch: &str) -> bool {
        self.arch.is_empty() || self.arch.iter().any(|a| a == arch)
    }

    pub fn is_flaky_here(&self) -> bool {
        self.allows_failure_on(std::env::consts::OS)
    }
}

impl Default for Job {
    fn default() -> Self {
        Self {
            number: 1,
            name: "default".to_string(),
            env: BTreeMap::new(),
            allow_failure: vec![],
            arch: vec![],
            timeout_secs: None,
            retries: 0,
        }
    }
}

/// Expands the matrix of `config` into jobs.
///
/// 将 `config` 的矩阵展开为作业。
pub fn expand(config: &PipelineConfig) -> Result<Vec<Job>> {
    let matrix = &config.matrix;
    let mut entries: Vec<MatrixEntry> = Vec::new();

    if !matrix.axis.is_empty() {
        let mut combos: Vec<Vec<(String, String)>> = vec![vec![]];
        for axis in &matrix.axis {
            let mut next = Vec::with_capacity(combos.len() * axis.values.len());
            for combo in &combos {
                for value in &axis.values {
                    let mut extended = combo.clone();
                    extended.push((axis.name.clone(), value.clone()));
                    next.push(extended);
                }
            }
            combos = next;
        }

        for combo in combos {
            let env: BTreeMap<String, String> = combo.iter().cloned().collect();
            if matrix.exclude.iter().any(|pattern| pattern.matches(&env)) {
                continue;
            }
            entries.push(MatrixEntry {
                name: Some(default_name(&combo)),
                env,
                ..MatrixEntry::default()
            });
        }
    }

    entries.extend(matrix.include.iter().cloned());

    if matrix.axis.is_empty() && matrix.include.is_empty() {
        entries.push(MatrixEntry::default());
    }

    let defaults = &config.job;
    let mut seen = HashSet::new();
    let mut jobs = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let name = match entry.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                let pairs: Vec<(String, String)> = entry
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                default_name(&pairs)
            }
        };
        if !seen.insert(name.clone()) {
            bail!("duplicate job name '{}' in the matrix", name);
        }

        jobs.push(Job {
            number: index + 1,
            name,
            env: entry.env,
            allow_failure: entry
                .allow_failure
                .unwrap_or_else(|| defaults.allow_failure.clone()),
            arch: entry.arch.unwrap_or_else(|| defaults.arch.clone()),
            timeout_secs: entry.timeout_secs.or(defaults.timeout_secs),
            retries: entry.retries.unwrap_or(defaults.retries),
        });
    }

    Ok(jobs)
}

/// `KEY=value` pairs joined by a space, in the given order.
fn default_name(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return "default".to_string();
    }
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

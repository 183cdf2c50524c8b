//! # JSON Reporting Module / JSON 报告模块
//!
//! Machine-readable report of a run, written with `serde_json`.
//! 使用 `serde_json` 写出的机器可读运行报告。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::models::JobResult;

#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub host_os: String,
    pub host_arch: String,
    pub passed: bool,
    pub results: Vec<JobResult>,
}

impl RunReport {
    pub fn new(results: &[JobResult]) -> Self {
        Self {
            generated_at: Utc::now(),
            host_os: std::env::consts::OS.to_string(),
            host_arch: std::env::consts::ARCH.to_string(),
            passed: !results.iter().any(|r| r.is_unexpected_failure()),
            results: results.to_vec(),
        }
    }
}

/// Writes the results as pretty-printed JSON.
///
/// 将结果写为格式化的 JSON。
pub fn write_json_report(results: &[JobResult], output_path: &Path) -> Result<()> {
    let report = RunReport::new(results);
    let content =
        serde_json::to_string_pretty(&report).context("Failed to serialize the JSON report")?;
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))
}

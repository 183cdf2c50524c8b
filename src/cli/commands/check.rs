//! # Check Command Module / 检查命令模块
//!
//! Validates a pipeline file without running anything.
//! 在不运行任何内容的情况下验证流水线文件。

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use crate::core::{config, matrix};
use crate::infra::t;

pub fn execute(config_path: &Path, locale: &str) -> Result<()> {
    let (pipeline, canonical_path) = config::load(config_path)?;
    pipeline.validate().with_context(|| {
        t!("config_invalid", locale = locale, path = canonical_path.display()).to_string()
    })?;

    let jobs = matrix::expand(&pipeline)?;
    let step_count: usize = config::Phase::ALL
        .iter()
        .map(|phase| pipeline.steps(*phase).len())
        .sum();

    println!(
        "{} {}",
        "✔".green(),
        t!(
            "check.valid",
            locale = locale,
            path = canonical_path.display(),
            jobs = jobs.len(),
            steps = step_count
        )
        .bold()
    );
    Ok(())
}

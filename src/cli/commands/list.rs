//! # List Command Module / 列表命令模块
//!
//! Prints the expanded matrix and, for every job, which steps its guards let
//! through. Nothing is executed.
//!
//! 打印展开后的矩阵，以及每个作业中守卫允许运行的步骤。不执行任何内容。

use anyhow::Result;

use super::{RunOptions, build_context, load_pipeline};
use crate::core::matrix;
use crate::reporting::print_job_plan;

pub async fn execute(options: RunOptions, explicit_language: Option<String>) -> Result<()> {
    let (config, _config_path, locale) = load_pipeline(&options, explicit_language.as_deref())?;
    let ctx = build_context(&options, &locale).await?;
    let jobs = matrix::expand(&config)?;
    print_job_plan(&jobs, &config, &ctx, &locale);
    Ok(())
}

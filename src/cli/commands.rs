//! # Commands / 命令
//!
//! One module per subcommand.
//! 每个子命令一个模块。

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::core::config::{self, PipelineConfig};
use crate::core::environment::RunContext;
use crate::infra::{git, t};

pub mod check;
pub mod init;
pub mod list;
pub mod run;

/// Options shared by `run` and `list`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: PathBuf,
    pub project_dir: PathBuf,
    pub branch: Option<String>,
    pub pull_request: Option<String>,
}

/// Loads and validates the pipeline file, then applies its language unless
/// one was given on the command line.
pub(crate) fn load_pipeline(
    options: &RunOptions,
    explicit_language: Option<&str>,
) -> Result<(PipelineConfig, PathBuf, String)> {
    let (config, config_path) = config::load(&options.config)?;
    let locale = match explicit_language {
        Some(lang) => lang.to_string(),
        None => crate::resolve_locale(&config.language),
    };
    rust_i18n::set_locale(&locale);

    config
        .validate()
        .with_context(|| {
            t!("config_invalid", locale = &locale, path = config_path.display()).to_string()
        })?;
    Ok((config, config_path, locale))
}

/// Resolves the project root and the branch / pull request information.
pub(crate) async fn build_context(options: &RunOptions, locale: &str) -> Result<RunContext> {
    let project_root = fs::canonicalize(&options.project_dir).with_context(|| {
        t!(
            "project_dir_not_found",
            locale = locale,
            path = options.project_dir.display()
        )
        .to_string()
    })?;

    let branch = match &options.branch {
        Some(branch) => branch.clone(),
        None => git::current_branch(&project_root)
            .await
            .unwrap_or_else(|| "unknown".to_string()),
    };
    let pull_request = options
        .pull_request
        .clone()
        .filter(|pr| !pr.is_empty() && pr != "false");

    Ok(RunContext {
        project_root,
        branch,
        pull_request,
    })
}

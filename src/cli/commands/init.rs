//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command, which writes a new pipeline
//! file, either from the commented template or through an interactive wizard.
//!
//! 此模块实现 `init` 命令，通过带注释的模板或交互式向导写出新的流水线文件。
//!
//! ## Features / 功能特性
//!
//! - **Template**: a five-job matrix with guarded test, docs, coverage and deploy steps
//! - **Interactive Wizard**: matrix axes and optional phases chosen step by step
//! - **Overwrite Protection**: an existing file is kept unless `--force` or confirmed
//!
//! - **模板**：包含五个作业的矩阵以及带守卫的测试、文档、覆盖率和部署步骤
//! - **交互式向导**：逐步选择矩阵轴和可选阶段
//! - **覆盖保护**：除非使用 `--force` 或确认，否则保留已有文件

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, MultiSelect, theme::ColorfulTheme};
use std::fs;
use std::path::Path;

use crate::core::config::{Axis, PipelineConfig, Step};
use crate::infra::t;

pub const TEMPLATE: &str = r#"# Pipeline Configuration / 流水线配置

# Language for runner messages / 运行器消息的语言
language = "en"
# Built-in variables are CI_BRANCH, CI_PULL_REQUEST, CI_BUILD_DIR, ...
# 内置变量为 CI_BRANCH、CI_PULL_REQUEST、CI_BUILD_DIR 等
builtin_prefix = "CI"

# Global environment for every job / 每个作业的全局环境
[env]
ENV_NAME = "testenv"

[job]
timeout_secs = 1800
retries = 0

# Every combination of the axes becomes a job / 轴的每种组合都成为一个作业
[matrix]
fail_fast = false

[[matrix.axis]]
name = "PYTHON_VERSION"
values = ["2.7", "3.5"]

[[matrix.axis]]
name = "NUMPY_VERSION"
values = ["1.10", "1.11"]

# Extra jobs appended after the combinations / 追加在组合之后的额外作业
[[matrix.include]]
name = "docs"
env = { PYTHON_VERSION = "3.5", NUMPY_VERSION = "1.11", BUILD_DOCS = "true", SKIP_TESTS = "true" }

[[install]]
name = "create-env"
run = "conda create -q -y -n $ENV_NAME python=$PYTHON_VERSION numpy=$NUMPY_VERSION"

[[install]]
name = "dependencies"
run = "pip install -r requirements.txt"

# Script steps abort the job on the first failure / script 步骤在第一次失败时中止作业
[[script]]
name = "tests"
run = "pytest"
when = "SKIP_TESTS != true"

[[script]]
name = "docs"
run = "make html"
workdir = "doc"
when = "BUILD_DOCS == true"

# Only after a successful script phase; failures here never fail the job
# 仅在 script 阶段成功后运行；此处的失败不会使作业失败
[[after_success]]
name = "coverage"
run = "coveralls"
when = "COVERALLS == true"

[[after_success]]
name = "deploy-docs"
run = "sh doc/deploy.sh"
when = "BUILD_DOCS == true && CI_BRANCH == master && CI_PULL_REQUEST == false"
"#;

/// Parses the built-in template.
pub fn default_pipeline() -> Result<PipelineConfig> {
    PipelineConfig::from_toml(TEMPLATE)
}

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path for the new pipeline file
/// * `force` - Overwrite an existing file without asking
/// * `non_interactive` - Write the template instead of launching the wizard
/// * `language` - Language for messages
pub fn execute(output: &Path, force: bool, non_interactive: bool, language: &str) -> Result<()> {
    let theme = ColorfulTheme::default();

    if output.exists() && !force {
        if non_interactive {
            println!(
                "{}",
                t!("init.file_exists", locale = language, path = output.display()).red()
            );
            println!("{}", t!("init.use_force", locale = language).yellow());
            return Ok(());
        }
        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(t!("init.overwrite_prompt", locale = language, path = output.display()))
            .default(false)
            .interact()
            .context(t!("init.user_confirmation_failed", locale = language).to_string())?;
        if !confirmation {
            println!("{}", t!("init.aborted", locale = language));
            return Ok(());
        }
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).with_context(|| {
                t!("init.create_parent_dir_failed", locale = language, path = parent.display())
                    .to_string()
            })?;
        }
    }

    let content = if non_interactive {
        TEMPLATE.to_string()
    } else {
        let pipeline = run_wizard(&theme, language)?;
        toml::to_string_pretty(&pipeline)
            .context(t!("init.serialize_failed", locale = language).to_string())?
    };

    fs::write(output, content).with_context(|| {
        t!("init.write_failed", locale = language, path = output.display()).to_string()
    })?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init.success", locale = language, path = output.display()).bold()
    );
    println!("{}", t!("init.next_steps", locale = language));
    Ok(())
}

/// Asks for the matrix axes and the optional phases.
fn run_wizard(theme: &ColorfulTheme, language: &str) -> Result<PipelineConfig> {
    println!("\n{}", t!("init.wizard_welcome", locale = language).cyan().bold());
    println!("{}", t!("init.wizard_description", locale = language));

    let mut pipeline = PipelineConfig {
        language: language.to_string(),
        ..PipelineConfig::default()
    };

    loop {
        let name: String = Input::with_theme(theme)
            .with_prompt(t!("init.axis_name_prompt", locale = language))
            .allow_empty(true)
            .interact_text()?;
        let name = name.trim().to_string();
        if name.is_empty() {
            break;
        }
        let values: String = Input::with_theme(theme)
            .with_prompt(t!("init.axis_values_prompt", locale = language, name = &name))
            .interact_text()?;
        let values = split_values(&values);
        if values.is_empty() {
            println!("{}", t!("init.axis_no_values", locale = language).yellow());
            continue;
        }
        pipeline.matrix.axis.push(Axis { name, values });
    }

    let install: String = Input::with_theme(theme)
        .with_prompt(t!("init.install_prompt", locale = language))
        .allow_empty(true)
        .interact_text()?;
    if !install.trim().is_empty() {
        pipeline.install.push(Step::new(install.trim()).named("install"));
    }

    let test_command: String = Input::with_theme(theme)
        .with_prompt(t!("init.test_command_prompt", locale = language))
        .default("make test".to_string())
        .interact_text()?;
    pipeline
        .script
        .push(Step::new(test_command.trim()).named("tests").when("SKIP_TESTS != true"));

    let options = [
        t!("init.option_docs", locale = language),
        t!("init.option_coverage", locale = language),
        t!("init.option_deploy", locale = language),
    ];
    let selections = MultiSelect::with_theme(theme)
        .with_prompt(t!("init.options_prompt", locale = language))
        .items(&options)
        .interact()
        .context(t!("init.user_confirmation_failed", locale = language).to_string())?;

    for selection in selections {
        match selection {
            0 => pipeline
                .script
                .push(Step::new("make html").named("docs").when("BUILD_DOCS == true")),
            1 => pipeline
                .after_success
                .push(Step::new("coveralls").named("coverage").when("COVERALLS == true")),
            2 => pipeline.after_success.push(
                Step::new("sh deploy.sh").named("deploy").when(
                    "BUILD_DOCS == true && CI_BRANCH == master && CI_PULL_REQUEST == false",
                ),
            ),
            _ => {}
        }
    }

    Ok(pipeline)
}

/// Splits a comma or whitespace separated list.
pub fn split_values(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

//! # Pipeline Matrix Library / Pipeline Matrix 库
//!
//! This library provides the core functionality for the Pipeline Matrix tool,
//! a configuration-driven CI pipeline runner. A pipeline file declares an
//! environment matrix and guarded `install`, `script`, `after_success` and
//! `after_failure` steps; every matrix entry becomes an isolated job.
//!
//! 此库为 Pipeline Matrix 工具提供核心功能，这是一个配置驱动的 CI 流水线运行器。
//! 流水线文件声明环境矩阵以及带守卫的 `install`、`script`、`after_success`
//! 和 `after_failure` 步骤；每个矩阵条目都成为一个隔离的作业。
//!
//! ## Modules / 模块
//!
//! - `core` - Pipeline model, guards, matrix expansion and the job execution engine
//! - `infra` - Command execution, workspaces and git queries
//! - `reporting` - Console, HTML and JSON reports
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 流水线模型、守卫、矩阵展开和作业执行引擎
//! - `infra` - 命令执行、工作区和 git 查询
//! - `reporting` - 控制台、HTML 和 JSON 报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use crate::core::config;
pub use crate::core::execution;
pub use crate::core::models;

/// Picks the interface language from the system locale.
///
/// It attempts to match the full locale (e.g., "zh-CN"), then just the
/// language code (e.g., "en"), and finally falls back to "en".
pub fn detect_locale() -> String {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    resolve_locale(&locale)
}

/// Maps a requested locale onto one the application ships.
pub fn resolve_locale(requested: &str) -> String {
    let available_locales = rust_i18n::available_locales!();

    if available_locales.contains(&requested) {
        return requested.to_string();
    }
    requested
        .split(['-', '_'])
        .next()
        .and_then(|lang_code| {
            available_locales
                .iter()
                .find(|available| available.split('-').next() == Some(lang_code))
        })
        .map(|lang| lang.to_string())
        .unwrap_or_else(|| "en".to_string())
}

/// Initializes the application's internationalization (i18n) based on the system locale.
pub fn init() {
    rust_i18n::set_locale(&detect_locale());
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");

//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for Pipeline Matrix,
//! including command execution, job workspaces and git queries.
//!
//! 此模块为 Pipeline Matrix 提供基础设施服务，
//! 包括命令执行、作业工作区和 git 查询。

pub mod command;
pub mod fs;
pub mod git;

// Re-export i18n functions for easier access
pub use rust_i18n::t;

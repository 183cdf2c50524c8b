//! # Core Module / 核心模块
//!
//! This module contains the core functionality of Pipeline Matrix:
//! the pipeline file model, step guards, matrix expansion, job environments,
//! planning and job execution.
//!
//! 此模块包含 Pipeline Matrix 的核心功能：
//! 流水线文件模型、步骤守卫、矩阵展开、作业环境、执行计划和作业执行。

pub mod condition;
pub mod config;
pub mod environment;
pub mod execution;
pub mod matrix;
pub mod models;
pub mod planner;

// Re-exports
pub use config::PipelineConfig;
pub use execution::{run_job, run_matrix};
pub use models::JobResult;

//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides the per-job workspace: either the project root
//! itself or an isolated temporary copy of it.
//!
//! 此模块提供每个作业的工作区：项目根目录本身，或其隔离的临时副本。

use anyhow::{Context, Result};
use fs_extra::dir::CopyOptions;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directories never copied into an isolated workspace.
const SKIPPED_ENTRIES: &[&str] = &["target"];

/// The directory a job's steps run in.
/// When isolated, the temporary directory is deleted when this struct is dropped.
///
/// 作业步骤运行所在的目录。
/// 隔离模式下，当此结构体被丢弃时临时目录会被删除。
pub struct Workspace {
    pub path: PathBuf,
    _temp_root: Option<TempDir>,
}

impl Workspace {
    pub fn shared(path: PathBuf) -> Self {
        Self {
            path,
            _temp_root: None,
        }
    }

    pub fn is_isolated(&self) -> bool {
        self._temp_root.is_some()
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("path", &self.path)
            .field("isolated", &self.is_isolated())
            .finish()
    }
}

/// Prepares the workspace of a job.
///
/// # Arguments
/// * `project_root` - Path to the project root directory
/// * `job_name` - Name of the job, used to make the temporary directory recognisable
/// * `isolate` - Copy the project into a fresh temporary directory
pub fn create_job_workspace(project_root: &Path, job_name: &str, isolate: bool) -> Result<Workspace> {
    if !isolate {
        return Ok(Workspace::shared(project_root.to_path_buf()));
    }

    let sanitized_name = sanitize(job_name);
    let temp_dir = tempfile::Builder::new()
        .prefix(&format!("pipeline_matrix_{}_", sanitized_name))
        .tempdir()
        .with_context(|| "Failed to create temporary job directory".to_string())?;

    copy_project(project_root, temp_dir.path()).with_context(|| {
        format!(
            "Failed to copy {} into {}",
            project_root.display(),
            temp_dir.path().display()
        )
    })?;

    Ok(Workspace {
        path: temp_dir.path().to_path_buf(),
        _temp_root: Some(temp_dir),
    })
}

/// Copies the contents of `from` into `to`, leaving out build output.
pub fn copy_project(from: &Path, to: &Path) -> Result<()> {
    let mut items = Vec::new();
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if SKIPPED_ENTRIES.iter().any(|s| name.to_str() == Some(*s)) {
            continue;
        }
        items.push(entry.path());
    }

    let mut options = CopyOptions::new();
    options.overwrite = true;
    fs_extra::copy_items(&items, to, &options)?;
    Ok(())
}

/// Replaces everything but ASCII letters and digits with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

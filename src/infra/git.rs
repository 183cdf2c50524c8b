//! Branch detection for the `{P}_BRANCH` built-in variable.
//! 为内置变量 `{P}_BRANCH` 检测分支。

use std::path::Path;
use std::process::Stdio;

/// Returns the checked-out branch of the repository at `project_root`, or
/// `None` when git is unavailable, the directory is not a repository, or
/// `HEAD` is detached.
pub async fn current_branch(project_root: &Path) -> Option<String> {
    let output = tokio::process::Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(project_root)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if branch.is_empty() || branch == "HEAD" {
        None
    } else {
        Some(branch)
    }
}

//! # Command Execution Module / 命令执行模块
//!
//! Builds step commands and runs them while capturing their output.
//!
//! 构建步骤命令并在运行时捕获其输出。

use anyhow::{Result, anyhow, bail};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

/// Builds a command that runs `script` through the platform shell.
///
/// 构建通过平台 shell 运行 `script` 的命令。
pub fn shell_command(script: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(script);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }
}

/// Splits `line` with shell-like quoting rules and builds a command that
/// executes the program directly.
///
/// 按 shell 引号规则拆分 `line`，并构建直接执行程序的命令。
pub fn direct_command(line: &str) -> Result<Command> {
    let parts = shlex::split(line).ok_or_else(|| anyhow!("Failed to parse command: {}", line))?;
    let Some((program, args)) = parts.split_first() else {
        bail!("Empty command after parsing.");
    };
    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

/// Spawns a command, captures its stdout and stderr.
/// The two streams are read concurrently and interleaved line by line.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 两个流被并发读取并按行交错合并。
pub async fn spawn_and_capture(mut cmd: Command) -> (std::io::Result<ExitStatus>, String) {
    let mut child = match cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return (
            Err(std::io::Error::other("Failed to capture process output")),
            String::new(),
        );
    };

    let stdout_lines = LinesStream::new(BufReader::new(stdout).lines());
    let stderr_lines = LinesStream::new(BufReader::new(stderr).lines());
    let mut lines = stdout_lines.merge(stderr_lines);

    let mut output = String::new();
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                output.push_str(&line);
                output.push('\n');
            }
            Err(e) => {
                output.push_str(&format!("<unreadable output: {}>\n", e));
            }
        }
    }

    let status = child.wait().await;
    (status, output)
}

/// The last `max_lines` lines of `output`, prefixed by a marker when lines were dropped.
///
/// `output` 的最后 `max_lines` 行；如果有行被省略，则添加前缀标记。
pub fn output_excerpt(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.trim_end().to_string();
    }
    let hidden = lines.len() - max_lines;
    format!(
        "... ({} earlier lines omitted)\n{}",
        hidden,
        lines[hidden..].join("\n")
    )
}

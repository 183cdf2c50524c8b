// Shared test helpers for integration tests
#![allow(dead_code)]

use pipeline_matrix::config::PipelineConfig;
use pipeline_matrix::core::environment::{JobEnv, RunContext};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// A pipeline resembling a scientific Python project's CI: four
/// interpreter/NumPy combinations and one documentation job.
pub const FIVE_JOB_PIPELINE: &str = r#"
language = "en"
builtin_prefix = "TRAVIS"
inherit_env = false

[env]
ENV_NAME = "testenv"

[matrix]
fail_fast = false

[[matrix.axis]]
name = "PYTHON_VERSION"
values = ["2.7", "3.5"]

[[matrix.axis]]
name = "NUMPY_VERSION"
values = ["1.10", "1.11"]

[[matrix.include]]
name = "docs"
env = { PYTHON_VERSION = "3.5", NUMPY_VERSION = "1.11", BUILD_DOCS = "true", SKIP_TESTS = "true" }

[[install]]
name = "create-env"
run = "echo python=$PYTHON_VERSION numpy=$NUMPY_VERSION"

[[script]]
name = "tests"
run = "echo testing"
when = "SKIP_TESTS != true"

[[script]]
name = "docs"
run = "echo docs"
when = "BUILD_DOCS == true"

[[after_success]]
name = "coverage"
run = "echo coverage"
when = "COVERALLS == true"

[[after_success]]
name = "deploy-docs"
run = "echo deploy"
when = "BUILD_DOCS == true && TRAVIS_BRANCH == master && TRAVIS_PULL_REQUEST == false"
"#;

pub fn pipeline_from(content: &str) -> PipelineConfig {
    PipelineConfig::from_toml(content).expect("pipeline should parse")
}

pub fn env_of(pairs: &[(&str, &str)]) -> JobEnv {
    pairs.iter().copied().collect()
}

pub fn context_for(project_root: &Path) -> RunContext {
    RunContext {
        project_root: project_root.to_path_buf(),
        branch: "master".to_string(),
        pull_request: None,
    }
}

/// Creates a project directory containing `Pipeline.toml` with `content`.
pub fn project_with_pipeline(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let pipeline_path = temp_dir.path().join("Pipeline.toml");
    fs::write(&pipeline_path, content).expect("Failed to write Pipeline.toml");
    (temp_dir, pipeline_path)
}

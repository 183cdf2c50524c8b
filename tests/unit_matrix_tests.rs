//! # Matrix Expansion Unit Tests / 矩阵展开单元测试
//!
//! 测试轴的笛卡尔积、排除、包含以及作业默认值。

mod common;

use common::{FIVE_JOB_PIPELINE, pipeline_from};
use pipeline_matrix::core::matrix::{self, Job};

fn names(jobs: &[Job]) -> Vec<&str> {
    jobs.iter().map(|j| j.name.as_str()).collect()
}

#[cfg(test)]
mod expansion_tests {
    use super::*;

    #[test]
    fn test_five_job_matrix() {
        let jobs = matrix::expand(&pipeline_from(FIVE_JOB_PIPELINE)).unwrap();

        assert_eq!(jobs.len(), 5);
        assert_eq!(
            names(&jobs),
            vec![
                "PYTHON_VERSION=2.7 NUMPY_VERSION=1.10",
                "PYTHON_VERSION=2.7 NUMPY_VERSION=1.11",
                "PYTHON_VERSION=3.5 NUMPY_VERSION=1.10",
                "PYTHON_VERSION=3.5 NUMPY_VERSION=1.11",
                "docs",
            ]
        );
        let numbers: Vec<_> = jobs.iter().map(|j| j.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        let docs = &jobs[4];
        assert_eq!(docs.env.get("BUILD_DOCS").map(String::as_str), Some("true"));
        assert_eq!(docs.env.get("SKIP_TESTS").map(String::as_str), Some("true"));
        assert_eq!(jobs[0].env.len(), 2);
    }

    #[test]
    fn test_no_matrix_gives_one_default_job() {
        let jobs = matrix::expand(&pipeline_from("")).unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "default");
        assert_eq!(jobs[0].number, 1);
        assert!(jobs[0].env.is_empty());
    }

    #[test]
    fn test_exclude_is_a_subset_match() {
        let config = pipeline_from(
            r#"
            [[matrix.axis]]
            name = "PY"
            values = ["2.7", "3.5"]

            [[matrix.axis]]
            name = "NP"
            values = ["1.10", "1.11"]

            [[matrix.exclude]]
            env = { PY = "2.7", NP = "1.11" }

            [[matrix.exclude]]
            env = { NP = "1.10", OTHER = "x" }
            "#,
        );
        let jobs = matrix::expand(&config).unwrap();

        assert_eq!(names(&jobs), vec!["PY=2.7 NP=1.10", "PY=3.5 NP=1.10", "PY=3.5 NP=1.11"]);
        assert_eq!(jobs[2].number, 3);
    }

    #[test]
    fn test_include_only() {
        let config = pipeline_from(
            r#"
            [[matrix.include]]
            env = { NUMPY_VERSION = "1.11", COVERALLS = "true" }

            [[matrix.include]]
            name = "docs"
            env = { BUILD_DOCS = "true" }
            "#,
        );
        let jobs = matrix::expand(&config).unwrap();

        // Unnamed entries are named after their variables, sorted by key.
        assert_eq!(names(&jobs), vec!["COVERALLS=true NUMPY_VERSION=1.11", "docs"]);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let config = pipeline_from(
            r#"
            [[matrix.axis]]
            name = "PY"
            values = ["3.5"]

            [[matrix.include]]
            env = { PY = "3.5" }
            "#,
        );
        let err = matrix::expand(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate job name 'PY=3.5'"));
    }

    #[test]
    fn test_job_defaults_and_overrides() {
        let config = pipeline_from(
            r#"
            [job]
            timeout_secs = 600
            retries = 2
            allow_failure = ["windows"]
            arch = ["x86_64"]

            [[matrix.include]]
            name = "inherits"

            [[matrix.include]]
            name = "overrides"
            timeout_secs = 30
            retries = 0
            allow_failure = []
            arch = ["aarch64", "x86_64"]
            "#,
        );
        let jobs = matrix::expand(&config).unwrap();

        assert_eq!(jobs[0].timeout_secs, Some(600));
        assert_eq!(jobs[0].retries, 2);
        assert_eq!(jobs[0].allow_failure, vec!["windows"]);
        assert_eq!(jobs[0].arch, vec!["x86_64"]);

        assert_eq!(jobs[1].timeout_secs, Some(30));
        assert_eq!(jobs[1].retries, 0);
        assert!(jobs[1].allow_failure.is_empty());
        assert_eq!(jobs[1].arch, vec!["aarch64", "x86_64"]);
    }
}

#[cfg(test)]
mod job_tests {
    use super::*;

    #[test]
    fn test_allows_failure_on() {
        let job = Job {
            allow_failure: vec!["macos".to_string()],
            ..Job::default()
        };
        assert!(job.allows_failure_on("macos"));
        assert!(!job.allows_failure_on("linux"));

        let anywhere = Job {
            allow_failure: vec!["*".to_string()],
            ..Job::default()
        };
        assert!(anywhere.allows_failure_on("linux"));
        assert!(anywhere.is_flaky_here());
    }

    #[test]
    fn test_runs_on_arch() {
        let any = Job::default();
        assert!(any.runs_on_arch("x86_64"));
        assert!(any.runs_on_arch("riscv64"));

        let pinned = Job {
            arch: vec!["aarch64".to_string()],
            ..Job::default()
        };
        assert!(pinned.runs_on_arch("aarch64"));
        assert!(!pinned.runs_on_arch("x86_64"));
    }
}

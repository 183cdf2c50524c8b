//! # Reporting Module / 报告模块
//!
//! This module prints colored summaries to the console and writes HTML and
//! JSON reports of a run.
//!
//! 此模块在控制台打印彩色摘要，并写出运行的 HTML 和 JSON 报告。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_job_plan, print_summary, print_unexpected_failure_details};
pub use html::generate_html_report;
pub use json::write_json_report;

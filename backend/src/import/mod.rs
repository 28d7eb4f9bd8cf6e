//! Import orchestration and reporting.

pub mod pipeline;
pub mod report;

pub use pipeline::{import_bytes, import_csv_file, is_busy, run_import, ImportOptions};
pub use report::{rejected_rows, rejections_by_reason, ImportSummary, RejectedRow};

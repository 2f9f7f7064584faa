//! Report persistence at `<root>/reports/validate.json`.

use std::fs;
use std::path::{Path, PathBuf};

use sitepack_core::Report;

use crate::error::{PackError, PackResult};

pub const REPORTS_DIR: &str = "reports";
pub const REPORT_FILE: &str = "validate.json";

/// Write `report` as pretty-printed JSON under `target_root` and return
/// the file path.
pub fn write_report(report: &Report, target_root: &Path) -> PackResult<PathBuf> {
    let dir = target_root.join(REPORTS_DIR);
    let path = dir.join(REPORT_FILE);
    let wrap = |source| PackError::ReportWrite {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(&dir).map_err(wrap)?;
    let body = serde_json::to_string_pretty(report)?;
    fs::write(&path, body).map_err(wrap)?;
    tracing::debug!(path = %path.display(), "report written");
    Ok(path)
}

/// Directory holding `file`, or `.` for a bare file name.
pub(crate) fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

use serde::Serialize;

use crate::run::tables::TableRow;

#[derive(Serialize)]
pub(crate) struct CandidateRow {
    pub group: String,
    pub artifact_name: String,
    pub artifact_path: String,
    pub target_path: String,
    pub target_exists: bool,
}

impl TableRow for CandidateRow {
    const HEADERS: &'static [&'static str] = &[
        "GROUP",
        "ARTIFACT_NAME",
        "ARTIFACT_PATH",
        "TARGET_PATH",
        "TARGET_EXISTS",
    ];
}

#[derive(Serialize)]
pub(crate) struct QuarantineRow {
    pub group: String,
    pub artifact_name: String,
    pub artifact_path: String,
    pub target_path: String,
    pub target_exists: bool,
    pub quarantine_path: String,
    pub status: String,
}

impl TableRow for QuarantineRow {
    const HEADERS: &'static [&'static str] = &[
        "GROUP",
        "ARTIFACT_NAME",
        "ARTIFACT_PATH",
        "TARGET_PATH",
        "TARGET_EXISTS",
        "Q_PATH",
        "Q_STATUS",
    ];
}

/// Copy and move logs share one layout.
#[derive(Serialize)]
pub(crate) struct LogRow {
    pub group: String,
    pub source: String,
    pub destination: String,
    pub status: String,
}

impl TableRow for LogRow {
    const HEADERS: &'static [&'static str] = &["GROUP", "SRC", "DST", "STATUS"];
}

#[derive(Serialize)]
pub(crate) struct KeepCheckRow {
    pub group: String,
    pub artifact_name: String,
    pub artifact_path: String,
    pub target_path: String,
    pub exists: bool,
    pub in_removed_dir: bool,
}

impl TableRow for KeepCheckRow {
    const HEADERS: &'static [&'static str] = &[
        "GROUP",
        "ARTIFACT_NAME",
        "ARTIFACT_PATH",
        "TARGET_PATH",
        "EXISTS",
        "IN_REMOVED_DIR",
    ];
}

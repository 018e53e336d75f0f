use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::client::ReportDocument;

const REPORT_PREFIX: &str = "report-";
const REPORT_SUFFIX: &str = ".pdf";

/// Directory of downloaded PDF reports, pruned by the date in their file name.
#[derive(Debug, Clone)]
pub struct ReportArchive {
    dir: PathBuf,
    retention_days: u64,
}

impl ReportArchive {
    pub fn new(dir: impl Into<PathBuf>, retention_days: u64) -> Self {
        Self {
            dir: dir.into(),
            retention_days,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store(&self, document: &ReportDocument, now: SystemTime) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let ts = DateTime::<Utc>::from(now);
        let path = self
            .dir
            .join(report_file_name(ts, document.suggested_name.as_deref()));
        fs::write(&path, &document.bytes)?;
        debug!(path = %path.display(), bytes = document.bytes.len(), "report stored");

        prune_old_reports(&self.dir, self.retention_days, now)?;
        Ok(path)
    }
}

pub(crate) fn report_file_name(ts: DateTime<Utc>, suggested: Option<&str>) -> String {
    let source = suggested
        .map(|name| name.strip_suffix(REPORT_SUFFIX).unwrap_or(name))
        .map(|name| {
            name.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "summary".to_string());

    format!(
        "{REPORT_PREFIX}{}-{source}{REPORT_SUFFIX}",
        ts.format("%Y-%m-%d-%H%M%S")
    )
}

pub(crate) fn prune_old_reports(dir: &Path, retention_days: u64, now: SystemTime) -> Result<()> {
    let today = DateTime::<Utc>::from(now).date_naive();
    let cutoff = today
        .checked_sub_days(Days::new(retention_days))
        .unwrap_or(today);

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let Some(file_name) = path.file_name().and_then(|v| v.to_str()) else {
            continue;
        };
        if !file_name.ends_with(REPORT_SUFFIX) {
            continue;
        }
        let Some(date_part) = file_name
            .strip_prefix(REPORT_PREFIX)
            .and_then(|v| v.get(..10))
        else {
            continue;
        };

        let Ok(file_date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            if let Err(err) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %err, "failed to prune report");
            }
        }
    }

    Ok(())
}

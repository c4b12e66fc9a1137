//! Per-stage run watermarks and the reference clock.
//!
//! Each pipeline stage records the instant it last completed in a small
//! text file. The next run reads the watermark to select only work that
//! arrived since. An absent file means "never ran" and selects full
//! history; an unreadable or malformed file is reported as corrupt and
//! is never silently treated as absent. Instants come from
//! [`reference_now`], the run's fixed-zone clock.
//!
//! File format, first line: `Last run: 2024-01-02 03:04:05.123456`

use chrono::{FixedOffset, NaiveDateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PREFIX: &str = "Last run: ";
const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Current instant in the pipeline's fixed reference zone.
///
/// US/Eastern pinned at UTC-5 year-round. Watermarks, window
/// computation, and store sidecar timestamps all take their instants
/// from this clock, so runs agree on the calendar day regardless of the
/// host timezone.
pub fn reference_now() -> NaiveDateTime {
    let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
    Utc::now().with_timezone(&eastern).naive_local()
}

/// Pipeline stage owning a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Collect,
    Clean,
    Evaluate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collect => "collect",
            Stage::Clean => "clean",
            Stage::Evaluate => "evaluate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from watermark reads and writes.
#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("corrupt watermark file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(String),
}

/// Directory of per-stage watermark files.
pub struct WatermarkStore {
    dir: PathBuf,
}

impl WatermarkStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, stage: Stage) -> PathBuf {
        self.dir.join(format!("{stage}_last_run.log"))
    }

    /// Read a stage's watermark.
    ///
    /// Returns `Ok(None)` when the file does not exist and `Err` when it
    /// exists but cannot be parsed.
    pub fn read(&self, stage: Stage) -> Result<Option<NaiveDateTime>, WatermarkError> {
        let path = self.path(stage);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WatermarkError::Io(format!("{}: {e}", path.display()))),
        };

        let first_line = content.lines().next().ok_or_else(|| corrupt(&path, "empty file"))?;
        let stamp = first_line
            .strip_prefix(PREFIX)
            .ok_or_else(|| corrupt(&path, "missing 'Last run:' prefix"))?;

        let parsed = NaiveDateTime::parse_from_str(stamp, FORMAT)
            .map_err(|e| corrupt(&path, &format!("unparseable timestamp '{stamp}': {e}")))?;

        Ok(Some(parsed))
    }

    /// Record that a stage completed at `instant`, replacing any prior value.
    pub fn write(&self, stage: Stage, instant: NaiveDateTime) -> Result<(), WatermarkError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| WatermarkError::Io(format!("failed to create dir: {e}")))?;

        let path = self.path(stage);
        let tmp_path = path.with_extension("log.tmp");
        let content = format!("{PREFIX}{}\n", instant.format(FORMAT));

        fs::write(&tmp_path, content)
            .map_err(|e| WatermarkError::Io(format!("{}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            WatermarkError::Io(format!("atomic rename failed: {e}"))
        })?;

        Ok(())
    }
}

fn corrupt(path: &Path, reason: &str) -> WatermarkError {
    WatermarkError::Corrupt {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

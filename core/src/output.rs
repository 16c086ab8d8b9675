//! Publishes the raw ledger and the detail and rollup views as JSON files.
//!
//! `ledger.json` holds every ledger row, joined or not, so tickets the
//! reporting joins drop stay visible somewhere.
//!
//! Publication is two-phase: `stage` writes `*.json.tmp` next to the live
//! files, `publish` renames them into place. A stage that is dropped
//! unpublished deletes its temp files, so a failed run never replaces the
//! previous outputs.

use crate::{error::LedgerResult, ledger::TicketLedgerRow, verdict::Report};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LEDGER_FILE: &str = "ledger.json";
pub const DETAIL_FILE: &str = "detail.json";
pub const ROLLUP_FILE: &str = "rollup.json";

#[derive(Debug, Clone)]
pub struct OutputWriter {
    out_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.out_dir.join(LEDGER_FILE)
    }

    pub fn detail_path(&self) -> PathBuf {
        self.out_dir.join(DETAIL_FILE)
    }

    pub fn rollup_path(&self) -> PathBuf {
        self.out_dir.join(ROLLUP_FILE)
    }

    pub fn stage(
        &self,
        rows: &[TicketLedgerRow],
        report: &Report,
    ) -> LedgerResult<StagedOutputs> {
        std::fs::create_dir_all(&self.out_dir)?;
        let mut staged = StagedOutputs {
            out_dir: self.out_dir.clone(),
            pending: VecDeque::with_capacity(3),
        };
        // Pushed one at a time so a later failure still cleans up the earlier files.
        staged.pending.push_back(write_tmp(&self.ledger_path(), &rows)?);
        staged.pending.push_back(write_tmp(&self.detail_path(), &report.detail)?);
        staged.pending.push_back(write_tmp(&self.rollup_path(), &report.rollup)?);
        Ok(staged)
    }
}

/// Temp files waiting to be renamed over the live outputs.
#[derive(Debug)]
pub struct StagedOutputs {
    out_dir: PathBuf,
    pending: VecDeque<(PathBuf, PathBuf)>, // (tmp, live)
}

impl StagedOutputs {
    /// Rename each temp file over its live file. A file leaves `pending`
    /// only once its rename succeeds, so on error `Drop` removes the rest.
    pub fn publish(mut self) -> LedgerResult<()> {
        while let Some((tmp, live)) = self.pending.front() {
            std::fs::rename(tmp, live)?;
            self.pending.pop_front();
        }
        fsync_dir(&self.out_dir)?;
        Ok(())
    }
}

impl Drop for StagedOutputs {
    fn drop(&mut self) {
        for (tmp, _) in self.pending.drain(..) {
            if let Err(e) = std::fs::remove_file(&tmp) {
                log::warn!("Could not remove staged output {}: {e}", tmp.display());
            }
        }
    }
}

fn write_tmp<T: Serialize>(live: &Path, value: &T) -> LedgerResult<(PathBuf, PathBuf)> {
    let tmp = live.with_extension("json.tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    Ok((tmp, live.to_path_buf()))
}

fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{ExclusionCounts, RollupRow};

    fn report_with(owner: &str) -> Report {
        Report {
            detail: vec![],
            rollup: vec![RollupRow {
                owner: owner.into(),
                module: "m".into(),
                label: "l".into(),
                needs_attention_count: 1,
                within_limit_count: 0,
            }],
            exclusions: ExclusionCounts::default(),
        }
    }

    #[test]
    fn publish_replaces_live_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());

        writer.stage(&[], &report_with("ana")).unwrap().publish().unwrap();
        let rollup = std::fs::read_to_string(writer.rollup_path()).unwrap();
        assert!(rollup.contains("\"ana\""));
        assert!(writer.detail_path().exists());
        assert_eq!(std::fs::read_to_string(writer.ledger_path()).unwrap().trim(), "[]");
        assert!(!dir.path().join("rollup.json.tmp").exists());
    }

    #[test]
    fn dropped_stage_keeps_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        writer.stage(&[], &report_with("ana")).unwrap().publish().unwrap();

        let staged = writer.stage(&[], &report_with("bo")).unwrap();
        drop(staged);

        let rollup = std::fs::read_to_string(writer.rollup_path()).unwrap();
        assert!(rollup.contains("\"ana\""));
        assert!(!rollup.contains("\"bo\""));
        for tmp in ["ledger.json.tmp", "detail.json.tmp", "rollup.json.tmp"] {
            assert!(!dir.path().join(tmp).exists(), "{tmp} left behind");
        }
    }

    #[test]
    fn failed_rename_removes_remaining_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        // A non-empty directory where rollup.json should go makes its rename fail.
        std::fs::create_dir_all(writer.rollup_path().join("occupied")).unwrap();

        let err = writer.stage(&[], &report_with("ana")).unwrap().publish();
        assert!(err.is_err());
        assert!(writer.detail_path().is_file());
        assert!(!dir.path().join("rollup.json.tmp").exists());
    }
}

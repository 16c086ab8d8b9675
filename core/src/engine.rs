//! One poll cycle, end to end.
//!
//! EXECUTION ORDER (fixed):
//!   1. Fetch the snapshot: on failure nothing is touched
//!   2. Validate the batch: on failure nothing is touched
//!   3. Begin ledger transaction
//!   4. Merge every record
//!   5. Evaluate verdicts from the rows as seen inside the transaction
//!   6. Stage outputs (temp files): raw ledger, detail, rollup
//!   7. Record the merge run, commit
//!   8. Publish outputs
//!
//! RULES:
//!   - Any error in steps 3 to 7 drops the transaction (rollback) and the staged files.
//!   - Outputs are published only after a successful commit.
//!   - A publish error is `LedgerError::Publish` carrying the committed run id.
//!     That run must not be retried; `--report-only` rebuilds the outputs.
//!   - One run at a time per ledger; callers serialize invocations.

use crate::{
    clock::Clock,
    config::LedgerConfig,
    error::{LedgerError, LedgerResult},
    lookup::ReferenceTables,
    merge::{MergeEngine, MergeSummary},
    output::OutputWriter,
    snapshot::{validate_batch, SnapshotSource},
    store::{LedgerStore, MergeRunRecord},
    verdict::{self, Report},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run:     MergeRunRecord,
    pub summary: MergeSummary,
    pub report:  Report,
}

pub struct RunEngine {
    merger: MergeEngine,
    store:  LedgerStore,
}

impl RunEngine {
    pub fn new(config: LedgerConfig, store: LedgerStore) -> Self {
        Self {
            merger: MergeEngine::new(&config),
            store,
        }
    }

    /// Engine over a migrated in-memory ledger with test defaults.
    pub fn build_test() -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(LedgerConfig::default_test(), store))
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn run(
        &mut self,
        source: &mut dyn SnapshotSource,
        refs: &ReferenceTables,
        writer: Option<&OutputWriter>,
        clock: &dyn Clock,
    ) -> LedgerResult<RunOutcome> {
        let started_at = clock.now();

        let batch = source.fetch()?;
        validate_batch(&batch)?;
        log::info!("Applying snapshot of {} tickets", batch.len());

        let tx = self.store.transaction()?;
        let summary = self.merger.apply_batch(&tx, &batch, started_at)?;

        let rows = tx.all_rows()?;
        let report = verdict::evaluate(&rows, refs);

        let staged = writer.map(|w| w.stage(&rows, &report)).transpose()?;

        let run = MergeRunRecord {
            run_id:             uuid::Uuid::new_v4().to_string(),
            started_at,
            committed_at:       clock.now(),
            records:            summary.records,
            inserted:           summary.inserted,
            updated:            summary.updated,
            reopen_transitions: summary.reopen_transitions,
        };
        tx.record_run(&run)?;
        tx.commit()?;

        log::info!(
            "Run {} committed: {} records ({} new, {} updated, {} reopened)",
            run.run_id,
            summary.records,
            summary.inserted,
            summary.updated,
            summary.reopen_transitions,
        );

        if let Some(staged) = staged {
            staged.publish().map_err(|e| LedgerError::Publish {
                run_id: run.run_id.clone(),
                source: Box::new(e),
            })?;
        }

        Ok(RunOutcome {
            run,
            summary,
            report,
        })
    }

    /// Rebuild and publish the outputs from the ledger as it stands,
    /// without merging anything.
    pub fn republish(
        &self,
        refs: &ReferenceTables,
        writer: &OutputWriter,
    ) -> LedgerResult<Report> {
        let rows = self.store.all_rows()?;
        let report = verdict::evaluate(&rows, refs);
        writer.stage(&rows, &report)?.publish()?;
        Ok(report)
    }
}

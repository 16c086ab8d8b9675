//! ledger-runner: one poll cycle of the status-time ledger.
//!
//! Usage:
//!   ledger-runner --snapshot search.json --db ledger.db --data-dir ./data --out-dir ./out
//!   ledger-runner --report-only --db ledger.db
//!
//! Invoke once per poll interval from an external scheduler. Do not run two
//! instances against the same ledger at once.

use anyhow::{Context, Result};
use status_ledger_core::{
    clock::SystemClock,
    config::LedgerConfig,
    engine::RunEngine,
    lookup::ReferenceTables,
    output::OutputWriter,
    snapshot::TrackerSearchFile,
    store::LedgerStore,
    verdict::Report,
};
use std::env;

#[derive(serde::Serialize)]
struct RunSummary<'a> {
    run_id: Option<&'a str>,
    records: u64,
    inserted: u64,
    updated: u64,
    reopen_transitions: u64,
    detail_rows: usize,
    needs_attention: usize,
    unmapped_owner: u64,
    no_sla_rule: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = string_arg(&args, "--db").unwrap_or("ledger.db");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let out_dir = string_arg(&args, "--out-dir").unwrap_or("./out");
    let snapshot = string_arg(&args, "--snapshot");
    let report_only = args.iter().any(|a| a == "--report-only");
    let json = args.iter().any(|a| a == "--json");

    let mut config = LedgerConfig::load(data_dir)?;
    if let Some(q) = string_arg(&args, "--quantum") {
        let q: u64 = q.parse().with_context(|| format!("invalid --quantum '{q}'"))?;
        config = config.with_quantum(q);
        config.validate()?;
    }

    if !json {
        println!("Status-time ledger: ledger-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  out_dir:   {out_dir}");
        println!("  quantum:   {} min", config.poll_quantum);
        println!();
    }

    let refs = ReferenceTables::load(data_dir, &config.vocabulary())?;

    let store = LedgerStore::open(db)?;
    store.migrate()?;
    let mut engine = RunEngine::new(config, store);
    let writer = OutputWriter::new(out_dir);

    if report_only {
        let report = engine.republish(&refs, &writer)?;
        let summary = RunSummary {
            run_id: None,
            records: 0,
            inserted: 0,
            updated: 0,
            reopen_transitions: 0,
            detail_rows: report.detail.len(),
            needs_attention: report.needs_attention().count(),
            unmapped_owner: report.exclusions.unmapped_owner,
            no_sla_rule: report.exclusions.no_sla_rule,
        };
        return emit(&summary, &report, json);
    }

    let snapshot = snapshot.context("--snapshot <file> is required unless --report-only")?;
    let mut source = TrackerSearchFile::new(snapshot);

    let outcome = match engine.run(&mut source, &refs, Some(&writer), &SystemClock) {
        Ok(o) => o,
        Err(e) => {
            if e.committed_run().is_some() {
                log::error!("{e}. Do not retry this poll; rebuild outputs with --report-only");
            } else {
                log::error!("Run failed, ledger unchanged: {e}");
            }
            return Err(e.into());
        }
    };

    let summary = RunSummary {
        run_id: Some(&outcome.run.run_id),
        records: outcome.summary.records,
        inserted: outcome.summary.inserted,
        updated: outcome.summary.updated,
        reopen_transitions: outcome.summary.reopen_transitions,
        detail_rows: outcome.report.detail.len(),
        needs_attention: outcome.report.needs_attention().count(),
        unmapped_owner: outcome.report.exclusions.unmapped_owner,
        no_sla_rule: outcome.report.exclusions.no_sla_rule,
    };
    emit(&summary, &outcome.report, json)
}

fn emit(summary: &RunSummary<'_>, report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
        return Ok(());
    }

    println!("=== RUN SUMMARY ===");
    println!("  run_id:          {}", summary.run_id.unwrap_or("(report only)"));
    println!("  records:         {}", summary.records);
    println!("  new tickets:     {}", summary.inserted);
    println!("  updated:         {}", summary.updated);
    println!("  reopened:        {}", summary.reopen_transitions);
    println!("  detail rows:     {}", summary.detail_rows);
    println!("  need attention:  {}", summary.needs_attention);
    println!("  unmapped owner:  {}", summary.unmapped_owner);
    println!("  no SLA rule:     {}", summary.no_sla_rule);

    println!();
    println!("=== NEEDS ATTENTION BY OWNER ===");
    let flagged: Vec<_> = report
        .rollup
        .iter()
        .filter(|r| r.needs_attention_count > 0)
        .collect();
    if flagged.is_empty() {
        println!("  (nothing over its SLA)");
    } else {
        for r in flagged {
            println!(
                "  {:<16} {:<16} {:<16} attention: {:>3}  within: {:>3}",
                r.owner, r.module, r.label, r.needs_attention_count, r.within_limit_count
            );
        }
    }
    println!();
    println!("  generated at {}", chrono::Utc::now().to_rfc3339());
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

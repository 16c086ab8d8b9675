//! Reference tables: SLA thresholds per status and owners per (module, label).
//!
//! Both are immutable once loaded and are passed explicitly into the
//! verdict engine. Every run loads them afresh; nothing is cached between runs.

use crate::{
    error::{LedgerError, LedgerResult},
    status::{StatusVocabulary, TrackedStatus},
    types::Minutes,
};
use serde::{Deserialize, Serialize};
use std::collections::{hash_map::Entry, BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaRuleRow {
    pub status:       String,
    pub allowed_time: Minutes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRow {
    pub module: String,
    pub label:  String,
    pub owner:  String,
}

/// Allowed time per tracked status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlaRules {
    allowed: BTreeMap<TrackedStatus, Minutes>,
}

impl SlaRules {
    /// Rows naming an untracked status are skipped with a warning: no
    /// ticket can ever join against them. A tracked status listed twice
    /// is an error.
    pub fn from_rows(rows: Vec<SlaRuleRow>, vocab: &StatusVocabulary) -> LedgerResult<Self> {
        let mut allowed = BTreeMap::new();
        for row in rows {
            let canonical = vocab.normalize(&row.status);
            let Some(status) = canonical.tracked() else {
                log::warn!(
                    "SLA rule for untracked status '{}' ignored",
                    row.status
                );
                continue;
            };
            if allowed.insert(status, row.allowed_time).is_some() {
                return Err(LedgerError::ReferenceData(format!(
                    "duplicate SLA rule for status '{status}'"
                )));
            }
        }
        Ok(Self { allowed })
    }

    pub fn allowed_time(&self, status: TrackedStatus) -> Option<Minutes> {
        self.allowed.get(&status).copied()
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// Owner (SPOC) per exact (module, label) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerMap {
    owners: HashMap<(String, String), String>,
}

impl OwnerMap {
    /// Repeating a pair with the same owner is harmless; with a different
    /// owner it is ambiguous and rejected.
    pub fn from_rows(rows: Vec<OwnerRow>) -> LedgerResult<Self> {
        let mut owners = HashMap::new();
        for row in rows {
            match owners.entry((row.module, row.label)) {
                Entry::Vacant(slot) => {
                    slot.insert(row.owner);
                }
                Entry::Occupied(slot) => {
                    if *slot.get() != row.owner {
                        let (module, label) = slot.key();
                        return Err(LedgerError::ReferenceData(format!(
                            "({module}, {label}) mapped to both '{}' and '{}'",
                            slot.get(),
                            row.owner
                        )));
                    }
                }
            }
        }
        Ok(Self { owners })
    }

    pub fn owner_of(&self, module: &str, label: &str) -> Option<&str> {
        self.owners
            .get(&(module.to_string(), label.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub sla:    SlaRules,
    pub owners: OwnerMap,
}

impl ReferenceTables {
    /// Load `{data_dir}/reference/sla_rules.json` and
    /// `{data_dir}/reference/owner_map.json`.
    pub fn load(data_dir: &str, vocab: &StatusVocabulary) -> LedgerResult<Self> {
        let sla_rows: Vec<SlaRuleRow> =
            read_rows(&format!("{data_dir}/reference/sla_rules.json"))?;
        let owner_rows: Vec<OwnerRow> =
            read_rows(&format!("{data_dir}/reference/owner_map.json"))?;

        let tables = Self {
            sla:    SlaRules::from_rows(sla_rows, vocab)?,
            owners: OwnerMap::from_rows(owner_rows)?,
        };
        log::info!(
            "Loaded {} SLA rules and {} owner mappings",
            tables.sla.len(),
            tables.owners.len()
        );
        Ok(tables)
    }
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &str) -> LedgerResult<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LedgerError::ReferenceData(format!("cannot read {path}: {e}")))?;
    serde_json::from_str(&content)
        .map_err(|e| LedgerError::ReferenceData(format!("cannot parse {path}: {e}")))
}

use crate::{status::StatusVocabulary, types::Minutes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default poll interval of the scheduler, in minutes.
pub const DEFAULT_POLL_QUANTUM: Minutes = 15;

#[derive(Debug, Clone, Deserialize)]
struct LedgerConfigFile {
    poll_quantum_minutes: Minutes,
    #[serde(default)]
    status_aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Time credited to the current status bucket per observation.
    /// Must match the scheduler's actual cadence.
    pub poll_quantum: Minutes,
    /// Raw tracker spelling -> canonical status, applied after folding.
    pub status_aliases: HashMap<String, String>,
}

impl LedgerConfig {
    /// Load from `{data_dir}/ledger_config.json`.
    /// In tests, use LedgerConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/ledger_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: LedgerConfigFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        let config = Self {
            poll_quantum: file.poll_quantum_minutes,
            status_aliases: file.status_aliases,
        };
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            poll_quantum: DEFAULT_POLL_QUANTUM,
            status_aliases: HashMap::new(),
        }
    }

    pub fn with_quantum(mut self, quantum: Minutes) -> Self {
        self.poll_quantum = quantum;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_quantum == 0 {
            anyhow::bail!("poll_quantum_minutes must be greater than zero");
        }
        Ok(())
    }

    pub fn vocabulary(&self) -> StatusVocabulary {
        StatusVocabulary::new(&self.status_aliases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_reads_quantum_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ledger_config.json"),
            r#"{ "poll_quantum_minutes": 30, "status_aliases": { "To Do": "Open" } }"#,
        )
        .unwrap();

        let config = LedgerConfig::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.poll_quantum, 30);
        assert_eq!(config.vocabulary().normalize("to do").as_str(), "open");
    }

    #[test]
    fn zero_quantum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ledger_config.json"),
            r#"{ "poll_quantum_minutes": 0 }"#,
        )
        .unwrap();

        let err = LedgerConfig::load(dir.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("greater than zero"), "{err}");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = LedgerConfig::load("/definitely/not/here").unwrap_err();
        assert!(err.to_string().contains("ledger_config.json"), "{err}");
    }
}

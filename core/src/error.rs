use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot fetch failed: {0}")]
    Fetch(String),

    #[error("Malformed snapshot record '{ticket_no}': {reason}")]
    MalformedSnapshot { ticket_no: String, reason: String },

    #[error("Reference data error: {0}")]
    ReferenceData(String),

    /// The ledger committed but the outputs were not all renamed into place.
    #[error("Run {run_id} committed but publishing outputs failed: {source}")]
    Publish {
        run_id: String,
        #[source]
        source: Box<LedgerError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    /// True when the run failed before the ledger transaction began.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::MalformedSnapshot { .. })
    }

    /// The id of the merge run that committed before this error, if any.
    /// Retrying such a run would credit the same poll twice.
    pub fn committed_run(&self) -> Option<&str> {
        match self {
            Self::Publish { run_id, .. } => Some(run_id.as_str()),
            _ => None,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

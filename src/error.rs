use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MarkerError {
    #[error("invalid genome selection `{token}`: {reason}")]
    #[diagnostic(help(
        "use `all`, a comma-separated list of genome ids, or idx:modulus slices such as 1:30"
    ))]
    InvalidSelection { token: String, reason: String },

    #[error("invalid genome id: {0}")]
    InvalidGenomeId(String),

    #[error("invalid species id: {0}")]
    InvalidSpeciesId(String),

    #[error("genome {0} is not in the catalog")]
    UnknownGenome(String),

    #[error("remote {op} failed for {key}: {message}")]
    Remote {
        op: &'static str,
        key: String,
        message: String,
    },

    #[error("remote {op} for {key} returned status {status}")]
    RemoteStatus {
        op: &'static str,
        key: String,
        status: u16,
    },

    #[error("remote object not found: {0}")]
    RemoteNotFound(String),

    #[error("search tool failed: {0}")]
    ExternalTool(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("gene {gene_id} reported by the search is missing from the sequences of genome {genome_id}")]
    MissingGene { genome_id: String, gene_id: String },

    #[error("malformed search report at line {line}: {reason}")]
    MalformedReport { line: usize, reason: String },

    #[error("malformed catalog: {0}")]
    MalformedCatalog(String),

    #[error("malformed FASTA: {0}")]
    MalformedFasta(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("{failed} of {total} genomes failed")]
    ItemsFailed { failed: usize, total: usize },
}

impl MarkerError {
    pub fn is_transient(&self) -> bool {
        match self {
            MarkerError::Remote { .. } => true,
            MarkerError::RemoteStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let remote = MarkerError::Remote {
            op: "get",
            key: "a".to_string(),
            message: "connection reset".to_string(),
        };
        assert!(remote.is_transient());

        let throttled = MarkerError::RemoteStatus {
            op: "put",
            key: "a".to_string(),
            status: 503,
        };
        assert!(throttled.is_transient());

        let forbidden = MarkerError::RemoteStatus {
            op: "put",
            key: "a".to_string(),
            status: 403,
        };
        assert!(!forbidden.is_transient());
        assert!(!MarkerError::RemoteNotFound("a".to_string()).is_transient());
        assert!(!MarkerError::ExternalTool("exit 1".to_string()).is_transient());
    }
}

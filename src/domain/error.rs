use thiserror::Error;

/// Why a transform call had to be aborted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    #[error("incompatible transformer api version: expected {expected}, got {found}")]
    IncompatibleApiVersion { expected: u32, found: String },

    #[error("transformer response is missing the api version header")]
    MissingApiVersion,

    #[error("malformed transformer response: {0}")]
    MalformedResponse(String),

    #[error("transformer returned {actual} responses for {expected} events")]
    ResponseCountMismatch { expected: usize, actual: usize },

    #[error("transformer returned status code: {status}")]
    RequestFailed { status: u16 },

    #[error("transformer request failed: {0}")]
    Transport(String),

    #[error("transformer request timed out: {0}")]
    TimedOut(String),

    #[error("failed to encode transformer request: {0}")]
    Encoding(String),
}

/// Outcome of a transform call that produced no result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformerError {
    /// The caller must not continue with this data. The binary exits on it.
    #[error("irrecoverable {stage} fault calling {url}: {kind}")]
    Irrecoverable {
        stage: String,
        url: String,
        kind: FaultKind,
    },

    #[error("transform call cancelled")]
    Cancelled,
}

impl TransformerError {
    pub fn irrecoverable(stage: impl Into<String>, url: impl Into<String>, kind: FaultKind) -> Self {
        Self::Irrecoverable {
            stage: stage.into(),
            url: url.into(),
            kind,
        }
    }

    pub fn is_irrecoverable(&self) -> bool {
        matches!(self, Self::Irrecoverable { .. })
    }

    pub fn fault_kind(&self) -> Option<&FaultKind> {
        match self {
            Self::Irrecoverable { kind, .. } => Some(kind),
            Self::Cancelled => None,
        }
    }
}

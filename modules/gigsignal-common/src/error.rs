use thiserror::Error;

/// The platform's single error taxonomy (§7, §4.12). Every subsystem returns
/// this type at its boundary; internal code may still use `anyhow::Error`
/// and convert with `?` via the `Anyhow` variant.
#[derive(Error, Debug)]
pub enum Error {
    // --- Input (§7) ---
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("not found: {0}")]
    NotFound(String),

    // --- Dependency (§7) ---
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("upstream parse failure: {0}")]
    UpstreamParseFailure(String),

    // --- Data / validation (§4.12, §7) ---
    #[error("invalid gig data: {0}")]
    InvalidGigData(String),
    #[error("missing required field: {0}")]
    MissingRequiredField(String),
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
    #[error("invalid venue data: {0}")]
    InvalidVenueData(String),
    #[error("invalid price data: {0}")]
    InvalidPriceData(String),
    #[error("invalid url format: {0}")]
    InvalidUrlFormat(String),
    #[error("hash generation failed: {0}")]
    HashGenerationFailed(String),
    #[error("similarity calculation failed: {0}")]
    SimilarityCalculationFailed(String),
    #[error("data corruption: {0}")]
    DataCorruption(String),
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
    #[error("corrupt catalog: {0}")]
    CorruptCatalog(String),

    // --- System (§7) ---
    #[error("lockfile conflict: another process already holds {0}")]
    LockConflict(String),
    #[error("shutdown requested")]
    ShutdownRequested,

    // --- Query surface mapping (§4.11, §7) ---
    #[error("service unavailable")]
    ServiceUnavailable,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Severity used by the per-source error log (§4.14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

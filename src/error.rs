use thiserror::Error;

/// Errors that can abort a pipeline stage.
///
/// Only configuration-level problems are fatal: a bad window specification or
/// a required input file that cannot be read. Per-item trouble (a fetch that
/// came back non-200, an LLM reply that failed the compliance scan, a reply
/// with no parseable blocks) is recorded as data in the per-source envelope
/// and never surfaces through this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The window arguments could not be resolved into a `[start, end]` pair.
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// A required input artifact was absent.
    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reason codes recorded against items that produced no events.
///
/// These travel into the `noncompliant` list of the per-source envelope so a
/// human can audit exactly which inputs failed extraction and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The article/body fetch failed; nothing was sent to the model.
    FetchFailed,
    /// The reply failed the compliance scan even after the single retry and
    /// the best-available text held no parseable blocks either.
    SchemaNoncompliant,
    /// A non-empty reply contained no canonical header blocks.
    NoBlocksParsed,
    /// The completion service itself errored.
    ServiceError,
    /// The entity had no usable body text.
    EmptyBody,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::FetchFailed => "fetch_failed",
            FailureReason::SchemaNoncompliant => "schema_noncompliant",
            FailureReason::NoBlocksParsed => "no_blocks_parsed",
            FailureReason::ServiceError => "service_error",
            FailureReason::EmptyBody => "empty_body",
        }
    }
}

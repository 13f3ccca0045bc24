//! Error kinds surfaced by the pipeline.
//!
//! Only configuration errors abort a run. The other kinds are isolated to one
//! domain, one keyword batch or one blog post by the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GapError {
    /// Network failure, non-success status or unparsable document.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The LLM call failed after its retry budget was spent.
    #[error("AI service failed during {stage}: {reason}")]
    AiService { stage: String, reason: String },

    /// Generated content stayed below the quality bar.
    #[error("quality check failed: {0}")]
    Quality(String),

    /// Missing API key, invalid domain and similar setup problems.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GapError {
    pub(crate) fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn ai(stage: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::AiService {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }
}

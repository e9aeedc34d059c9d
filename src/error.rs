use thiserror::Error;

/// Failure of a single external analysis attempt.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("transient analysis failure: {0}")]
    Transient(String),
    #[error("permanent analysis failure: {0}")]
    Permanent(String),
    #[error("unparseable analysis response: {0}")]
    Parse(String),
}

impl AnalysisError {
    /// Parse failures are retried like rate limits; the response may just
    /// have been truncated.
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::Transient(_) | AnalysisError::Parse(_))
    }
}

/// Failures that end a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no source returned any article ({sources} sources tried)")]
    CollectionOutage { sources: usize },
    #[error("document contained no readable text")]
    EmptyDocument,
    #[error("document could not be read: {0}")]
    DocumentUnreadable(String),
}

impl RunError {
    pub fn user_message(&self) -> String {
        match self {
            RunError::CollectionOutage { sources } => format!(
                "❌ None of the {sources} news sources could be reached right now. Please try again in a few minutes."
            ),
            RunError::EmptyDocument => {
                "❌ I couldn't find any readable text in that file. Scanned newspapers without a text layer are not supported.".to_string()
            }
            RunError::DocumentUnreadable(_) => {
                "❌ Sorry, I couldn't read that file. Please make sure it is a valid PDF or text document.".to_string()
            }
        }
    }
}

//! Error types for Mimic operations

/// Result type for Mimic operations
pub type Result<T> = std::result::Result<T, MimicError>;

/// Error types for the behavior engine.
///
/// The engine's hot path (`process`, `segment`, `inject_typo`) never returns
/// these; they surface only from host-facing setup such as configuration
/// loading, strict corpus loading, or timeline validation.
#[derive(Debug, thiserror::Error)]
pub enum MimicError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Word/frequency corpus could not be read or parsed
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// A playback script violates an ordering invariant
    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_errors_convert() {
        let err: MimicError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, MimicError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error: "));
    }

    #[test]
    fn test_display_prefixes() {
        let err = MimicError::Corpus("Failed to read dict.txt".to_string());
        assert_eq!(err.to_string(), "Corpus error: Failed to read dict.txt");
        let err = MimicError::InvalidTimeline("bad order".to_string());
        assert_eq!(err.to_string(), "Invalid timeline: bad order");
    }
}

use thiserror::Error;

/// Custom error types for the poll server
#[derive(Debug, Error)]
pub enum PollError {
    /// Poll session rejections
    #[error("A poll is already active")]
    PollAlreadyActive,

    #[error("No poll is active")]
    NoActivePoll,

    #[error("Invalid poll: {0}")]
    InvalidPoll(String),

    #[error("Choice {choice} is out of range for {options} options")]
    InvalidChoice { choice: usize, options: usize },

    #[error("Student {0} has no response for the active poll")]
    UnknownStudent(String),

    #[error("Student {0} already submitted")]
    AlreadySubmitted(String),

    /// Roster rejections
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    /// Transport errors
    #[error("Invalid client message: {0}")]
    InvalidMessage(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Connection {0} is closed")]
    ConnectionClosed(String),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Convenience type alias for Results using PollError
pub type Result<T> = std::result::Result<T, PollError>;

impl PollError {
    /// Helper to create InvalidPoll errors
    pub fn invalid_poll(msg: impl Into<String>) -> Self {
        PollError::InvalidPoll(msg.into())
    }

    /// Rejections are dropped silently by the router; everything else is a
    /// transport or server fault worth a louder log line.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PollError::PollAlreadyActive
                | PollError::NoActivePoll
                | PollError::InvalidPoll(_)
                | PollError::InvalidChoice { .. }
                | PollError::UnknownStudent(_)
                | PollError::AlreadySubmitted(_)
                | PollError::InvalidRegistration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PollError::InvalidChoice { choice: 4, options: 2 };
        assert_eq!(err.to_string(), "Choice 4 is out of range for 2 options");

        let err = PollError::AlreadySubmitted("abc".to_string());
        assert_eq!(err.to_string(), "Student abc already submitted");
    }

    #[test]
    fn test_error_helpers() {
        let err = PollError::invalid_poll("needs two options");
        assert!(matches!(err, PollError::InvalidPoll(_)));
    }

    #[test]
    fn test_rejection_classification() {
        assert!(PollError::PollAlreadyActive.is_rejection());
        assert!(PollError::NoActivePoll.is_rejection());
        assert!(PollError::InvalidRegistration("empty name".into()).is_rejection());
        assert!(!PollError::ConnectionClosed("abc".into()).is_rejection());
        assert!(!PollError::InvalidMessage("not json".into()).is_rejection());
    }

    #[test]
    fn test_from_serde_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: PollError = parse_err.into();
        assert!(matches!(err, PollError::SerializationFailed(_)));
    }
}

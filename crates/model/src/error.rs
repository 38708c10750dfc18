use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The provider could not be reached, or the connection dropped.
    Network,
    /// The credential was missing, invalid, or lacks permission.
    Unauthorized,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The content is moderated.
    Moderated,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if a later attempt with the same request may succeed.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::RateLimitExceeded)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::Moderated => write!(f, "content moderated"),
            ErrorKind::Other => write!(f, "provider error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::Network.is_transient());
        assert!(ErrorKind::RateLimitExceeded.is_transient());
        assert!(!ErrorKind::Unauthorized.is_transient());
        assert!(!ErrorKind::Moderated.is_transient());
        assert!(!ErrorKind::Other.is_transient());
    }
}

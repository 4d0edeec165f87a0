use std::fmt;

/// Result type for stepline-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug)]
pub enum Error {
    /// Event lacked a field required for correlation
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingField { event, field } => {
                write!(f, "{} event is missing required field '{}'", event, field)
            }
        }
    }
}

impl std::error::Error for Error {}

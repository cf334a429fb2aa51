use thiserror::Error;

use crate::shared::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// `location` names the element (and attribute) plus its line and column
    #[error("malformed input at {location}: {message}")]
    MalformedInput { location: String, message: String },
}

impl ParseError {
    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        ParseError::MalformedInput {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn location(&self) -> &str {
        match self {
            ParseError::MalformedInput { location, .. } => location,
        }
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::MalformedInput { location, message } => {
                AppError::MalformedInput { location, message }
            }
        }
    }
}

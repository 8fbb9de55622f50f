//! Error types for reader internals

use thiserror::Error;

/// Errors raised while decoding a file, before they are tagged with a format
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Invalid file format: {format}")]
    InvalidFormat { format: String },

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Unexpected end of file: {context}")]
    UnexpectedEof { context: String },

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IoError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        IoError::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Tag the error with the format it came from
    pub fn into_error(self, format: &'static str) -> meshview_core::Error {
        use meshview_core::Error;
        match self {
            IoError::InvalidFormat { format: detail } => {
                Error::InvalidData(format!("{}: {}", format, detail))
            }
            IoError::ParseError { line, message } => Error::Parse { format, line, message },
            IoError::UnexpectedEof { context } => Error::Parse {
                format,
                line: 0,
                message: format!("unexpected end of file while reading {}", context),
            },
            IoError::Unsupported(what) => Error::Unsupported(format!("{}: {}", format, what)),
            IoError::Io(e) => Error::Io(e),
        }
    }
}

impl From<IoError> for meshview_core::Error {
    fn from(e: IoError) -> Self {
        e.into_error("file")
    }
}

pub type IoResult<T> = std::result::Result<T, IoError>;

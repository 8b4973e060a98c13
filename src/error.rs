//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing, rasterizing or encoding an export
#[derive(Error, Debug)]
pub enum Error {
    /// The embedded frame's content is not reachable (cross-origin)
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// No body or root element was found to render
    #[error("Missing content: {0}")]
    MissingContent(String),

    /// The underlying capture failed
    #[error("Rasterization failed: {0}")]
    RasterizationFailure(String),

    /// Converting the bitmap into the requested format failed
    #[error("Encoding failed: {0}")]
    EncodingFailure(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Failed to initialize the layout host
    #[error("Layout host initialization failed: {0}")]
    InitializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generated brochure content does not have the expected shape
    #[error("Invalid brochure content: {0}")]
    InvalidContent(String),

    /// Filesystem error while saving an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short machine-friendly label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Error::AccessDenied(_) => "access_denied",
            Error::MissingContent(_) => "missing_content",
            Error::RasterizationFailure(_) => "rasterization_failure",
            Error::EncodingFailure(_) => "encoding_failure",
            Error::Timeout(_) => "timeout",
            Error::InitializationError(_) => "initialization",
            Error::Config(_) => "config",
            Error::InvalidContent(_) => "invalid_content",
            Error::Io(_) => "io",
            #[cfg(feature = "cdp")]
            Error::CdpError(_) => "cdp",
            Error::Other(_) => "other",
        }
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::EncodingFailure(err.to_string())
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::EncodingFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "cdp")]
    #[test]
    fn browser_errors_convert_with_question_mark() {
        fn call() -> Result<()> {
            Err(anyhow::anyhow!("Target closed"))?;
            Ok(())
        }
        let err = call().unwrap_err();
        assert_eq!(err.kind(), "cdp");
        assert_eq!(err.to_string(), "CDP error: Target closed");
    }
}

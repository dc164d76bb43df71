//! Error types for markup rendering.

/// Errors produced while rendering a markup document.
///
/// Post-processing enrichments never surface here: a failed mention lookup
/// or code preview leaves the text unlinked and is only logged.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RenderError {
    /// No renderer is registered for the markup type or file name.
    #[error("unsupported markup type: {0}")]
    UnsupportedType(String),

    /// Reading input or writing output failed.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Input is not valid UTF-8 where text is required.
    #[error("invalid UTF-8 input")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Front matter exists but is not valid YAML for any supported dialect.
    #[error("invalid front matter")]
    FrontMatter(#[from] serde_yaml::Error),

    /// Settings file could not be parsed.
    #[error("invalid settings")]
    Settings(#[from] toml::de::Error),

    /// A pattern built from settings is not a valid regular expression.
    #[error("invalid pattern")]
    Pattern(#[from] regex::Error),

    /// The repository backing a render helper could not be opened.
    #[error("repository error: {0}")]
    Repository(String),

    /// An external renderer command failed.
    #[error("external renderer {name} failed: {message}")]
    External {
        /// Renderer name.
        name: String,
        /// Failure description (exit status or spawn error).
        message: String,
    },

    /// The render was cancelled through its context.
    #[error("render cancelled")]
    Cancelled,
}

/// Result alias for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

use confstore_types::TypeError;

/// Errors from encoding or parsing an envelope.
///
/// Every variant is fatal for the document being processed: nothing here is
/// recovered or defaulted.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The document is not valid UTF-8.
    #[error("document is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The input ended before the document was complete.
    #[error("unexpected end of document, expected {expected}")]
    UnexpectedEof { expected: String },

    /// Markup that could not be tokenized.
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A closing tag did not match the innermost open tag.
    #[error("mismatched tag at byte {offset}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        offset: usize,
        expected: String,
        found: String,
    },

    /// Character data where only elements are allowed.
    #[error("unexpected character data at byte {offset}")]
    UnexpectedText { offset: usize },

    /// An `&...;` reference that is not one of the predefined entities.
    #[error("invalid entity reference at byte {offset}: {entity}")]
    InvalidEntity { offset: usize, entity: String },

    /// The first element is not the document root.
    #[error("document start <{expected}> not found, found {found}")]
    MissingDocumentStart {
        expected: &'static str,
        found: String,
    },

    /// The root element does not begin with the version value.
    #[error("version value not found")]
    MissingVersion,

    /// The version value is present but not an integer.
    #[error("malformed version value: {0}")]
    MalformedVersion(String),

    /// The version is outside the supported range.
    #[error(transparent)]
    InvalidVersion(#[from] TypeError),

    /// A version-2 document without its integrity block.
    #[error("integrity block missing from version 2 document")]
    MissingIntegrityBlock,

    /// The root element is never closed.
    #[error("document end </{0}> not found")]
    MissingDocumentEnd(&'static str),

    /// Non-whitespace content after the document end.
    #[error("trailing content after document end at byte {offset}")]
    TrailingContent { offset: usize },

    /// A typed value element that could not be interpreted.
    #[error("malformed value '{name}': {reason}")]
    MalformedValue { name: String, reason: String },

    /// A section name that is not a valid tag name.
    #[error("invalid section name: {0:?}")]
    InvalidSectionName(String),

    /// A provider payload that is not a well-formed markup fragment.
    #[error("malformed payload for section '{section}': {reason}")]
    MalformedPayload { section: String, reason: String },
}

/// Result alias for envelope operations.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

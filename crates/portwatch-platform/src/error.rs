//! Platform parse errors.
//!
//! Backends surface failures as [`portwatch_core::Error`]; this type covers
//! the structured decoding steps (uevent messages, sysfs attributes) so they
//! can be tested precisely before conversion.

/// Result type alias for platform decoding.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Message shorter than its fixed header.
    #[error("uevent message truncated ({0} bytes)")]
    Truncated(usize),

    /// libudev header with the wrong magic.
    #[error("bad libudev magic {0:#010x}")]
    BadMagic(u32),

    /// Property block outside the message.
    #[error("uevent properties out of bounds (offset {offset}, length {length}, message {size})")]
    PropertiesOutOfBounds {
        /// Declared offset.
        offset: usize,
        /// Declared length.
        length: usize,
        /// Message size.
        size: usize,
    },

    /// Kernel header without `action@devpath`.
    #[error("malformed uevent header")]
    MalformedHeader,

    /// Required property absent.
    #[error("uevent lacks {0}")]
    MissingField(&'static str),

    /// Sysfs attribute with an unexpected value.
    #[error("invalid sysfs attribute {name}: {value:?}")]
    Attribute {
        /// Attribute name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

impl ParseError {
    /// Creates an attribute error.
    #[must_use]
    pub fn attribute(name: &'static str, value: impl Into<String>) -> Self {
        Self::Attribute {
            name,
            value: value.into(),
        }
    }
}

impl From<ParseError> for portwatch_core::Error {
    fn from(err: ParseError) -> Self {
        Self::invalid(err.to_string())
    }
}

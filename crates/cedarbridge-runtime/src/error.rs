//! Error types for the Cedarbridge wire format.
//!
//! Every failure is raised synchronously at construction, serialization, or
//! parse time. Nothing is truncated, clamped, or coerced.

use thiserror::Error;

/// Failures raised by serialization contexts, generated codecs, and the
/// container protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// A fixed message began with the wrong magic number.
    #[error("bad magic number: expected {expected:#010x}, received {received:#010x}")]
    BadMagicNumber {
        /// Magic number of the message being parsed
        expected: u32,
        /// Value actually read
        received: u32,
    },

    /// A version range whose minimum exceeds its maximum.
    #[error("bad version range: minimum {min} exceeds maximum {max}")]
    BadVersionRange {
        /// Lower bound
        min: u64,
        /// Upper bound
        max: u64,
    },

    /// A length-limited message exceeded its limit.
    #[error("message too long: {actual} bytes exceeds limit of {limit}")]
    MessageTooLong {
        /// Maximum permitted length in bytes
        limit: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// The input ended before a read could complete.
    #[error("truncated input: {needed} more bytes required")]
    Truncated {
        /// Size of the read that could not be satisfied
        needed: usize,
    },

    /// A fixed-capacity buffer cannot hold the next write.
    #[error("buffer full: writing {needed} bytes exceeds remaining capacity {remaining}")]
    BufferFull {
        /// Size of the rejected write
        needed: usize,
        /// Capacity left in the buffer
        remaining: usize,
    },

    /// A length or count does not fit in the unsigned 32-bit prefix.
    #[error("length {length} does not fit in an unsigned 32-bit prefix")]
    LengthOverflow {
        /// Offending length
        length: usize,
    },

    /// A string field did not hold valid UTF-8.
    #[error("invalid UTF-8 in string field: {reason}")]
    InvalidUtf8 {
        /// Decoder error description
        reason: String,
    },

    /// A variant discriminator outside the declared cases.
    #[error("unrecognized variant index {index} for {type_name} ({cases} cases)")]
    UnrecognizedVariantIndex {
        /// Qualified name of the variant or protocol version
        type_name: String,
        /// Index read from the wire
        index: u32,
        /// Number of declared cases
        cases: u32,
    },

    /// A boolean field held something other than 0 or 1.
    #[error("bad boolean: expected 0 or 1, received {received}")]
    BadBoolean {
        /// Value actually read
        received: u32,
    },

    /// A type-erased codec was handed a value of the wrong type.
    #[error("type mismatch: expected a value of type {expected}")]
    TypeMismatch {
        /// Qualified name of the expected type
        expected: String,
    },

    /// The underlying stream failed.
    #[error("i/o failure ({kind}): {message}")]
    Io {
        /// `std::io::ErrorKind` rendered as text
        kind: String,
        /// Error description
        message: String,
    },
}

impl WireError {
    pub(crate) fn from_io(err: &std::io::Error, needed: usize) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return WireError::Truncated { needed };
        }
        WireError::Io {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }
}

/// Convenient Result type alias for wire operations
pub type Result<T> = std::result::Result<T, WireError>;

//! Latched builder errors.

use thiserror::Error;

/// Errors that latch on a [`Builder`](crate::Builder) and surface at
/// extraction.
///
/// Once latched, every further operation on the builder is a no-op and
/// [`take_bytes`](crate::Builder::take_bytes) returns the error instead of
/// the accumulated bytes. API misuse (exceeding a fixed buffer, unwriting
/// past a scope boundary) is not an [`Error`]; it panics.
#[derive(Error, Debug)]
pub enum Error {
    /// A length-prefixed scope closed over a body too large for its prefix.
    #[error("pending child length {length} exceeds {width}-byte length prefix")]
    PrefixOverflow {
        /// Measured body length in bytes.
        length: u64,
        /// Declared prefix width in bytes.
        width: usize,
    },

    /// An ASN.1 scope closed over a body longer than `2^31 - 1` bytes.
    #[error("pending ASN.1 child length {0} exceeds maximum")]
    Asn1Overflow(u64),

    /// An append would have grown the buffer past the maximum supported size.
    #[error("buffer exceeds maximum supported length")]
    LengthOverflow,

    /// A scope callback panicked and the panic was caught by the caller.
    #[error("length-prefixed scope callback panicked")]
    Panicked,

    /// A caller-supplied failure, latched via
    /// [`set_error`](crate::Builder::set_error) or returned from a scope
    /// callback.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary error for latching on a builder.
    pub fn custom(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Custom(err.into())
    }
}

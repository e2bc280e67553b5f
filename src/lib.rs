//! Build and parse length-prefixed wire formats.
//!
//! # Overview
//!
//! A library for the binary framing style shared by TLS, X.509/ASN.1 DER,
//! and similar protocols, built around two paired abstractions:
//! - [`Builder`] emits a byte sequence, with nested length-prefixed regions
//!   described as scopes: the prefix slot is reserved up front, the body is
//!   measured when the scope closes, and the prefix is back-patched. Callers
//!   never compute a length by hand.
//! - [`Reader`] is a non-owning, zero-allocation view that consumes exactly
//!   what the builder emits: fixed-width integers, raw byte runs, and
//!   length-prefixed sub-views.
//!
//! Fixed-width integers are big-endian (network byte order); a parallel
//! `_le` method family covers little-endian formats with the same
//! contracts. The [`asn1`] module adds DER framing on both halves.
//!
//! Recoverable failures latch on the builder and surface once at
//! [`Builder::take_bytes`]; API misuse panics. The reader signals failure by
//! returning `None` and leaving the view unchanged.
//!
//! # Example
//!
//! ```
//! use wirebyte::{Builder, Reader};
//!
//! // A 16-bit prefixed series of 8-bit prefixed strings, as found in TLS.
//! let mut b = Builder::new();
//! b.add_u16_length_prefixed(|b| {
//!     for value in ["hello", "world"] {
//!         b.add_u8_length_prefixed(|b| {
//!             b.add_bytes(value.as_bytes());
//!             Ok(())
//!         });
//!     }
//!     Ok(())
//! });
//! let wire = b.take_bytes().unwrap();
//!
//! let mut input = Reader::new(&wire);
//! let mut values = input.read_u16_length_prefixed().unwrap();
//! assert!(input.is_empty());
//! let mut result = Vec::new();
//! while !values.is_empty() {
//!     let value = values.read_u8_length_prefixed().unwrap();
//!     result.push(std::str::from_utf8(value.as_bytes()).unwrap());
//! }
//! assert_eq!(result, ["hello", "world"]);
//! ```

pub mod asn1;
pub mod builder;
pub mod error;
pub mod reader;

pub use builder::Builder;
pub use error::Error;
pub use reader::Reader;

//! Append-only byte emitter with deferred length prefixes.
//!
//! # Overview
//!
//! A [`Builder`] accumulates a single contiguous byte sequence. Fixed-width
//! integers and raw bytes are appended directly; length-prefixed regions are
//! described with nested scopes, without knowing each field's length in
//! advance. Opening a scope reserves the prefix slot and hands the builder
//! back to a callback; when the callback returns, the body is measured and
//! the prefix back-patched.
//!
//! Recoverable failures (a body outgrowing its prefix, a callback returning
//! an error) latch on the builder: every further operation becomes a no-op
//! and [`Builder::take_bytes`] returns the error. API misuse (outgrowing a
//! fixed buffer, unwriting past a scope boundary, replacing the builder
//! under an open scope) panics.

use crate::Error;
use bytes::BufMut;
use paste::paste;

/// Buffer length ceiling; requests beyond this latch [`Error::LengthOverflow`].
const MAX_LEN: usize = isize::MAX as usize;

/// Bytes reserved for an ASN.1 length before the encoded form is known.
const ASN1_RESERVED: usize = 4;

/// Encoding of an open scope's length prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Prefix {
    /// Fixed-width big-endian.
    Big,
    /// Fixed-width little-endian.
    Little,
    /// ASN.1 DER definite length.
    Asn1,
}

/// An open length-prefixed scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Frame {
    /// Offset of the first reserved prefix byte.
    pos: usize,
    /// Number of reserved prefix bytes.
    width: usize,
    prefix: Prefix,
}

impl Frame {
    /// Offset of the first body byte.
    fn data_start(&self) -> usize {
        self.pos + self.width
    }
}

/// An append-only builder of length-prefixed byte sequences.
///
/// # Example
///
/// ```
/// use wirebyte::Builder;
///
/// let mut b = Builder::new();
/// b.add_u8(1);
/// b.add_u16_length_prefixed(|b| {
///     b.add_bytes(b"hi");
///     Ok(())
/// });
/// assert_eq!(b.take_bytes().unwrap(), [1, 0, 2, b'h', b'i']);
/// ```
///
/// Scope callbacks receive the builder itself, so the borrow checker rules
/// out writes through any outer handle while a scope is open:
///
/// ```compile_fail
/// let mut b = wirebyte::Builder::new();
/// b.add_u8_length_prefixed(|c| {
///     b.add_u8(2); // `b` is inaccessible until the scope closes
///     Ok(())
/// });
/// ```
///
/// Within one message, stick to a single integer family: the big-endian
/// methods or their `_le` counterparts, never both.
#[derive(Debug, Default)]
pub struct Builder {
    buf: Vec<u8>,
    /// Capacity ceiling recorded at construction; meaningful when `fixed`.
    cap: usize,
    fixed: bool,
    /// Length of adopted storage at construction; `unwrite` floor.
    base: usize,
    /// Open scopes, innermost last.
    frames: Vec<Frame>,
    err: Option<Error>,
}

impl Builder {
    /// Creates an empty, growable builder.
    pub fn new() -> Self {
        Self::with_buffer(Vec::new())
    }

    /// Creates a growable builder that appends to `buf`.
    ///
    /// While the capacity of `buf` suffices, output is produced in place;
    /// once it does not, the storage is reallocated like any [`Vec`].
    pub fn with_buffer(buf: Vec<u8>) -> Self {
        Self {
            base: buf.len(),
            buf,
            cap: 0,
            fixed: false,
            frames: Vec::new(),
            err: None,
        }
    }

    /// Creates a builder that appends to `buf` and never reallocates.
    ///
    /// Any operation that would grow the buffer past the capacity `buf` has
    /// at construction panics before mutating state. Use this for output
    /// into pre-sized or shared storage, where a silent reallocation would
    /// be a bug.
    pub fn new_fixed(buf: Vec<u8>) -> Self {
        Self {
            base: buf.len(),
            cap: buf.capacity(),
            buf,
            fixed: true,
            frames: Vec::new(),
            err: None,
        }
    }

    /// Number of bytes accumulated so far, including unpatched prefixes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether no bytes have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Latches `err` if no error is latched yet.
    ///
    /// All subsequent operations become no-ops and
    /// [`take_bytes`](Self::take_bytes) returns the latched error.
    pub fn set_error(&mut self, err: Error) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// Consumes the builder and returns the accumulated bytes, or the
    /// latched error if any operation failed.
    pub fn take_bytes(self) -> Result<Vec<u8>, Error> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.buf),
        }
    }

    /// Appends `bytes` verbatim.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        if !self.ensure(bytes.len()) {
            return;
        }
        self.buf.put_slice(bytes);
    }

    /// Appends `value` as a single byte.
    #[inline]
    pub fn add_u8(&mut self, value: u8) {
        self.add_unsigned(value as u64, 1, false);
    }

    /// Rescinds the last `n` appended bytes.
    ///
    /// No-op if an error is latched or `n` is zero.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the number of bytes appended within the current
    /// scope (or since construction when no scope is open; storage adopted
    /// at construction cannot be unwritten).
    pub fn unwrite(&mut self, n: usize) {
        if self.err.is_some() {
            return;
        }
        let start = self.frames.last().map_or(self.base, Frame::data_start);
        let written = self.buf.len() - start;
        if n > written {
            panic!("unwrite of {n} bytes exceeds {written} bytes written in current scope");
        }
        self.buf.truncate(self.buf.len() - n);
    }

    /// Appends a body whose ASN.1 DER definite length is patched in front of
    /// it when `body` returns.
    ///
    /// Four bytes are reserved for the length; once the body is measured,
    /// the minimal DER form is written and the body shifted to sit flush
    /// against it. Bodies longer than `2^31 - 1` bytes latch an error.
    pub fn add_asn1_length_prefixed<F>(&mut self, body: F)
    where
        F: FnOnce(&mut Builder) -> Result<(), Error>,
    {
        self.add_length_prefixed(ASN1_RESERVED, Prefix::Asn1, body);
    }

    /// Checks that `n` more bytes can be appended.
    ///
    /// Returns false (without mutating) when an error is latched or the
    /// request latches [`Error::LengthOverflow`]. Panics when a fixed
    /// builder would outgrow its storage.
    fn ensure(&mut self, n: usize) -> bool {
        if self.err.is_some() {
            return false;
        }
        let new_len = match self.buf.len().checked_add(n) {
            Some(new_len) if new_len <= MAX_LEN => new_len,
            _ => {
                self.err = Some(Error::LengthOverflow);
                return false;
            }
        };
        if self.fixed && new_len > self.cap {
            panic!(
                "append of {n} bytes exceeds fixed buffer capacity {} (length {})",
                self.cap,
                self.buf.len()
            );
        }
        true
    }

    fn add_unsigned(&mut self, value: u64, width: usize, little: bool) {
        if !self.ensure(width) {
            return;
        }
        if little {
            self.buf.put_uint_le(value, width);
        } else {
            self.buf.put_uint(value, width);
        }
    }

    pub(crate) fn add_length_prefixed<F>(&mut self, width: usize, prefix: Prefix, body: F)
    where
        F: FnOnce(&mut Builder) -> Result<(), Error>,
    {
        if self.err.is_some() {
            return;
        }
        let pos = self.buf.len();
        if !self.ensure(width) {
            return;
        }
        self.buf.put_bytes(0, width);
        self.frames.push(Frame { pos, width, prefix });
        let depth = self.frames.len();

        // If `body` unwinds, the guard drops the open frame and latches so a
        // builder observed after a caught panic is terminal rather than
        // half-updated. The panic itself propagates unchanged.
        let result = {
            let mut guard = ScopeGuard {
                builder: self,
                depth,
                defused: false,
            };
            let result = body(&mut *guard.builder);
            guard.defused = true;
            result
        };

        if self.frames.len() != depth {
            panic!("builder replaced while a length-prefixed scope was open");
        }
        let frame = self.frames.pop().expect("open scope frame");
        if frame != (Frame { pos, width, prefix }) {
            panic!("builder replaced while a length-prefixed scope was open");
        }
        if let Err(err) = result {
            self.set_error(err);
            return;
        }
        if self.err.is_some() {
            return;
        }

        let length = (self.buf.len() - frame.data_start()) as u64;
        match frame.prefix {
            Prefix::Big | Prefix::Little => self.patch_fixed(frame, length),
            Prefix::Asn1 => self.patch_asn1(frame, length),
        }
    }

    /// Back-patches a fixed-width prefix with the measured body length.
    fn patch_fixed(&mut self, frame: Frame, length: u64) {
        if length >= 1u64 << (8 * frame.width) {
            self.set_error(Error::PrefixOverflow {
                length,
                width: frame.width,
            });
            return;
        }
        let mut slot = &mut self.buf[frame.pos..frame.data_start()];
        match frame.prefix {
            Prefix::Big => slot.put_uint(length, frame.width),
            Prefix::Little => slot.put_uint_le(length, frame.width),
            Prefix::Asn1 => unreachable!(),
        }
    }

    /// Back-patches an ASN.1 DER definite length and closes the gap left by
    /// the reservation.
    fn patch_asn1(&mut self, frame: Frame, length: u64) {
        if length > i32::MAX as u64 {
            self.set_error(Error::Asn1Overflow(length));
            return;
        }
        // Short form below 128; otherwise an initial byte plus the minimal
        // count of big-endian length bytes.
        let header = if length < 0x80 {
            1
        } else {
            let mut bytes = 0;
            let mut rest = length;
            while rest > 0 {
                bytes += 1;
                rest >>= 8;
            }
            1 + bytes
        };

        let body = frame.data_start();
        let end = self.buf.len();
        if header < frame.width {
            self.buf.copy_within(body..end, frame.pos + header);
            self.buf.truncate(end - (frame.width - header));
        } else if header > frame.width {
            // Only the five-byte form (bodies of 2^24 bytes and up) lands
            // here; grow by the difference and shift the body right.
            let extra = header - frame.width;
            if !self.ensure(extra) {
                return;
            }
            self.buf.put_bytes(0, extra);
            self.buf.copy_within(body..end, body + extra);
        }

        let mut slot = &mut self.buf[frame.pos..frame.pos + header];
        if length < 0x80 {
            slot.put_u8(length as u8);
        } else {
            let bytes = header - 1;
            slot.put_u8(0x80 | bytes as u8);
            slot.put_uint(length, bytes);
        }
    }
}

/// Latches and unwinds scope state if a callback panics.
struct ScopeGuard<'a> {
    builder: &'a mut Builder,
    depth: usize,
    defused: bool,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.defused {
            return;
        }
        self.builder.frames.truncate(self.depth - 1);
        self.builder.set_error(Error::Panicked);
    }
}

// Fixed-width integer appends beyond u8, in big-endian and little-endian
// pairs. The two families share one contract and must not be mixed within a
// message. `add_u24` and `add_u48` take the next wider type and emit the
// low-order bytes.
macro_rules! impl_add_uint {
    ($($bits:literal => ($width:literal, $ty:ty)),+ $(,)?) => {
        paste! {
            impl Builder {
                $(
                    #[doc = concat!(
                        "Appends `value` as a big-endian ", stringify!($bits), "-bit integer."
                    )]
                    #[inline]
                    pub fn [<add_u $bits>](&mut self, value: $ty) {
                        self.add_unsigned(value as u64, $width, false);
                    }

                    #[doc = concat!(
                        "Appends `value` as a little-endian ", stringify!($bits), "-bit integer."
                    )]
                    #[inline]
                    pub fn [<add_u $bits _le>](&mut self, value: $ty) {
                        self.add_unsigned(value as u64, $width, true);
                    }
                )+
            }
        }
    };
}

impl_add_uint!(
    16 => (2, u16),
    24 => (3, u32),
    32 => (4, u32),
    48 => (6, u64),
    64 => (8, u64),
);

// Length-prefixed scopes for each prefix width. A one-byte prefix has no
// byte order, so `add_u8_length_prefixed` has no `_le` counterpart.
macro_rules! impl_add_length_prefixed {
    ($($bits:literal => $width:literal),+ $(,)?) => {
        paste! {
            impl Builder {
                $(
                    #[doc = concat!(
                        "Appends a body whose length is patched in front of it as a ",
                        "big-endian ", stringify!($bits), "-bit prefix when `body` returns.",
                    )]
                    ///
                    /// A body too large for the prefix latches
                    /// [`Error::PrefixOverflow`]; an `Err` returned by `body`
                    /// latches that error. Either way extraction reports the
                    /// failure.
                    pub fn [<add_u $bits _length_prefixed>]<F>(&mut self, body: F)
                    where
                        F: FnOnce(&mut Builder) -> Result<(), Error>,
                    {
                        self.add_length_prefixed($width, Prefix::Big, body);
                    }
                )+
            }
        }
    };
}

macro_rules! impl_add_length_prefixed_le {
    ($($bits:literal => $width:literal),+ $(,)?) => {
        paste! {
            impl Builder {
                $(
                    #[doc = concat!(
                        "Appends a body whose length is patched in front of it as a ",
                        "little-endian ", stringify!($bits), "-bit prefix when `body` returns.",
                    )]
                    pub fn [<add_u $bits _length_prefixed_le>]<F>(&mut self, body: F)
                    where
                        F: FnOnce(&mut Builder) -> Result<(), Error>,
                    {
                        self.add_length_prefixed($width, Prefix::Little, body);
                    }
                )+
            }
        }
    };
}

impl_add_length_prefixed!(8 => 1, 16 => 2, 24 => 3, 32 => 4);
impl_add_length_prefixed_le!(16 => 2, 24 => 3, 32 => 4);

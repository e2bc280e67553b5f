//! ASN.1 DER framing.
//!
//! Only the framing layer lives here: the tag byte, the definite-length
//! encoding, and the split of an element into tag, length, and body. Schema
//! concerns (INTEGER canonicalization, time formats, OID arithmetic) belong
//! to callers.
//!
//! The builder side reserves four bytes for the length and rewrites them to
//! the minimal DER form once the body is measured; the reader side accepts
//! only that minimal form. High-tag-number form (low five tag bits all set)
//! and indefinite lengths are not supported.

use crate::{Builder, Error, Reader};

/// Bit set on the tag of a constructed element.
pub const CONSTRUCTED: u8 = 0x20;

/// Bit set on a context-specific tag.
pub const CONTEXT_SPECIFIC: u8 = 0x80;

/// An ASN.1 tag byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tag(u8);

impl Tag {
    pub const BOOLEAN: Tag = Tag(0x01);
    pub const INTEGER: Tag = Tag(0x02);
    pub const BIT_STRING: Tag = Tag(0x03);
    pub const OCTET_STRING: Tag = Tag(0x04);
    pub const NULL: Tag = Tag(0x05);
    pub const OBJECT_IDENTIFIER: Tag = Tag(0x06);
    pub const ENUMERATED: Tag = Tag(0x0a);
    pub const UTF8_STRING: Tag = Tag(0x0c);
    pub const SEQUENCE: Tag = Tag(CONSTRUCTED | 0x10);
    pub const SET: Tag = Tag(CONSTRUCTED | 0x11);
    pub const UTC_TIME: Tag = Tag(0x17);
    pub const GENERALIZED_TIME: Tag = Tag(0x18);

    /// Returns the constructed form of the tag.
    pub const fn constructed(self) -> Tag {
        Tag(self.0 | CONSTRUCTED)
    }

    /// Returns the context-specific form of the tag.
    pub const fn context_specific(self) -> Tag {
        Tag(self.0 | CONTEXT_SPECIFIC)
    }
}

impl From<u8> for Tag {
    fn from(value: u8) -> Self {
        Tag(value)
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl Builder {
    /// Appends a DER element: `tag`, a definite length, then the body
    /// produced by `body`.
    pub fn add_asn1<F>(&mut self, tag: Tag, body: F)
    where
        F: FnOnce(&mut Builder) -> Result<(), Error>,
    {
        self.add_u8(tag.0);
        self.add_asn1_length_prefixed(body);
    }
}

impl<'a> Reader<'a> {
    /// Consumes a DER element with the expected `tag` and returns its body.
    ///
    /// Returns `None` (view unchanged) on a tag mismatch, a truncated
    /// element, or a length that is not minimally encoded.
    pub fn read_asn1(&mut self, tag: Tag) -> Option<Reader<'a>> {
        let mut view = *self;
        let (actual, body) = view.read_any_asn1()?;
        if actual != tag {
            return None;
        }
        *self = view;
        Some(body)
    }

    /// Consumes a DER element of any tag and returns the tag and body.
    pub fn read_any_asn1(&mut self) -> Option<(Tag, Reader<'a>)> {
        let mut view = *self;
        let tag = view.read_u8()?;
        if tag & 0x1f == 0x1f {
            // High tag number form.
            return None;
        }
        let first = view.read_u8()?;
        let length = if first & 0x80 == 0 {
            first as u64
        } else {
            let bytes = (first & 0x7f) as usize;
            // 0x80 alone would be an indefinite length; more than four
            // length bytes exceeds what a builder can emit.
            if bytes == 0 || bytes > 4 {
                return None;
            }
            let length = view.read_unsigned(bytes, false)?;
            // DER: the long form may not encode what the short form could,
            // and may not carry leading zero bytes.
            if length < 0x80 || length >> (8 * (bytes - 1)) == 0 {
                return None;
            }
            length
        };
        let body = view.read_bytes(length as usize)?;
        *self = view;
        Some((Tag(tag), Reader::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_asn1(tag: Tag, body: &[u8]) -> Vec<u8> {
        let mut b = Builder::new();
        b.add_asn1(tag, |b| {
            b.add_bytes(body);
            Ok(())
        });
        b.take_bytes().unwrap()
    }

    #[test]
    fn test_short_form() {
        assert_eq!(build_asn1(Tag::OCTET_STRING, &[1, 2, 3]), [4, 3, 1, 2, 3]);
        assert_eq!(build_asn1(Tag::NULL, &[]), [5, 0]);
        let longest_short = build_asn1(Tag::OCTET_STRING, &[0xaa; 127]);
        assert_eq!(&longest_short[..2], &[4, 127]);
        assert_eq!(longest_short.len(), 129);
    }

    #[test]
    fn test_long_form() {
        let one_byte = build_asn1(Tag::OCTET_STRING, &[0xaa; 128]);
        assert_eq!(&one_byte[..3], &[0x04, 0x81, 128]);
        assert_eq!(one_byte.len(), 131);

        let two_byte = build_asn1(Tag::OCTET_STRING, &[0xaa; 300]);
        assert_eq!(&two_byte[..4], &[0x04, 0x82, 0x01, 0x2c]);
        assert_eq!(two_byte.len(), 304);
    }

    #[test]
    fn test_nested_sequence() {
        let mut b = Builder::new();
        b.add_asn1(Tag::SEQUENCE, |b| {
            b.add_asn1(Tag::INTEGER, |b| {
                b.add_u8(42);
                Ok(())
            });
            b.add_asn1(Tag::OCTET_STRING, |b| {
                b.add_bytes(b"ok");
                Ok(())
            });
            Ok(())
        });
        let got = b.take_bytes().unwrap();
        assert_eq!(got, [0x30, 7, 0x02, 1, 42, 0x04, 2, b'o', b'k']);

        let mut r = Reader::new(&got);
        let mut seq = r.read_asn1(Tag::SEQUENCE).unwrap();
        assert!(r.is_empty());
        let mut int = seq.read_asn1(Tag::INTEGER).unwrap();
        assert_eq!(int.read_u8(), Some(42));
        let os = seq.read_asn1(Tag::OCTET_STRING).unwrap();
        assert_eq!(os.as_bytes(), b"ok");
        assert!(seq.is_empty());
    }

    #[test]
    fn test_round_trip_long_form() {
        let payload = vec![0x5a; 70_000];
        let got = build_asn1(Tag::OCTET_STRING, &payload);
        assert_eq!(&got[..5], &[0x04, 0x83, 0x01, 0x11, 0x70]);

        let mut r = Reader::new(&got);
        let body = r.read_asn1(Tag::OCTET_STRING).unwrap();
        assert_eq!(body.as_bytes(), &payload[..]);
        assert!(r.is_empty());
    }

    #[test]
    fn test_tag_mismatch_leaves_view() {
        let got = build_asn1(Tag::INTEGER, &[1]);
        let mut r = Reader::new(&got);
        assert_eq!(r.read_asn1(Tag::SEQUENCE), None);
        assert_eq!(r.len(), got.len());
        let (tag, body) = r.read_any_asn1().unwrap();
        assert_eq!(tag, Tag::INTEGER);
        assert_eq!(body.as_bytes(), &[1]);
    }

    #[test]
    fn test_rejects_malformed() {
        // High tag number form.
        assert_eq!(Reader::new(&[0x1f, 0x01, 0x00]).read_any_asn1(), None);
        // Indefinite length.
        assert_eq!(Reader::new(&[0x04, 0x80, 0x00]).read_any_asn1(), None);
        // Long form encoding a short-form value.
        let mut short_in_long = vec![0x04, 0x81, 0x7f];
        short_in_long.extend_from_slice(&[0; 0x7f]);
        assert_eq!(Reader::new(&short_in_long).read_any_asn1(), None);
        // Leading zero length byte.
        let mut nonminimal = vec![0x04, 0x82, 0x00, 0x81];
        nonminimal.extend_from_slice(&[0; 0x81]);
        assert_eq!(Reader::new(&nonminimal).read_any_asn1(), None);
        // More length bytes than a builder can emit.
        assert_eq!(
            Reader::new(&[0x04, 0x85, 1, 1, 1, 1, 1]).read_any_asn1(),
            None
        );
        // Truncated body.
        assert_eq!(Reader::new(&[0x04, 0x03, 1, 2]).read_any_asn1(), None);
    }

    #[test]
    fn test_tag_combinators() {
        assert_eq!(u8::from(Tag::SEQUENCE), 0x30);
        assert_eq!(u8::from(Tag::from(0x02).constructed()), 0x22);
        let explicit = Tag::from(0).constructed().context_specific();
        assert_eq!(u8::from(explicit), 0xa0);
    }
}

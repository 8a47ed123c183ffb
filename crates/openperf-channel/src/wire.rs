// SPDX-License-Identifier: Apache-2.0

//! Literal length-delimited framing for the request/reply bus (spec.md section 4.1, 6.1).
//!
//! The in-process transport ([`crate::bus`]) never needs to leave Rust-value form, but
//! the wire format is still part of the documented contract (testable property 3 of
//! spec.md section 8): part 0 is an unsigned discriminant selecting the variant, parts
//! 1..N carry the payload fields in declaration order, scalars are fixed-width
//! little-endian bytes, strings are raw length-prefixed bytes with no NUL terminator.
//!
//! A type implements [`WireMessage`] to declare its discriminant ordering; [`encode`] and
//! [`decode`] then do the generic framing/parsing and surface [`CodecError`] exactly as
//! spec.md section 4.1 describes: `deserialize_request` fails with `einval` (here,
//! [`CodecError::UnknownDiscriminant`]) on an unrecognized case, and a frame missing a
//! declared part or left partially consumed is a `codec_error`.

use crate::error::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// One length-delimited frame: the discriminant followed by its payload parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Part 0: the variant discriminant.
    pub discriminant: u32,
    /// Parts 1..N: payload fields in declaration order.
    pub parts: Vec<Bytes>,
}

/// A request or reply variant that can be framed over the bus's wire format.
///
/// Implementers document their discriminant ordering by assigning one constant per
/// case (spec.md section 6.1: "implementations MUST document this order").
pub trait WireMessage: Sized {
    /// Encodes `self` into the frame's discriminant and ordered payload parts.
    fn to_frame(&self) -> Frame;

    /// Decodes a frame back into a value, or fails with a [`CodecError`] if the
    /// discriminant is unknown or a declared part is missing/malformed.
    fn from_frame(frame: Frame) -> Result<Self, CodecError>;
}

/// Serializes a length-delimited frame to a single buffer: `u32` part count, then for
/// each part a `u32` length prefix followed by the raw bytes (including the
/// discriminant, encoded as part 0 in fixed 4-byte form).
pub fn serialize(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::new();
    let total_parts = 1 + frame.parts.len();
    buf.put_u32_le(total_parts as u32);
    buf.put_u32_le(4);
    buf.put_u32_le(frame.discriminant);
    for part in &frame.parts {
        buf.put_u32_le(part.len() as u32);
        buf.put_slice(part);
    }
    buf.freeze()
}

/// Deserializes a buffer produced by [`serialize`] back into a [`Frame`].
///
/// Fails with [`CodecError::UnterminatedFrame`] if the buffer is truncated mid-part,
/// or has zero declared parts (there is always at least the discriminant).
pub fn deserialize(mut buf: Bytes) -> Result<Frame, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::UnterminatedFrame);
    }
    let total_parts = buf.get_u32_le() as usize;
    if total_parts == 0 {
        return Err(CodecError::UnterminatedFrame);
    }

    let mut raw_parts = Vec::with_capacity(total_parts);
    for _ in 0..total_parts {
        if buf.remaining() < 4 {
            return Err(CodecError::UnterminatedFrame);
        }
        let len = buf.get_u32_le() as usize;
        if buf.remaining() < len {
            return Err(CodecError::UnterminatedFrame);
        }
        raw_parts.push(buf.copy_to_bytes(len));
    }
    if buf.has_remaining() {
        return Err(CodecError::UnterminatedFrame);
    }

    let mut iter = raw_parts.into_iter();
    let discriminant_bytes = iter.next().ok_or(CodecError::UnterminatedFrame)?;
    if discriminant_bytes.len() != 4 {
        return Err(CodecError::BadScalarLength {
            index: 0,
            expected: 4,
            actual: discriminant_bytes.len(),
        });
    }
    let discriminant = u32::from_le_bytes(discriminant_bytes.as_ref().try_into().unwrap());

    Ok(Frame {
        discriminant,
        parts: iter.collect(),
    })
}

/// Cursor over a frame's payload parts, used by [`WireMessage::from_frame`]
/// implementations to pull fields off in declaration order.
pub struct PartCursor {
    parts: std::vec::IntoIter<Bytes>,
    next_index: usize,
}

impl PartCursor {
    /// Wraps a frame's parts for sequential decoding.
    pub fn new(frame: Frame) -> Self {
        Self {
            parts: frame.parts.into_iter(),
            next_index: 1,
        }
    }

    fn next_part(&mut self) -> Result<Bytes, CodecError> {
        let index = self.next_index;
        self.next_index += 1;
        self.parts.next().ok_or(CodecError::MissingPart { index })
    }

    /// Pops a fixed-width little-endian `u64`.
    pub fn pop_u64(&mut self) -> Result<u64, CodecError> {
        let part = self.next_part()?;
        let index = self.next_index - 1;
        let bytes: [u8; 8] = part.as_ref().try_into().map_err(|_| CodecError::BadScalarLength {
            index,
            expected: 8,
            actual: part.len(),
        })?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Pops a fixed-width little-endian `f64`.
    pub fn pop_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_bits(self.pop_u64()?))
    }

    /// Pops a fixed-width `bool` (encoded as a single byte).
    pub fn pop_bool(&mut self) -> Result<bool, CodecError> {
        let part = self.next_part()?;
        let index = self.next_index - 1;
        if part.len() != 1 {
            return Err(CodecError::BadScalarLength {
                index,
                expected: 1,
                actual: part.len(),
            });
        }
        Ok(part[0] != 0)
    }

    /// Pops a length-prefixed UTF-8 string (the length prefix is implicit in the
    /// part's own framing; this simply validates the bytes are UTF-8).
    pub fn pop_string(&mut self) -> Result<String, CodecError> {
        let part = self.next_part()?;
        let index = self.next_index - 1;
        String::from_utf8(part.to_vec()).map_err(|_| CodecError::InvalidUtf8 { index })
    }

    /// Pops an optional length-prefixed string: an empty part decodes to `None`.
    pub fn pop_optional_string(&mut self) -> Result<Option<String>, CodecError> {
        let s = self.pop_string()?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }

    /// Pops raw owned bytes (used for owned-object handles such as a bulk
    /// create/delete payload moved by value across the bus).
    pub fn pop_bytes(&mut self) -> Result<Bytes, CodecError> {
        self.next_part()
    }

    /// Returns an error if any parts remain unconsumed, per the "final part clears
    /// the more flag" requirement of spec.md section 4.1.
    pub fn finish(mut self) -> Result<(), CodecError> {
        if self.parts.next().is_some() {
            Err(CodecError::UnterminatedFrame)
        } else {
            Ok(())
        }
    }
}

/// Builder used by [`WireMessage::to_frame`] implementations to push fields in
/// declaration order.
#[derive(Default)]
pub struct PartBuilder {
    parts: Vec<Bytes>,
}

impl PartBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a fixed-width little-endian `u64`.
    pub fn push_u64(&mut self, v: u64) -> &mut Self {
        self.parts.push(Bytes::copy_from_slice(&v.to_le_bytes()));
        self
    }

    /// Pushes a fixed-width little-endian `f64`.
    pub fn push_f64(&mut self, v: f64) -> &mut Self {
        self.push_u64(v.to_bits())
    }

    /// Pushes a fixed-width `bool`.
    pub fn push_bool(&mut self, v: bool) -> &mut Self {
        self.parts.push(Bytes::copy_from_slice(&[v as u8]));
        self
    }

    /// Pushes a raw UTF-8 string, length-prefixed at the frame level (no NUL
    /// terminator, per spec.md section 6.1).
    pub fn push_str(&mut self, v: &str) -> &mut Self {
        self.parts.push(Bytes::copy_from_slice(v.as_bytes()));
        self
    }

    /// Pushes an optional string as an empty part when absent.
    pub fn push_optional_str(&mut self, v: Option<&str>) -> &mut Self {
        self.push_str(v.unwrap_or(""))
    }

    /// Pushes raw owned bytes.
    pub fn push_bytes(&mut self, v: Bytes) -> &mut Self {
        self.parts.push(v);
        self
    }

    /// Finishes the builder into a [`Frame`] with the given discriminant.
    pub fn build(self, discriminant: u32) -> Frame {
        Frame {
            discriminant,
            parts: self.parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_deserialize_round_trip() {
        let mut builder = PartBuilder::new();
        builder.push_u64(42).push_str("gen-1").push_bool(true);
        let frame = builder.build(3);

        let bytes = serialize(&frame);
        let decoded = deserialize(bytes).expect("valid frame");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn truncated_frame_is_codec_error() {
        let mut builder = PartBuilder::new();
        builder.push_u64(1);
        let frame = builder.build(1);
        let mut bytes = serialize(&frame).to_vec();
        bytes.truncate(bytes.len() - 2);
        let err = deserialize(Bytes::from(bytes)).unwrap_err();
        assert_eq!(err, CodecError::UnterminatedFrame);
    }

    #[test]
    fn cursor_reports_missing_part() {
        let frame = Frame {
            discriminant: 7,
            parts: vec![],
        };
        let mut cursor = PartCursor::new(frame);
        let err = cursor.pop_u64().unwrap_err();
        assert_eq!(err, CodecError::MissingPart { index: 1 });
    }

    #[test]
    fn cursor_reports_unterminated_when_parts_remain() {
        let frame = Frame {
            discriminant: 7,
            parts: vec![Bytes::from_static(b"extra")],
        };
        let cursor = PartCursor::new(frame);
        assert_eq!(cursor.finish().unwrap_err(), CodecError::UnterminatedFrame);
    }
}

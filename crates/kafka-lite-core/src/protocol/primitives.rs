//! Primitive wire types shared by every request and response.
//!
//! Kafka encodes everything big-endian. Flexible message versions add the
//! "compact" forms, where a length prefix is stored as an unsigned varint of
//! `length + 1` so that `0` can mean null:
//!
//! | Type | Wire form |
//! |---|---|
//! | compact string | uvarint(len + 1), then `len` UTF-8 bytes; `0` = null |
//! | compact array | uvarint(count + 1), then `count` elements; `0` = null |
//! | tagged fields | uvarint(count), then `count` x (uvarint tag, uvarint size, bytes) |
//! | nullable string | int16 length, then bytes; `-1` = null |
//! | uuid | 16 raw bytes |
//!
//! [`WireReader`] checks the remaining length before every read and reports
//! [`BrokerError::MalformedField`] instead of reading past the buffer end.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{BrokerError, Result};

/// Longest unsigned varint that fits a `u32`.
const MAX_VARINT_BYTES: usize = 5;

/// Bound-checked decoder over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct WireReader {
    buf: Bytes,
}

impl WireReader {
    /// Create a reader over `buf`.
    #[must_use]
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Whether every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the reader, returning the unread bytes.
    #[must_use]
    pub fn into_remaining(self) -> Bytes {
        self.buf
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(BrokerError::malformed(
                field,
                format!(
                    "needs {needed} bytes, only {} remaining",
                    self.buf.remaining()
                ),
            ));
        }
        Ok(())
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        self.ensure(field, 1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i8(&mut self, field: &'static str) -> Result<i8> {
        self.ensure(field, 1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_u16(&mut self, field: &'static str) -> Result<u16> {
        self.ensure(field, 2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_i16(&mut self, field: &'static str) -> Result<i16> {
        self.ensure(field, 2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32> {
        self.ensure(field, 4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_i32(&mut self, field: &'static str) -> Result<i32> {
        self.ensure(field, 4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64> {
        self.ensure(field, 8)?;
        Ok(self.buf.get_u64())
    }

    pub fn read_i64(&mut self, field: &'static str) -> Result<i64> {
        self.ensure(field, 8)?;
        Ok(self.buf.get_i64())
    }

    /// Read `len` raw bytes without copying.
    pub fn read_bytes(&mut self, field: &'static str, len: usize) -> Result<Bytes> {
        self.ensure(field, len)?;
        Ok(self.buf.split_to(len))
    }

    /// Read a 128-bit identifier.
    pub fn read_uuid(&mut self, field: &'static str) -> Result<Uuid> {
        self.ensure(field, 16)?;
        let mut raw = [0u8; 16];
        self.buf.copy_to_slice(&mut raw);
        Ok(Uuid::from_bytes(raw))
    }

    /// Read an unsigned LEB128 varint.
    ///
    /// The fifth byte may only carry the top four bits of a `u32`.
    pub fn read_unsigned_varint(&mut self, field: &'static str) -> Result<u32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8(field)?;
            if i == MAX_VARINT_BYTES - 1 && byte & 0xF0 != 0 {
                return Err(BrokerError::malformed(field, "varint overflows u32"));
            }
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(BrokerError::malformed(field, "varint longer than 5 bytes"))
    }

    /// Read a compact length prefix; `None` when the stored value is 0.
    fn read_compact_len(&mut self, field: &'static str) -> Result<Option<usize>> {
        match self.read_unsigned_varint(field)? {
            0 => Ok(None),
            stored => Ok(Some((stored - 1) as usize)),
        }
    }

    fn read_utf8(&mut self, field: &'static str, len: usize) -> Result<String> {
        let raw = self.read_bytes(field, len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| BrokerError::malformed(field, format!("invalid UTF-8: {e}")))
    }

    /// Read a non-nullable compact string. A stored length of 0 is rejected.
    pub fn read_compact_string(&mut self, field: &'static str) -> Result<String> {
        self.read_compact_nullable_string(field)?
            .ok_or_else(|| BrokerError::malformed(field, "null in non-nullable compact string"))
    }

    /// Read a nullable compact string.
    pub fn read_compact_nullable_string(&mut self, field: &'static str) -> Result<Option<String>> {
        match self.read_compact_len(field)? {
            None => Ok(None),
            Some(len) => self.read_utf8(field, len).map(Some),
        }
    }

    /// Read a compact array element count; `None` for a null array.
    ///
    /// Every element occupies at least one byte, so a count larger than the
    /// remaining buffer is rejected before the caller allocates for it.
    pub fn read_compact_array_len(&mut self, field: &'static str) -> Result<Option<usize>> {
        let len = self.read_compact_len(field)?;
        if let Some(count) = len {
            if count > self.remaining() {
                return Err(BrokerError::malformed(
                    field,
                    format!(
                        "array of {count} elements exceeds {} remaining bytes",
                        self.remaining()
                    ),
                ));
            }
        }
        Ok(len)
    }

    /// Read a classic int16-prefixed string where `-1` means null.
    pub fn read_nullable_string(&mut self, field: &'static str) -> Result<Option<String>> {
        match self.read_i16(field)? {
            -1 => Ok(None),
            len if len < 0 => Err(BrokerError::malformed(
                field,
                format!("negative string length {len}"),
            )),
            len => self.read_utf8(field, len as usize).map(Some),
        }
    }

    /// Skip a tagged-field section, returning how many fields it held.
    pub fn skip_tagged_fields(&mut self, field: &'static str) -> Result<usize> {
        let count = self.read_unsigned_varint(field)? as usize;
        for _ in 0..count {
            let _tag = self.read_unsigned_varint(field)?;
            let size = self.read_unsigned_varint(field)? as usize;
            self.read_bytes(field, size)?;
        }
        Ok(count)
    }
}

/// Encoder that grows its buffer to exactly what was written.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish writing and take the buffer.
    #[must_use]
    pub fn into_inner(self) -> BytesMut {
        self.buf
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn put_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn put_slice(&mut self, v: &[u8]) {
        self.buf.put_slice(v);
    }

    pub fn put_uuid(&mut self, v: &Uuid) {
        self.buf.put_slice(v.as_bytes());
    }

    pub fn put_unsigned_varint(&mut self, mut v: u32) {
        while v >= 0x80 {
            self.buf.put_u8((v as u8 & 0x7f) | 0x80);
            v >>= 7;
        }
        self.buf.put_u8(v as u8);
    }

    /// Write a compact length prefix (`len + 1`, or 0 for null).
    fn put_compact_len(&mut self, len: Option<usize>) {
        let stored = len.map_or(0, |l| l as u32 + 1);
        self.put_unsigned_varint(stored);
    }

    pub fn put_compact_string(&mut self, v: &str) {
        self.put_compact_len(Some(v.len()));
        self.buf.put_slice(v.as_bytes());
    }

    pub fn put_compact_nullable_string(&mut self, v: Option<&str>) {
        match v {
            Some(s) => self.put_compact_string(s),
            None => self.put_compact_len(None),
        }
    }

    /// Write a compact array element count; elements follow.
    pub fn put_compact_array_len(&mut self, count: Option<usize>) {
        self.put_compact_len(count);
    }

    /// Write a classic int16-prefixed string, `-1` for null.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MalformedField`] if the string is longer than
    /// `i16::MAX` bytes; nothing is written in that case.
    pub fn put_nullable_string(&mut self, field: &'static str, v: Option<&str>) -> Result<()> {
        match v {
            Some(s) => {
                let len = i16::try_from(s.len()).map_err(|_| {
                    BrokerError::malformed(field, format!("{} bytes exceeds i16 length", s.len()))
                })?;
                self.buf.put_i16(len);
                self.buf.put_slice(s.as_bytes());
            }
            None => self.buf.put_i16(-1),
        }
        Ok(())
    }

    /// Write an empty tagged-field section.
    pub fn put_empty_tagged_fields(&mut self) {
        self.buf.put_u8(0);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_compact_string_round_trip(s in any::<String>(), absent in any::<bool>()) {
            let mut w = WireWriter::new();
            w.put_compact_string(&s);
            w.put_compact_nullable_string((!absent).then_some(s.as_str()));

            let mut r = WireReader::new(w.into_inner().freeze());
            prop_assert_eq!(r.read_compact_string("s").unwrap(), s.clone());
            let expected = (!absent).then_some(s);
            prop_assert_eq!(r.read_compact_nullable_string("n").unwrap(), expected);
            prop_assert!(r.is_empty());
        }

        #[test]
        fn prop_compact_array_len_round_trip(
            ids in proptest::option::of(proptest::collection::vec(any::<i32>(), 0..300))
        ) {
            let mut w = WireWriter::new();
            w.put_compact_array_len(ids.as_ref().map(Vec::len));
            for &id in ids.iter().flatten() {
                w.put_i32(id);
            }

            let mut r = WireReader::new(w.into_inner().freeze());
            let count = r.read_compact_array_len("ids").unwrap();
            prop_assert_eq!(count, ids.as_ref().map(Vec::len));
            let mut decoded = Vec::new();
            for _ in 0..count.unwrap_or(0) {
                decoded.push(r.read_i32("id").unwrap());
            }
            prop_assert_eq!(decoded, ids.unwrap_or_default());
            prop_assert!(r.is_empty());
        }

        #[test]
        fn prop_fixed_width_round_trip(
            a in any::<i8>(),
            b in any::<i16>(),
            c in any::<u16>(),
            d in any::<i32>(),
            e in any::<u32>(),
            f in any::<i64>(),
            g in any::<u64>(),
        ) {
            let mut w = WireWriter::new();
            w.put_i8(a);
            w.put_i16(b);
            w.put_u16(c);
            w.put_i32(d);
            w.put_u32(e);
            w.put_i64(f);
            w.put_u64(g);
            prop_assert_eq!(w.len(), 1 + 2 + 2 + 4 + 4 + 8 + 8);

            let mut r = WireReader::new(w.into_inner().freeze());
            prop_assert_eq!(r.read_i8("a").unwrap(), a);
            prop_assert_eq!(r.read_i16("b").unwrap(), b);
            prop_assert_eq!(r.read_u16("c").unwrap(), c);
            prop_assert_eq!(r.read_i32("d").unwrap(), d);
            prop_assert_eq!(r.read_u32("e").unwrap(), e);
            prop_assert_eq!(r.read_i64("f").unwrap(), f);
            prop_assert_eq!(r.read_u64("g").unwrap(), g);
            prop_assert!(r.is_empty());
        }

        #[test]
        fn prop_uuid_round_trip(raw in any::<u128>()) {
            let id = Uuid::from_u128(raw);
            let mut w = WireWriter::new();
            w.put_uuid(&id);
            prop_assert_eq!(w.len(), 16);

            let mut r = WireReader::new(w.into_inner().freeze());
            prop_assert_eq!(r.read_uuid("id").unwrap(), id);
        }

        #[test]
        fn prop_varint_round_trip(v in any::<u32>()) {
            let mut w = WireWriter::new();
            w.put_unsigned_varint(v);
            prop_assert!(w.len() <= MAX_VARINT_BYTES);

            let mut r = WireReader::new(w.into_inner().freeze());
            prop_assert_eq!(r.read_unsigned_varint("v").unwrap(), v);
            prop_assert!(r.is_empty());
        }

        #[test]
        fn prop_nullable_string_round_trip(s in proptest::option::of(".{0,64}")) {
            let mut w = WireWriter::new();
            w.put_nullable_string("s", s.as_deref()).unwrap();

            let mut r = WireReader::new(w.into_inner().freeze());
            prop_assert_eq!(r.read_nullable_string("s").unwrap(), s);
        }

        #[test]
        fn prop_arbitrary_input_never_panics(
            bytes in proptest::collection::vec(any::<u8>(), 0..32)
        ) {
            let mut r = WireReader::new(Bytes::from(bytes));
            let _ = r.read_compact_array_len("a");
            let _ = r.read_compact_nullable_string("s");
            let _ = r.skip_tagged_fields("tags");
        }
    }
}

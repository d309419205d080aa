//! The serialization context contract.
//!
//! Generated codecs only ever talk to a [`SerializeContext`] or a
//! [`DeserializeContext`]. Each backing supplies raw byte movement and a
//! scope stack; every encoding rule lives in the provided methods here, so
//! two backings cannot disagree about the bytes they produce.
//!
//! Wire rules (all multi-byte values most-significant byte first):
//!
//! | Operation | Encoding |
//! |---|---|
//! | integers | fixed width, big-endian |
//! | floats | IEEE 754 bits as the same-width unsigned integer |
//! | string | `u32` byte length, then UTF-8 bytes |
//! | byte array | `u32` byte length, then raw bytes |
//! | sequence length | `u32` element count |
//! | variant index | `u32` discriminator |
//!
//! Scope markers are diagnostic only and contribute no bytes.

use bytes::Bytes;

use crate::error::{Result, WireError};
use crate::float::Float16;

/// One open `begin`/`end` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub label: String,
    pub index: Option<u32>,
}

/// Stack of open diagnostic scopes.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    open: Vec<Scope>,
}

impl ScopeStack {
    pub fn push(&mut self, label: &str, index: Option<u32>) {
        self.open.push(Scope {
            label: label.to_string(),
            index,
        });
    }

    pub fn pop(&mut self, label: &str, index: Option<u32>) {
        let top = self.open.pop();
        debug_assert!(
            top.as_ref()
                .is_some_and(|s| s.label == label && s.index == index),
            "unbalanced scope: closing {label:?}/{index:?}, open {top:?}"
        );
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Dotted rendering of the open scopes, e.g. `Point.b` or `List[3]`.
    pub fn path(&self) -> String {
        let mut out = String::new();
        for s in &self.open {
            if !out.is_empty() && s.index.is_none() {
                out.push('.');
            }
            match s.index {
                Some(i) => {
                    if out.is_empty() {
                        out.push_str(&s.label);
                    }
                    out.push_str(&format!("[{i}]"));
                }
                None => out.push_str(&s.label),
            }
        }
        out
    }
}

pub(crate) fn length_prefix(length: usize) -> Result<u32> {
    u32::try_from(length).map_err(|_| WireError::LengthOverflow { length })
}

/// Write side of the contract.
pub trait SerializeContext {
    /// Append raw bytes to the output.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()>;

    fn scopes(&mut self) -> &mut ScopeStack;

    fn begin(&mut self, label: &str) {
        self.scopes().push(label, None);
    }

    fn begin_indexed(&mut self, label: &str, index: u32) {
        self.scopes().push(label, Some(index));
    }

    fn end(&mut self, label: &str) {
        self.scopes().pop(label, None);
    }

    fn end_indexed(&mut self, label: &str, index: u32) {
        self.scopes().pop(label, Some(index));
    }

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_f16(&mut self, value: Float16) -> Result<()> {
        self.write_u16(value.to_bits())
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_u32(length_prefix(value.len())?)?;
        self.write_raw(value.as_bytes())
    }

    fn write_byte_array(&mut self, value: &[u8]) -> Result<()> {
        self.write_u32(length_prefix(value.len())?)?;
        self.write_raw(value)
    }

    fn write_sequence_length(&mut self, length: usize) -> Result<()> {
        self.write_u32(length_prefix(length)?)
    }

    fn write_variant_index(&mut self, index: u32) -> Result<()> {
        self.write_u32(index)
    }
}

/// Read side of the contract.
pub trait DeserializeContext {
    /// Fill `buf` completely or fail with [`WireError::Truncated`].
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Take exactly `length` bytes as a read-only view.
    fn read_view(&mut self, length: usize) -> Result<Bytes>;

    fn scopes(&mut self) -> &mut ScopeStack;

    fn begin(&mut self, label: &str) {
        self.scopes().push(label, None);
    }

    fn begin_indexed(&mut self, label: &str, index: u32) {
        self.scopes().push(label, Some(index));
    }

    fn end(&mut self, label: &str) {
        self.scopes().pop(label, None);
    }

    fn end_indexed(&mut self, label: &str, index: u32) {
        self.scopes().pop(label, Some(index));
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(u64::from_be_bytes(b))
    }

    fn read_i8(&mut self) -> Result<i8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(i8::from_be_bytes(b))
    }

    fn read_i16(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(i16::from_be_bytes(b))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(i32::from_be_bytes(b))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(i64::from_be_bytes(b))
    }

    fn read_f16(&mut self) -> Result<Float16> {
        Ok(Float16::from_bits(self.read_u16()?))
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    fn read_string(&mut self) -> Result<String> {
        let length = self.read_u32()? as usize;
        self.read_utf8(length)
    }

    /// Like [`DeserializeContext::read_string`], but rejects a declared
    /// length above `limit` before reading any of the string bytes.
    fn read_string_limited(&mut self, limit: usize) -> Result<String> {
        let length = self.read_u32()? as usize;
        if length > limit {
            return Err(WireError::MessageTooLong {
                limit,
                actual: length,
            });
        }
        self.read_utf8(length)
    }

    /// Read exactly `length` bytes and validate them as UTF-8.
    fn read_utf8(&mut self, length: usize) -> Result<String> {
        let view = self.read_view(length)?;
        String::from_utf8(view.to_vec()).map_err(|e| WireError::InvalidUtf8 {
            reason: e.utf8_error().to_string(),
        })
    }

    fn read_byte_array(&mut self) -> Result<Bytes> {
        let length = self.read_u32()? as usize;
        self.read_view(length)
    }

    fn read_sequence_length(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    fn read_variant_index(&mut self) -> Result<u32> {
        self.read_u32()
    }
}

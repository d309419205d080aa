//! Fixed in-memory buffer backing.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::context::{DeserializeContext, ScopeStack, SerializeContext};
use crate::error::{Result, WireError};

/// Writes into a buffer that never grows past its initial capacity.
#[derive(Debug)]
pub struct BufferSerializeContext {
    buf: BytesMut,
    capacity: usize,
    scopes: ScopeStack,
}

impl BufferSerializeContext {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            scopes: ScopeStack::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Drop everything written so far, keeping the capacity.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

impl SerializeContext for BufferSerializeContext {
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(WireError::BufferFull {
                needed: bytes.len(),
                remaining,
            });
        }
        self.buf.put_slice(bytes);
        Ok(())
    }

    fn scopes(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }
}

/// Reads from an immutable buffer; byte arrays come back as zero-copy views.
#[derive(Debug)]
pub struct BufferDeserializeContext {
    buf: Bytes,
    scopes: ScopeStack,
}

impl BufferDeserializeContext {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            scopes: ScopeStack::default(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_exhausted(&self) -> bool {
        !self.buf.has_remaining()
    }
}

impl DeserializeContext for BufferDeserializeContext {
    fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        if self.buf.remaining() < out.len() {
            return Err(WireError::Truncated { needed: out.len() });
        }
        self.buf.copy_to_slice(out);
        Ok(())
    }

    fn read_view(&mut self, length: usize) -> Result<Bytes> {
        if self.buf.remaining() < length {
            return Err(WireError::Truncated { needed: length });
        }
        Ok(self.buf.split_to(length))
    }

    fn scopes(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }
}

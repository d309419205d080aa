//! Streaming backing over `std::io::{Read, Write}`.

use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;

use crate::context::{DeserializeContext, ScopeStack, SerializeContext};
use crate::error::{Result, WireError};

/// Writes straight through to the wrapped writer.
#[derive(Debug)]
pub struct StreamSerializeContext<W> {
    inner: W,
    scopes: ScopeStack,
    written: u64,
}

impl<W: Write> StreamSerializeContext<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scopes: ScopeStack::default(),
            written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(|e| WireError::from_io(&e, 0))
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> SerializeContext for StreamSerializeContext<W> {
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner
            .write_all(bytes)
            .map_err(|e| WireError::from_io(&e, bytes.len()))?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn scopes(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }
}

/// Reads from the wrapped reader on demand.
#[derive(Debug)]
pub struct StreamDeserializeContext<R> {
    inner: R,
    scopes: ScopeStack,
    read: u64,
}

impl<R: Read> StreamDeserializeContext<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            scopes: ScopeStack::default(),
            read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> DeserializeContext for StreamDeserializeContext<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        // Count every byte pulled from the reader, even when the read
        // comes up short.
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(WireError::Truncated { needed: buf.len() }),
                Ok(n) => {
                    filled += n;
                    self.read += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(WireError::from_io(&e, buf.len())),
            }
        }
        Ok(())
    }

    fn read_view(&mut self, length: usize) -> Result<Bytes> {
        // Grow with the data actually received instead of trusting the
        // declared length up front.
        let mut out = Vec::new();
        let got = (&mut self.inner)
            .take(length as u64)
            .read_to_end(&mut out)
            .map_err(|e| WireError::from_io(&e, length))?;
        self.read += got as u64;
        if got < length {
            return Err(WireError::Truncated { needed: length });
        }
        Ok(Bytes::from(out))
    }

    fn scopes(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }
}

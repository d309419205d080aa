//! Container protocol: the version handshake run once per connection.
//!
//! Three fixed-layout, big-endian messages:
//!
//! | Message | Size | Layout |
//! |---|---|---|
//! | [`ContainerAvailable`] | 48 | magic, container min/max (u32), reserved (u32), application id (16), application min/max (u64) |
//! | [`ContainerUse`] | 32 | magic, container version (u32), application id (16), application version (u64) |
//! | [`ContainerResponse`] | 12 + N | magic, ok (u32), N (u32), N bytes of UTF-8, N <= 244 |
//!
//! The server sends `Available`, the client answers with `Use`, and the
//! server replies with `Response`. A negative response carries a
//! human-readable reason and the connection is expected to close.
//!
//! Every parse checks the magic number before reading any other field.

use std::ops::RangeInclusive;

use bytes::Bytes;
use uuid::Uuid;

use crate::buffer::{BufferDeserializeContext, BufferSerializeContext};
use crate::builtins::{deserialize_uuid, serialize_uuid};
use crate::context::{DeserializeContext, SerializeContext};
use crate::error::{Result, WireError};

fn expect_magic(ctx: &mut dyn DeserializeContext, expected: u32) -> Result<()> {
    let received = ctx.read_u32()?;
    if received != expected {
        tracing::trace!(expected, received, "container message magic mismatch");
        return Err(WireError::BadMagicNumber { expected, received });
    }
    Ok(())
}

/// Server offer: the container and application version ranges it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerAvailable {
    container_min: u32,
    container_max: u32,
    application_protocol_id: Uuid,
    application_min: u64,
    application_max: u64,
}

impl ContainerAvailable {
    pub const MAGIC: u32 = 0x4342_0000;
    pub const SIZE: usize = 48;

    /// # Errors
    ///
    /// [`WireError::BadVersionRange`] if either minimum exceeds its maximum.
    pub fn new(
        container_min: u32,
        container_max: u32,
        application_protocol_id: Uuid,
        application_min: u64,
        application_max: u64,
    ) -> Result<Self> {
        if container_min > container_max {
            return Err(WireError::BadVersionRange {
                min: u64::from(container_min),
                max: u64::from(container_max),
            });
        }
        if application_min > application_max {
            return Err(WireError::BadVersionRange {
                min: application_min,
                max: application_max,
            });
        }
        Ok(Self {
            container_min,
            container_max,
            application_protocol_id,
            application_min,
            application_max,
        })
    }

    pub fn container_min(&self) -> u32 {
        self.container_min
    }

    pub fn container_max(&self) -> u32 {
        self.container_max
    }

    pub fn application_protocol_id(&self) -> Uuid {
        self.application_protocol_id
    }

    pub fn application_min(&self) -> u64 {
        self.application_min
    }

    pub fn application_max(&self) -> u64 {
        self.application_max
    }

    pub fn serialize(&self, ctx: &mut dyn SerializeContext) -> Result<()> {
        ctx.begin("ContainerAvailable");
        ctx.write_u32(Self::MAGIC)?;
        ctx.write_u32(self.container_min)?;
        ctx.write_u32(self.container_max)?;
        // Reserved for a future flags field.
        ctx.write_u32(0)?;
        serialize_uuid(ctx, &self.application_protocol_id)?;
        ctx.write_u64(self.application_min)?;
        ctx.write_u64(self.application_max)?;
        ctx.end("ContainerAvailable");
        Ok(())
    }

    pub fn deserialize(ctx: &mut dyn DeserializeContext) -> Result<Self> {
        ctx.begin("ContainerAvailable");
        expect_magic(ctx, Self::MAGIC)?;
        let container_min = ctx.read_u32()?;
        let container_max = ctx.read_u32()?;
        let _reserved = ctx.read_u32()?;
        let application_protocol_id = deserialize_uuid(ctx)?;
        let application_min = ctx.read_u64()?;
        let application_max = ctx.read_u64()?;
        ctx.end("ContainerAvailable");
        Self::new(
            container_min,
            container_max,
            application_protocol_id,
            application_min,
            application_max,
        )
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut ctx = BufferSerializeContext::with_capacity(Self::SIZE);
        self.serialize(&mut ctx)?;
        Ok(ctx.freeze())
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        Self::deserialize(&mut BufferDeserializeContext::new(bytes))
    }

    /// Pick the highest container and application versions inside both this
    /// offer and the client's supported ranges. `None` means the two sides
    /// share no version of one of them.
    pub fn choose(
        &self,
        containers: RangeInclusive<u32>,
        applications: RangeInclusive<u64>,
    ) -> Option<ContainerUse> {
        let container_hi = (*containers.end()).min(self.container_max);
        let container_lo = (*containers.start()).max(self.container_min);
        if container_lo > container_hi {
            return None;
        }
        let application_hi = (*applications.end()).min(self.application_max);
        let application_lo = (*applications.start()).max(self.application_min);
        if application_lo > application_hi {
            return None;
        }
        Some(ContainerUse::new(
            container_hi,
            self.application_protocol_id,
            application_hi,
        ))
    }
}

/// Client choice: the container and application versions it will speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerUse {
    container_version: u32,
    application_protocol_id: Uuid,
    application_version: u64,
}

impl ContainerUse {
    pub const MAGIC: u32 = 0x4342_0001;
    pub const SIZE: usize = 32;

    pub fn new(container_version: u32, application_protocol_id: Uuid, application_version: u64) -> Self {
        Self {
            container_version,
            application_protocol_id,
            application_version,
        }
    }

    pub fn container_version(&self) -> u32 {
        self.container_version
    }

    pub fn application_protocol_id(&self) -> Uuid {
        self.application_protocol_id
    }

    pub fn application_version(&self) -> u64 {
        self.application_version
    }

    pub fn serialize(&self, ctx: &mut dyn SerializeContext) -> Result<()> {
        ctx.begin("ContainerUse");
        ctx.write_u32(Self::MAGIC)?;
        ctx.write_u32(self.container_version)?;
        serialize_uuid(ctx, &self.application_protocol_id)?;
        ctx.write_u64(self.application_version)?;
        ctx.end("ContainerUse");
        Ok(())
    }

    pub fn deserialize(ctx: &mut dyn DeserializeContext) -> Result<Self> {
        ctx.begin("ContainerUse");
        expect_magic(ctx, Self::MAGIC)?;
        let container_version = ctx.read_u32()?;
        let application_protocol_id = deserialize_uuid(ctx)?;
        let application_version = ctx.read_u64()?;
        ctx.end("ContainerUse");
        Ok(Self::new(
            container_version,
            application_protocol_id,
            application_version,
        ))
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut ctx = BufferSerializeContext::with_capacity(Self::SIZE);
        self.serialize(&mut ctx)?;
        Ok(ctx.freeze())
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        Self::deserialize(&mut BufferDeserializeContext::new(bytes))
    }
}

/// Server verdict on a [`ContainerUse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerResponse {
    ok: bool,
    message: String,
}

impl ContainerResponse {
    pub const MAGIC: u32 = 0x4342_0002;
    pub const HEADER_SIZE: usize = 12;
    /// Keeps the whole frame within 256 bytes.
    pub const MAX_MESSAGE_BYTES: usize = 244;

    /// # Errors
    ///
    /// [`WireError::MessageTooLong`] if `message` encodes to more than
    /// [`Self::MAX_MESSAGE_BYTES`] bytes of UTF-8.
    pub fn new(ok: bool, message: impl Into<String>) -> Result<Self> {
        let message = message.into();
        if message.len() > Self::MAX_MESSAGE_BYTES {
            return Err(WireError::MessageTooLong {
                limit: Self::MAX_MESSAGE_BYTES,
                actual: message.len(),
            });
        }
        Ok(Self { ok, message })
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.message.len()
    }

    pub fn serialize(&self, ctx: &mut dyn SerializeContext) -> Result<()> {
        ctx.begin("ContainerResponse");
        ctx.write_u32(Self::MAGIC)?;
        ctx.write_u32(u32::from(self.ok))?;
        ctx.write_string(&self.message)?;
        ctx.end("ContainerResponse");
        Ok(())
    }

    pub fn deserialize(ctx: &mut dyn DeserializeContext) -> Result<Self> {
        ctx.begin("ContainerResponse");
        expect_magic(ctx, Self::MAGIC)?;
        let ok = match ctx.read_u32()? {
            0 => false,
            1 => true,
            received => return Err(WireError::BadBoolean { received }),
        };
        let message = ctx.read_string_limited(Self::MAX_MESSAGE_BYTES)?;
        ctx.end("ContainerResponse");
        Ok(Self { ok, message })
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut ctx = BufferSerializeContext::with_capacity(self.size());
        self.serialize(&mut ctx)?;
        Ok(ctx.freeze())
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        Self::deserialize(&mut BufferDeserializeContext::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_prefers_the_highest_shared_versions() {
        let id = Uuid::from_u128(1);
        let offer = ContainerAvailable::new(1, 3, id, 2, 9).unwrap();
        let chosen = offer.choose(2..=5, 1..=4).unwrap();
        assert_eq!(chosen, ContainerUse::new(3, id, 4));
        assert!(offer.choose(4..=5, 1..=4).is_none());
        assert!(offer.choose(1..=1, 10..=12).is_none());
    }
}

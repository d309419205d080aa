//! Hand-written adapters for the external types of the core package.
//!
//! Generated code reaches these by name; each pair follows the same calling
//! convention as a generated codec.

use bytes::Bytes;
use uuid::Uuid;

use crate::codec::{DeserializeFn, SerializeFn};
use crate::context::{DeserializeContext, SerializeContext};
use crate::error::Result;
use crate::float::{Float16, Float32, Float64};

macro_rules! scalar_adapter {
    ($ty:ty, $ser:ident, $de:ident, $write:ident, $read:ident) => {
        pub fn $ser(ctx: &mut dyn SerializeContext, value: &$ty) -> Result<()> {
            ctx.$write(*value)
        }

        pub fn $de(ctx: &mut dyn DeserializeContext) -> Result<$ty> {
            ctx.$read()
        }
    };
}

scalar_adapter!(u8, serialize_u8, deserialize_u8, write_u8, read_u8);
scalar_adapter!(u16, serialize_u16, deserialize_u16, write_u16, read_u16);
scalar_adapter!(u32, serialize_u32, deserialize_u32, write_u32, read_u32);
scalar_adapter!(u64, serialize_u64, deserialize_u64, write_u64, read_u64);
scalar_adapter!(i8, serialize_i8, deserialize_i8, write_i8, read_i8);
scalar_adapter!(i16, serialize_i16, deserialize_i16, write_i16, read_i16);
scalar_adapter!(i32, serialize_i32, deserialize_i32, write_i32, read_i32);
scalar_adapter!(i64, serialize_i64, deserialize_i64, write_i64, read_i64);
scalar_adapter!(Float16, serialize_f16, deserialize_f16, write_f16, read_f16);

pub fn serialize_f32(ctx: &mut dyn SerializeContext, value: &Float32) -> Result<()> {
    ctx.write_f32(value.0)
}

pub fn deserialize_f32(ctx: &mut dyn DeserializeContext) -> Result<Float32> {
    Ok(Float32(ctx.read_f32()?))
}

pub fn serialize_f64(ctx: &mut dyn SerializeContext, value: &Float64) -> Result<()> {
    ctx.write_f64(value.0)
}

pub fn deserialize_f64(ctx: &mut dyn DeserializeContext) -> Result<Float64> {
    Ok(Float64(ctx.read_f64()?))
}

pub fn serialize_string(ctx: &mut dyn SerializeContext, value: &String) -> Result<()> {
    ctx.write_string(value)
}

pub fn deserialize_string(ctx: &mut dyn DeserializeContext) -> Result<String> {
    ctx.read_string()
}

pub fn serialize_byte_array(ctx: &mut dyn SerializeContext, value: &Bytes) -> Result<()> {
    ctx.write_byte_array(value)
}

pub fn deserialize_byte_array(ctx: &mut dyn DeserializeContext) -> Result<Bytes> {
    ctx.read_byte_array()
}

/// UUIDs travel as their 16 bytes, most significant first.
pub fn serialize_uuid(ctx: &mut dyn SerializeContext, value: &Uuid) -> Result<()> {
    let (hi, lo) = value.as_u64_pair();
    ctx.write_u64(hi)?;
    ctx.write_u64(lo)
}

pub fn deserialize_uuid(ctx: &mut dyn DeserializeContext) -> Result<Uuid> {
    let hi = ctx.read_u64()?;
    let lo = ctx.read_u64()?;
    Ok(Uuid::from_u64_pair(hi, lo))
}

/// Sequence length, then each element.
#[allow(clippy::ptr_arg)]
pub fn serialize_list<A>(
    ctx: &mut dyn SerializeContext,
    value: &Vec<A>,
    serialize_a: &SerializeFn<'_, A>,
) -> Result<()> {
    ctx.begin("List");
    ctx.write_sequence_length(value.len())?;
    for (index, item) in value.iter().enumerate() {
        let index = index as u32;
        ctx.begin_indexed("List", index);
        serialize_a(ctx, item)?;
        ctx.end_indexed("List", index);
    }
    ctx.end("List");
    Ok(())
}

pub fn deserialize_list<A>(
    ctx: &mut dyn DeserializeContext,
    deserialize_a: &DeserializeFn<'_, A>,
) -> Result<Vec<A>> {
    ctx.begin("List");
    let length = ctx.read_sequence_length()?;
    // Capacity is bounded so a hostile count cannot force a large allocation.
    let mut out = Vec::with_capacity(length.min(1024));
    for index in 0..length {
        let index = index as u32;
        ctx.begin_indexed("List", index);
        out.push(deserialize_a(ctx)?);
        ctx.end_indexed("List", index);
    }
    ctx.end("List");
    Ok(out)
}

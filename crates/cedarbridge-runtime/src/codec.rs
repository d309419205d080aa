//! Shapes shared by generated codecs.

use std::any::Any;

use crate::context::{DeserializeContext, SerializeContext};
use crate::error::Result;

/// Serializer for values of `T`, passed to generic codecs once per type
/// parameter. `'a` lets a closure borrow the codecs of an enclosing generic.
pub type SerializeFn<'a, T> = dyn Fn(&mut dyn SerializeContext, &T) -> Result<()> + 'a;

/// Deserializer for values of `T`.
pub type DeserializeFn<'a, T> = dyn Fn(&mut dyn DeserializeContext) -> Result<T> + 'a;

/// Implemented by every case type of a generated variant.
pub trait VariantCase: Into<Self::Variant> {
    /// The closed enum this case belongs to.
    type Variant;

    /// Zero-based declaration index; this is the wire tag.
    const VARIANT_INDEX: u32;
}

/// Type-erased serializer over `&dyn Any`.
pub type ErasedSerializeFn = fn(&mut dyn SerializeContext, &dyn Any) -> Result<()>;

/// Type-erased deserializer producing a boxed value.
pub type ErasedDeserializeFn = fn(&mut dyn DeserializeContext) -> Result<Box<dyn Any>>;

/// Erased codec pair for runtime type-directed lookup. Only non-generic
/// types carry one; generic types need codecs for their arguments.
#[derive(Clone, Copy)]
pub struct ErasedCodec {
    pub serialize: ErasedSerializeFn,
    pub deserialize: ErasedDeserializeFn,
}

impl std::fmt::Debug for ErasedCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedCodec").finish_non_exhaustive()
    }
}

/// Dispatcher over the closed message set of one protocol version.
pub trait ProtocolVersionCodec {
    /// Closed enum over the version's messages.
    type Message;

    /// Qualified protocol name.
    const PROTOCOL_NAME: &'static str;

    const PROTOCOL_ID: uuid::Uuid;

    const VERSION: u64;

    fn serialize(ctx: &mut dyn SerializeContext, message: &Self::Message) -> Result<()>;

    fn deserialize(ctx: &mut dyn DeserializeContext) -> Result<Self::Message>;
}

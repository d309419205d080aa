//! # Cedarbridge runtime
//!
//! The static half of Cedarbridge: everything code generated by `cedarbridgec`
//! compiles against, plus the container handshake.
//!
//! - [`context`]: the serialization context contract. Generated codecs call
//!   only these operations.
//! - [`stream`] and [`buffer`]: the two backings (streaming I/O and a fixed
//!   in-memory buffer). Both produce identical bytes for identical values.
//! - [`builtins`]: adapters for the external types of the core package.
//! - [`registry`]: codec and protocol factories for runtime lookup.
//! - [`container`]: the three-message container protocol.
#![forbid(unsafe_code)]

pub mod buffer;
pub mod builtins;
pub mod codec;
pub mod container;
pub mod context;
pub mod error;
pub mod float;
pub mod registry;
pub mod stream;

pub use buffer::{BufferDeserializeContext, BufferSerializeContext};
pub use codec::{
    DeserializeFn, ErasedCodec, ProtocolVersionCodec, SerializeFn, VariantCase,
};
pub use container::{ContainerAvailable, ContainerResponse, ContainerUse};
pub use context::{DeserializeContext, SerializeContext};
pub use error::{Result, WireError};
pub use float::{Float16, Float32, Float64};
pub use registry::{
    CodecFactory, CodecRegistries, CodecRegistry, ProtocolFactory, ProtocolRegistry, TypeKind,
};
pub use stream::{StreamDeserializeContext, StreamSerializeContext};

// Re-exported so generated code can name these without extra dependencies.
pub use bytes;
pub use uuid;

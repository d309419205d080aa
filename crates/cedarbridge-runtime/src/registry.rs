//! Runtime lookup tables for generated codecs and protocol dispatchers.
//!
//! Generated packages expose their tables as `static` values; callers
//! assemble the ones they need into a [`CodecRegistries`] or
//! [`ProtocolRegistry`] and pass that value to whoever needs lookups.

use std::any::Any;
use std::collections::BTreeMap;

use uuid::Uuid;

use crate::codec::ErasedCodec;
use crate::context::{DeserializeContext, SerializeContext};
use crate::error::{Result, WireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Record,
    Variant,
}

/// Descriptor exposed by every generated type, keyed by qualified name.
#[derive(Debug, Clone, Copy)]
pub struct CodecFactory {
    pub qualified_name: &'static str,
    pub kind: TypeKind,
    pub type_parameters: &'static [&'static str],
    pub codec: Option<ErasedCodec>,
}

impl CodecFactory {
    pub const fn new(
        qualified_name: &'static str,
        kind: TypeKind,
        type_parameters: &'static [&'static str],
        codec: Option<ErasedCodec>,
    ) -> Self {
        Self {
            qualified_name,
            kind,
            type_parameters,
            codec,
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_parameters.is_empty()
    }

    pub fn serialize(&self, ctx: &mut dyn SerializeContext, value: &dyn Any) -> Result<()> {
        match self.codec {
            Some(codec) => (codec.serialize)(ctx, value),
            None => Err(self.type_mismatch()),
        }
    }

    pub fn deserialize(&self, ctx: &mut dyn DeserializeContext) -> Result<Box<dyn Any>> {
        match self.codec {
            Some(codec) => (codec.deserialize)(ctx),
            None => Err(self.type_mismatch()),
        }
    }

    fn type_mismatch(&self) -> WireError {
        WireError::TypeMismatch {
            expected: format!(
                "{} (generic; instantiate its codec with argument codecs)",
                self.qualified_name
            ),
        }
    }
}

/// All factories of one package.
#[derive(Debug, Clone, Copy)]
pub struct CodecRegistry {
    pub package: &'static str,
    pub factories: &'static [CodecFactory],
}

impl CodecRegistry {
    pub const fn new(package: &'static str, factories: &'static [CodecFactory]) -> Self {
        Self { package, factories }
    }

    pub fn find(&self, qualified_name: &str) -> Option<&'static CodecFactory> {
        self.factories
            .iter()
            .find(|f| f.qualified_name == qualified_name)
    }
}

/// Package registries indexed by package name.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistries {
    by_package: BTreeMap<&'static str, &'static CodecRegistry>,
}

impl CodecRegistries {
    pub fn new(registries: &[&'static CodecRegistry]) -> Self {
        let mut by_package = BTreeMap::new();
        for r in registries {
            by_package.insert(r.package, *r);
        }
        Self { by_package }
    }

    pub fn package(&self, package: &str) -> Option<&'static CodecRegistry> {
        self.by_package.get(package).copied()
    }

    /// Look up `pkg.Type` by splitting at the last dot.
    pub fn find(&self, qualified_name: &str) -> Option<&'static CodecFactory> {
        let (package, _) = qualified_name.rsplit_once('.')?;
        self.package(package)?.find(qualified_name)
    }

    pub fn packages(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_package.keys().copied()
    }
}

/// Descriptor exposed by every generated protocol version.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolFactory {
    pub protocol: &'static str,
    pub id: Uuid,
    pub version: u64,
    pub messages: &'static [&'static str],
    pub codec: ErasedCodec,
}

impl ProtocolFactory {
    pub const fn new(
        protocol: &'static str,
        id: Uuid,
        version: u64,
        messages: &'static [&'static str],
        codec: ErasedCodec,
    ) -> Self {
        Self {
            protocol,
            id,
            version,
            messages,
            codec,
        }
    }
}

/// Protocol versions keyed by `(protocol id, version)`.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    by_key: BTreeMap<(Uuid, u64), &'static ProtocolFactory>,
}

impl ProtocolRegistry {
    pub fn new(factories: &[&'static [ProtocolFactory]]) -> Self {
        let mut by_key = BTreeMap::new();
        for group in factories {
            for f in *group {
                by_key.insert((f.id, f.version), f);
            }
        }
        Self { by_key }
    }

    pub fn find(&self, id: Uuid, version: u64) -> Option<&'static ProtocolFactory> {
        self.by_key.get(&(id, version)).copied()
    }

    /// Supported versions of `id`, ascending.
    pub fn versions(&self, id: Uuid) -> Vec<u64> {
        self.by_key
            .keys()
            .filter(|(i, _)| *i == id)
            .map(|(_, v)| *v)
            .collect()
    }
}

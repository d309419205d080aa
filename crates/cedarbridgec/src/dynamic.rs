//! Dynamic codec: runs the generated-codec plan over [`Value`] trees.
//!
//! Each declaration's codec is interpreted the way its generated Rust would
//! run: field references come from [`method_ref::resolve`], synthesized
//! lambdas are bound by name in [`ResolvedFields::lambdas`] order, and a
//! lambda referenced before it is bound is an error. The bytes produced are
//! the bytes generated code produces.
//!
//! [`method_ref::resolve`]: crate::method_ref::resolve

use std::collections::BTreeMap;

use cedarbridge_runtime::bytes::Bytes;
use cedarbridge_runtime::uuid::Uuid;
use cedarbridge_runtime::{
    builtins, DeserializeContext, Float16, Float32, Float64, SerializeContext, WireError,
};
use thiserror::Error;

use crate::externals::Builtin;
use crate::method_ref::{Direction, MethodRef, ResolvedFields};
use crate::model::{
    DeclarationKind, Field, Model, QualifiedName, TypeDeclaration, TypeExpression,
};
use crate::names::FreshNames;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F16(Float16),
    F32(Float32),
    F64(Float64),
    String(String),
    Bytes(Bytes),
    Uuid(Uuid),
    List(Vec<Value>),
    /// Field values in declaration order.
    Record(Vec<Value>),
    /// Case tag and that case's field values.
    Variant { index: u32, fields: Vec<Value> },
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F16(_) => "float16",
            Value::F32(_) => "float32",
            Value::F64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "byte array",
            Value::Uuid(_) => "uuid",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Variant { .. } => "variant",
        }
    }
}

#[derive(Debug, Error)]
pub enum DynamicError {
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The value does not have the shape its type requires.
    #[error("expected {expected}, found {found}")]
    ValueMismatch { expected: String, found: String },

    /// The model cannot be interpreted (unknown type, unbound parameter,
    /// lambda used before its declaration, external without an adapter).
    #[error("model: {0}")]
    Model(String),
}

type DynResult<T> = Result<T, DynamicError>;

/// A bound codec: what a generated codec value refers to at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Codec {
    Named(QualifiedName),
    Applied {
        target: QualifiedName,
        arguments: Vec<Codec>,
    },
}

type Env = BTreeMap<String, Codec>;

fn mismatch(expected: impl Into<String>, found: &Value) -> DynamicError {
    DynamicError::ValueMismatch {
        expected: expected.into(),
        found: found.kind_name().to_string(),
    }
}

pub struct DynamicCodec<'m> {
    model: &'m Model,
}

impl<'m> DynamicCodec<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    /// Serialize `value` as the closed type `ty` (no type parameters).
    pub fn serialize(
        &self,
        ctx: &mut dyn SerializeContext,
        ty: &TypeExpression,
        value: &Value,
    ) -> DynResult<()> {
        let (refs, lambdas) = self.plan([ty], Direction::Serialize, &Env::new())?;
        let codec = self.bind(&refs[0], &Env::new(), &lambdas)?;
        self.write(ctx, &codec, value)
    }

    pub fn deserialize(
        &self,
        ctx: &mut dyn DeserializeContext,
        ty: &TypeExpression,
    ) -> DynResult<Value> {
        let (refs, lambdas) = self.plan([ty], Direction::Deserialize, &Env::new())?;
        let codec = self.bind(&refs[0], &Env::new(), &lambdas)?;
        self.read(ctx, &codec)
    }

    /// Dispatch `value` (a [`Value::Variant`] whose index is the message
    /// tag and whose single field is the message) through a protocol version.
    pub fn serialize_message(
        &self,
        ctx: &mut dyn SerializeContext,
        protocol: &QualifiedName,
        version: u64,
        value: &Value,
    ) -> DynResult<()> {
        let messages = self.protocol_messages(protocol, version)?;
        let Value::Variant { index, fields } = value else {
            return Err(mismatch("protocol message", value));
        };
        let (Some(message), [inner]) = (messages.get(*index as usize), fields.as_slice()) else {
            return Err(DynamicError::ValueMismatch {
                expected: format!("one of {} messages of {protocol} v{version}", messages.len()),
                found: format!("tag {index} with {} fields", fields.len()),
            });
        };
        ctx.begin(&protocol.to_string());
        ctx.write_variant_index(*index)?;
        self.write(ctx, &Codec::Named(message.clone()), inner)?;
        ctx.end(&protocol.to_string());
        Ok(())
    }

    pub fn deserialize_message(
        &self,
        ctx: &mut dyn DeserializeContext,
        protocol: &QualifiedName,
        version: u64,
    ) -> DynResult<Value> {
        let messages = self.protocol_messages(protocol, version)?;
        ctx.begin(&protocol.to_string());
        let index = ctx.read_variant_index()?;
        let Some(message) = messages.get(index as usize) else {
            return Err(WireError::UnrecognizedVariantIndex {
                type_name: format!("{protocol} v{version}"),
                index,
                cases: messages.len() as u32,
            }
            .into());
        };
        let inner = self.read(ctx, &Codec::Named(message.clone()))?;
        ctx.end(&protocol.to_string());
        Ok(Value::Variant {
            index,
            fields: vec![inner],
        })
    }

    fn protocol_messages(
        &self,
        protocol: &QualifiedName,
        version: u64,
    ) -> DynResult<&'m [QualifiedName]> {
        let p = self
            .model
            .find_protocol(protocol)
            .ok_or_else(|| DynamicError::Model(format!("unknown protocol {protocol}")))?;
        p.versions
            .iter()
            .find(|v| v.version == version)
            .map(|v| v.messages.as_slice())
            .ok_or_else(|| DynamicError::Model(format!("{protocol} has no version {version}")))
    }

    fn decl(&self, name: &QualifiedName) -> DynResult<&'m TypeDeclaration> {
        self.model
            .find_type(name)
            .ok_or_else(|| DynamicError::Model(format!("unknown type {name}")))
    }

    /// Resolve one generation unit and bind its lambdas in emission order.
    fn plan<'t>(
        &self,
        types: impl IntoIterator<Item = &'t TypeExpression>,
        direction: Direction,
        env: &Env,
    ) -> DynResult<(Vec<MethodRef>, BTreeMap<String, Codec>)> {
        let resolved = ResolvedFields::resolve(types, direction, &mut FreshNames::new());
        let mut lambdas = BTreeMap::new();
        for l in resolved.lambdas() {
            let mut arguments = Vec::with_capacity(l.arg_refs.len());
            for a in &l.arg_refs {
                arguments.push(self.bind(a, env, &lambdas)?);
            }
            lambdas.insert(
                l.lambda_name.clone(),
                Codec::Applied {
                    target: l.target.clone(),
                    arguments,
                },
            );
        }
        Ok((resolved.refs, lambdas))
    }

    fn bind(&self, r: &MethodRef, env: &Env, lambdas: &BTreeMap<String, Codec>) -> DynResult<Codec> {
        match r {
            MethodRef::Parameter(p) => env
                .get(p)
                .cloned()
                .ok_or_else(|| DynamicError::Model(format!("unbound type parameter {p:?}"))),
            MethodRef::Named(q) => Ok(Codec::Named(q.clone())),
            MethodRef::Lambda(l) => lambdas.get(&l.lambda_name).cloned().ok_or_else(|| {
                DynamicError::Model(format!("{} used before its declaration", l.lambda_name))
            }),
        }
    }

    fn env_for(&self, decl: &TypeDeclaration, arguments: &[Codec]) -> DynResult<Env> {
        if decl.arity() != arguments.len() {
            return Err(DynamicError::Model(format!(
                "{} takes {} type arguments, got {}",
                decl.name,
                decl.arity(),
                arguments.len()
            )));
        }
        Ok(decl
            .type_parameters
            .iter()
            .map(|p| p.name.clone())
            .zip(arguments.iter().cloned())
            .collect())
    }

    fn write(&self, ctx: &mut dyn SerializeContext, codec: &Codec, value: &Value) -> DynResult<()> {
        let (name, arguments) = match codec {
            Codec::Named(q) => (q, &[][..]),
            Codec::Applied { target, arguments } => (target, arguments.as_slice()),
        };
        let decl = self.decl(name)?;
        let env = self.env_for(decl, arguments)?;
        match &decl.kind {
            DeclarationKind::External => self.write_builtin(ctx, decl, arguments, value),
            DeclarationKind::Record { fields } => {
                let Value::Record(values) = value else {
                    return Err(mismatch(format!("record {}", decl.name), value));
                };
                ctx.begin(&decl.name.name);
                self.write_fields(ctx, decl, fields, values, &env)?;
                ctx.end(&decl.name.name);
                Ok(())
            }
            DeclarationKind::Variant { cases } => {
                let Value::Variant { index, fields: values } = value else {
                    return Err(mismatch(format!("variant {}", decl.name), value));
                };
                let Some(case) = cases.get(*index as usize) else {
                    return Err(DynamicError::ValueMismatch {
                        expected: format!("{} has {} cases", decl.name, cases.len()),
                        found: format!("case {index}"),
                    });
                };
                ctx.begin(&decl.name.name);
                ctx.write_variant_index(*index)?;
                ctx.begin(&case.name);
                self.write_fields(ctx, decl, &case.fields, values, &env)?;
                ctx.end(&case.name);
                ctx.end(&decl.name.name);
                Ok(())
            }
        }
    }

    fn write_fields(
        &self,
        ctx: &mut dyn SerializeContext,
        decl: &TypeDeclaration,
        fields: &[Field],
        values: &[Value],
        env: &Env,
    ) -> DynResult<()> {
        if fields.len() != values.len() {
            return Err(DynamicError::ValueMismatch {
                expected: format!("{} fields for {}", fields.len(), decl.name),
                found: format!("{} values", values.len()),
            });
        }
        let (refs, lambdas) = self.plan(fields.iter().map(|f| &f.ty), Direction::Serialize, env)?;
        for ((f, r), v) in fields.iter().zip(&refs).zip(values) {
            let codec = self.bind(r, env, &lambdas)?;
            ctx.begin(&f.name);
            self.write(ctx, &codec, v)?;
            ctx.end(&f.name);
        }
        Ok(())
    }

    fn write_builtin(
        &self,
        ctx: &mut dyn SerializeContext,
        decl: &TypeDeclaration,
        arguments: &[Codec],
        value: &Value,
    ) -> DynResult<()> {
        let builtin = Builtin::from_name(&decl.name).ok_or_else(|| {
            DynamicError::Model(format!("no dynamic adapter for external {}", decl.name))
        })?;
        match (builtin, value) {
            (Builtin::U8, Value::U8(v)) => ctx.write_u8(*v)?,
            (Builtin::U16, Value::U16(v)) => ctx.write_u16(*v)?,
            (Builtin::U32, Value::U32(v)) => ctx.write_u32(*v)?,
            (Builtin::U64, Value::U64(v)) => ctx.write_u64(*v)?,
            (Builtin::I8, Value::I8(v)) => ctx.write_i8(*v)?,
            (Builtin::I16, Value::I16(v)) => ctx.write_i16(*v)?,
            (Builtin::I32, Value::I32(v)) => ctx.write_i32(*v)?,
            (Builtin::I64, Value::I64(v)) => ctx.write_i64(*v)?,
            (Builtin::F16, Value::F16(v)) => builtins::serialize_f16(ctx, v)?,
            (Builtin::F32, Value::F32(v)) => builtins::serialize_f32(ctx, v)?,
            (Builtin::F64, Value::F64(v)) => builtins::serialize_f64(ctx, v)?,
            (Builtin::String, Value::String(v)) => ctx.write_string(v)?,
            (Builtin::ByteArray, Value::Bytes(v)) => ctx.write_byte_array(v)?,
            (Builtin::Uuid, Value::Uuid(v)) => builtins::serialize_uuid(ctx, v)?,
            (Builtin::List, Value::List(items)) => {
                let element = &arguments[0];
                ctx.begin("List");
                ctx.write_sequence_length(items.len())?;
                for (index, item) in items.iter().enumerate() {
                    let index = index as u32;
                    ctx.begin_indexed("List", index);
                    self.write(ctx, element, item)?;
                    ctx.end_indexed("List", index);
                }
                ctx.end("List");
            }
            (b, v) => return Err(mismatch(b.core_name(), v)),
        }
        Ok(())
    }

    fn read(&self, ctx: &mut dyn DeserializeContext, codec: &Codec) -> DynResult<Value> {
        let (name, arguments) = match codec {
            Codec::Named(q) => (q, &[][..]),
            Codec::Applied { target, arguments } => (target, arguments.as_slice()),
        };
        let decl = self.decl(name)?;
        let env = self.env_for(decl, arguments)?;
        match &decl.kind {
            DeclarationKind::External => self.read_builtin(ctx, decl, arguments),
            DeclarationKind::Record { fields } => {
                ctx.begin(&decl.name.name);
                let values = self.read_fields(ctx, fields, &env)?;
                ctx.end(&decl.name.name);
                Ok(Value::Record(values))
            }
            DeclarationKind::Variant { cases } => {
                ctx.begin(&decl.name.name);
                let index = ctx.read_variant_index()?;
                let Some(case) = cases.get(index as usize) else {
                    return Err(WireError::UnrecognizedVariantIndex {
                        type_name: decl.name.to_string(),
                        index,
                        cases: cases.len() as u32,
                    }
                    .into());
                };
                ctx.begin(&case.name);
                let fields = self.read_fields(ctx, &case.fields, &env)?;
                ctx.end(&case.name);
                ctx.end(&decl.name.name);
                Ok(Value::Variant { index, fields })
            }
        }
    }

    fn read_fields(
        &self,
        ctx: &mut dyn DeserializeContext,
        fields: &[Field],
        env: &Env,
    ) -> DynResult<Vec<Value>> {
        let (refs, lambdas) =
            self.plan(fields.iter().map(|f| &f.ty), Direction::Deserialize, env)?;
        let mut out = Vec::with_capacity(fields.len());
        for (f, r) in fields.iter().zip(&refs) {
            let codec = self.bind(r, env, &lambdas)?;
            ctx.begin(&f.name);
            out.push(self.read(ctx, &codec)?);
            ctx.end(&f.name);
        }
        Ok(out)
    }

    fn read_builtin(
        &self,
        ctx: &mut dyn DeserializeContext,
        decl: &TypeDeclaration,
        arguments: &[Codec],
    ) -> DynResult<Value> {
        let builtin = Builtin::from_name(&decl.name).ok_or_else(|| {
            DynamicError::Model(format!("no dynamic adapter for external {}", decl.name))
        })?;
        Ok(match builtin {
            Builtin::U8 => Value::U8(ctx.read_u8()?),
            Builtin::U16 => Value::U16(ctx.read_u16()?),
            Builtin::U32 => Value::U32(ctx.read_u32()?),
            Builtin::U64 => Value::U64(ctx.read_u64()?),
            Builtin::I8 => Value::I8(ctx.read_i8()?),
            Builtin::I16 => Value::I16(ctx.read_i16()?),
            Builtin::I32 => Value::I32(ctx.read_i32()?),
            Builtin::I64 => Value::I64(ctx.read_i64()?),
            Builtin::F16 => Value::F16(builtins::deserialize_f16(ctx)?),
            Builtin::F32 => Value::F32(builtins::deserialize_f32(ctx)?),
            Builtin::F64 => Value::F64(builtins::deserialize_f64(ctx)?),
            Builtin::String => Value::String(ctx.read_string()?),
            Builtin::ByteArray => Value::Bytes(ctx.read_byte_array()?),
            Builtin::Uuid => Value::Uuid(builtins::deserialize_uuid(ctx)?),
            Builtin::List => {
                let element = &arguments[0];
                ctx.begin("List");
                let length = ctx.read_sequence_length()?;
                let mut items = Vec::with_capacity(length.min(1024));
                for index in 0..length {
                    let index = index as u32;
                    ctx.begin_indexed("List", index);
                    items.push(self.read(ctx, element)?);
                    ctx.end_indexed("List", index);
                }
                ctx.end("List");
                Value::List(items)
            }
        })
    }
}

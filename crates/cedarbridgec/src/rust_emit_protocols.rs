//! Rust source for one protocol version: capability trait, closed message
//! enum, tag dispatcher and factory.

use crate::generate::{GenerateError, GenerateOptions};
use crate::method_ref::Direction;
use crate::model::{Model, Protocol, ProtocolVersion};
use crate::names::{self, ident};
use crate::rust_emit::{RustTypes, SourceWriter};

pub fn emit_protocol_version_module(
    model: &Model,
    protocol: &Protocol,
    version: &ProtocolVersion,
    options: &GenerateOptions,
) -> Result<String, GenerateError> {
    let types = RustTypes::new(model, options);
    let proto = &protocol.name.name;
    let qualified = protocol.name.to_string();
    let enum_name = names::protocol_version_enum(proto, version.version);
    let version_trait = names::protocol_version_trait(proto, version.version);
    let codec_name = format!("{enum_name}Codec");
    let id_const = format!("super::{}", names::protocol_id_const(proto));

    if version.messages.is_empty() {
        return Err(GenerateError::invariant(format!(
            "{qualified} v{}: no messages",
            version.version
        )));
    }
    let mut messages = Vec::with_capacity(version.messages.len());
    for m in &version.messages {
        let decl = types.decl(m)?;
        if decl.is_external() || !decl.type_parameters.is_empty() {
            return Err(GenerateError::invariant(format!(
                "{qualified} v{}: message {m} must be a non-generic record or variant",
                version.version
            )));
        }
        messages.push((ident(&m.name), types.declared_type(m), m));
    }

    let mut w = SourceWriter::new();
    w.header(&format!("Version {} of protocol `{qualified}`.", version.version));

    w.line(&format!(
        "/// Implemented by exactly the messages of version {} of `{qualified}`.",
        version.version
    ));
    w.line(&format!(
        "pub trait {version_trait}: super::{} {{}}",
        names::protocol_marker_trait(proto)
    ));
    w.blank();

    w.line("#[derive(Debug, Clone, PartialEq, Eq, Hash)]");
    w.open(&format!("pub enum {enum_name}"));
    for (variant, path, _) in &messages {
        w.line(&format!("{variant}({path}),"));
    }
    w.close("");
    w.blank();

    for (variant, path, _) in &messages {
        w.open(&format!("impl ::core::convert::From<{path}> for {enum_name}"));
        w.open(&format!("fn from(message: {path}) -> Self"));
        w.line(&format!("{enum_name}::{variant}(message)"));
        w.close("");
        w.close("");
        w.blank();
    }

    w.open(&format!("impl {enum_name}"));
    w.line("/// Wire tag of the held message.");
    w.open("pub fn variant_index(&self) -> u32");
    w.open("match self");
    for (tag, (variant, _, _)) in messages.iter().enumerate() {
        w.line(&format!("{enum_name}::{variant}(_) => {tag},"));
    }
    w.close("");
    w.close("");
    w.close("");
    w.blank();

    w.line("pub fn serialize(");
    w.indented();
    w.line(&format!("ctx: &mut dyn {},", types.rt("SerializeContext")));
    w.line(&format!("message: &{enum_name},"));
    w.dedented();
    w.open(&format!(") -> {}<()>", types.rt("Result")));
    if options.emit_scopes {
        w.line(&format!("ctx.begin({qualified:?});"));
    }
    w.open("match message");
    for (tag, (variant, _, m)) in messages.iter().enumerate() {
        w.open(&format!("{enum_name}::{variant}(message) =>"));
        w.line(&format!("ctx.write_variant_index({tag})?;"));
        w.line(&format!(
            "{}(ctx, message)?;",
            types.codec_fn(m, Direction::Serialize)?
        ));
        w.close("");
    }
    w.close("");
    if options.emit_scopes {
        w.line(&format!("ctx.end({qualified:?});"));
    }
    w.line("Ok(())");
    w.close("");
    w.blank();

    w.open(&format!(
        "pub fn deserialize(ctx: &mut dyn {}) -> {}<{enum_name}>",
        types.rt("DeserializeContext"),
        types.rt("Result")
    ));
    if options.emit_scopes {
        w.line(&format!("ctx.begin({qualified:?});"));
    }
    w.line("let index = ctx.read_variant_index()?;");
    w.open("let message = match index");
    for (tag, (variant, _, m)) in messages.iter().enumerate() {
        w.line(&format!(
            "{tag} => {enum_name}::{variant}({}(ctx)?),",
            types.codec_fn(m, Direction::Deserialize)?
        ));
    }
    w.open("_ =>");
    w.open(&format!(
        "return Err({}",
        types.rt("WireError::UnrecognizedVariantIndex")
    ));
    w.line(&format!(
        "type_name: {:?}.to_string(),",
        format!("{qualified} v{}", version.version)
    ));
    w.line("index,");
    w.line(&format!("cases: {},", messages.len()));
    w.close(");");
    w.close("");
    w.close(";");
    if options.emit_scopes {
        w.line(&format!("ctx.end({qualified:?});"));
    }
    w.line("Ok(message)");
    w.close("");
    w.blank();

    w.line(&format!(
        "/// Dispatcher for version {} of `{qualified}`.",
        version.version
    ));
    w.line("#[derive(Debug, Clone, Copy, Default)]");
    w.line(&format!("pub struct {codec_name};"));
    w.blank();
    w.open(&format!(
        "impl {} for {codec_name}",
        types.rt("ProtocolVersionCodec")
    ));
    w.line(&format!("type Message = {enum_name};"));
    w.line(&format!("const PROTOCOL_NAME: &'static str = {qualified:?};"));
    w.line(&format!(
        "const PROTOCOL_ID: {} = {id_const};",
        types.rt("uuid::Uuid")
    ));
    w.line(&format!("const VERSION: u64 = {};", version.version));
    w.blank();
    w.open(&format!(
        "fn serialize(ctx: &mut dyn {}, message: &{enum_name}) -> {}<()>",
        types.rt("SerializeContext"),
        types.rt("Result")
    ));
    w.line("serialize(ctx, message)");
    w.close("");
    w.blank();
    w.open(&format!(
        "fn deserialize(ctx: &mut dyn {}) -> {}<{enum_name}>",
        types.rt("DeserializeContext"),
        types.rt("Result")
    ));
    w.line("deserialize(ctx)");
    w.close("");
    w.close("");

    if options.emit_registry {
        w.blank();
        w.open(&format!(
            "fn serialize_erased(ctx: &mut dyn {}, value: &dyn ::core::any::Any) -> {}<()>",
            types.rt("SerializeContext"),
            types.rt("Result")
        ));
        w.open(&format!("match value.downcast_ref::<{enum_name}>()"));
        w.line("::core::option::Option::Some(message) => serialize(ctx, message),");
        w.open(&format!(
            "::core::option::Option::None => Err({}",
            types.rt("WireError::TypeMismatch")
        ));
        w.line(&format!(
            "expected: {:?}.to_string(),",
            format!("{qualified} v{}", version.version)
        ));
        w.close("),");
        w.close("");
        w.close("");
        w.blank();
        w.open(&format!(
            "fn deserialize_erased(ctx: &mut dyn {}) -> {}<::std::boxed::Box<dyn ::core::any::Any>>",
            types.rt("DeserializeContext"),
            types.rt("Result")
        ));
        w.line("Ok(::std::boxed::Box::new(deserialize(ctx)?))");
        w.close("");
        w.blank();
        let names_list: Vec<String> = messages
            .iter()
            .map(|(_, _, m)| format!("{:?}", m.to_string()))
            .collect();
        w.line(&format!(
            "pub const FACTORY: {} = {}(",
            types.rt("ProtocolFactory"),
            types.rt("ProtocolFactory::new")
        ));
        w.indented();
        w.line(&format!("{qualified:?},"));
        w.line(&format!("{id_const},"));
        w.line(&format!("{},", version.version));
        w.line(&format!("&[{}],", names_list.join(", ")));
        w.open(&types.rt("ErasedCodec"));
        w.line("serialize: serialize_erased,");
        w.line("deserialize: deserialize_erased,");
        w.close(",");
        w.dedented();
        w.line(");");
    }
    Ok(w.finish())
}

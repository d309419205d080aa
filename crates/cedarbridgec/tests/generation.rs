use std::path::Path;

use cedarbridgec::generate::{artifact_count, drifted_outputs, generate_package};
use cedarbridgec::model::{
    Field, Package, Protocol, ProtocolVersion, TypeDeclaration,
};
use cedarbridgec::{
    generate_model, load_model, write_outputs, GenerateErrorKind, GenerateOptions,
    GeneratedOutput, Model, OutputKind, QualifiedName, TypeExpression,
};

const CHAT_MODEL: &str = include_str!("../../../tests/cedarbridge/chat_model.json");

fn chat_model() -> Model {
    load_model(CHAT_MODEL.as_bytes()).unwrap()
}

fn no_scopes() -> GenerateOptions {
    GenerateOptions {
        emit_scopes: false,
        ..GenerateOptions::default()
    }
}

fn source<'a>(outputs: &'a [GeneratedOutput], rel: &str) -> &'a str {
    let o = outputs
        .iter()
        .find(|o| o.rel_path == Path::new(rel))
        .unwrap_or_else(|| panic!("missing output {rel}"));
    std::str::from_utf8(&o.bytes).unwrap()
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in:\n{haystack}"))
}

#[test]
fn artifact_count_is_types_plus_protocol_versions() {
    let model = chat_model();
    let outputs = generate_model(&model, &GenerateOptions::default()).unwrap();

    // core: Option, MapEntry, Map. demo.chat: 6 types + 2 versions.
    assert_eq!(model.expected_artifact_count(), 11);
    assert_eq!(artifact_count(&outputs), 11);
    // Plus one module file per package and the root.
    assert_eq!(outputs.len(), 14);

    let kinds = |k: OutputKind| outputs.iter().filter(|o| o.kind == k).count();
    assert_eq!(kinds(OutputKind::Type), 9);
    assert_eq!(kinds(OutputKind::ProtocolVersion), 2);
    assert_eq!(kinds(OutputKind::PackageModule), 2);
    assert_eq!(kinds(OutputKind::RootModule), 1);

    for rel in [
        "mod.rs",
        "cedarbridge_core/mod.rs",
        "cedarbridge_core/option.rs",
        "cedarbridge_core/map_entry.rs",
        "demo_chat/mod.rs",
        "demo_chat/point.rs",
        "demo_chat/protocol_chat_v1.rs",
        "demo_chat/protocol_chat_v2.rs",
    ] {
        source(&outputs, rel);
    }
}

#[test]
fn every_package_produces_its_own_artifacts() {
    let model = chat_model();
    for package in model.packages() {
        let outputs = generate_package(&model, package, &GenerateOptions::default()).unwrap();
        assert!(artifact_count(&outputs) > 0, "{}", package.name);
        assert_eq!(
            outputs.iter().filter(|o| o.kind == OutputKind::PackageModule).count(),
            1
        );
    }
}

#[test]
fn generation_is_deterministic() {
    let model = chat_model();
    let a = generate_model(&model, &GenerateOptions::default()).unwrap();
    let b = generate_model(&model, &GenerateOptions::default()).unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.rel_path, y.rel_path);
        assert_eq!(x.bytes, y.bytes);
    }
}

#[test]
fn record_codec_writes_fields_in_declared_order() {
    let outputs = generate_model(&chat_model(), &no_scopes()).unwrap();
    let point = source(&outputs, "demo_chat/point.rs");

    assert!(point.starts_with("// @generated by cedarbridge; do not edit.\n"));
    assert!(point.contains("pub struct Point {\n    a: u8,\n    b: ::std::string::String,\n}"));
    assert!(point.contains("pub fn new(a: u8, b: ::std::string::String) -> Self"));

    let write_a = position(point, "::cedarbridge_runtime::builtins::serialize_u8(ctx, &value.a)?;");
    let write_b = position(point, "::cedarbridge_runtime::builtins::serialize_string(ctx, &value.b)?;");
    assert!(write_a < write_b);

    let read_a = position(point, "let field_a = ::cedarbridge_runtime::builtins::deserialize_u8(ctx)?;");
    let read_b =
        position(point, "let field_b = ::cedarbridge_runtime::builtins::deserialize_string(ctx)?;");
    assert!(read_a < read_b);
    assert!(point.contains("Ok(Point::new(field_a, field_b))"));
}

#[test]
fn nested_generic_lambdas_are_declared_before_use() {
    let outputs = generate_model(&chat_model(), &no_scopes()).unwrap();
    let envelope = source(&outputs, "demo_chat/envelope.rs");

    assert!(envelope.contains("pub fn serialize<A>("));
    assert!(envelope.contains("serialize_a: &::cedarbridge_runtime::SerializeFn<'_, A>,"));

    // tags: Option<List<A>> -> lambda_0 wraps lambda_3.
    let inner = position(envelope, "let lambda_3 = |ctx_4: &mut dyn ::cedarbridge_runtime::SerializeContext, value_5: &::std::vec::Vec<A>|");
    let outer = position(envelope, "let lambda_0 = |ctx_1: &mut dyn ::cedarbridge_runtime::SerializeContext, value_2: &super::super::cedarbridge_core::option::Option<::std::vec::Vec<A>>|");
    assert!(inner < outer);
    assert!(envelope.contains("::cedarbridge_runtime::builtins::serialize_list(ctx_4, value_5, serialize_a)"));
    assert!(envelope.contains("super::super::cedarbridge_core::option::serialize(ctx_1, value_2, &lambda_3)"));

    let field_writes = position(envelope, "serialize_a(ctx, &value.payload)?;");
    assert!(outer < field_writes);
    assert!(envelope.contains("lambda_0(ctx, &value.tags)?;"));

    // The deserializer is its own generation unit and restarts numbering.
    assert!(envelope.contains("let lambda_3 = |ctx_4: &mut dyn ::cedarbridge_runtime::DeserializeContext| -> ::cedarbridge_runtime::Result<::std::vec::Vec<A>>"));
    assert!(envelope.contains("::cedarbridge_runtime::builtins::deserialize_list(ctx_4, deserialize_a)"));
}

#[test]
fn sibling_lambdas_follow_their_dependencies() {
    let outputs = generate_model(&chat_model(), &no_scopes()).unwrap();
    let inbox = source(&outputs, "demo_chat/inbox.rs");

    let list = position(inbox, "let lambda_3 =");
    let map = position(inbox, "let lambda_0 =");
    let envelope = position(inbox, "let lambda_6 =");
    assert!(list < map && map < envelope);
    assert!(inbox.contains(
        "super::super::cedarbridge_core::map::serialize(ctx_1, value_2, &::cedarbridge_runtime::builtins::serialize_string, &lambda_3)"
    ));
    assert!(inbox.contains(
        "super::super::demo_chat::envelope::serialize(ctx_7, value_8, &super::super::demo_chat::shape::serialize)"
    ));
}

#[test]
fn variant_cases_carry_their_declaration_index() {
    let outputs = generate_model(&chat_model(), &no_scopes()).unwrap();
    let shape = source(&outputs, "demo_chat/shape.rs");

    for (case, tag) in [("Circle", 0), ("Rect", 1), ("Empty", 2)] {
        assert!(shape.contains(&format!("pub struct Shape{case}")));
        assert!(shape.contains(&format!(
            "impl ::cedarbridge_runtime::VariantCase for Shape{case} {{\n    type Variant = Shape;\n    const VARIANT_INDEX: u32 = {tag};\n}}"
        )));
        assert!(shape.contains(&format!("Shape::{case}(case) => {{\n            ctx.write_variant_index({tag})?;")));
        assert!(shape.contains(&format!("Shape::{case}(_) => {tag},")));
    }
    assert!(shape.contains("pub struct ShapeEmpty {}"));
    assert!(shape.contains("type_name: \"demo.chat.Shape\".to_string(),"));
    assert!(shape.contains("cases: 3,"));
}

#[test]
fn protocol_versions_get_dispatchers_and_capabilities() {
    let model = chat_model();
    let outputs = generate_model(&model, &GenerateOptions::default()).unwrap();
    let v1 = source(&outputs, "demo_chat/protocol_chat_v1.rs");
    let v2 = source(&outputs, "demo_chat/protocol_chat_v2.rs");
    let package = source(&outputs, "demo_chat/mod.rs");
    let point = source(&outputs, "demo_chat/point.rs");
    let hello = source(&outputs, "demo_chat/hello.rs");

    assert!(v1.contains("pub trait ChatV1Message: super::ChatMessage {}"));
    assert!(v1.contains("pub enum ChatV1 {\n    Hello(super::super::demo_chat::hello::Hello),\n    Ack(super::super::demo_chat::ack::Ack),\n}"));
    assert!(!v1.contains("Point"));
    assert!(v2.contains("Point(super::super::demo_chat::point::Point),"));
    assert!(v2.contains("const VERSION: u64 = 2;"));
    assert!(v2.contains("const PROTOCOL_ID: ::cedarbridge_runtime::uuid::Uuid = super::CHAT_PROTOCOL_ID;"));
    assert!(v2.contains("type_name: \"demo.chat.Chat v2\".to_string(),"));

    let chat = model
        .find_protocol(&QualifiedName::new("demo.chat", "Chat"))
        .unwrap();
    assert!(package.contains(&format!(
        "pub const CHAT_PROTOCOL_ID: ::cedarbridge_runtime::uuid::Uuid = ::cedarbridge_runtime::uuid::Uuid::from_u128(0x{:032x});",
        chat.id.as_u128()
    )));
    assert!(package.contains("pub trait ChatMessage {}"));
    assert!(package.contains("pub use protocol_chat_v1::{ChatV1, ChatV1Message};"));
    assert!(package.contains(
        "pub const PROTOCOL_FACTORIES: &[::cedarbridge_runtime::ProtocolFactory] = &[protocol_chat_v1::FACTORY, protocol_chat_v2::FACTORY];"
    ));

    // Point is only a v2 message; Hello is in both versions.
    assert!(point.contains("impl super::super::demo_chat::ChatMessage for Point {}"));
    assert!(point.contains("impl super::super::demo_chat::protocol_chat_v2::ChatV2Message for Point {}"));
    assert!(!point.contains("ChatV1Message"));
    assert!(hello.contains("protocol_chat_v1::ChatV1Message for Hello {}"));
    assert!(hello.contains("protocol_chat_v2::ChatV2Message for Hello {}"));
    assert_eq!(hello.matches("ChatMessage for Hello").count(), 1);
}

#[test]
fn options_control_runtime_path_scopes_and_registry() {
    let model = chat_model();
    let options = GenerateOptions {
        runtime_path: "crate::wire".to_string(),
        emit_registry: false,
        emit_scopes: false,
    };
    let outputs = generate_model(&model, &options).unwrap();
    for o in &outputs {
        let text = std::str::from_utf8(&o.bytes).unwrap();
        assert!(!text.contains("::cedarbridge_runtime"), "{}", o.rel_path.display());
        assert!(!text.contains("ctx.begin("), "{}", o.rel_path.display());
        assert!(!text.contains("FACTORY"), "{}", o.rel_path.display());
    }
    assert!(source(&outputs, "demo_chat/point.rs").contains("crate::wire::builtins::serialize_u8"));

    let scoped = generate_model(&model, &GenerateOptions::default()).unwrap();
    let point = source(&scoped, "demo_chat/point.rs");
    let begin = position(point, "ctx.begin(\"Point\");");
    let field = position(point, "ctx.begin(\"a\");");
    let end = position(point, "ctx.end(\"Point\");");
    assert!(begin < field && field < end);
    assert!(point.contains("pub const FACTORY: ::cedarbridge_runtime::CodecFactory"));
}

#[test]
fn unresolved_reference_is_an_invariant_violation() {
    let mut package = Package::new("broken");
    package.types.push(TypeDeclaration::record(
        QualifiedName::new("broken", "Holder"),
        &[],
        vec![Field::new("x", TypeExpression::named("broken", "Missing"))],
    ));
    let model = Model::with_core(vec![package]).unwrap();
    let err = generate_model(&model, &GenerateOptions::default()).unwrap_err();
    assert_eq!(err.kind, GenerateErrorKind::ModelInvariantViolation);
    assert_eq!(err.artifact.as_deref(), Some("broken.Holder"));
}

#[test]
fn undeclared_parameter_is_an_invariant_violation() {
    let mut package = Package::new("broken");
    package.types.push(TypeDeclaration::record(
        QualifiedName::new("broken", "Holder"),
        &[],
        vec![Field::new("x", TypeExpression::parameter("T"))],
    ));
    let model = Model::with_core(vec![package]).unwrap();
    let err = generate_model(&model, &GenerateOptions::default()).unwrap_err();
    assert_eq!(err.kind, GenerateErrorKind::ModelInvariantViolation);
    assert!(err.message.contains("\"T\""), "{err}");
}

#[test]
fn generic_protocol_message_is_an_invariant_violation() {
    let name = QualifiedName::new("broken", "Boxed");
    let mut package = Package::new("broken");
    package.types.push(TypeDeclaration::record(
        name.clone(),
        &["A"],
        vec![Field::new("value", TypeExpression::parameter("A"))],
    ));
    let proto = QualifiedName::new("broken", "Wire");
    package.protocols.push(Protocol {
        id: cedarbridgec::model::derive_protocol_id(&proto),
        name: proto,
        versions: vec![ProtocolVersion {
            version: 1,
            messages: vec![name],
        }],
    });
    let model = Model::with_core(vec![package]).unwrap();
    let err = generate_model(&model, &GenerateOptions::default()).unwrap_err();
    assert_eq!(err.kind, GenerateErrorKind::ModelInvariantViolation);
    assert_eq!(err.artifact.as_deref(), Some("broken.Wire v1"));
}

#[test]
fn io_failure_names_the_artifact_and_writes_nothing() {
    let outputs = generate_model(&chat_model(), &GenerateOptions::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    // The package directory exists as a regular file.
    std::fs::write(dir.path().join("demo_chat"), b"not a directory").unwrap();

    let err = write_outputs(dir.path(), &outputs).unwrap_err();
    assert_eq!(err.kind, GenerateErrorKind::GenerationIo);
    let artifact = err.artifact.clone().unwrap();
    assert!(artifact.starts_with("demo_chat"), "{err}");
    assert!(err.to_string().starts_with("generation I/O failure: demo_chat"));

    assert!(!dir.path().join("mod.rs").exists());
    assert!(!dir.path().join("cedarbridge_core").join("option.rs").exists());
}

#[test]
fn written_tree_matches_outputs() {
    let outputs = generate_model(&chat_model(), &GenerateOptions::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    write_outputs(dir.path(), &outputs).unwrap();
    assert!(drifted_outputs(dir.path(), &outputs).is_empty());

    std::fs::write(dir.path().join("demo_chat/ack.rs"), b"// edited\n").unwrap();
    let drifted: Vec<_> = drifted_outputs(dir.path(), &outputs)
        .into_iter()
        .map(|o| o.artifact.clone())
        .collect();
    assert_eq!(drifted, vec!["demo.chat.Ack".to_string()]);
}

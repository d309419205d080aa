use cedarbridge_runtime::uuid::Uuid;
use cedarbridge_runtime::{
    BufferDeserializeContext, BufferSerializeContext, Float64, StreamDeserializeContext,
    StreamSerializeContext, WireError,
};
use cedarbridgec::dynamic::{DynamicCodec, DynamicError, Value};
use cedarbridgec::{load_model, Model, QualifiedName, TypeExpression};
use proptest::prelude::*;

const CHAT_MODEL: &str = include_str!("../../../tests/cedarbridge/chat_model.json");

fn chat_model() -> Model {
    load_model(CHAT_MODEL.as_bytes()).unwrap()
}

fn demo(name: &str) -> TypeExpression {
    TypeExpression::named("demo.chat", name)
}

fn encode(codec: &DynamicCodec<'_>, ty: &TypeExpression, value: &Value) -> Vec<u8> {
    let mut w = BufferSerializeContext::with_capacity(4096);
    codec.serialize(&mut w, ty, value).unwrap();
    w.as_slice().to_vec()
}

fn decode(codec: &DynamicCodec<'_>, ty: &TypeExpression, bytes: &[u8]) -> Result<Value, DynamicError> {
    let mut r = BufferDeserializeContext::new(bytes.to_vec());
    let value = codec.deserialize(&mut r, ty)?;
    assert!(r.is_exhausted(), "trailing bytes");
    Ok(value)
}

#[test]
fn record_writes_a_then_length_prefixed_b() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    let point = Value::Record(vec![Value::U8(7), Value::String("hi".to_string())]);

    let bytes = encode(&codec, &demo("Point"), &point);
    assert_eq!(bytes, vec![7, 0, 0, 0, 2, b'h', b'i']);
    assert_eq!(decode(&codec, &demo("Point"), &bytes).unwrap(), point);
}

#[test]
fn stream_and_buffer_backings_agree() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    let hello = Value::Record(vec![
        Value::String("ada".to_string()),
        Value::Variant {
            index: 1,
            fields: vec![Value::String("a".to_string())],
        },
    ]);

    let buffered = encode(&codec, &demo("Hello"), &hello);
    let mut stream = StreamSerializeContext::new(Vec::new());
    codec.serialize(&mut stream, &demo("Hello"), &hello).unwrap();
    let streamed = stream.into_inner();
    assert_eq!(streamed, buffered);

    let mut r = StreamDeserializeContext::new(streamed.as_slice());
    assert_eq!(codec.deserialize(&mut r, &demo("Hello")).unwrap(), hello);
}

#[test]
fn variant_tag_is_written_before_case_fields() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    let rect = Value::Variant {
        index: 1,
        fields: vec![Value::U32(3), Value::U32(4)],
    };
    assert_eq!(
        encode(&codec, &demo("Shape"), &rect),
        vec![0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0, 4]
    );
    let empty = Value::Variant {
        index: 2,
        fields: Vec::new(),
    };
    assert_eq!(encode(&codec, &demo("Shape"), &empty), vec![0, 0, 0, 2]);
}

#[test]
fn out_of_range_variant_tag_fails_to_decode() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    let err = decode(&codec, &demo("Shape"), &[0, 0, 0, 3]).unwrap_err();
    match err {
        DynamicError::Wire(WireError::UnrecognizedVariantIndex {
            type_name,
            index,
            cases,
        }) => {
            assert_eq!(type_name, "demo.chat.Shape");
            assert_eq!(index, 3);
            assert_eq!(cases, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn generic_record_round_trips_through_nested_lambdas() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    let ty = TypeExpression::application(
        QualifiedName::new("demo.chat", "Envelope"),
        vec![TypeExpression::named("cedarbridge.core", "IntegerSigned16")],
    );
    let id = Uuid::from_u128(0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10);
    let value = Value::Record(vec![
        Value::Uuid(id),
        Value::I16(-2),
        Value::Variant {
            index: 1,
            fields: vec![Value::List(vec![Value::I16(1), Value::I16(256)])],
        },
    ]);

    let bytes = encode(&codec, &ty, &value);
    let mut expected: Vec<u8> = (1..=16).collect();
    expected.extend([0xff, 0xfe]);
    expected.extend([0, 0, 0, 1, 0, 0, 0, 2, 0, 1, 1, 0]);
    assert_eq!(bytes, expected);
    assert_eq!(decode(&codec, &ty, &bytes).unwrap(), value);
}

#[test]
fn map_of_lists_round_trips() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    let point = |a: u8| Value::Record(vec![Value::U8(a), Value::String(String::new())]);
    let entry = |k: &str, points: Vec<Value>| {
        Value::Record(vec![Value::String(k.to_string()), Value::List(points)])
    };
    let inbox = Value::Record(vec![
        Value::Record(vec![Value::List(vec![
            entry("x", vec![point(1), point(2)]),
            entry("y", Vec::new()),
        ])]),
        Value::Record(vec![
            Value::Uuid(Uuid::nil()),
            Value::Variant {
                index: 0,
                fields: vec![Value::F64(Float64::from(1.5))],
            },
            Value::Variant {
                index: 0,
                fields: Vec::new(),
            },
        ]),
    ]);
    let bytes = encode(&codec, &demo("Inbox"), &inbox);
    assert_eq!(decode(&codec, &demo("Inbox"), &bytes).unwrap(), inbox);
}

#[test]
fn truncated_input_is_a_wire_error() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    let err = decode(&codec, &demo("Point"), &[7, 0, 0, 0, 5, b'a']).unwrap_err();
    assert!(matches!(err, DynamicError::Wire(WireError::Truncated { .. })), "{err}");
}

#[test]
fn protocol_messages_dispatch_by_version_tag() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    let chat = QualifiedName::new("demo.chat", "Chat");
    let point = Value::Variant {
        index: 2,
        fields: vec![Value::Record(vec![Value::U8(1), Value::String("p".to_string())])],
    };

    let mut w = BufferSerializeContext::with_capacity(64);
    codec.serialize_message(&mut w, &chat, 2, &point).unwrap();
    let bytes = w.as_slice().to_vec();
    assert_eq!(bytes, vec![0, 0, 0, 2, 1, 0, 0, 0, 1, b'p']);

    let mut r = BufferDeserializeContext::new(bytes.clone());
    assert_eq!(codec.deserialize_message(&mut r, &chat, 2).unwrap(), point);

    // Tag 2 does not exist in version 1.
    let mut r = BufferDeserializeContext::new(bytes);
    let err = codec.deserialize_message(&mut r, &chat, 1).unwrap_err();
    assert!(matches!(
        err,
        DynamicError::Wire(WireError::UnrecognizedVariantIndex { index: 2, cases: 2, .. })
    ));

    let mut w = BufferSerializeContext::with_capacity(64);
    let err = codec.serialize_message(&mut w, &chat, 1, &point).unwrap_err();
    assert!(matches!(err, DynamicError::ValueMismatch { .. }));
    assert!(matches!(
        codec.serialize_message(&mut w, &chat, 9, &point),
        Err(DynamicError::Model(_))
    ));
}

fn shape_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u64>().prop_map(|bits| Value::Variant {
            index: 0,
            fields: vec![Value::F64(Float64(f64::from_bits(bits)))],
        }),
        (any::<u32>(), any::<u32>()).prop_map(|(w, h)| Value::Variant {
            index: 1,
            fields: vec![Value::U32(w), Value::U32(h)],
        }),
        Just(Value::Variant {
            index: 2,
            fields: Vec::new(),
        }),
    ]
}

#[test]
fn prop_variant_cases_round_trip_with_tag_equal_to_index() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    proptest!(|(shape in shape_strategy())| {
        let Value::Variant { index, .. } = &shape else {
            unreachable!();
        };
        let bytes = encode(&codec, &demo("Shape"), &shape);
        prop_assert_eq!(&bytes[..4], &index.to_be_bytes()[..]);
        prop_assert_eq!(decode(&codec, &demo("Shape"), &bytes).unwrap(), shape);
    });
}

#[test]
fn prop_out_of_range_tags_never_decode() {
    let model = chat_model();
    let codec = DynamicCodec::new(&model);
    proptest!(|(tag in 3u32..)| {
        let err = decode(&codec, &demo("Shape"), &tag.to_be_bytes()).unwrap_err();
        let is_unrecognized = matches!(
            err,
            DynamicError::Wire(WireError::UnrecognizedVariantIndex { .. })
        );
        prop_assert!(is_unrecognized);
    });
}

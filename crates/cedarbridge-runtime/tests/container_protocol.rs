use cedarbridge_runtime::uuid::Uuid;
use cedarbridge_runtime::{
    BufferDeserializeContext, BufferSerializeContext, ContainerAvailable, ContainerResponse,
    ContainerUse, SerializeContext, StreamDeserializeContext, WireError,
};
use proptest::prelude::*;

fn app_id() -> Uuid {
    Uuid::parse_str("fb06cb82-4245-ff5a-d5e5-6d0060db3016").expect("uuid")
}

#[test]
fn available_scenario_is_48_bytes_and_round_trips() {
    let x = ContainerAvailable::new(1, 2, app_id(), 1, 3).unwrap();
    let bytes = x.to_bytes().unwrap();
    assert_eq!(bytes.len(), ContainerAvailable::SIZE);
    assert_eq!(bytes.len(), 48);
    assert_eq!(&bytes[0..4], &[0x43, 0x42, 0x00, 0x00]);
    assert_eq!(&bytes[4..8], &[0, 0, 0, 1]);
    assert_eq!(&bytes[8..12], &[0, 0, 0, 2]);
    assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    assert_eq!(&bytes[16..32], app_id().as_bytes());
    assert_eq!(&bytes[32..40], &[0, 0, 0, 0, 0, 0, 0, 1]);
    assert_eq!(&bytes[40..48], &[0, 0, 0, 0, 0, 0, 0, 3]);
    assert_eq!(ContainerAvailable::from_bytes(bytes).unwrap(), x);
}

#[test]
fn available_ignores_the_reserved_field_on_read() {
    let x = ContainerAvailable::new(1, 2, app_id(), 1, 3).unwrap();
    let mut bytes = x.to_bytes().unwrap().to_vec();
    bytes[12..16].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(ContainerAvailable::from_bytes(bytes).unwrap(), x);
}

#[test]
fn available_rejects_inverted_ranges() {
    assert_eq!(
        ContainerAvailable::new(3, 2, app_id(), 1, 3),
        Err(WireError::BadVersionRange { min: 3, max: 2 })
    );
    assert_eq!(
        ContainerAvailable::new(1, 2, app_id(), 7, 3),
        Err(WireError::BadVersionRange { min: 7, max: 3 })
    );
    // Unsigned comparison: u32::MAX is a large maximum, not -1.
    assert!(ContainerAvailable::new(0, u32::MAX, app_id(), 0, u64::MAX).is_ok());
}

#[test]
fn parsing_an_inverted_range_fails_like_construction() {
    let mut ctx = BufferSerializeContext::with_capacity(48);
    ctx.write_u32(ContainerAvailable::MAGIC).unwrap();
    ctx.write_u32(5).unwrap();
    ctx.write_u32(4).unwrap();
    ctx.write_u32(0).unwrap();
    ctx.write_raw(app_id().as_bytes()).unwrap();
    ctx.write_u64(1).unwrap();
    ctx.write_u64(1).unwrap();
    assert_eq!(
        ContainerAvailable::from_bytes(ctx.freeze()),
        Err(WireError::BadVersionRange { min: 5, max: 4 })
    );
}

#[test]
fn use_is_32_bytes_and_round_trips() {
    let u = ContainerUse::new(2, app_id(), 3);
    let bytes = u.to_bytes().unwrap();
    assert_eq!(bytes.len(), ContainerUse::SIZE);
    assert_eq!(&bytes[0..4], &[0x43, 0x42, 0x00, 0x01]);
    assert_eq!(ContainerUse::from_bytes(bytes).unwrap(), u);
}

#[test]
fn response_scenario_round_trips() {
    let r = ContainerResponse::new(false, "No problem!").unwrap();
    let bytes = r.to_bytes().unwrap();
    assert_eq!(bytes.len(), 12 + "No problem!".len());
    assert_eq!(&bytes[0..4], &[0x43, 0x42, 0x00, 0x02]);
    assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    assert_eq!(&bytes[8..12], &[0, 0, 0, 11]);
    let back = ContainerResponse::from_bytes(bytes).unwrap();
    assert_eq!(back, r);
    assert!(!back.ok());
    assert_eq!(back.message(), "No problem!");
}

#[test]
fn response_message_limit_is_counted_in_utf8_bytes() {
    assert!(ContainerResponse::new(true, "a".repeat(244)).is_ok());
    assert_eq!(
        ContainerResponse::new(true, "a".repeat(245)),
        Err(WireError::MessageTooLong {
            limit: 244,
            actual: 245
        })
    );
    // 123 two-byte characters: 123 chars but 246 bytes.
    assert_eq!(
        ContainerResponse::new(true, "é".repeat(123)),
        Err(WireError::MessageTooLong {
            limit: 244,
            actual: 246
        })
    );
    let biggest = ContainerResponse::new(true, "a".repeat(244)).unwrap();
    assert_eq!(biggest.to_bytes().unwrap().len(), 256);
}

#[test]
fn response_parse_rejects_oversized_length_before_reading_it() {
    let mut ctx = BufferSerializeContext::with_capacity(12);
    ctx.write_u32(ContainerResponse::MAGIC).unwrap();
    ctx.write_u32(1).unwrap();
    ctx.write_u32(300).unwrap();
    assert_eq!(
        ContainerResponse::from_bytes(ctx.freeze()),
        Err(WireError::MessageTooLong {
            limit: 244,
            actual: 300
        })
    );
}

#[test]
fn response_parse_rejects_a_non_boolean_ok_field() {
    let mut ctx = BufferSerializeContext::with_capacity(12);
    ctx.write_u32(ContainerResponse::MAGIC).unwrap();
    ctx.write_u32(2).unwrap();
    ctx.write_u32(0).unwrap();
    assert_eq!(
        ContainerResponse::from_bytes(ctx.freeze()),
        Err(WireError::BadBoolean { received: 2 })
    );
}

#[test]
fn wrong_magic_names_expected_and_received() {
    let use_bytes = ContainerUse::new(1, app_id(), 1).to_bytes().unwrap();
    assert_eq!(
        ContainerAvailable::from_bytes(use_bytes.clone()),
        Err(WireError::BadMagicNumber {
            expected: 0x4342_0000,
            received: 0x4342_0001
        })
    );
    assert_eq!(
        ContainerResponse::from_bytes(use_bytes),
        Err(WireError::BadMagicNumber {
            expected: 0x4342_0002,
            received: 0x4342_0001
        })
    );
    let avail = ContainerAvailable::new(1, 1, app_id(), 1, 1).unwrap();
    assert_eq!(
        ContainerUse::from_bytes(avail.to_bytes().unwrap()),
        Err(WireError::BadMagicNumber {
            expected: 0x4342_0001,
            received: 0x4342_0000
        })
    );
}

#[test]
fn bad_magic_consumes_only_the_magic() {
    let mut ctx = BufferSerializeContext::with_capacity(64);
    ctx.write_u32(0x1234_5678).unwrap();
    let good = ContainerResponse::new(true, "go").unwrap();
    good.serialize(&mut ctx).unwrap();

    let mut r = BufferDeserializeContext::new(ctx.freeze());
    assert_eq!(
        ContainerResponse::deserialize(&mut r),
        Err(WireError::BadMagicNumber {
            expected: ContainerResponse::MAGIC,
            received: 0x1234_5678
        })
    );
    assert_eq!(ContainerResponse::deserialize(&mut r).unwrap(), good);
    assert!(r.is_exhausted());
}

#[test]
fn handshake_flows_over_a_stream() {
    let offer = ContainerAvailable::new(1, 2, app_id(), 1, 3).unwrap();
    let mut wire = Vec::new();
    wire.extend_from_slice(&offer.to_bytes().unwrap());
    let chosen = offer.choose(1..=1, 2..=5).expect("shared versions");
    wire.extend_from_slice(&chosen.to_bytes().unwrap());
    let verdict = ContainerResponse::new(true, "").unwrap();
    wire.extend_from_slice(&verdict.to_bytes().unwrap());

    let mut r = StreamDeserializeContext::new(&wire[..]);
    assert_eq!(ContainerAvailable::deserialize(&mut r).unwrap(), offer);
    let u = ContainerUse::deserialize(&mut r).unwrap();
    assert_eq!(u.container_version(), 1);
    assert_eq!(u.application_version(), 3);
    assert_eq!(u.application_protocol_id(), app_id());
    assert_eq!(ContainerResponse::deserialize(&mut r).unwrap(), verdict);
    assert_eq!(r.bytes_read(), (48 + 32 + 12) as u64);
}

#[test]
fn prop_available_round_trips_for_valid_ranges() {
    proptest!(|(
        c in (any::<u32>(), any::<u32>()),
        a in (any::<u64>(), any::<u64>()),
        id in any::<u128>(),
    )| {
        let (cmin, cmax) = if c.0 <= c.1 { c } else { (c.1, c.0) };
        let (amin, amax) = if a.0 <= a.1 { a } else { (a.1, a.0) };
        let x = ContainerAvailable::new(cmin, cmax, Uuid::from_u128(id), amin, amax).unwrap();
        let bytes = x.to_bytes().unwrap();
        prop_assert_eq!(bytes.len(), 48);
        prop_assert_eq!(ContainerAvailable::from_bytes(bytes).unwrap(), x);
    });
}

#[test]
fn prop_available_rejects_any_inverted_container_range() {
    proptest!(|(lo in 0u32..u32::MAX, gap in 1u32..1000)| {
        let hi = lo.saturating_add(gap);
        prop_assume!(hi > lo);
        prop_assert_eq!(
            ContainerAvailable::new(hi, lo, Uuid::nil(), 0, 0),
            Err(WireError::BadVersionRange { min: u64::from(hi), max: u64::from(lo) })
        );
    });
}

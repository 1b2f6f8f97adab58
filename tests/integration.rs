//! Integration tests: factory, cloning, write/update pipeline and round trips through the
//! demo protocol.

use protostack::builtin::{INVALID_MESSAGE_NAME, RAW_DATA_FIELD};
use protostack::demo;
use protostack::field::{ArrayList, FloatValue, IntValue, StringField};
use protostack::layer::{CHECKSUM_FIELD, DATA_FIELD, ID_FIELD, SIZE_FIELD, SYNC_FIELD};
use protostack::{
    BasicMessage, Bundle, DataInfo, Endianness, ErrorStatus, Field, MessageFactory, MessageHandle, Mode,
    MsgDataLayer, MsgIdLayer, MsgSizeLayer, Optional, Protocol, ProtocolError, UpdateStatus, Value,
};

/// Heartbeat with counter 7: sync, size 7, id 1, counter, CRC-16/CCITT 0xCBBA.
const HEARTBEAT_7: [u8; 11] = [0xab, 0xcd, 0x00, 0x07, 0x01, 0x00, 0x00, 0x00, 0x07, 0xcb, 0xba];

fn heartbeat_7() -> Vec<u8> {
    demo::frame(demo::HEARTBEAT, &[0, 0, 0, 7])
}

fn decode_one(bytes: &[u8]) -> MessageHandle {
    let mut protocol = demo::protocol();
    let mut out = protocol.read(&DataInfo::new(bytes), true);
    assert_eq!(out.len(), 1, "expected exactly one message");
    out.remove(0)
}

fn int<T: protostack::field::IntType>(handle: &MessageHandle, name: &str) -> T {
    handle
        .message()
        .fields()
        .get_as::<IntValue<T>>(name)
        .map(IntValue::get)
        .expect("int field")
}

#[test]
fn test_frame_helper_layout() {
    assert_eq!(heartbeat_7(), HEARTBEAT_7);
}

#[test]
fn test_create_all_messages() {
    let protocol = demo::protocol();
    let all = protocol.create_all_messages();
    let names: Vec<&str> = all.iter().map(|h| h.name()).collect();
    assert_eq!(
        names,
        ["Heartbeat", "Temperature", "Text", "Reading8", "Reading16", "Status", "Samples"]
    );
    for handle in &all {
        assert!(handle.raw_bytes().is_some(), "{} has raw data", handle.name());
        assert!(handle.transport().is_some(), "{} has transport", handle.name());
        assert_eq!(handle.properties().protocol_name.as_deref(), Some("demo"));
    }
}

#[test]
fn test_create_message_by_index_and_text() {
    let protocol = demo::protocol();
    assert_eq!(protocol.create_message(demo::READING, 0).expect("idx 0").name(), "Reading8");
    assert_eq!(protocol.create_message(demo::READING, 1).expect("idx 1").name(), "Reading16");
    assert!(protocol.create_message(demo::READING, 2).is_none());
    assert!(protocol.create_message(99, 0).is_none());
    assert_eq!(protocol.create_message_by_str("0x05", 0).expect("hex").name(), "Status");
    assert_eq!(protocol.create_message_by_str("6", 0).expect("dec").name(), "Samples");
}

#[test]
fn test_created_message_is_refreshed() {
    // Status starts with detail Tentative; the refresh run on creation resolves it.
    let protocol = demo::protocol();
    let handle = protocol.create_message(demo::STATUS, 0).expect("status");
    let detail = handle
        .message()
        .fields()
        .get_as::<Optional<IntValue<u32>>>("detail")
        .expect("detail");
    assert_eq!(detail.mode(), Mode::Missing);
    assert_eq!(handle.raw_bytes().map(<[u8]>::len), Some(2 + 2 + 1 + 3 + 2));
}

#[test]
fn test_write_computes_size_and_checksum() {
    let protocol = demo::protocol();
    let mut handle = protocol.create_message(demo::HEARTBEAT, 0).expect("heartbeat");
    handle
        .message_mut()
        .fields_mut()
        .get_as_mut::<IntValue<u32>>("counter")
        .expect("counter")
        .set(7);
    let data = protocol.write(&handle).expect("write").data;
    assert_eq!(data, HEARTBEAT_7);
}

#[test]
fn test_update_message_reports_refresh_change() {
    let protocol = demo::protocol();
    let mut handle = protocol.create_message(demo::STATUS, 0).expect("status");
    assert_eq!(protocol.update_message(&mut handle).expect("update"), UpdateStatus::NoChange);

    handle
        .message_mut()
        .fields_mut()
        .get_as_mut::<IntValue<u8>>("flags")
        .expect("flags")
        .set(demo::FLAG_DETAIL);
    assert_eq!(protocol.update_message(&mut handle).expect("update"), UpdateStatus::Changed);
    // detail now present: 4 more bytes on the wire
    assert_eq!(handle.raw_bytes().map(<[u8]>::len), Some(2 + 2 + 1 + 7 + 2));
}

#[test]
fn test_update_refreshes_extra_info_message() {
    let protocol = demo::protocol();
    let mut handle = protocol.create_message(demo::HEARTBEAT, 0).expect("heartbeat");
    assert!(handle.extra_info_document().is_none());

    handle
        .properties_mut()
        .extra_info
        .insert("note".to_string(), serde_json::json!("manual"));
    protocol.update_message(&mut handle).expect("update");
    assert!(handle.extra_info_document().expect("document").contains("manual"));

    handle.properties_mut().extra_info.clear();
    protocol.update_message(&mut handle).expect("update");
    assert!(handle.properties().extra_info_msg.is_none());
}

#[test]
fn test_write_invalid_message_fails() {
    let protocol = demo::protocol();
    let handle = protocol.create_invalid_message();
    match protocol.write(&handle) {
        Err(ProtocolError::WriteFailed(es)) => assert_eq!(es, ErrorStatus::InvalidMsgId),
        other => panic!("unexpected result: {:?}", other.map(|d| d.data)),
    }
}

#[test]
fn test_builtin_messages() {
    let protocol = demo::protocol();
    assert_eq!(protocol.create_invalid_message().name(), INVALID_MESSAGE_NAME);
    let raw = protocol.create_raw_data_message();
    assert!(raw.message().fields().get(RAW_DATA_FIELD).is_some());
    assert_eq!(raw.id_as_string(), "???");
    assert_eq!(protocol.create_extra_info_message().message().fields().len(), 1);
}

#[test]
fn test_clone_picks_matching_variant() {
    let protocol = demo::protocol();
    let handle = decode_one(&demo::frame(demo::READING, &[10, 0x12, 0x34]));
    assert_eq!(handle.name(), "Reading16");

    let copy = protocol.clone_message(&handle).expect("clone");
    assert_eq!(copy.name(), "Reading16");
    assert_eq!(int::<u16>(&copy, "value"), 0x1234);
    assert_eq!(copy.raw_bytes(), handle.raw_bytes());
}

#[test]
fn test_clone_invalid_message_copies_bytes() {
    let protocol = demo::protocol();
    let handle = decode_one(&[0x01, 0x02, 0x03]);
    assert_eq!(handle.name(), INVALID_MESSAGE_NAME);
    let copy = protocol.clone_message(&handle).expect("clone");
    assert_eq!(copy.raw_bytes(), Some(&[0x01u8, 0x02, 0x03][..]));
}

#[test]
fn test_decode_each_message_type() {
    let h = decode_one(&demo::frame(demo::TEMPERATURE, &[3, 0x41, 0xa8, 0x00, 0x00]));
    assert_eq!(h.name(), "Temperature");
    let celsius = h
        .message()
        .fields()
        .get_as::<FloatValue<f32>>("celsius")
        .map(FloatValue::get)
        .expect("celsius");
    assert_eq!(celsius, 21.0);

    let h = decode_one(&demo::frame(demo::TEXT, &[2, b'o', b'k']));
    let text = h.message().fields().get_as::<StringField>("text").map(StringField::text);
    assert_eq!(text.as_deref(), Some("ok"));

    let h = decode_one(&demo::frame(demo::SAMPLES, &[0xff, 0xfe, 0x00, 0x05]));
    let samples = h.message().fields().get_as::<ArrayList<IntValue<i16>>>("samples").expect("samples");
    assert_eq!(samples.value(), Value::List(vec![Value::I16(-2), Value::I16(5)]));

    let h = decode_one(&demo::frame(demo::STATUS, &[1, 0x00, 0x02, 0, 0, 0, 9]));
    let detail = h.message().fields().get_as::<Optional<IntValue<u32>>>("detail").expect("detail");
    assert_eq!(detail.mode(), Mode::Exists);
    assert_eq!(detail.field().get(), 9);
}

#[test]
fn test_out_of_range_value_is_invalid_message() {
    let bytes = demo::frame(demo::TEMPERATURE, &[200, 0, 0, 0, 0]);
    let h = decode_one(&bytes);
    assert_eq!(h.name(), INVALID_MESSAGE_NAME);
    assert_eq!(h.raw_bytes(), Some(&bytes[..]));
    assert!(h.transport().is_some());
}

#[test]
fn test_transport_annotation_fields() {
    let h = decode_one(&heartbeat_7());
    let transport = h.transport().expect("transport");
    let fields = transport.fields();
    assert_eq!(fields.get(SYNC_FIELD).map(|f| f.value()), Some(Value::Bytes(vec![0xab, 0xcd])));
    assert_eq!(fields.get(SIZE_FIELD).map(|f| f.value()), Some(Value::U64(7)));
    assert_eq!(fields.get(ID_FIELD).map(|f| f.value()), Some(Value::U64(1)));
    assert_eq!(fields.get(DATA_FIELD).map(|f| f.value()), Some(Value::Bytes(vec![0, 0, 0, 7])));
    assert!(fields.get(CHECKSUM_FIELD).is_some());
}

#[test]
fn test_round_trip_every_type() {
    let protocol = demo::protocol();
    for mut handle in protocol.create_all_messages() {
        // Give every message non-default content where it has an obvious knob.
        let fields = handle.message_mut().fields_mut();
        if let Some(f) = fields.get_as_mut::<IntValue<u32>>("counter") {
            f.set(0xdead_beef);
        }
        if let Some(f) = fields.get_as_mut::<StringField>("text") {
            f.set("round trip");
        }
        if let Some(f) = fields.get_as_mut::<ArrayList<IntValue<i16>>>("samples") {
            f.push_default().set(-300);
        }
        if let Some(f) = fields.get_as_mut::<IntValue<u8>>("flags") {
            f.set(demo::FLAG_DETAIL);
        }
        protocol.update_message(&mut handle).expect("update");

        let bytes = protocol.write(&handle).expect("write").data;
        let decoded = decode_one(&bytes);
        assert_eq!(decoded.name(), handle.name());
        assert_eq!(
            decoded.message().fields().value(),
            handle.message().fields().value(),
            "{} round trip",
            handle.name()
        );
        let copy = protocol.clone_message(&decoded).expect("clone");
        assert_eq!(copy.name(), handle.name());
    }
}

fn long_reading() -> BasicMessage {
    BasicMessage::new(
        4,
        "Long",
        Bundle::new()
            .with("a", IntValue::<u8>::new(Endianness::Big))
            .with("b", IntValue::<u16>::new(Endianness::Big)),
    )
}

fn short_reading() -> BasicMessage {
    BasicMessage::new(4, "Short", Bundle::new().with("a", IntValue::<u8>::new(Endianness::Big)))
}

fn sized(factory: MessageFactory) -> Protocol<MsgSizeLayer<MsgIdLayer<MsgDataLayer, 1>, 1>> {
    Protocol::new(MsgSizeLayer::new(MsgIdLayer::new(MsgDataLayer::new(factory), Endianness::Big), Endianness::Big))
}

#[test]
fn test_shared_id_told_apart_by_frame_length() {
    // Short: size 2, id 4, a=5. Long: size 4, id 4, a=5, b=0x0102.
    let stream = [0x02, 0x04, 0x05, 0x04, 0x04, 0x05, 0x01, 0x02];
    let orders = [
        MessageFactory::new().with(4, long_reading).with(4, short_reading),
        MessageFactory::new().with(4, short_reading).with(4, long_reading),
    ];
    for factory in orders {
        let mut protocol = sized(factory);
        let mut out = Vec::new();
        for (i, byte) in stream.iter().enumerate() {
            out.extend(protocol.read(&DataInfo::new(vec![*byte]), i + 1 == stream.len()));
        }
        let names: Vec<&str> = out.iter().map(|h| h.name()).collect();
        assert_eq!(names, ["Short", "Long"]);
        assert_eq!(out[0].raw_bytes(), Some(&stream[..3]));
        assert_eq!(out[1].raw_bytes(), Some(&stream[3..]));
        assert_eq!(int::<u16>(&out[1], "b"), 0x0102);

        let copy = protocol.clone_message(&out[0]).expect("clone");
        assert_eq!(copy.name(), "Short");
        assert_eq!(protocol.write(&out[1]).expect("write").data, &stream[3..]);
    }
}

//! A small serial-line protocol built from the stock layers and fields.
//!
//! Frame layout (big endian):
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 2 | sync `0xAB 0xCD` |
//! | 2 | size of id + payload + checksum |
//! | 1 | message id |
//! | n | payload |
//! | 2 | CRC-16/CCITT over id + payload |
//!
//! Messages:
//!
//! | Id | Name | Payload |
//! |----|------|---------|
//! | 1 | Heartbeat | `counter: u32` |
//! | 2 | Temperature | `sensor: u8` (0..=15), `celsius: f32` |
//! | 3 | Text | `text: u8-prefixed string` |
//! | 4 | Reading8 | `channel: u8` (0..=7), `value: u8` |
//! | 4 | Reading16 | `channel: u8` (8..=15), `value: u16` |
//! | 5 | Status | `flags: u8`, `code: u16`, `detail: u32` present iff flags bit 0 |
//! | 6 | Samples | `samples: i16` until end of payload |

use crate::field::{ArrayList, Bundle, CountPolicy, Endianness, FloatValue, IntValue, Mode, Optional, StringField};
use crate::layer::{Checksum, ChecksumLayer, Crc16Ccitt, MsgDataLayer, MsgIdLayer, MsgSizeLayer, SyncPrefixLayer};
use crate::message::{BasicMessage, MsgId};
use crate::protocol::{Protocol, ProtocolConfig};
use crate::stack::MessageFactory;

pub const SYNC: [u8; 2] = [0xab, 0xcd];

pub const HEARTBEAT: MsgId = 1;
pub const TEMPERATURE: MsgId = 2;
pub const TEXT: MsgId = 3;
pub const READING: MsgId = 4;
pub const STATUS: MsgId = 5;
pub const SAMPLES: MsgId = 6;

/// Status flag: `detail` follows `code`.
pub const FLAG_DETAIL: u8 = 0x01;

pub type DemoStack =
    SyncPrefixLayer<MsgSizeLayer<ChecksumLayer<Crc16Ccitt, MsgIdLayer<MsgDataLayer, 1>>, 2>, 2>;

const BE: Endianness = Endianness::Big;

pub fn heartbeat() -> BasicMessage {
    BasicMessage::new(HEARTBEAT, "Heartbeat", Bundle::new().with("counter", IntValue::<u32>::new(BE)))
}

pub fn temperature() -> BasicMessage {
    BasicMessage::new(
        TEMPERATURE,
        "Temperature",
        Bundle::new()
            .with("sensor", IntValue::<u8>::new(BE).with_range(0, 15).fail_on_invalid())
            .with("celsius", FloatValue::<f32>::new(BE)),
    )
}

pub fn text() -> BasicMessage {
    BasicMessage::new(TEXT, "Text", Bundle::new().with("text", StringField::prefixed(1, BE)))
}

pub fn reading8() -> BasicMessage {
    BasicMessage::new(
        READING,
        "Reading8",
        Bundle::new()
            .with("channel", IntValue::<u8>::new(BE).with_range(0, 7).fail_on_invalid())
            .with("value", IntValue::<u8>::new(BE)),
    )
}

pub fn reading16() -> BasicMessage {
    BasicMessage::new(
        READING,
        "Reading16",
        Bundle::new()
            .with("channel", IntValue::<u8>::new(BE).with_range(8, 15).with_value(8).fail_on_invalid())
            .with("value", IntValue::<u16>::new(BE)),
    )
}

pub fn status() -> BasicMessage {
    BasicMessage::new(
        STATUS,
        "Status",
        Bundle::new()
            .with("flags", IntValue::<u8>::new(BE))
            .with("code", IntValue::<u16>::new(BE))
            .with("detail", Optional::new(IntValue::<u32>::new(BE))),
    )
    .with_refresh(sync_detail_mode)
}

pub fn samples() -> BasicMessage {
    BasicMessage::new(
        SAMPLES,
        "Samples",
        Bundle::new().with("samples", ArrayList::new(IntValue::<i16>::new(BE), CountPolicy::Remaining)),
    )
}

/// Make `detail`'s presence follow the flags.
fn sync_detail_mode(fields: &mut Bundle) -> bool {
    let present = fields
        .get_as::<IntValue<u8>>("flags")
        .map_or(false, |f| f.get() & FLAG_DETAIL != 0);
    let want = if present { Mode::Exists } else { Mode::Missing };
    match fields.get_as_mut::<Optional<IntValue<u32>>>("detail") {
        Some(detail) if detail.mode() != want => {
            detail.set_mode(want);
            true
        }
        _ => false,
    }
}

pub fn factory() -> MessageFactory {
    MessageFactory::new()
        .with(HEARTBEAT, heartbeat)
        .with(TEMPERATURE, temperature)
        .with(TEXT, text)
        .with(READING, reading8)
        .with(READING, reading16)
        .with(STATUS, status)
        .with(SAMPLES, samples)
}

pub fn stack() -> DemoStack {
    SyncPrefixLayer::new(
        SYNC,
        MsgSizeLayer::new(
            ChecksumLayer::new(MsgIdLayer::new(MsgDataLayer::new(factory()), BE), BE),
            BE,
        ),
    )
}

pub fn protocol() -> Protocol<DemoStack> {
    Protocol::with_config(stack(), ProtocolConfig::default().with_name("demo"))
}

/// Build a well-formed frame around a raw payload, bypassing the message types.
/// Only the low byte of `id` goes on the wire.
pub fn frame(id: MsgId, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 1);
    body.push((id & 0xff) as u8);
    body.extend_from_slice(payload);
    let crc = Crc16Ccitt::calculate(&body) as u16;
    let size = (body.len() + Crc16Ccitt::LENGTH) as u16;

    let mut out = Vec::with_capacity(body.len() + 6);
    out.extend_from_slice(&SYNC);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

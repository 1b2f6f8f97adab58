//! Stream reassembly engine: turns byte chunks into message handles and message
//! handles back into bytes.
//!
//! Bytes that do not start a recognizable frame are collected in a garbage buffer and
//! surfaced as invalid messages, so every ingested byte ends up in exactly one emitted
//! handle (see [`Protocol::read`]).

use crate::builtin;
use crate::error::{ErrorStatus, ProtocolError, Result};
use crate::handle::{ExtraInfo, MessageHandle};
use crate::message::{Message, MsgId};
use crate::stack::ProtocolStack;
use std::time::SystemTime;
use tracing::{debug, error, trace, warn};

/// Garbage bytes collected before they are flushed as an invalid message.
pub const GARBAGE_LIMIT: usize = 512;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Reported by [`Protocol::name`] and attached to every emitted handle.
    pub name: String,
    pub garbage_limit: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig { name: "protocol".to_string(), garbage_limit: GARBAGE_LIMIT }
    }
}

impl ProtocolConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_garbage_limit(mut self, limit: usize) -> Self {
        self.garbage_limit = limit.max(1);
        self
    }
}

/// A chunk of bytes with its timestamp and caller-supplied metadata.
#[derive(Debug, Clone)]
pub struct DataInfo {
    pub timestamp: SystemTime,
    pub data: Vec<u8>,
    pub extra_properties: ExtraInfo,
}

impl DataInfo {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        DataInfo { timestamp: SystemTime::now(), data: data.into(), extra_properties: ExtraInfo::new() }
    }

    /// Attach one metadata entry (builder form).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Whether [`Protocol::update_message`] changed any field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    NoChange,
    Changed,
}

/// Engine driving one protocol stack over one byte stream.
///
/// Not internally synchronized: use one instance per connection.
#[derive(Debug)]
pub struct Protocol<S: ProtocolStack> {
    stack: S,
    config: ProtocolConfig,
    data: Vec<u8>,
    garbage: Vec<u8>,
}

impl<S: ProtocolStack> Protocol<S> {
    pub fn new(stack: S) -> Self {
        Protocol::with_config(stack, ProtocolConfig::default())
    }

    pub fn with_config(stack: S, config: ProtocolConfig) -> Self {
        Protocol { stack, config, data: Vec::new(), garbage: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Bytes received but not yet resolved into a message or garbage.
    pub fn pending(&self) -> usize {
        self.data.len()
    }

    /// Garbage bytes held back until the next flush.
    pub fn garbage_len(&self) -> usize {
        self.garbage.len()
    }

    /// Append `info.data` and extract every message that can now be decoded.
    ///
    /// Handles come back in the order their bytes appear in the stream, with invalid
    /// messages for garbage interleaved. With `final_chunk` set, everything still
    /// pending is flushed as garbage.
    pub fn read(&mut self, info: &DataInfo, final_chunk: bool) -> Vec<MessageHandle> {
        let Protocol { stack, config, data, garbage } = self;
        let stack: &S = stack;
        data.extend_from_slice(&info.data);

        let mut emitter = Emitter { stack, config, extra: &info.extra_properties, garbage, out: Vec::new() };
        let mut buf = ConsumeGuard { data, consumed: 0 };

        loop {
            let remaining = &buf.data[buf.consumed..];
            if remaining.is_empty() {
                break;
            }
            let mut iter = remaining;
            let mut msg = None;
            let es = stack.read(&mut msg, &mut iter, remaining.len());
            let used = remaining.len() - iter.len();

            match es {
                ErrorStatus::NotEnoughData => {
                    trace!(pending = remaining.len(), "waiting for more data");
                    break;
                }
                ErrorStatus::MsgAllocFailure => {
                    error!(offset = buf.consumed, "protocol stack failed to allocate a message");
                    if cfg!(debug_assertions) {
                        panic!("protocol stack failed to allocate a message");
                    }
                    break;
                }
                ErrorStatus::Success | ErrorStatus::InvalidMsgData if used == 0 => {
                    warn!(status = %es, "stack read consumed no bytes, resynchronizing");
                    emitter.push_garbage(remaining[0]);
                    buf.consumed += 1;
                }
                ErrorStatus::Success => {
                    let msg = match msg {
                        Some(m) => m,
                        None => {
                            error!(offset = buf.consumed, "stack reported success without a message");
                            if cfg!(debug_assertions) {
                                panic!("stack reported success without a message");
                            }
                            break;
                        }
                    };
                    emitter.flush_garbage();
                    trace!(name = msg.name(), id = %msg.id_as_string(), len = used, "message decoded");
                    emitter.emit_frame(msg, &remaining[..used]);
                    buf.consumed += used;
                }
                ErrorStatus::InvalidMsgData => {
                    emitter.flush_garbage();
                    debug!(len = used, "invalid message data");
                    emitter.emit_frame(Box::new(builtin::invalid_message()), &remaining[..used]);
                    buf.consumed += used;
                }
                es if es.is_framing_error() => {
                    emitter.push_garbage(remaining[0]);
                    buf.consumed += 1;
                }
                es => {
                    // UpdateRequired is a write-side status
                    error!(status = %es, offset = buf.consumed, "unexpected status from stack read");
                    emitter.push_garbage(remaining[0]);
                    buf.consumed += 1;
                }
            }
        }

        if final_chunk {
            let rest = &buf.data[buf.consumed..];
            let n = rest.len();
            emitter.garbage.extend_from_slice(rest);
            buf.consumed += n;
            emitter.flush_garbage();
        }

        emitter.out
    }

    /// Serialize `handle`'s message into a chunk ready for transmission.
    pub fn write(&self, handle: &MessageHandle) -> Result<DataInfo> {
        let data = self.serialize(handle.message())?;
        Ok(DataInfo::new(data))
    }

    /// Recompute derived values, re-serialize, and refresh the transport, raw data and
    /// extra info annotations from the new bytes.
    pub fn update_message(&self, handle: &mut MessageHandle) -> Result<UpdateStatus> {
        let changed = handle.message_mut().refresh();
        let data = self.serialize(handle.message())?;

        let mut transport = self.stack.transport_message();
        let mut iter: &[u8] = &data;
        let es = transport.read(&mut iter, data.len());
        if es != ErrorStatus::Success {
            error!(status = %es, name = handle.name(), "transport view does not decode serialized message");
            return Err(ProtocolError::TransportReadFailed(es));
        }

        let mut raw = builtin::raw_data_message();
        let mut iter: &[u8] = &data;
        let es = raw.read(&mut iter, data.len());
        if es != ErrorStatus::Success {
            error!(status = %es, "raw data view does not decode serialized message");
            return Err(ProtocolError::RawDataReadFailed(es));
        }

        let extra_info_msg = if handle.properties().extra_info.is_empty() {
            None
        } else {
            let msg = builtin::extra_info_message_from(&handle.properties().extra_info)?;
            Some(Box::new(msg) as Box<dyn Message>)
        };

        let props = handle.properties_mut();
        props.protocol_name = Some(self.config.name.clone());
        props.transport = Some(transport);
        props.raw_data = Some(Box::new(raw));
        props.extra_info_msg = extra_info_msg;

        debug!(name = handle.name(), changed, "message updated");
        Ok(if changed { UpdateStatus::Changed } else { UpdateStatus::NoChange })
    }

    /// Copy `handle` into a fresh instance of the same message type.
    ///
    /// Candidates registered for the message's id are tried in order and the first one
    /// that accepts the assignment wins. Messages without an id (invalid message, raw
    /// data) are copied as they are.
    pub fn clone_message(&self, handle: &MessageHandle) -> Option<MessageHandle> {
        let id = match handle.id() {
            Some(id) => id,
            None => return Some(handle.clone()),
        };
        for idx in 0.. {
            let mut candidate = self.stack.create_msg(id, idx)?;
            if candidate.assign(handle.message()) {
                let mut copy = MessageHandle::new(candidate);
                *copy.properties_mut() = handle.properties().clone();
                return Some(copy);
            }
        }
        None
    }

    /// The `idx`-th message type registered for `id`, with consistent derived values.
    pub fn create_message(&self, id: MsgId, idx: usize) -> Option<MessageHandle> {
        let msg = self.stack.create_msg(id, idx)?;
        Some(self.prepare(msg))
    }

    /// Like [`create_message`](Protocol::create_message), with the id given as decimal
    /// or hexadecimal (`0x` prefix optional) text.
    pub fn create_message_by_str(&self, id: &str, idx: usize) -> Option<MessageHandle> {
        let id = parse_msg_id(id)?;
        self.create_message(id, idx)
    }

    /// One instance of every registered message type.
    pub fn create_all_messages(&self) -> Vec<MessageHandle> {
        self.stack.create_all_msgs().into_iter().map(|m| self.prepare(m)).collect()
    }

    pub fn create_invalid_message(&self) -> MessageHandle {
        self.builtin_handle(Box::new(builtin::invalid_message()))
    }

    pub fn create_raw_data_message(&self) -> MessageHandle {
        self.builtin_handle(Box::new(builtin::raw_data_message()))
    }

    pub fn create_extra_info_message(&self) -> MessageHandle {
        self.builtin_handle(Box::new(builtin::extra_info_message()))
    }

    fn builtin_handle(&self, msg: Box<dyn Message>) -> MessageHandle {
        let mut handle = MessageHandle::new(msg);
        handle.properties_mut().protocol_name = Some(self.config.name.clone());
        handle
    }

    fn prepare(&self, msg: Box<dyn Message>) -> MessageHandle {
        let mut handle = self.builtin_handle(msg);
        if let Err(e) = self.update_message(&mut handle) {
            warn!(name = handle.name(), error = %e, "new message left without annotations");
        }
        handle
    }

    /// Write, then run the single update pass if the stack asked for one.
    ///
    /// The output is not bounded: an undecided optional field is written as present.
    fn serialize(&self, msg: &dyn Message) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.stack.length(msg));
        match self.stack.write(msg, &mut out, usize::MAX) {
            ErrorStatus::Success => {}
            ErrorStatus::UpdateRequired => {
                let es = self.stack.update(&mut out);
                if es != ErrorStatus::Success {
                    error!(status = %es, name = msg.name(), "update pass failed after write");
                    return Err(ProtocolError::UpdateFailed(es));
                }
            }
            es => {
                error!(status = %es, name = msg.name(), "message write failed");
                return Err(ProtocolError::WriteFailed(es));
            }
        }
        trace!(name = msg.name(), len = out.len(), "message serialized");
        Ok(out)
    }
}

/// Parse a message id given as text: decimal first, then hexadecimal.
pub fn parse_msg_id(text: &str) -> Option<MsgId> {
    let text = text.trim();
    if let Ok(id) = text.parse::<MsgId>() {
        return Some(id);
    }
    let hex = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    MsgId::from_str_radix(hex, 16).ok()
}

/// Drops the resolved prefix of the accumulation buffer on every exit from
/// [`Protocol::read`].
struct ConsumeGuard<'a> {
    data: &'a mut Vec<u8>,
    consumed: usize,
}

impl Drop for ConsumeGuard<'_> {
    fn drop(&mut self) {
        self.data.drain(..self.consumed);
    }
}

/// Output side of one [`Protocol::read`] call.
struct Emitter<'a, S> {
    stack: &'a S,
    config: &'a ProtocolConfig,
    extra: &'a ExtraInfo,
    garbage: &'a mut Vec<u8>,
    out: Vec<MessageHandle>,
}

impl<S: ProtocolStack> Emitter<'_, S> {
    fn push_garbage(&mut self, byte: u8) {
        self.garbage.push(byte);
        if self.garbage.len() >= self.config.garbage_limit {
            self.flush_garbage();
        }
    }

    fn flush_garbage(&mut self) {
        if self.garbage.is_empty() {
            return;
        }
        let bytes = std::mem::take(self.garbage);
        debug!(len = bytes.len(), "flushing garbage");
        let mut handle = MessageHandle::new(Box::new(builtin::invalid_message()));
        self.annotate(&mut handle, &bytes, false);
        self.out.push(handle);
    }

    fn emit_frame(&mut self, msg: Box<dyn Message>, span: &[u8]) {
        let mut handle = MessageHandle::new(msg);
        self.annotate(&mut handle, span, true);
        self.out.push(handle);
    }

    fn annotate(&self, handle: &mut MessageHandle, span: &[u8], with_transport: bool) {
        let props = handle.properties_mut();
        props.protocol_name = Some(self.config.name.clone());

        if with_transport {
            let mut transport = self.stack.transport_message();
            let mut iter = span;
            match transport.read(&mut iter, span.len()) {
                ErrorStatus::Success => props.transport = Some(transport),
                es => trace!(status = %es, "span does not decode as a transport frame"),
            }
        }

        let mut raw = builtin::raw_data_message();
        let mut iter = span;
        match raw.read(&mut iter, span.len()) {
            ErrorStatus::Success => props.raw_data = Some(Box::new(raw)),
            es => warn!(status = %es, "failed to capture raw data"),
        }

        if !self.extra.is_empty() {
            props.extra_info = self.extra.clone();
            match builtin::extra_info_message_from(self.extra) {
                Ok(msg) => props.extra_info_msg = Some(Box::new(msg)),
                Err(e) => warn!(error = %e, "failed to render extra info"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Bundle, Endianness, IntValue};
    use crate::layer::{MsgDataLayer, MsgIdLayer, MsgSizeLayer};
    use crate::message::BasicMessage;
    use crate::stack::MessageFactory;

    type Stack = MsgSizeLayer<MsgIdLayer<MsgDataLayer, 1>, 1>;

    fn factory() -> MessageFactory {
        MessageFactory::new()
            .with(1, || {
                BasicMessage::new(
                    1,
                    "Ranged",
                    Bundle::new().with("v", IntValue::<u8>::new(Endianness::Big).with_range(0, 9).fail_on_invalid()),
                )
            })
    }

    fn protocol() -> Protocol<Stack> {
        let stack = MsgSizeLayer::new(MsgIdLayer::new(MsgDataLayer::new(factory()), Endianness::Big), Endianness::Big);
        Protocol::with_config(stack, ProtocolConfig::default().with_name("test"))
    }

    fn raw(handle: &MessageHandle) -> Vec<u8> {
        handle.raw_bytes().map(<[u8]>::to_vec).unwrap_or_default()
    }

    #[test]
    fn partial_frame_waits() {
        let mut p = protocol();
        assert!(p.read(&DataInfo::new(vec![0x02, 0x01]), false).is_empty());
        assert_eq!(p.pending(), 2);
        let out = p.read(&DataInfo::new(vec![0x05]), false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name(), "Ranged");
        assert_eq!(raw(&out[0]), vec![0x02, 0x01, 0x05]);
        assert_eq!(out[0].properties().protocol_name.as_deref(), Some("test"));
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn invalid_data_wraps_consumed_span() {
        let mut p = protocol();
        let out = p.read(&DataInfo::new(vec![0x02, 0x01, 0x42, 0x02, 0x01, 0x03]), false);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name(), builtin::INVALID_MESSAGE_NAME);
        assert_eq!(raw(&out[0]), vec![0x02, 0x01, 0x42]);
        assert!(out[0].transport().is_some());
        assert_eq!(out[1].name(), "Ranged");
    }

    #[test]
    fn unknown_id_becomes_garbage_then_flushes_on_success() {
        let mut p = protocol();
        let out = p.read(&DataInfo::new(vec![0x02, 0x07, 0x00]), false);
        // 02 07 00: id 7 unknown; 07 00 is a size of 7, waits
        assert!(out.is_empty());
        assert_eq!(p.garbage_len(), 1);
        let out = p.read(&DataInfo::new(vec![]), true);
        assert_eq!(out.len(), 1);
        assert_eq!(raw(&out[0]), vec![0x02, 0x07, 0x00]);
        assert!(out[0].transport().is_none());
        assert_eq!(p.garbage_len(), 0);
    }

    #[test]
    fn extra_info_is_attached() {
        let mut p = protocol();
        let info = DataInfo::new(vec![0x02, 0x01, 0x01]).with_extra("port", "uart1");
        let out = p.read(&info, false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].properties().extra_info.get("port"), Some(&serde_json::json!("uart1")));
        let doc = out[0].extra_info_document().expect("document");
        assert!(doc.contains("uart1"));
    }

    #[test]
    fn write_and_update() {
        let p = protocol();
        let mut handle = p.create_message(1, 0).expect("registered");
        assert_eq!(raw(&handle), vec![0x02, 0x01, 0x00]);
        handle.message_mut().fields_mut().get_as_mut::<IntValue<u8>>("v").expect("v").set(4);
        assert_eq!(p.update_message(&mut handle).expect("update"), UpdateStatus::NoChange);
        assert_eq!(raw(&handle), vec![0x02, 0x01, 0x04]);
        assert_eq!(p.write(&handle).expect("write").data, vec![0x02, 0x01, 0x04]);
    }

    #[test]
    fn write_failure_is_an_error() {
        let p = protocol();
        let handle = p.create_invalid_message();
        assert!(matches!(p.write(&handle), Err(ProtocolError::WriteFailed(ErrorStatus::InvalidMsgId))));
    }

    #[test]
    fn id_text_forms() {
        assert_eq!(parse_msg_id("17"), Some(17));
        assert_eq!(parse_msg_id("0x1f"), Some(0x1f));
        assert_eq!(parse_msg_id("ff"), Some(0xff));
        assert_eq!(parse_msg_id("zz"), None);
        let p = protocol();
        assert!(p.create_message_by_str("0x01", 0).is_some());
        assert!(p.create_message_by_str("2", 0).is_none());
    }

    #[test]
    fn clone_copies_values() {
        let p = protocol();
        let mut handle = p.create_message(1, 0).expect("registered");
        handle.message_mut().fields_mut().get_as_mut::<IntValue<u8>>("v").expect("v").set(3);
        let copy = p.clone_message(&handle).expect("clone");
        assert_eq!(copy.message().fields().get_as::<IntValue<u8>>("v").map(IntValue::get), Some(3));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "failed to allocate")]
    fn alloc_failure_is_loud() {
        let mut p = Protocol::new(MsgDataLayer::new(factory()));
        let _ = p.read(&DataInfo::new(vec![1, 2, 3]), false);
    }
}

//! Framing layers. Each wraps the next one and implements [`ProtocolStack`], so a
//! concrete protocol is a nested type such as
//! `SyncPrefixLayer<MsgSizeLayer<ChecksumLayer<Crc16Ccitt, MsgIdLayer<MsgDataLayer, 1>>, 2>, 2>`.
//!
//! Reads never look past their `len`. Writes append, and a layer may patch its own bytes
//! once the layers it wraps have written (the size prefix does). A trailing checksum
//! writes a placeholder and asks for an update pass.
//!
//! A size prefix bounds the frame, so the layers inside it are read with
//! [`ProtocolStack::read_frame`] and a message must account for every byte of it.

use crate::error::ErrorStatus;
use crate::field::{max_uint, put_uint, read_uint, write_uint, Bundle, Endianness, IntValue, LengthPolicy, RawBytes};
use crate::message::{Message, MsgId};
use crate::stack::{MessageFactory, ProtocolStack};
use std::fmt;
use std::marker::PhantomData;

/// Transport field names.
pub const SYNC_FIELD: &str = "sync";
pub const SIZE_FIELD: &str = "size";
pub const ID_FIELD: &str = "id";
pub const DATA_FIELD: &str = "data";
pub const CHECKSUM_FIELD: &str = "checksum";

fn assert_width(width: usize, what: &str) {
    assert!((1..=8).contains(&width), "{} width {} out of range 1..=8", what, width);
}

/// Innermost layer: the message payload itself.
#[derive(Debug)]
pub struct MsgDataLayer {
    factory: MessageFactory,
}

impl MsgDataLayer {
    pub fn new(factory: MessageFactory) -> Self {
        MsgDataLayer { factory }
    }

    pub fn factory(&self) -> &MessageFactory {
        &self.factory
    }
}

impl ProtocolStack for MsgDataLayer {
    fn read(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        let m = match msg.as_mut() {
            Some(m) => m,
            None => return ErrorStatus::MsgAllocFailure,
        };
        match m.read(iter, len) {
            ErrorStatus::Success => ErrorStatus::Success,
            ErrorStatus::NotEnoughData => ErrorStatus::NotEnoughData,
            _ => ErrorStatus::InvalidMsgData,
        }
    }

    fn read_frame(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        let before = iter.len();
        let es = self.read(msg, iter, len);
        if es == ErrorStatus::Success && before - iter.len() != len {
            return ErrorStatus::InvalidMsgData;
        }
        es
    }

    fn write(&self, msg: &dyn Message, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        msg.write(out, len)
    }

    fn update(&self, _buf: &mut [u8]) -> ErrorStatus {
        ErrorStatus::Success
    }

    fn length(&self, msg: &dyn Message) -> usize {
        msg.length()
    }

    fn create_msg(&self, id: MsgId, idx: usize) -> Option<Box<dyn Message>> {
        self.factory.create(id, idx)
    }

    fn create_all_msgs(&self) -> Vec<Box<dyn Message>> {
        self.factory.create_all()
    }

    fn transport_fields(&self, fields: &mut Bundle, trailer: usize) {
        fields.push(DATA_FIELD, RawBytes::new(LengthPolicy::Remaining { reserved_tail: trailer }));
    }
}

/// Numeric message id of `N` bytes. Allocates the message through the wrapped layers'
/// factory, trying each type registered for the id in turn.
///
/// The first candidate that decodes wins. A candidate that needs more bytes does not end
/// the search: the result is `NotEnoughData` only when no candidate decoded and at least
/// one asked for more. Inside a bounded frame a candidate must consume all of it.
#[derive(Debug)]
pub struct MsgIdLayer<Next, const N: usize> {
    endianness: Endianness,
    next: Next,
}

impl<Next: ProtocolStack, const N: usize> MsgIdLayer<Next, N> {
    pub fn new(next: Next, endianness: Endianness) -> Self {
        assert_width(N, "message id");
        MsgIdLayer { endianness, next }
    }

    pub fn next(&self) -> &Next {
        &self.next
    }

    fn read_next(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize, exact: bool) -> ErrorStatus {
        if exact {
            self.next.read_frame(msg, iter, len)
        } else {
            self.next.read(msg, iter, len)
        }
    }

    fn read_id(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize, exact: bool) -> ErrorStatus {
        if len < N {
            return ErrorStatus::NotEnoughData;
        }
        let mut body = *iter;
        let id = match read_uint(&mut body, N, self.endianness) {
            Some(id) => id,
            None => return ErrorStatus::NotEnoughData,
        };

        if let Some(m) = msg.as_ref() {
            if m.id() != Some(id) {
                return ErrorStatus::InvalidMsgId;
            }
            let es = self.read_next(msg, &mut body, len - N, exact);
            *iter = body;
            return es;
        }

        let mut last = ErrorStatus::InvalidMsgId;
        let mut wants_more = false;
        for idx in 0.. {
            let candidate = match self.next.create_msg(id, idx) {
                Some(c) => c,
                None => break,
            };
            let mut attempt = body;
            let mut slot = Some(candidate);
            let es = self.read_next(&mut slot, &mut attempt, len - N, exact);
            if es == ErrorStatus::NotEnoughData {
                wants_more = true;
                continue;
            }
            *msg = slot;
            *iter = attempt;
            if matches!(es, ErrorStatus::Success | ErrorStatus::ProtocolError) {
                return es;
            }
            last = es;
        }
        if wants_more {
            *msg = None;
            return ErrorStatus::NotEnoughData;
        }
        last
    }
}

impl<Next: ProtocolStack, const N: usize> ProtocolStack for MsgIdLayer<Next, N> {
    fn read(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.read_id(msg, iter, len, false)
    }

    fn read_frame(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.read_id(msg, iter, len, true)
    }

    fn write(&self, msg: &dyn Message, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        let id = match msg.id() {
            Some(id) => id,
            None => return ErrorStatus::InvalidMsgId,
        };
        if id > max_uint(N) {
            return ErrorStatus::InvalidMsgId;
        }
        if len < N {
            return ErrorStatus::BufferOverflow;
        }
        write_uint(out, id, N, self.endianness);
        self.next.write(msg, out, len - N)
    }

    fn update(&self, buf: &mut [u8]) -> ErrorStatus {
        if buf.len() < N {
            return ErrorStatus::NotEnoughData;
        }
        self.next.update(&mut buf[N..])
    }

    fn length(&self, msg: &dyn Message) -> usize {
        N + self.next.length(msg)
    }

    fn create_msg(&self, id: MsgId, idx: usize) -> Option<Box<dyn Message>> {
        self.next.create_msg(id, idx)
    }

    fn create_all_msgs(&self) -> Vec<Box<dyn Message>> {
        self.next.create_all_msgs()
    }

    fn transport_fields(&self, fields: &mut Bundle, trailer: usize) {
        fields.push(ID_FIELD, IntValue::<u64>::new(self.endianness).with_length(N));
        self.next.transport_fields(fields, trailer);
    }
}

/// Size prefix of `N` bytes counting everything the wrapped layers produce.
#[derive(Debug)]
pub struct MsgSizeLayer<Next, const N: usize> {
    endianness: Endianness,
    next: Next,
}

impl<Next: ProtocolStack, const N: usize> MsgSizeLayer<Next, N> {
    pub fn new(next: Next, endianness: Endianness) -> Self {
        assert_width(N, "size prefix");
        MsgSizeLayer { endianness, next }
    }

    pub fn next(&self) -> &Next {
        &self.next
    }
}

impl<Next: ProtocolStack, const N: usize> ProtocolStack for MsgSizeLayer<Next, N> {
    fn read(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        if len < N {
            return ErrorStatus::NotEnoughData;
        }
        let mut body = *iter;
        let size = match read_uint(&mut body, N, self.endianness).map(usize::try_from) {
            Some(Ok(size)) => size,
            _ => return ErrorStatus::ProtocolError,
        };
        if size > len - N {
            return ErrorStatus::NotEnoughData;
        }
        let (frame, rest) = body.split_at(size);
        let mut frame_iter = frame;
        match self.next.read_frame(msg, &mut frame_iter, size) {
            // The whole frame is present, so the inner layers asking for more means the
            // size is wrong.
            ErrorStatus::NotEnoughData => ErrorStatus::ProtocolError,
            ErrorStatus::ProtocolError => ErrorStatus::ProtocolError,
            es => {
                *iter = rest;
                es
            }
        }
    }

    fn write(&self, msg: &dyn Message, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        if len < N {
            return ErrorStatus::BufferOverflow;
        }
        // The size is what the wrapped layers actually wrote, patched in afterwards.
        let start = out.len();
        write_uint(out, 0, N, self.endianness);
        let es = self.next.write(msg, out, len - N);
        if !matches!(es, ErrorStatus::Success | ErrorStatus::UpdateRequired) {
            return es;
        }
        let size = out.len() - start - N;
        if size as u64 > max_uint(N) {
            return ErrorStatus::InvalidMsgData;
        }
        put_uint(&mut out[start..start + N], size as u64, N, self.endianness);
        es
    }

    fn update(&self, buf: &mut [u8]) -> ErrorStatus {
        if buf.len() < N {
            return ErrorStatus::NotEnoughData;
        }
        let mut prefix: &[u8] = &buf[..];
        let size = match read_uint(&mut prefix, N, self.endianness).map(usize::try_from) {
            Some(Ok(size)) => size,
            _ => return ErrorStatus::ProtocolError,
        };
        if size > buf.len() - N {
            return ErrorStatus::NotEnoughData;
        }
        self.next.update(&mut buf[N..N + size])
    }

    fn length(&self, msg: &dyn Message) -> usize {
        N + self.next.length(msg)
    }

    fn create_msg(&self, id: MsgId, idx: usize) -> Option<Box<dyn Message>> {
        self.next.create_msg(id, idx)
    }

    fn create_all_msgs(&self) -> Vec<Box<dyn Message>> {
        self.next.create_all_msgs()
    }

    fn transport_fields(&self, fields: &mut Bundle, trailer: usize) {
        fields.push(SIZE_FIELD, IntValue::<u64>::new(self.endianness).with_length(N));
        self.next.transport_fields(fields, trailer);
    }
}

/// Fixed synchronization bytes in front of every frame.
pub struct SyncPrefixLayer<Next, const N: usize> {
    sync: [u8; N],
    next: Next,
}

impl<Next: ProtocolStack, const N: usize> SyncPrefixLayer<Next, N> {
    pub fn new(sync: [u8; N], next: Next) -> Self {
        SyncPrefixLayer { sync, next }
    }

    pub fn next(&self) -> &Next {
        &self.next
    }
}

impl<Next: fmt::Debug, const N: usize> fmt::Debug for SyncPrefixLayer<Next, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncPrefixLayer")
            .field("sync", &&self.sync[..])
            .field("next", &self.next)
            .finish()
    }
}

impl<Next: ProtocolStack, const N: usize> SyncPrefixLayer<Next, N> {
    fn read_synced(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize, exact: bool) -> ErrorStatus {
        // A partial prefix is still checked so garbage is rejected without waiting.
        let data: &[u8] = *iter;
        let avail = len.min(N).min(data.len());
        if data[..avail] != self.sync[..avail] {
            return ErrorStatus::ProtocolError;
        }
        if len < N {
            return ErrorStatus::NotEnoughData;
        }
        let mut body = &data[N..];
        let es = if exact {
            self.next.read_frame(msg, &mut body, len - N)
        } else {
            self.next.read(msg, &mut body, len - N)
        };
        *iter = body;
        es
    }
}

impl<Next: ProtocolStack, const N: usize> ProtocolStack for SyncPrefixLayer<Next, N> {
    fn read(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.read_synced(msg, iter, len, false)
    }

    fn read_frame(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.read_synced(msg, iter, len, true)
    }

    fn write(&self, msg: &dyn Message, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        if len < N {
            return ErrorStatus::BufferOverflow;
        }
        out.extend_from_slice(&self.sync);
        self.next.write(msg, out, len - N)
    }

    fn update(&self, buf: &mut [u8]) -> ErrorStatus {
        if buf.len() < N {
            return ErrorStatus::NotEnoughData;
        }
        self.next.update(&mut buf[N..])
    }

    fn length(&self, msg: &dyn Message) -> usize {
        N + self.next.length(msg)
    }

    fn create_msg(&self, id: MsgId, idx: usize) -> Option<Box<dyn Message>> {
        self.next.create_msg(id, idx)
    }

    fn create_all_msgs(&self) -> Vec<Box<dyn Message>> {
        self.next.create_all_msgs()
    }

    fn transport_fields(&self, fields: &mut Bundle, trailer: usize) {
        fields.push(SYNC_FIELD, RawBytes::fixed(N));
        self.next.transport_fields(fields, trailer);
    }
}

/// Checksum calculator for [`ChecksumLayer`].
pub trait Checksum {
    /// Serialized length in bytes (1..=8).
    const LENGTH: usize;

    fn calculate(data: &[u8]) -> u64;
}

/// Arithmetic sum of all bytes, truncated to `N` bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicSum<const N: usize>;

impl<const N: usize> Checksum for BasicSum<N> {
    const LENGTH: usize = N;

    fn calculate(data: &[u8]) -> u64 {
        let sum = data.iter().fold(0u64, |acc, b| acc.wrapping_add(u64::from(*b)));
        sum & max_uint(N)
    }
}

/// CRC-16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no reflection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16Ccitt;

impl Checksum for Crc16Ccitt {
    const LENGTH: usize = 2;

    fn calculate(data: &[u8]) -> u64 {
        let mut crc: u16 = 0xffff;
        for byte in data {
            crc ^= u16::from(*byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
            }
        }
        u64::from(crc)
    }
}

/// Checksum trailer over everything the wrapped layers produce.
pub struct ChecksumLayer<C, Next> {
    endianness: Endianness,
    next: Next,
    calc: PhantomData<C>,
}

impl<C: Checksum, Next: ProtocolStack> ChecksumLayer<C, Next> {
    pub fn new(next: Next, endianness: Endianness) -> Self {
        assert_width(C::LENGTH, "checksum");
        ChecksumLayer { endianness, next, calc: PhantomData }
    }

    pub fn next(&self) -> &Next {
        &self.next
    }
}

impl<C, Next: fmt::Debug> fmt::Debug for ChecksumLayer<C, Next> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumLayer")
            .field("calc", &std::any::type_name::<C>())
            .field("endianness", &self.endianness)
            .field("next", &self.next)
            .finish()
    }
}

impl<C: Checksum, Next: ProtocolStack> ChecksumLayer<C, Next> {
    fn read_checked(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize, exact: bool) -> ErrorStatus {
        if len < C::LENGTH {
            return ErrorStatus::NotEnoughData;
        }
        let start = *iter;
        let mut body = start;
        let es = if exact {
            self.next.read_frame(msg, &mut body, len - C::LENGTH)
        } else {
            self.next.read(msg, &mut body, len - C::LENGTH)
        };
        if es != ErrorStatus::Success {
            // Where the payload stopped is unreliable after a failed read, so the trailer
            // cannot be located.
            *iter = body;
            return es;
        }
        let covered = start.len() - body.len();
        let expected = match read_uint(&mut body, C::LENGTH, self.endianness) {
            Some(v) => v,
            None => return ErrorStatus::NotEnoughData,
        };
        if C::calculate(&start[..covered]) != expected {
            *msg = None;
            return ErrorStatus::ProtocolError;
        }
        *iter = body;
        es
    }
}

impl<C: Checksum, Next: ProtocolStack> ProtocolStack for ChecksumLayer<C, Next> {
    fn read(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.read_checked(msg, iter, len, false)
    }

    fn read_frame(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.read_checked(msg, iter, len, true)
    }

    fn write(&self, msg: &dyn Message, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        if len < C::LENGTH {
            return ErrorStatus::BufferOverflow;
        }
        let es = self.next.write(msg, out, len - C::LENGTH);
        if !matches!(es, ErrorStatus::Success | ErrorStatus::UpdateRequired) {
            return es;
        }
        write_uint(out, 0, C::LENGTH, self.endianness);
        ErrorStatus::UpdateRequired
    }

    fn update(&self, buf: &mut [u8]) -> ErrorStatus {
        if buf.len() < C::LENGTH {
            return ErrorStatus::NotEnoughData;
        }
        let body_len = buf.len() - C::LENGTH;
        let es = self.next.update(&mut buf[..body_len]);
        if es != ErrorStatus::Success {
            return es;
        }
        let checksum = C::calculate(&buf[..body_len]);
        put_uint(&mut buf[body_len..], checksum, C::LENGTH, self.endianness);
        ErrorStatus::Success
    }

    fn length(&self, msg: &dyn Message) -> usize {
        self.next.length(msg) + C::LENGTH
    }

    fn create_msg(&self, id: MsgId, idx: usize) -> Option<Box<dyn Message>> {
        self.next.create_msg(id, idx)
    }

    fn create_all_msgs(&self) -> Vec<Box<dyn Message>> {
        self.next.create_all_msgs()
    }

    fn transport_fields(&self, fields: &mut Bundle, trailer: usize) {
        self.next.transport_fields(fields, trailer + C::LENGTH);
        fields.push(CHECKSUM_FIELD, IntValue::<u64>::new(self.endianness).with_length(C::LENGTH));
    }
}

//! The contract between the engine and a concrete protocol definition.

use crate::builtin;
use crate::error::ErrorStatus;
use crate::field::Bundle;
use crate::message::{Message, MsgId};
use std::fmt;

/// Composition of framing layers around a message, driven by the engine through status
/// codes and consumed/produced byte counts only.
///
/// Implemented by every framing layer in [`crate::layer`]; the outermost layer of a
/// composition is the stack handed to [`Protocol`](crate::Protocol).
pub trait ProtocolStack {
    /// Decode one frame from `iter`, looking at no more than `len` bytes.
    ///
    /// When `msg` is `None` the stack allocates the message itself; on return `msg` holds
    /// whatever message was identified, even if the payload then failed to decode.
    fn read(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus;

    /// Like [`read`](ProtocolStack::read), for a frame whose extent is already known:
    /// `len` is exactly the frame, and a message that leaves part of it unread is
    /// rejected with [`ErrorStatus::InvalidMsgData`]. Called by layers that bound what
    /// they wrap, such as a size prefix.
    fn read_frame(&self, msg: &mut Option<Box<dyn Message>>, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.read(msg, iter, len)
    }

    /// Frame `msg` by appending to `out`, producing at most `len` bytes.
    ///
    /// A layer may patch bytes it appended itself once the wrapped layers return. A layer
    /// whose content is only known after the whole frame is written (a trailing checksum)
    /// leaves a placeholder and returns [`ErrorStatus::UpdateRequired`].
    fn write(&self, msg: &dyn Message, out: &mut Vec<u8>, len: usize) -> ErrorStatus;

    /// Fill in placeholders over a complete, freshly written frame.
    fn update(&self, buf: &mut [u8]) -> ErrorStatus;

    /// Length of `msg` once framed by this layer and everything it wraps. Optional fields
    /// still undecided count as absent, so a write may produce more.
    fn length(&self, msg: &dyn Message) -> usize;

    /// The `idx`-th registered message type for `id`.
    fn create_msg(&self, id: MsgId, idx: usize) -> Option<Box<dyn Message>>;

    /// One instance of every registered message type, in registration order.
    fn create_all_msgs(&self) -> Vec<Box<dyn Message>>;

    /// Append the fields this layer (and the layers it wraps) contribute to the transport
    /// view. `trailer` is the number of bytes outer layers place after the frame body.
    fn transport_fields(&self, fields: &mut Bundle, trailer: usize);

    /// Message that decodes a whole frame field-by-field without interpreting it.
    fn transport_message(&self) -> Box<dyn Message> {
        let mut fields = Bundle::new();
        self.transport_fields(&mut fields, 0);
        Box::new(builtin::transport_message(fields))
    }
}

type Constructor = Box<dyn Fn() -> Box<dyn Message> + Send + Sync>;

/// Ordered registry of message constructors keyed by id.
///
/// Several types may share an id; they are told apart by their position among the
/// constructors registered for that id.
#[derive(Default)]
pub struct MessageFactory {
    entries: Vec<(MsgId, Constructor)>,
}

impl MessageFactory {
    pub fn new() -> Self {
        MessageFactory::default()
    }

    /// Register a constructor (builder form).
    pub fn with<M, F>(mut self, id: MsgId, ctor: F) -> Self
    where
        M: Message + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.register(id, move || Box::new(ctor()) as Box<dyn Message>);
        self
    }

    pub fn register<F>(&mut self, id: MsgId, ctor: F)
    where
        F: Fn() -> Box<dyn Message> + Send + Sync + 'static,
    {
        self.entries.push((id, Box::new(ctor)));
    }

    /// Construct the `idx`-th type registered for `id`, in registration order.
    pub fn create(&self, id: MsgId, idx: usize) -> Option<Box<dyn Message>> {
        self.entries
            .iter()
            .filter(|(entry_id, _)| *entry_id == id)
            .nth(idx)
            .map(|(_, ctor)| ctor())
    }

    pub fn create_all(&self) -> Vec<Box<dyn Message>> {
        self.entries.iter().map(|(_, ctor)| ctor()).collect()
    }

    /// Number of types registered for `id`.
    pub fn count(&self, id: MsgId) -> usize {
        self.entries.iter().filter(|(entry_id, _)| *entry_id == id).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MessageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFactory")
            .field("ids", &self.entries.iter().map(|(id, _)| *id).collect::<Vec<_>>())
            .finish()
    }
}

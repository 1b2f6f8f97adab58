//! Message handles: a message plus the out-of-band properties the engine attaches.

use crate::builtin::{EXTRA_INFO_FIELD, RAW_DATA_FIELD};
use crate::field::{RawBytes, StringField};
use crate::message::{Message, MsgId};

/// Free-form metadata supplied with ingested data (timestamps, source tags, ...).
pub type ExtraInfo = serde_json::Map<String, serde_json::Value>;

/// Side-channel annotations. None of these are part of the wire format.
#[derive(Debug, Clone, Default)]
pub struct MessageProperties {
    /// Name of the protocol that produced the message.
    pub protocol_name: Option<String>,
    /// Transport-layer decode of the bytes the message came from.
    pub transport: Option<Box<dyn Message>>,
    /// Verbatim copy of those bytes.
    pub raw_data: Option<Box<dyn Message>>,
    pub extra_info: ExtraInfo,
    /// `extra_info` rendered as a JSON document message; absent when `extra_info` is empty.
    pub extra_info_msg: Option<Box<dyn Message>>,
}

/// What the engine hands to consumers.
#[derive(Debug, Clone)]
pub struct MessageHandle {
    message: Box<dyn Message>,
    properties: MessageProperties,
}

impl MessageHandle {
    pub fn new(message: Box<dyn Message>) -> Self {
        MessageHandle { message, properties: MessageProperties::default() }
    }

    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    pub fn message_mut(&mut self) -> &mut dyn Message {
        self.message.as_mut()
    }

    pub fn into_message(self) -> Box<dyn Message> {
        self.message
    }

    pub fn properties(&self) -> &MessageProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut MessageProperties {
        &mut self.properties
    }

    pub fn id(&self) -> Option<MsgId> {
        self.message.id()
    }

    pub fn id_as_string(&self) -> String {
        self.message.id_as_string()
    }

    pub fn name(&self) -> &str {
        self.message.name()
    }

    pub fn is_valid(&self) -> bool {
        self.message.valid()
    }

    /// Bytes this message was decoded from (or serialized to by the last update).
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        self.properties
            .raw_data
            .as_ref()
            .and_then(|m| m.fields().get_as::<RawBytes>(RAW_DATA_FIELD))
            .map(RawBytes::bytes)
    }

    pub fn transport(&self) -> Option<&dyn Message> {
        self.properties.transport.as_deref()
    }

    /// JSON document of the extra info, if any was attached.
    pub fn extra_info_document(&self) -> Option<String> {
        self.properties
            .extra_info_msg
            .as_ref()
            .and_then(|m| m.fields().get_as::<StringField>(EXTRA_INFO_FIELD))
            .map(StringField::text)
    }
}

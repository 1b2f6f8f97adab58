//! Messages the engine synthesizes itself: invalid-input wrappers and side views.

use crate::field::{Bundle, RawBytes, StringField};
use crate::handle::ExtraInfo;
use crate::message::BasicMessage;

pub const INVALID_MESSAGE_NAME: &str = "Invalid Message";
pub const RAW_DATA_MESSAGE_NAME: &str = "Raw Data";
pub const EXTRA_INFO_MESSAGE_NAME: &str = "Extra Info";
pub const TRANSPORT_MESSAGE_NAME: &str = "Transport";

/// Name of the single field in the raw data message.
pub const RAW_DATA_FIELD: &str = "data";
/// Name of the single field in the extra info message.
pub const EXTRA_INFO_FIELD: &str = "info";

/// Placeholder for bytes that did not decode as a valid message. The offending bytes are
/// attached as its raw data property.
pub fn invalid_message() -> BasicMessage {
    BasicMessage::unidentified(INVALID_MESSAGE_NAME, Bundle::new())
}

/// Holds a verbatim copy of every byte it reads.
pub fn raw_data_message() -> BasicMessage {
    BasicMessage::unidentified(
        RAW_DATA_MESSAGE_NAME,
        Bundle::new().with(RAW_DATA_FIELD, RawBytes::remaining()),
    )
}

/// Empty extra info message.
pub fn extra_info_message() -> BasicMessage {
    BasicMessage::unidentified(
        EXTRA_INFO_MESSAGE_NAME,
        Bundle::new().with(EXTRA_INFO_FIELD, StringField::remaining()),
    )
}

/// Extra info message holding `info` as a pretty-printed JSON document.
pub fn extra_info_message_from(info: &ExtraInfo) -> serde_json::Result<BasicMessage> {
    let doc = serde_json::to_string_pretty(info)?;
    Ok(BasicMessage::unidentified(
        EXTRA_INFO_MESSAGE_NAME,
        Bundle::new().with(EXTRA_INFO_FIELD, StringField::remaining().with_text(doc)),
    ))
}

/// Transport view built from the fields a protocol stack contributes.
pub fn transport_message(fields: Bundle) -> BasicMessage {
    BasicMessage::unidentified(TRANSPORT_MESSAGE_NAME, fields)
}

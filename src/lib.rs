//! # protostack: binary protocol fields, framing layers and stream reassembly
//!
//! A protocol is described as a composition of typed fields (integers, floats, byte
//! and text sequences, lists, optionals, bundles) grouped into messages, wrapped in a
//! stack of framing layers (sync prefix, size, id, checksum). The [`Protocol`] engine
//! consumes a byte stream in arbitrary chunks and emits decoded messages, and turns
//! messages back into bytes.
//!
//! ## Layout
//!
//! - [`field`]: codec units and the [`Field`] trait
//! - [`message`]: [`Message`] trait and [`BasicMessage`]
//! - [`stack`]: the [`ProtocolStack`] contract and [`MessageFactory`]
//! - [`layer`]: stock framing layers and checksum calculators
//! - [`protocol`]: the reassembly engine
//! - [`demo`]: a complete small protocol used by the tests and the `decode_stream` tool
//!
//! ## Status codes
//!
//! Codec calls return an [`ErrorStatus`] rather than a `Result`. `NotEnoughData` means
//! "call again with more bytes"; framing errors make the engine skip one byte into a
//! garbage buffer and resynchronize; `InvalidMsgData` turns the frame into an invalid
//! message. No byte is ever dropped: each one surfaces in a decoded message or an
//! invalid message.
//!
//! ## Usage
//!
//! ```
//! use protostack::{demo, DataInfo};
//!
//! let mut protocol = demo::protocol();
//! let mut bytes = demo::frame(demo::HEARTBEAT, &[0, 0, 0, 7]);
//! let tail = bytes.split_off(5);
//!
//! assert!(protocol.read(&DataInfo::new(bytes), false).is_empty());
//! let messages = protocol.read(&DataInfo::new(tail), false);
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].name(), "Heartbeat");
//! ```

pub mod builtin;
pub mod demo;
pub mod dump;
pub mod error;
pub mod field;
pub mod handle;
pub mod layer;
pub mod message;
pub mod protocol;
pub mod stack;
pub mod value;

pub use error::{ErrorStatus, ProtocolError, Result};
pub use field::{Bundle, Endianness, Field, Mode, Optional};
pub use handle::{ExtraInfo, MessageHandle, MessageProperties};
pub use layer::{
    BasicSum, Checksum, ChecksumLayer, Crc16Ccitt, MsgDataLayer, MsgIdLayer, MsgSizeLayer, SyncPrefixLayer,
};
pub use message::{BasicMessage, Message, MsgId};
pub use protocol::{parse_msg_id, DataInfo, Protocol, ProtocolConfig, UpdateStatus, GARBAGE_LIMIT};
pub use stack::{MessageFactory, ProtocolStack};
pub use value::Value;

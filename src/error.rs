//! Status codes returned by every codec operation, and the errors surfaced at the
//! emission boundary.
//!
//! Field, message and layer operations never return `Result`: they return a single
//! [`ErrorStatus`] and the caller branches on it. Only the engine's public
//! serialization entry points turn a failed status into a [`ProtocolError`].

/// Outcome of a read, write or update call.
///
/// | Status | Meaning for the caller |
/// |--------|------------------------|
/// | `Success` | operation completed |
/// | `UpdateRequired` | written bytes need an update pass before use |
/// | `NotEnoughData` | retry with more input; not an error |
/// | `ProtocolError` | bytes at the current position cannot start a frame |
/// | `InvalidMsgId` | frame carried an id no message type is registered for |
/// | `InvalidMsgData` | frame recognized, payload malformed |
/// | `MsgAllocFailure` | message construction failed (stack contract violation) |
/// | `NotSupported` | operation not supported by this field or layer |
/// | `BufferOverflow` | output would exceed the allowed length |
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorStatus {
    #[error("success")]
    Success,
    #[error("update required")]
    UpdateRequired,
    #[error("not enough data")]
    NotEnoughData,
    #[error("protocol error")]
    ProtocolError,
    #[error("invalid message id")]
    InvalidMsgId,
    #[error("invalid message data")]
    InvalidMsgData,
    #[error("message allocation failure")]
    MsgAllocFailure,
    #[error("not supported")]
    NotSupported,
    #[error("buffer overflow")]
    BufferOverflow,
}

impl ErrorStatus {
    /// Statuses that mean "the bytes at this position do not start a recognizable frame".
    /// The engine moves one byte to garbage and resynchronizes on any of these.
    pub fn is_framing_error(self) -> bool {
        !matches!(
            self,
            ErrorStatus::Success
                | ErrorStatus::UpdateRequired
                | ErrorStatus::NotEnoughData
                | ErrorStatus::InvalidMsgData
                | ErrorStatus::MsgAllocFailure
        )
    }
}

/// Failure of a serialization request handed to the engine.
///
/// These all indicate a protocol stack that cannot serialize a message it was able to
/// construct; they are contract violations, not malformed input.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message write failed: {0}")]
    WriteFailed(ErrorStatus),
    #[error("update pass after write failed: {0}")]
    UpdateFailed(ErrorStatus),
    #[error("failed to read transport view of serialized message: {0}")]
    TransportReadFailed(ErrorStatus),
    #[error("failed to read raw data view of serialized message: {0}")]
    RawDataReadFailed(ErrorStatus),
    #[error("extra info: {0}")]
    ExtraInfo(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_errors() {
        assert!(ErrorStatus::ProtocolError.is_framing_error());
        assert!(ErrorStatus::InvalidMsgId.is_framing_error());
        assert!(ErrorStatus::BufferOverflow.is_framing_error());
        assert!(!ErrorStatus::NotEnoughData.is_framing_error());
        assert!(!ErrorStatus::InvalidMsgData.is_framing_error());
        assert!(!ErrorStatus::Success.is_framing_error());
    }

    #[test]
    fn error_display_carries_status() {
        let err = ProtocolError::UpdateFailed(ErrorStatus::NotEnoughData);
        assert!(err.to_string().contains("not enough data"));
    }
}

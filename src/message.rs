//! Messages: identified units built from a [`Bundle`] of fields.

use crate::error::ErrorStatus;
use crate::field::{Bundle, Field};
use std::any::Any;
use std::fmt;

/// Numeric message identifier.
pub type MsgId = u64;

/// A protocol message.
///
/// The default method bodies delegate to [`fields`](Message::fields), so most
/// implementations only provide identity, field access, and [`assign`](Message::assign).
pub trait Message: fmt::Debug {
    /// Numeric id, or `None` for messages outside the protocol's id space (invalid
    /// message, raw data, transport view).
    fn id(&self) -> Option<MsgId>;

    fn name(&self) -> &str;

    fn fields(&self) -> &Bundle;

    fn fields_mut(&mut self) -> &mut Bundle;

    fn id_as_string(&self) -> String {
        match self.id() {
            Some(id) => id.to_string(),
            None => "???".to_string(),
        }
    }

    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.fields_mut().read(iter, len)
    }

    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        self.fields().write(out, len)
    }

    fn length(&self) -> usize {
        self.fields().length()
    }

    fn valid(&self) -> bool {
        self.fields().valid()
    }

    /// Recompute dependent field values. Returns true if any value changed.
    fn refresh(&mut self) -> bool {
        self.fields_mut().refresh()
    }

    /// Copy the contents of `other` into `self` if the two are structurally compatible.
    fn assign(&mut self, other: &dyn Message) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn clone_box(&self) -> Box<dyn Message>;
}

impl Clone for Box<dyn Message> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Message-specific refresh step, run after the fields' own refresh.
pub type RefreshFn = fn(&mut Bundle) -> bool;

/// General purpose message: an id, a name, and a field bundle.
///
/// Protocol definitions build their message types from this by registering a
/// constructor per type with a [`MessageFactory`](crate::stack::MessageFactory).
#[derive(Debug, Clone)]
pub struct BasicMessage {
    id: Option<MsgId>,
    name: String,
    fields: Bundle,
    refresher: Option<RefreshFn>,
}

impl BasicMessage {
    pub fn new(id: MsgId, name: impl Into<String>, fields: Bundle) -> Self {
        BasicMessage { id: Some(id), name: name.into(), fields, refresher: None }
    }

    /// Message without a protocol id.
    pub fn unidentified(name: impl Into<String>, fields: Bundle) -> Self {
        BasicMessage { id: None, name: name.into(), fields, refresher: None }
    }

    /// Install a refresh step that recomputes dependent fields (e.g. an optional's
    /// mode from a flags field).
    pub fn with_refresh(mut self, refresher: RefreshFn) -> Self {
        self.refresher = Some(refresher);
        self
    }
}

impl Message for BasicMessage {
    fn id(&self) -> Option<MsgId> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &Bundle {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut Bundle {
        &mut self.fields
    }

    fn refresh(&mut self) -> bool {
        let mut changed = self.fields.refresh();
        if let Some(refresher) = self.refresher {
            changed |= refresher(&mut self.fields);
        }
        changed
    }

    fn assign(&mut self, other: &dyn Message) -> bool {
        let other = match other.as_any().downcast_ref::<BasicMessage>() {
            Some(o) => o,
            None => return false,
        };
        if other.id != self.id || other.name != self.name || !self.fields.same_layout(&other.fields) {
            return false;
        }
        self.fields = other.fields.clone();
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Endianness, IntValue, Mode, Optional};

    fn with_flags() -> BasicMessage {
        BasicMessage::new(
            3,
            "Flagged",
            Bundle::new()
                .with("flags", IntValue::<u8>::new(Endianness::Big))
                .with("extra", Optional::new(IntValue::<u16>::new(Endianness::Big))),
        )
        .with_refresh(|fields| {
            let present = fields.get_as::<IntValue<u8>>("flags").map_or(false, |f| f.get() & 1 != 0);
            let want = if present { Mode::Exists } else { Mode::Missing };
            match fields.get_as_mut::<Optional<IntValue<u16>>>("extra") {
                Some(extra) if extra.mode() != want => {
                    extra.set_mode(want);
                    true
                }
                _ => false,
            }
        })
    }

    #[test]
    fn refresh_reports_change_once() {
        let mut msg = with_flags();
        assert!(msg.refresh());
        assert!(!msg.refresh());
        assert_eq!(msg.length(), 1);
    }

    #[test]
    fn assign_requires_same_layout() {
        let mut src = with_flags();
        src.fields_mut().get_as_mut::<IntValue<u8>>("flags").expect("flags").set(1);

        let mut dst = with_flags();
        assert!(dst.assign(&src));
        assert_eq!(dst.fields().get_as::<IntValue<u8>>("flags").map(IntValue::get), Some(1));

        let mut other = BasicMessage::new(3, "Flagged", Bundle::new());
        assert!(!other.assign(&src));
    }

    #[test]
    fn unidentified_id_string() {
        let msg = BasicMessage::unidentified("Raw", Bundle::new());
        assert_eq!(msg.id_as_string(), "???");
        assert_eq!(with_flags().id_as_string(), "3");
    }
}

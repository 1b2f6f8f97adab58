//! Tri-state presence wrapper around any field.
//!
//! | Mode (before) | available length | read | Mode (after) |
//! |---------------|------------------|------|--------------|
//! | `Missing` | any | no-op success | `Missing` |
//! | `Tentative` | 0 | resolve absent, success | `Missing` |
//! | `Tentative` | >0 | inner read succeeds | `Exists` |
//! | `Tentative` | >0 | inner read fails | `Tentative` |
//! | `Exists` | any | delegate | `Exists` |
//!
//! On write, `Missing` and zero-length `Tentative` produce nothing; otherwise the inner
//! field is written.

use super::Field;
use crate::error::ErrorStatus;
use crate::value::Value;
use std::any::Any;

/// Presence state of an [`Optional`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Presence decided at read time: present if any bytes remain.
    #[default]
    Tentative,
    Exists,
    Missing,
}

#[derive(Debug, Clone)]
pub struct Optional<F: Field> {
    field: F,
    mode: Mode,
}

impl<F: Field + Clone + 'static> Optional<F> {
    /// Wrap `field` in [`Mode::Tentative`].
    pub fn new(field: F) -> Self {
        Optional { field, mode: Mode::Tentative }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut F {
        &mut self.field
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn is_present(&self) -> bool {
        self.mode == Mode::Exists
    }
}

impl<F: Field + Clone + 'static> Field for Optional<F> {
    fn length(&self) -> usize {
        if self.mode != Mode::Exists {
            return 0;
        }
        self.field.length()
    }

    fn min_length(&self) -> usize {
        0
    }

    fn max_length(&self) -> usize {
        self.field.max_length()
    }

    fn valid(&self) -> bool {
        if self.mode == Mode::Missing {
            return true;
        }
        self.field.valid()
    }

    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus {
        if self.mode == Mode::Missing {
            return ErrorStatus::Success;
        }
        if self.mode == Mode::Tentative && len == 0 {
            self.mode = Mode::Missing;
            return ErrorStatus::Success;
        }
        let es = self.field.read(iter, len);
        if es == ErrorStatus::Success {
            self.mode = Mode::Exists;
        }
        es
    }

    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        if self.mode == Mode::Missing {
            return ErrorStatus::Success;
        }
        if self.mode == Mode::Tentative && len == 0 {
            return ErrorStatus::Success;
        }
        self.field.write(out, len)
    }

    fn value(&self) -> Value {
        match self.mode {
            Mode::Missing => Value::List(Vec::new()),
            Mode::Exists | Mode::Tentative => Value::List(vec![self.field.value()]),
        }
    }

    fn set_value(&mut self, value: &Value) -> bool {
        match value.as_list() {
            Some([]) => {
                self.mode = Mode::Missing;
                true
            }
            Some([inner]) => {
                if !self.field.set_value(inner) {
                    return false;
                }
                self.mode = Mode::Exists;
                true
            }
            _ => false,
        }
    }

    fn refresh(&mut self) -> bool {
        self.field.refresh()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn Field> {
        Box::new(self.clone())
    }
}

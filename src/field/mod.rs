//! Field codecs: the atomic units messages and transport frames are built from.
//!
//! Every field reads from a byte cursor (`&mut &[u8]`, advanced as bytes are consumed)
//! bounded by an explicit `len`, and writes by appending to a `Vec<u8>` bounded by an
//! explicit `len`. Callers guarantee the cursor holds at least `len` bytes.
//!
//! | Field | Wire form |
//! |-------|-----------|
//! | [`IntValue`] | 1..=8 byte integer, configurable endianness |
//! | [`FloatValue`] | IEEE-754 `f32` / `f64` |
//! | [`RawBytes`] / [`StringField`] | fixed, size-prefixed, or rest-of-data bytes |
//! | [`ArrayList`] | count-prefixed or rest-of-data sequence of one field type |
//! | [`Optional`] | tri-state presence around any field |
//! | [`Bundle`] | ordered record of named fields |

mod array_list;
mod bundle;
mod bytes;
mod float_value;
mod int_value;
mod optional;

pub use array_list::{ArrayList, CountPolicy};
pub use bundle::Bundle;
pub use bytes::{LengthPolicy, RawBytes, StringField};
pub use float_value::{FloatType, FloatValue};
pub use int_value::{IntType, IntValue};
pub use optional::{Mode, Optional};

use crate::error::ErrorStatus;
use crate::value::Value;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::any::Any;
use std::fmt;

/// Byte order for multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// A single codec unit.
///
/// Invariants: after a successful [`read`](Field::read), [`length`](Field::length) equals
/// the number of bytes consumed; [`write`](Field::write) never appends more than `len`
/// bytes. A failed read retains no partial state the caller can rely on.
pub trait Field: fmt::Debug {
    /// Serialized length of the current value.
    fn length(&self) -> usize;

    fn min_length(&self) -> usize;

    fn max_length(&self) -> usize;

    /// Whether the current value satisfies the field's constraints.
    fn valid(&self) -> bool;

    /// Decode from `iter`, consuming at most `len` bytes.
    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus;

    /// Encode by appending to `out`, producing at most `len` bytes.
    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus;

    fn value(&self) -> Value;

    /// Replace the value from its dynamic form. Returns false if `value` has the wrong shape.
    fn set_value(&mut self, value: &Value) -> bool;

    /// Recompute values that depend on other values. Returns true if anything changed.
    fn refresh(&mut self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn clone_box(&self) -> Box<dyn Field>;
}

impl Clone for Box<dyn Field> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Split `n` bytes off the front of the cursor. Caller checks `n <= iter.len()`.
pub(crate) fn take<'a>(iter: &mut &'a [u8], n: usize) -> &'a [u8] {
    let (head, tail) = iter.split_at(n);
    *iter = tail;
    head
}

/// Read an unsigned integer of `n` bytes (1..=8).
pub(crate) fn read_uint(iter: &mut &[u8], n: usize, endianness: Endianness) -> Option<u64> {
    let r = match endianness {
        Endianness::Big => iter.read_uint::<BigEndian>(n),
        Endianness::Little => iter.read_uint::<LittleEndian>(n),
    };
    r.ok()
}

/// Append the low `n` bytes (1..=8) of `v`.
pub(crate) fn write_uint(out: &mut Vec<u8>, v: u64, n: usize, endianness: Endianness) {
    let masked = if n >= 8 { v } else { v & ((1u64 << (8 * n)) - 1) };
    // Writing into a Vec cannot fail.
    let _ = match endianness {
        Endianness::Big => out.write_uint::<BigEndian>(masked, n),
        Endianness::Little => out.write_uint::<LittleEndian>(masked, n),
    };
}

/// Overwrite `buf[..n]` with the low `n` bytes of `v`. Used by update passes.
pub(crate) fn put_uint(buf: &mut [u8], v: u64, n: usize, endianness: Endianness) {
    let mut tmp = Vec::with_capacity(n);
    write_uint(&mut tmp, v, n, endianness);
    buf[..n].copy_from_slice(&tmp);
}

/// Largest value representable in `n` bytes.
pub(crate) fn max_uint(n: usize) -> u64 {
    if n >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * n)) - 1
    }
}

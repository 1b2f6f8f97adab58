//! Byte sequence and text fields.

use super::{max_uint, read_uint, take, write_uint, Endianness, Field};
use crate::error::ErrorStatus;
use crate::value::Value;
use std::any::Any;

/// How a variable-length field finds its extent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPolicy {
    /// Exactly `n` bytes; shorter data is zero-padded on write, longer is truncated.
    Fixed(usize),
    /// Byte count prefix of `width` bytes, followed by the data.
    Prefixed { width: usize, endianness: Endianness },
    /// Everything available, minus `reserved_tail` bytes left for later fields.
    Remaining { reserved_tail: usize },
}

impl LengthPolicy {
    fn prefix_width(&self) -> usize {
        match self {
            LengthPolicy::Prefixed { width, .. } => *width,
            _ => 0,
        }
    }
}

/// Raw byte sequence.
#[derive(Debug, Clone)]
pub struct RawBytes {
    data: Vec<u8>,
    policy: LengthPolicy,
}

impl RawBytes {
    pub fn new(policy: LengthPolicy) -> Self {
        if let LengthPolicy::Prefixed { width, .. } = policy {
            assert!((1..=8).contains(&width), "size prefix width {} out of range 1..=8", width);
        }
        let data = match policy {
            LengthPolicy::Fixed(n) => vec![0; n],
            _ => Vec::new(),
        };
        RawBytes { data, policy }
    }

    /// Bytes up to the end of the available data.
    pub fn remaining() -> Self {
        RawBytes::new(LengthPolicy::Remaining { reserved_tail: 0 })
    }

    pub fn fixed(n: usize) -> Self {
        RawBytes::new(LengthPolicy::Fixed(n))
    }

    pub fn prefixed(width: usize, endianness: Endianness) -> Self {
        RawBytes::new(LengthPolicy::Prefixed { width, endianness })
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn set_bytes(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
    }

    pub fn policy(&self) -> LengthPolicy {
        self.policy
    }
}

impl Field for RawBytes {
    fn length(&self) -> usize {
        match self.policy {
            LengthPolicy::Fixed(n) => n,
            _ => self.policy.prefix_width() + self.data.len(),
        }
    }

    fn min_length(&self) -> usize {
        match self.policy {
            LengthPolicy::Fixed(n) => n,
            _ => self.policy.prefix_width(),
        }
    }

    fn max_length(&self) -> usize {
        match self.policy {
            LengthPolicy::Fixed(n) => n,
            LengthPolicy::Prefixed { width, .. } => {
                usize::try_from(max_uint(width)).unwrap_or(usize::MAX).saturating_add(width)
            }
            LengthPolicy::Remaining { .. } => usize::MAX,
        }
    }

    fn valid(&self) -> bool {
        match self.policy {
            LengthPolicy::Fixed(n) => self.data.len() == n,
            LengthPolicy::Prefixed { width, .. } => self.data.len() as u64 <= max_uint(width),
            LengthPolicy::Remaining { .. } => true,
        }
    }

    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus {
        let count = match self.policy {
            LengthPolicy::Fixed(n) => {
                if len < n {
                    return ErrorStatus::NotEnoughData;
                }
                n
            }
            LengthPolicy::Prefixed { width, endianness } => {
                if len < width {
                    return ErrorStatus::NotEnoughData;
                }
                let size = match read_uint(iter, width, endianness) {
                    Some(s) => s,
                    None => return ErrorStatus::NotEnoughData,
                };
                match usize::try_from(size) {
                    Ok(s) if s <= len - width => s,
                    _ => return ErrorStatus::NotEnoughData,
                }
            }
            LengthPolicy::Remaining { reserved_tail } => {
                if len < reserved_tail {
                    return ErrorStatus::NotEnoughData;
                }
                len - reserved_tail
            }
        };
        self.data = take(iter, count).to_vec();
        ErrorStatus::Success
    }

    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        match self.policy {
            LengthPolicy::Fixed(n) => {
                if len < n {
                    return ErrorStatus::BufferOverflow;
                }
                let used = self.data.len().min(n);
                out.extend_from_slice(&self.data[..used]);
                out.resize(out.len() + (n - used), 0);
            }
            LengthPolicy::Prefixed { width, endianness } => {
                if !self.valid() {
                    return ErrorStatus::InvalidMsgData;
                }
                if len < width + self.data.len() {
                    return ErrorStatus::BufferOverflow;
                }
                write_uint(out, self.data.len() as u64, width, endianness);
                out.extend_from_slice(&self.data);
            }
            LengthPolicy::Remaining { .. } => {
                if len < self.data.len() {
                    return ErrorStatus::BufferOverflow;
                }
                out.extend_from_slice(&self.data);
            }
        }
        ErrorStatus::Success
    }

    fn value(&self) -> Value {
        Value::Bytes(self.data.clone())
    }

    fn set_value(&mut self, value: &Value) -> bool {
        match value {
            Value::Bytes(b) => {
                self.data = b.clone();
                true
            }
            Value::List(items) => {
                let bytes: Option<Vec<u8>> = items
                    .iter()
                    .map(|v| v.as_u64().and_then(|x| u8::try_from(x).ok()))
                    .collect();
                match bytes {
                    Some(b) => {
                        self.data = b;
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
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

/// UTF-8 text stored with the same length policies as [`RawBytes`].
///
/// Bytes that are not valid UTF-8 are kept as read; the field then reports invalid.
#[derive(Debug, Clone)]
pub struct StringField {
    raw: RawBytes,
}

impl StringField {
    pub fn new(policy: LengthPolicy) -> Self {
        StringField { raw: RawBytes::new(policy) }
    }

    pub fn remaining() -> Self {
        StringField::new(LengthPolicy::Remaining { reserved_tail: 0 })
    }

    pub fn prefixed(width: usize, endianness: Endianness) -> Self {
        StringField::new(LengthPolicy::Prefixed { width, endianness })
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set(text);
        self
    }

    /// Text with invalid UTF-8 sequences replaced; fixed-length padding NULs trimmed.
    pub fn text(&self) -> String {
        let bytes = self.raw.bytes();
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.raw.set_bytes(text.into().into_bytes());
    }
}

impl Field for StringField {
    fn length(&self) -> usize {
        self.raw.length()
    }

    fn min_length(&self) -> usize {
        self.raw.min_length()
    }

    fn max_length(&self) -> usize {
        self.raw.max_length()
    }

    fn valid(&self) -> bool {
        let fits = match self.raw.policy() {
            LengthPolicy::Fixed(n) => self.raw.bytes().len() <= n,
            _ => self.raw.valid(),
        };
        fits && std::str::from_utf8(self.raw.bytes()).is_ok()
    }

    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus {
        self.raw.read(iter, len)
    }

    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        self.raw.write(out, len)
    }

    fn value(&self) -> Value {
        Value::String(self.text())
    }

    fn set_value(&mut self, value: &Value) -> bool {
        match value.as_str() {
            Some(s) => {
                self.set(s);
                true
            }
            None => false,
        }
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

//! IEEE-754 floating point field.

use super::{read_uint, write_uint, Endianness, Field};
use crate::error::ErrorStatus;
use crate::value::Value;
use std::any::Any;
use std::fmt;

pub trait FloatType: Copy + Default + PartialOrd + fmt::Debug + 'static {
    const BYTES: usize;

    fn to_raw(self) -> u64;
    fn from_raw(raw: u64) -> Self;
    fn to_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

impl FloatType for f32 {
    const BYTES: usize = 4;

    fn to_raw(self) -> u64 {
        self.to_bits() as u64
    }

    fn from_raw(raw: u64) -> Self {
        f32::from_bits(raw as u32)
    }

    fn to_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl FloatType for f64 {
    const BYTES: usize = 8;

    fn to_raw(self) -> u64 {
        self.to_bits()
    }

    fn from_raw(raw: u64) -> Self {
        f64::from_bits(raw)
    }

    fn to_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

/// Floating point field. NaN is never valid.
#[derive(Debug, Clone)]
pub struct FloatValue<T: FloatType> {
    value: T,
    endianness: Endianness,
}

impl<T: FloatType> FloatValue<T> {
    pub fn new(endianness: Endianness) -> Self {
        FloatValue { value: T::default(), endianness }
    }

    pub fn with_value(mut self, value: T) -> Self {
        self.value = value;
        self
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }
}

impl<T: FloatType> Field for FloatValue<T> {
    fn length(&self) -> usize {
        T::BYTES
    }

    fn min_length(&self) -> usize {
        T::BYTES
    }

    fn max_length(&self) -> usize {
        T::BYTES
    }

    fn valid(&self) -> bool {
        // NaN is the only value not equal to itself.
        self.value.partial_cmp(&self.value).is_some()
    }

    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus {
        if len < T::BYTES {
            return ErrorStatus::NotEnoughData;
        }
        match read_uint(iter, T::BYTES, self.endianness) {
            Some(raw) => {
                self.value = T::from_raw(raw);
                ErrorStatus::Success
            }
            None => ErrorStatus::NotEnoughData,
        }
    }

    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        if len < T::BYTES {
            return ErrorStatus::BufferOverflow;
        }
        write_uint(out, self.value.to_raw(), T::BYTES, self.endianness);
        ErrorStatus::Success
    }

    fn value(&self) -> Value {
        self.value.to_value()
    }

    fn set_value(&mut self, value: &Value) -> bool {
        match T::from_value(value) {
            Some(v) => {
                self.value = v;
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

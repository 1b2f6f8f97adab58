//! Integer field with configurable width, endianness and valid ranges.

use super::{read_uint, write_uint, Endianness, Field};
use crate::error::ErrorStatus;
use crate::value::Value;
use std::any::Any;
use std::fmt;

/// Integer types storable in an [`IntValue`].
pub trait IntType: Copy + Default + PartialOrd + fmt::Debug + 'static {
    /// Natural width in bytes.
    const BYTES: usize;
    const SIGNED: bool;

    /// Two's complement bit pattern, sign-extended to 64 bits.
    fn to_bits(self) -> u64;
    /// Truncating conversion from a 64-bit pattern.
    fn from_bits(bits: u64) -> Self;
    fn to_value(self) -> Value;
}

macro_rules! impl_int_type {
    ($t:ty, $signed:expr, $variant:ident) => {
        impl IntType for $t {
            const BYTES: usize = std::mem::size_of::<$t>();
            const SIGNED: bool = $signed;

            fn to_bits(self) -> u64 {
                self as i64 as u64
            }

            fn from_bits(bits: u64) -> Self {
                bits as $t
            }

            fn to_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

impl_int_type!(u8, false, U8);
impl_int_type!(u16, false, U16);
impl_int_type!(u32, false, U32);
impl_int_type!(u64, false, U64);
impl_int_type!(i8, true, I8);
impl_int_type!(i16, true, I16);
impl_int_type!(i32, true, I32);
impl_int_type!(i64, true, I64);

/// Integer field serialized in `length` bytes (defaults to the natural width of `T`).
///
/// Valid ranges are inclusive; an empty range list accepts every value. With
/// [`fail_on_invalid`](IntValue::fail_on_invalid), a read that yields an out-of-range
/// value returns [`ErrorStatus::InvalidMsgData`].
#[derive(Debug, Clone)]
pub struct IntValue<T: IntType> {
    value: T,
    endianness: Endianness,
    length: usize,
    ranges: Vec<(T, T)>,
    fail_on_invalid: bool,
}

impl<T: IntType> IntValue<T> {
    pub fn new(endianness: Endianness) -> Self {
        IntValue {
            value: T::default(),
            endianness,
            length: T::BYTES,
            ranges: Vec::new(),
            fail_on_invalid: false,
        }
    }

    /// Serialize in `length` bytes instead of the natural width.
    ///
    /// Panics unless `1 <= length <= T::BYTES`.
    pub fn with_length(mut self, length: usize) -> Self {
        assert!(
            (1..=T::BYTES).contains(&length),
            "serialized length {} out of range 1..={}",
            length,
            T::BYTES
        );
        self.length = length;
        self
    }

    pub fn with_value(mut self, value: T) -> Self {
        self.value = value;
        self
    }

    /// Add an inclusive valid range.
    pub fn with_range(mut self, min: T, max: T) -> Self {
        self.ranges.push((min, max));
        self
    }

    pub fn fail_on_invalid(mut self) -> Self {
        self.fail_on_invalid = true;
        self
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn decode_bits(&self, raw: u64) -> T {
        if T::SIGNED && self.length < 8 {
            let shift = 64 - 8 * self.length as u32;
            T::from_bits((((raw << shift) as i64) >> shift) as u64)
        } else {
            T::from_bits(raw)
        }
    }
}

impl<T: IntType> Field for IntValue<T> {
    fn length(&self) -> usize {
        self.length
    }

    fn min_length(&self) -> usize {
        self.length
    }

    fn max_length(&self) -> usize {
        self.length
    }

    fn valid(&self) -> bool {
        self.ranges.is_empty()
            || self
                .ranges
                .iter()
                .any(|(min, max)| *min <= self.value && self.value <= *max)
    }

    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus {
        if len < self.length {
            return ErrorStatus::NotEnoughData;
        }
        let raw = match read_uint(iter, self.length, self.endianness) {
            Some(v) => v,
            None => return ErrorStatus::NotEnoughData,
        };
        self.value = self.decode_bits(raw);
        if self.fail_on_invalid && !self.valid() {
            return ErrorStatus::InvalidMsgData;
        }
        ErrorStatus::Success
    }

    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        if len < self.length {
            return ErrorStatus::BufferOverflow;
        }
        write_uint(out, self.value.to_bits(), self.length, self.endianness);
        ErrorStatus::Success
    }

    fn value(&self) -> Value {
        self.value.to_value()
    }

    fn set_value(&mut self, value: &Value) -> bool {
        match value.as_i64() {
            Some(v) => {
                self.value = T::from_bits(v as u64);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_big_and_little() {
        let f = IntValue::<u16>::new(Endianness::Big).with_value(0x1234);
        let mut out = Vec::new();
        assert_eq!(f.write(&mut out, 2), ErrorStatus::Success);
        assert_eq!(out, vec![0x12, 0x34]);

        let mut g = IntValue::<u16>::new(Endianness::Little);
        let mut iter: &[u8] = &out;
        assert_eq!(g.read(&mut iter, 2), ErrorStatus::Success);
        assert_eq!(g.get(), 0x3412);
        assert!(iter.is_empty());
    }

    #[test]
    fn short_input_is_not_enough_data() {
        let mut f = IntValue::<u32>::new(Endianness::Big);
        let data = [1u8, 2, 3, 4];
        let mut iter: &[u8] = &data;
        assert_eq!(f.read(&mut iter, 3), ErrorStatus::NotEnoughData);
    }

    #[test]
    fn write_never_exceeds_len() {
        let f = IntValue::<u32>::new(Endianness::Big).with_value(7);
        let mut out = Vec::new();
        assert_eq!(f.write(&mut out, 3), ErrorStatus::BufferOverflow);
        assert!(out.is_empty());
    }

    #[test]
    fn narrow_signed_is_sign_extended() {
        let mut f = IntValue::<i32>::new(Endianness::Big).with_length(3);
        let data = [0xff, 0xff, 0xfe];
        let mut iter: &[u8] = &data;
        assert_eq!(f.read(&mut iter, 3), ErrorStatus::Success);
        assert_eq!(f.get(), -2);
        assert_eq!(f.length(), 3);

        let mut out = Vec::new();
        assert_eq!(f.write(&mut out, 3), ErrorStatus::Success);
        assert_eq!(out, data.to_vec());
    }

    #[test]
    fn ranges_and_fail_on_invalid() {
        let mut f = IntValue::<u8>::new(Endianness::Big)
            .with_range(0, 2)
            .with_range(10, 15)
            .fail_on_invalid();
        for (byte, ok) in [(0u8, true), (2, true), (5, false), (12, true), (16, false)] {
            let data = [byte];
            let mut iter: &[u8] = &data;
            let es = f.read(&mut iter, 1);
            if ok {
                assert_eq!(es, ErrorStatus::Success, "value {}", byte);
            } else {
                assert_eq!(es, ErrorStatus::InvalidMsgData, "value {}", byte);
                assert!(!f.valid());
            }
            assert!(iter.is_empty());
        }
    }

    #[test]
    fn set_value_accepts_any_integer_variant() {
        let mut f = IntValue::<u16>::new(Endianness::Big);
        assert!(f.set_value(&Value::U8(9)));
        assert_eq!(f.get(), 9);
        assert!(f.set_value(&Value::I64(300)));
        assert_eq!(f.value(), Value::U16(300));
        assert!(!f.set_value(&Value::String("x".into())));
    }
}

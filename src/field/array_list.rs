//! Homogeneous list of fields.

use super::{max_uint, read_uint, write_uint, Endianness, Field};
use crate::error::ErrorStatus;
use crate::value::Value;
use std::any::Any;

/// How an [`ArrayList`] knows its element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPolicy {
    /// Element count prefix of `width` bytes.
    Prefixed { width: usize, endianness: Endianness },
    /// Elements until the available data is exhausted.
    Remaining,
}

/// List of elements cloned from a prototype field.
#[derive(Debug, Clone)]
pub struct ArrayList<F: Field + Clone> {
    elements: Vec<F>,
    prototype: F,
    count: CountPolicy,
}

impl<F: Field + Clone + 'static> ArrayList<F> {
    pub fn new(prototype: F, count: CountPolicy) -> Self {
        if let CountPolicy::Prefixed { width, .. } = count {
            assert!((1..=8).contains(&width), "count prefix width {} out of range 1..=8", width);
        }
        ArrayList { elements: Vec::new(), prototype, count }
    }

    pub fn elements(&self) -> &[F] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut Vec<F> {
        &mut self.elements
    }

    /// Append a fresh element (a clone of the prototype) and return it for editing.
    pub fn push_default(&mut self) -> &mut F {
        self.elements.push(self.prototype.clone());
        let last = self.elements.len() - 1;
        &mut self.elements[last]
    }

    fn prefix_width(&self) -> usize {
        match self.count {
            CountPolicy::Prefixed { width, .. } => width,
            CountPolicy::Remaining => 0,
        }
    }

    fn read_element(&self, iter: &mut &[u8], remaining: &mut usize) -> Result<F, ErrorStatus> {
        let mut elem = self.prototype.clone();
        let before = iter.len();
        let es = elem.read(iter, *remaining);
        if es != ErrorStatus::Success {
            return Err(es);
        }
        let consumed = before - iter.len();
        if consumed == 0 {
            // A zero-length element would never exhaust the input.
            return Err(ErrorStatus::ProtocolError);
        }
        *remaining -= consumed;
        Ok(elem)
    }
}

impl<F: Field + Clone + 'static> Field for ArrayList<F> {
    fn length(&self) -> usize {
        self.prefix_width() + self.elements.iter().map(Field::length).sum::<usize>()
    }

    fn min_length(&self) -> usize {
        self.prefix_width()
    }

    fn max_length(&self) -> usize {
        usize::MAX
    }

    fn valid(&self) -> bool {
        let count_fits = match self.count {
            CountPolicy::Prefixed { width, .. } => self.elements.len() as u64 <= max_uint(width),
            CountPolicy::Remaining => true,
        };
        count_fits && self.elements.iter().all(Field::valid)
    }

    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus {
        let mut remaining = len;
        let mut elements = Vec::new();
        match self.count {
            CountPolicy::Prefixed { width, endianness } => {
                if len < width {
                    return ErrorStatus::NotEnoughData;
                }
                let count = match read_uint(iter, width, endianness) {
                    Some(c) => c,
                    None => return ErrorStatus::NotEnoughData,
                };
                remaining -= width;
                for _ in 0..count {
                    match self.read_element(iter, &mut remaining) {
                        Ok(elem) => elements.push(elem),
                        Err(es) => return es,
                    }
                }
            }
            CountPolicy::Remaining => {
                while remaining > 0 {
                    match self.read_element(iter, &mut remaining) {
                        Ok(elem) => elements.push(elem),
                        Err(es) => return es,
                    }
                }
            }
        }
        self.elements = elements;
        ErrorStatus::Success
    }

    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        if len < self.length() {
            return ErrorStatus::BufferOverflow;
        }
        let start = out.len();
        if let CountPolicy::Prefixed { width, endianness } = self.count {
            if self.elements.len() as u64 > max_uint(width) {
                return ErrorStatus::InvalidMsgData;
            }
            write_uint(out, self.elements.len() as u64, width, endianness);
        }
        for elem in &self.elements {
            let es = elem.write(out, len - (out.len() - start));
            if es != ErrorStatus::Success {
                return es;
            }
        }
        ErrorStatus::Success
    }

    fn value(&self) -> Value {
        Value::List(self.elements.iter().map(Field::value).collect())
    }

    fn set_value(&mut self, value: &Value) -> bool {
        let items = match value.as_list() {
            Some(items) => items,
            None => return false,
        };
        let mut elements = Vec::with_capacity(items.len());
        for item in items {
            let mut elem = self.prototype.clone();
            if !elem.set_value(item) {
                return false;
            }
            elements.push(elem);
        }
        self.elements = elements;
        true
    }

    fn refresh(&mut self) -> bool {
        let mut changed = false;
        for elem in &mut self.elements {
            changed |= elem.refresh();
        }
        changed
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
    use crate::field::IntValue;

    fn u16_list(count: CountPolicy) -> ArrayList<IntValue<u16>> {
        ArrayList::new(IntValue::new(Endianness::Big), count)
    }

    #[test]
    fn count_prefixed_read() {
        let mut list = u16_list(CountPolicy::Prefixed { width: 1, endianness: Endianness::Big });
        let data = [2u8, 0x00, 0x01, 0x00, 0x02, 0xff];
        let mut iter: &[u8] = &data;
        assert_eq!(list.read(&mut iter, data.len()), ErrorStatus::Success);
        assert_eq!(list.value(), Value::List(vec![Value::U16(1), Value::U16(2)]));
        assert_eq!(list.length(), 5);
        assert_eq!(iter, &[0xff]);
    }

    #[test]
    fn count_prefixed_short_is_not_enough_data() {
        let mut list = u16_list(CountPolicy::Prefixed { width: 1, endianness: Endianness::Big });
        let data = [2u8, 0x00, 0x01, 0x00];
        let mut iter: &[u8] = &data;
        assert_eq!(list.read(&mut iter, data.len()), ErrorStatus::NotEnoughData);
        assert!(list.elements().is_empty());
    }

    #[test]
    fn remaining_consumes_everything() {
        let mut list = u16_list(CountPolicy::Remaining);
        let data = [0u8, 7, 0, 8, 0, 9];
        let mut iter: &[u8] = &data;
        assert_eq!(list.read(&mut iter, data.len()), ErrorStatus::Success);
        assert_eq!(list.elements().len(), 3);
        assert!(iter.is_empty());
    }

    #[test]
    fn write_from_set_value() {
        let mut list = u16_list(CountPolicy::Prefixed { width: 2, endianness: Endianness::Little });
        assert!(list.set_value(&Value::List(vec![Value::U16(0x0102), Value::U16(0x0304)])));
        list.push_default().set(5);
        let mut out = Vec::new();
        assert_eq!(list.write(&mut out, 64), ErrorStatus::Success);
        assert_eq!(out, vec![3, 0, 0x01, 0x02, 0x03, 0x04, 0x00, 0x05]);
    }
}

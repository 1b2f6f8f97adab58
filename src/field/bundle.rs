//! Ordered record of named fields.

use super::Field;
use crate::error::ErrorStatus;
use crate::value::Value;
use std::any::{Any, TypeId};

#[derive(Debug, Clone)]
struct Member {
    name: String,
    field: Box<dyn Field>,
}

/// Ordered sequence of named member fields, read and written in definition order.
///
/// Each member is handed the length still available after the members before it, so a
/// trailing [`Optional`](super::Optional) in `Tentative` mode resolves against exactly
/// the bytes the bundle was given.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    members: Vec<Member>,
}

impl Bundle {
    pub fn new() -> Self {
        Bundle::default()
    }

    /// Append a member (builder form).
    pub fn with(mut self, name: impl Into<String>, field: impl Field + 'static) -> Self {
        self.push(name, field);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, field: impl Field + 'static) {
        self.members.push(Member { name: name.into(), field: Box::new(field) });
    }

    pub fn push_boxed(&mut self, name: impl Into<String>, field: Box<dyn Field>) {
        self.members.push(Member { name: name.into(), field });
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Field> {
        self.members.iter().find(|m| m.name == name).map(|m| m.field.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn Field> {
        match self.members.iter_mut().find(|m| m.name == name) {
            Some(m) => Some(m.field.as_mut()),
            None => None,
        }
    }

    /// Typed access to a member.
    pub fn get_as<T: Field + 'static>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(|f| f.as_any().downcast_ref::<T>())
    }

    pub fn get_as_mut<T: Field + 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.get_mut(name).and_then(|f| f.as_any_mut().downcast_mut::<T>())
    }

    /// Members in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Field)> {
        self.members.iter().map(|m| (m.name.as_str(), m.field.as_ref()))
    }

    /// True if `other` has the same member names and member types, in the same order.
    pub fn same_layout(&self, other: &Bundle) -> bool {
        self.members.len() == other.members.len()
            && self.members.iter().zip(&other.members).all(|(a, b)| {
                a.name == b.name && member_type(a.field.as_ref()) == member_type(b.field.as_ref())
            })
    }
}

fn member_type(field: &dyn Field) -> TypeId {
    field.as_any().type_id()
}

impl Field for Bundle {
    fn length(&self) -> usize {
        self.members.iter().map(|m| m.field.length()).sum()
    }

    fn min_length(&self) -> usize {
        self.members.iter().map(|m| m.field.min_length()).sum()
    }

    fn max_length(&self) -> usize {
        self.members
            .iter()
            .fold(0usize, |acc, m| acc.saturating_add(m.field.max_length()))
    }

    fn valid(&self) -> bool {
        self.members.iter().all(|m| m.field.valid())
    }

    fn read(&mut self, iter: &mut &[u8], len: usize) -> ErrorStatus {
        let mut remaining = len;
        for m in &mut self.members {
            let before = iter.len();
            let es = m.field.read(iter, remaining);
            if es != ErrorStatus::Success {
                return es;
            }
            remaining -= before - iter.len();
        }
        ErrorStatus::Success
    }

    fn write(&self, out: &mut Vec<u8>, len: usize) -> ErrorStatus {
        let start = out.len();
        for m in &self.members {
            let written = out.len() - start;
            let es = m.field.write(out, len - written);
            if es != ErrorStatus::Success {
                return es;
            }
        }
        ErrorStatus::Success
    }

    fn value(&self) -> Value {
        Value::Struct(
            self.members
                .iter()
                .map(|m| (m.name.clone(), m.field.value()))
                .collect(),
        )
    }

    fn set_value(&mut self, value: &Value) -> bool {
        let map = match value.as_struct() {
            Some(m) => m,
            None => return false,
        };
        let mut ok = true;
        for (name, v) in map {
            match self.get_mut(name) {
                Some(f) => ok &= f.set_value(v),
                None => ok = false,
            }
        }
        ok
    }

    fn refresh(&mut self) -> bool {
        let mut changed = false;
        for m in &mut self.members {
            changed |= m.field.refresh();
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

//! Defines the stores a dynamic message keeps its decoded fields in.

use crate::{Mergable, internal::Sealed};
use crate::io::{write, FieldNumber, LengthBuilder, CodedWriter};
use crate::value::{MapKey, Value};
use hashbrown::{HashMap, hash_map};

pub mod unknown_fields;

/// A set of fields that knows how to write itself without its message's descriptor.
/// This unifies unknown fields and extension fields.
pub trait FieldSet: Sealed {
    /// Calculates the size of all the fields in this set
    fn calculate_size(&self, builder: LengthBuilder) -> Option<LengthBuilder>;
    /// Writes the fields in this set to the writer
    fn write_to(&self, output: &mut CodedWriter) -> write::Result;
    /// Checks that all required fields of messages in the set are present
    fn check_initialized(&self) -> write::Result;
}

/// The decoded value of a single field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// The value of a singular field. Its presence in a store is the field's presence.
    Singular(Value),
    /// The values of a repeated field in the order they were read or pushed
    Repeated(Vec<Value>),
    /// The entries of a map field
    Map(HashMap<MapKey, Value>),
}

impl FieldValue {
    /// Returns whether a repeated or map value holds no elements. Singular values are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Singular(_) => false,
            FieldValue::Repeated(v) => v.is_empty(),
            FieldValue::Map(m) => m.is_empty(),
        }
    }
    /// Returns the singular value held, if this is a singular field
    pub fn as_singular(&self) -> Option<&Value> {
        match self {
            FieldValue::Singular(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the values held, if this is a repeated field
    pub fn as_repeated(&self) -> Option<&[Value]> {
        match self {
            FieldValue::Repeated(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the entries held, if this is a map field
    pub fn as_map(&self) -> Option<&HashMap<MapKey, Value>> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl Mergable for Value {
    fn merge(&mut self, other: &Self) {
        match (self, other) {
            (Value::Message(a), Value::Message(b)) => a.merge(b),
            (this, other) => *this = other.clone(),
        }
    }
}

impl Mergable for FieldValue {
    fn merge(&mut self, other: &Self) {
        match (self, other) {
            (FieldValue::Singular(a), FieldValue::Singular(b)) => a.merge(b),
            (FieldValue::Repeated(a), FieldValue::Repeated(b)) => a.extend(b.iter().cloned()),
            (FieldValue::Map(a), FieldValue::Map(b)) => {
                a.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())))
            },
            (this, other) => *this = other.clone(),
        }
    }
}

/// The known fields of a message by field number. A field absent from the store is not set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldStore {
    inner: HashMap<FieldNumber, FieldValue>,
}

impl Sealed for FieldStore { }
impl Mergable for FieldStore {
    fn merge(&mut self, other: &Self) {
        for (num, value) in &other.inner {
            match self.inner.entry(*num) {
                hash_map::Entry::Occupied(mut e) => e.get_mut().merge(value),
                hash_map::Entry::Vacant(e) => { e.insert(value.clone()); },
            }
        }
    }
}

impl FieldStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Default::default()
    }
    /// Gets the value of a field
    #[inline]
    pub fn get(&self, num: FieldNumber) -> Option<&FieldValue> {
        self.inner.get(&num)
    }
    /// Gets a unique reference to the value of a field
    #[inline]
    pub fn get_mut(&mut self, num: FieldNumber) -> Option<&mut FieldValue> {
        self.inner.get_mut(&num)
    }
    /// Gets the entry for a field for in place insertion
    #[inline]
    pub fn entry(&mut self, num: FieldNumber) -> hash_map::Entry<'_, FieldNumber, FieldValue, hashbrown::hash_map::DefaultHashBuilder> {
        self.inner.entry(num)
    }
    /// Sets the value of a field, returning the previous value
    #[inline]
    pub fn insert(&mut self, num: FieldNumber, value: FieldValue) -> Option<FieldValue> {
        self.inner.insert(num, value)
    }
    /// Removes a field from the store
    #[inline]
    pub fn remove(&mut self, num: FieldNumber) -> Option<FieldValue> {
        self.inner.remove(&num)
    }
    /// Returns whether the field is present
    #[inline]
    pub fn contains(&self, num: FieldNumber) -> bool {
        self.inner.contains_key(&num)
    }
    /// Returns the number of fields present
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    /// Returns whether no fields are present
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    /// Removes every field
    #[inline]
    pub fn clear(&mut self) {
        self.inner.clear()
    }
    /// Returns an iterator over the fields present, in no particular order
    pub fn iter(&self) -> hash_map::Iter<'_, FieldNumber, FieldValue> {
        self.inner.iter()
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use hashbrown::HashMap;
    use crate::Mergable;
    use crate::io::FieldNumber;
    use crate::value::{MapKey, Value};
    use super::{FieldStore, FieldValue};

    fn num(n: u32) -> FieldNumber {
        FieldNumber::new(n).unwrap()
    }

    #[test]
    fn merge_rules() {
        let mut a = FieldStore::new();
        a.insert(num(1), FieldValue::Singular(Value::I32(5)));
        a.insert(num(2), FieldValue::Repeated(vec![Value::Bool(true)]));
        a.insert(num(3), FieldValue::Map([(MapKey::String("a".into()), Value::U32(1))].into_iter().collect()));

        let mut b = FieldStore::new();
        b.insert(num(1), FieldValue::Singular(Value::I32(7)));
        b.insert(num(2), FieldValue::Repeated(vec![Value::Bool(false)]));
        b.insert(num(3), FieldValue::Map([
            (MapKey::String("a".into()), Value::U32(2)),
            (MapKey::String("b".into()), Value::U32(3)),
        ].into_iter().collect()));
        b.insert(num(4), FieldValue::Singular(Value::F64(1.5)));

        a.merge(&b);

        assert_matches!(a.get(num(1)), Some(FieldValue::Singular(Value::I32(7))));
        assert_eq!(a.get(num(2)).and_then(FieldValue::as_repeated), Some(&[Value::Bool(true), Value::Bool(false)][..]));
        let expected: HashMap<_, _> = [
            (MapKey::String("a".into()), Value::U32(2)),
            (MapKey::String("b".into()), Value::U32(3)),
        ].into_iter().collect();
        assert_eq!(a.get(num(3)).and_then(FieldValue::as_map), Some(&expected));
        assert!(a.contains(num(4)));
        assert_eq!(a.len(), 4);
    }
    #[test]
    fn empty_values() {
        assert!(FieldValue::Repeated(Vec::new()).is_empty());
        assert!(FieldValue::Map(HashMap::new()).is_empty());
        assert!(!FieldValue::Singular(Value::Bool(false)).is_empty());
    }
}

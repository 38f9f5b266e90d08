use std::collections::{BTreeSet, BinaryHeap, HashSet, LinkedList, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

/// View of a member value as the builtin rules see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(&'a str),
    /// Collection with its element count.
    Seq(usize),
    /// Any structured value.
    Object,
}

impl<'a> FieldValue<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Str(_) => "string",
            FieldValue::Seq(_) => "sequence",
            FieldValue::Object => "object",
        }
    }

    /// View of a JSON payload value.
    pub fn from_json(value: &'a Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(flag) => FieldValue::Bool(*flag),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    FieldValue::Int(int as i128)
                } else if let Some(int) = number.as_u64() {
                    FieldValue::Int(int as i128)
                } else {
                    FieldValue::Float(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(text) => FieldValue::Str(text),
            Value::Array(items) => FieldValue::Seq(items.len()),
            Value::Object(_) => FieldValue::Object,
        }
    }
}

/// Conversion of a member value into a [`FieldValue`].
///
/// Generated routines implement this for every validatable type so nested
/// values can carry `required` checks.
pub trait AsFieldValue {
    fn field_value(&self) -> FieldValue<'_>;
}

macro_rules! int_field_value {
    ($($ty:ty),*) => {
        $(impl AsFieldValue for $ty {
            fn field_value(&self) -> FieldValue<'_> {
                FieldValue::Int(*self as i128)
            }
        })*
    };
}

int_field_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl AsFieldValue for f32 {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::Float(*self as f64)
    }
}

impl AsFieldValue for f64 {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::Float(*self)
    }
}

impl AsFieldValue for bool {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::Bool(*self)
    }
}

impl AsFieldValue for String {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::Str(self)
    }
}

impl AsFieldValue for str {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::Str(self)
    }
}

impl AsFieldValue for Value {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::from_json(self)
    }
}

impl<T: AsFieldValue> AsFieldValue for Option<T> {
    fn field_value(&self) -> FieldValue<'_> {
        match self {
            Some(value) => value.field_value(),
            None => FieldValue::Null,
        }
    }
}

impl<T: AsFieldValue + ?Sized> AsFieldValue for &T {
    fn field_value(&self) -> FieldValue<'_> {
        (**self).field_value()
    }
}

macro_rules! pointer_field_value {
    ($($ptr:ident),*) => {
        $(impl<T: AsFieldValue + ?Sized> AsFieldValue for $ptr<T> {
            fn field_value(&self) -> FieldValue<'_> {
                (**self).field_value()
            }
        })*
    };
}

pointer_field_value!(Box, Arc, Rc);

impl<T> AsFieldValue for [T] {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::Seq(self.len())
    }
}

impl<T, const N: usize> AsFieldValue for [T; N] {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::Seq(N)
    }
}

macro_rules! seq_field_value {
    ($($seq:ident),*) => {
        $(impl<T> AsFieldValue for $seq<T> {
            fn field_value(&self) -> FieldValue<'_> {
                FieldValue::Seq(self.len())
            }
        })*
    };
}

seq_field_value!(Vec, VecDeque, LinkedList, BTreeSet, BinaryHeap);

impl<T, S> AsFieldValue for HashSet<T, S> {
    fn field_value(&self) -> FieldValue<'_> {
        FieldValue::Seq(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_and_pointers_are_transparent() {
        assert_eq!(Some(3_i32).field_value(), FieldValue::Int(3));
        assert_eq!(None::<String>.field_value(), FieldValue::Null);
        assert_eq!(Box::new("abc".to_string()).field_value(), FieldValue::Str("abc"));
        assert_eq!(vec![1, 2].field_value(), FieldValue::Seq(2));
    }

    #[test]
    fn json_numbers_keep_integers() {
        let value = serde_json::json!({"a": 5, "b": 1.5, "c": u64::MAX});
        assert_eq!(FieldValue::from_json(&value["a"]), FieldValue::Int(5));
        assert_eq!(FieldValue::from_json(&value["b"]), FieldValue::Float(1.5));
        assert_eq!(
            FieldValue::from_json(&value["c"]),
            FieldValue::Int(u64::MAX as i128)
        );
    }
}

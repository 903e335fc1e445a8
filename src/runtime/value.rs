//! Representation of template values
use core::fmt;
use std::rc::Rc;

pub type Integer = i64;

// Type that stores all possible values!
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum Value {
    // The only falsy value, and what unbound names evaluate to
    #[default]
    Nil,
    Integer(Integer),
    // Shared so that loop variables and lookups don't copy whole sequences
    Array(Rc<[Value]>),
    // Only enters a program through render variables
    Text(Rc<str>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Integer(_) => "integer",
            Value::Array(_) => "array",
            Value::Text(_) => "text",
        }
    }

    pub fn as_integer(&self) -> Option<Integer> {
        match self {
            Self::Integer(int) => Some(*int),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// The text a value prints as
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! from_integer {
    ($($ty:ty)*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Integer(Integer::from(value))
                }
            }
        )*
    };
}

from_integer!(i8 i16 i32 i64 u8 u16 u32);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(Rc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(Rc::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::Array(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::Value;
    use assert2::check;

    #[test]
    fn display() {
        check!(Value::Nil.to_string() == "");
        check!(Value::from(-42i64).to_string() == "-42");
        check!(Value::from("hi there").to_string() == "hi there");
        check!(Value::from_iter([1i64, 2, 3]).to_string() == "[1, 2, 3]");
        check!(Value::from(Vec::<Value>::new()).to_string() == "[]");
        let nested: Value = [Value::Integer(1), Value::Nil, Value::from_iter(["a", "b"])]
            .into_iter()
            .collect();
        check!(nested.to_string() == "[1, , [a, b]]");
    }

    #[test]
    fn only_nil_is_falsy() {
        check!(!Value::Nil.is_truthy());
        check!(Value::from(0i64).is_truthy());
        check!(Value::from("").is_truthy());
        check!(Value::from(Vec::<Value>::new()).is_truthy());
    }

    #[test]
    fn conversions() {
        check!(Value::from(None::<i32>) == Value::Nil);
        check!(Value::from(Some(7u8)).as_integer() == Some(7));
        let array = Value::from_iter([4i64, 5]);
        let expected = [Value::Integer(4), Value::Integer(5)];
        check!(array.as_array() == Some(expected.as_slice()));
        check!(Value::from("x").as_array() == None);
    }
}

//! Leaf values and the leaf-type constraint carried by typed trees.

use std::fmt;

use serde_json::{Number, Value};

use crate::errors::{TreeError, TreeResult};

/// Opaque leaf value stored in a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Type constraint enforced on every scalar written below a typed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafType {
    Null,
    Bool,
    Int,
    Float,
    /// Satisfied by both integers and floats
    Number,
    Str,
}

impl LeafType {
    /// Whether a scalar of type `found` may be stored under this constraint.
    pub fn accepts(self, found: LeafType) -> bool {
        self == found || (self == LeafType::Number && matches!(found, LeafType::Int | LeafType::Float))
    }

    pub fn name(self) -> &'static str {
        match self {
            LeafType::Null => "null",
            LeafType::Bool => "bool",
            LeafType::Int => "int",
            LeafType::Float => "float",
            LeafType::Number => "number",
            LeafType::Str => "str",
        }
    }
}

impl fmt::Display for LeafType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Scalar {
    pub fn leaf_type(&self) -> LeafType {
        match self {
            Scalar::Null => LeafType::Null,
            Scalar::Bool(_) => LeafType::Bool,
            Scalar::Int(_) => LeafType::Int,
            Scalar::Float(_) => LeafType::Float,
            Scalar::Str(_) => LeafType::Str,
        }
    }

    /// Fails with `TypeConstraintViolation` if the constraint rejects this scalar.
    pub fn check(&self, constraint: Option<LeafType>) -> TreeResult<()> {
        match constraint {
            Some(expected) if !expected.accepts(self.leaf_type()) => {
                Err(TreeError::TypeConstraintViolation {
                    expected,
                    found: self.leaf_type(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Converts a plain non-container value; `None` for objects and arrays.
    ///
    /// Unsigned integers beyond `i64::MAX` are stored as floats.
    pub fn from_plain(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Non-finite floats have no JSON form and become `null`.
    pub fn to_plain(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::Number((*i).into()),
            Scalar::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Scalar::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value.into())
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    f32 => Float,
    String => Str,
    &str => Str,
}

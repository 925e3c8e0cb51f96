use std::hash::{Hash, Hasher};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use crate::dtype::{DType, DTypeOfPrimitive};

/// A literal value bound to a socket instead of a symbolic op.
///
/// Floats compare and hash by bit pattern so that constants can be members of
/// an op set. `0.0` and `-0.0` are therefore distinct constants, and a NaN equals
/// itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConstantValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Array(ArrayD<f64>),
}

impl ConstantValue {
    pub fn dtype(&self) -> DType {
        match self {
            ConstantValue::Bool(_) => bool::DTYPE,
            ConstantValue::Int(_) => i64::DTYPE,
            ConstantValue::Float(_) | ConstantValue::Array(_) => f64::DTYPE,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            ConstantValue::Array(a) => a.shape().to_vec(),
            _ => vec![],
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstantValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ConstantValue::Int(i) => Some(*i as f64),
            ConstantValue::Float(f) => Some(*f),
            ConstantValue::Array(_) => None,
        }
    }
}

impl PartialEq for ConstantValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstantValue::Bool(a), ConstantValue::Bool(b)) => a == b,
            (ConstantValue::Int(a), ConstantValue::Int(b)) => a == b,
            (ConstantValue::Float(a), ConstantValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstantValue::Array(a), ConstantValue::Array(b)) => {
                a.shape() == b.shape()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

impl Eq for ConstantValue {}

impl Hash for ConstantValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ConstantValue::Bool(b) => b.hash(state),
            ConstantValue::Int(i) => i.hash(state),
            ConstantValue::Float(f) => f.to_bits().hash(state),
            ConstantValue::Array(a) => {
                a.shape().hash(state);
                for x in a.iter() {
                    x.to_bits().hash(state);
                }
            }
        }
    }
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstantValue::Bool(b) => write!(f, "{b}"),
            ConstantValue::Int(i) => write!(f, "{i}"),
            ConstantValue::Float(x) => write!(f, "{x:?}"),
            ConstantValue::Array(a) => write!(f, "array{:?}", a.shape()),
        }
    }
}

impl From<bool> for ConstantValue {
    fn from(value: bool) -> Self {
        ConstantValue::Bool(value)
    }
}

impl From<i64> for ConstantValue {
    fn from(value: i64) -> Self {
        ConstantValue::Int(value)
    }
}

impl From<f64> for ConstantValue {
    fn from(value: f64) -> Self {
        ConstantValue::Float(value)
    }
}

impl From<ArrayD<f64>> for ConstantValue {
    fn from(value: ArrayD<f64>) -> Self {
        ConstantValue::Array(value)
    }
}

use std::str::FromStr;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

#[derive(Debug, thiserror::Error)]
pub enum DTypeError {
    #[error("Unknown dtype name \"{0}\"")]
    UnknownDTypeName(String),
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Serialize, Deserialize, strum_macros::EnumIter)]
pub enum DType {
    F64,
    F32,
    I64,
    I32,
    U8,
    BOOL
}

impl DType {
    pub fn size(&self) -> usize {
        match self {
            DType::F64 => 8,
            DType::F32 => 4,
            DType::I64 => 8,
            DType::I32 => 4,
            DType::U8 => 1,
            DType::BOOL => 1
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F64 | DType::F32)
    }
}

/// Accepts the short names used in space specs ("float", "int", "bool") as well
/// as the explicit width names printed by `Display`.
impl FromStr for DType {
    type Err = DTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "float" | "f32" => DType::F32,
            "double" | "f64" => DType::F64,
            "int" | "i32" => DType::I32,
            "long" | "i64" => DType::I64,
            "u8" => DType::U8,
            _ => DType::iter()
                .find(|d| d.to_string().eq_ignore_ascii_case(s))
                .ok_or_else(|| DTypeError::UnknownDTypeName(s.to_string()))?
        })
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::F64 => write!(f, "Float64"),
            DType::F32 => write!(f, "Float32"),
            DType::I64 => write!(f, "Int64"),
            DType::I32 => write!(f, "Int32"),
            DType::U8 => write!(f, "UInt8"),
            DType::BOOL => write!(f, "Bool")
        }
    }
}

pub trait DTypeOfPrimitive {
    const DTYPE: DType;
}

impl DTypeOfPrimitive for f64 { const DTYPE: DType = DType::F64; }
impl DTypeOfPrimitive for f32 { const DTYPE: DType = DType::F32; }
impl DTypeOfPrimitive for i64 { const DTYPE: DType = DType::I64; }
impl DTypeOfPrimitive for i32 { const DTYPE: DType = DType::I32; }
impl DTypeOfPrimitive for u8 { const DTYPE: DType = DType::U8; }
impl DTypeOfPrimitive for bool { const DTYPE: DType = DType::BOOL; }

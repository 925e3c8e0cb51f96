//! Conversion between nested container ops and their flat, path-keyed form.
//!
//! Keys are built from the traversal path: a `Dict` member `key` contributes
//! `/key`, a `Tuple` member at index `i` contributes `/_T<i>_`. Dict members are
//! visited in lexicographic order, so two structurally identical containers always
//! produce the same key sequence.

use std::collections::BTreeMap;
use crate::ops::{DataOp, FlattenedDataOp};

pub const FLAT_TUPLE_OPEN: &str = "_T";
pub const FLAT_TUPLE_CLOSE: &str = "_";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlattenError {
    #[error("Flattened ops have a key mismatch ({key} vs {other_key})")]
    KeyMismatch { key: String, other_key: String },
    #[error("Invalid flat key \"{0}\"")]
    InvalidKey(String),
    #[error("Flat key \"{0}\" conflicts with another entry")]
    ConflictingKey(String),
    #[error("Tuple at \"{0}\" does not have contiguous indices")]
    NonContiguousTuple(String),
    #[error("Dict key \"{0}\" is reserved for flat paths")]
    ReservedKey(String),
}

pub(crate) fn dict_member_key(prefix: &str, key: &str) -> String {
    format!("{prefix}/{key}")
}

pub(crate) fn tuple_member_key(prefix: &str, index: usize) -> String {
    format!("{prefix}/{FLAT_TUPLE_OPEN}{index}{FLAT_TUPLE_CLOSE}")
}

/// Parses a `_T<n>_` path segment.
pub(crate) fn parse_tuple_segment(segment: &str) -> Option<usize> {
    let digits = segment.strip_prefix(FLAT_TUPLE_OPEN)?.strip_suffix(FLAT_TUPLE_CLOSE)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// True if `key` could not be used as a dict member without breaking unflattening.
pub(crate) fn is_reserved_dict_key(key: &str) -> bool {
    key.is_empty() || key.contains('/') || contains_tuple_marker(key)
}

fn contains_tuple_marker(key: &str) -> bool {
    key.match_indices(FLAT_TUPLE_OPEN).any(|(start, _)| {
        let rest = &key[start + FLAT_TUPLE_OPEN.len()..];
        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        digits > 0 && rest[digits..].starts_with(FLAT_TUPLE_CLOSE)
    })
}

/// Lazy depth-first traversal yielding `(path_key, primitive)` pairs.
#[derive(Clone)]
pub struct FlattenIter<'a> {
    stack: Vec<(String, &'a DataOp)>,
}

impl<'a> FlattenIter<'a> {
    pub fn new(op: &'a DataOp, key_prefix: &str) -> Self {
        Self {
            stack: vec![(key_prefix.to_string(), op)],
        }
    }
}

impl<'a> Iterator for FlattenIter<'a> {
    type Item = (String, &'a DataOp);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, op) = self.stack.pop()?;
            match op {
                DataOp::Dict(items) if !items.is_empty() => {
                    for (member, value) in items.iter().rev() {
                        self.stack.push((dict_member_key(&key, member), value));
                    }
                }
                DataOp::Tuple(items) if !items.is_empty() => {
                    for (i, value) in items.iter().enumerate().rev() {
                        self.stack.push((tuple_member_key(&key, i), value));
                    }
                }
                DataOp::Flattened(flat) if !flat.is_empty() => {
                    let members: Vec<_> = flat.iter().collect();
                    for (member, value) in members.into_iter().rev() {
                        self.stack.push((format!("{key}{member}"), value));
                    }
                }
                // Primitives and empty containers end the recursion.
                _ => return Some((key, op)),
            }
        }
    }
}

/// Flattens `op` with an empty key prefix. A primitive yields a single entry under `""`.
pub fn flatten_op(op: &DataOp) -> FlattenedDataOp {
    FlattenIter::new(op, "")
        .map(|(key, value)| (key, value.clone()))
        .collect()
}

enum Nest {
    Empty,
    Leaf(DataOp),
    Dict(BTreeMap<String, Nest>),
    Tuple(BTreeMap<usize, Nest>),
}

impl Nest {
    fn into_op(self, path: &str) -> Result<DataOp, FlattenError> {
        Ok(match self {
            Nest::Empty => DataOp::Dict(BTreeMap::new()),
            Nest::Leaf(op) => op,
            Nest::Dict(items) => {
                let mut ret = BTreeMap::new();
                for (key, value) in items {
                    let child = value.into_op(&dict_member_key(path, &key))?;
                    ret.insert(key, child);
                }
                DataOp::Dict(ret)
            }
            Nest::Tuple(items) => {
                let mut ret = Vec::with_capacity(items.len());
                for (expected, (index, value)) in items.into_iter().enumerate() {
                    if index != expected {
                        return Err(FlattenError::NonContiguousTuple(path.to_string()));
                    }
                    ret.push(value.into_op(&tuple_member_key(path, index))?);
                }
                DataOp::Tuple(ret)
            }
        })
    }
}

/// Rebuilds the nested structure encoded in the keys of `flat`.
///
/// A single entry under `""` unflattens to its value; an empty mapping to an
/// empty `Dict`.
pub fn unflatten_op(flat: &FlattenedDataOp) -> Result<DataOp, FlattenError> {
    if flat.len() == 1 {
        if let Some(op) = flat.get("") {
            return Ok(op.clone());
        }
    }

    let mut root = Nest::Empty;
    for (key, value) in flat.iter() {
        let path = key
            .strip_prefix('/')
            .ok_or_else(|| FlattenError::InvalidKey(key.to_string()))?;
        let mut node = &mut root;
        for segment in path.split('/') {
            if segment.is_empty() {
                return Err(FlattenError::InvalidKey(key.to_string()));
            }
            node = match parse_tuple_segment(segment) {
                Some(index) => {
                    if matches!(node, Nest::Empty) {
                        *node = Nest::Tuple(BTreeMap::new());
                    }
                    match node {
                        Nest::Tuple(items) => items.entry(index).or_insert(Nest::Empty),
                        _ => return Err(FlattenError::ConflictingKey(key.to_string())),
                    }
                }
                None => {
                    if matches!(node, Nest::Empty) {
                        *node = Nest::Dict(BTreeMap::new());
                    }
                    match node {
                        Nest::Dict(items) => items.entry(segment.to_string()).or_insert(Nest::Empty),
                        _ => return Err(FlattenError::ConflictingKey(key.to_string())),
                    }
                }
            };
        }
        if !matches!(node, Nest::Empty) {
            return Err(FlattenError::ConflictingKey(key.to_string()));
        }
        *node = Nest::Leaf(value.clone());
    }
    root.into_op("")
}

/// One call produced by splitting flattened arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCall {
    pub key: String,
    pub args: Vec<DataOp>,
}

/// Splits the `Flattened` entries of `args` into one parameter list per flat key.
///
/// All flattened arguments must share the same key set. Non-flattened arguments
/// are repeated unchanged in every call. Returns `None` if no argument is
/// flattened.
pub fn split_flattened_args(args: &[DataOp]) -> Result<Option<Vec<SplitCall>>, FlattenError> {
    let flattened: Vec<&FlattenedDataOp> = args.iter().filter_map(|a| a.as_flattened()).collect();
    let Some(guide) = flattened.first() else {
        return Ok(None);
    };

    for other in &flattened[1..] {
        let missing = guide.keys().find(|k| !other.contains_key(k));
        let extra = other.keys().find(|k| !guide.contains_key(k));
        if missing.is_some() || extra.is_some() {
            return Err(FlattenError::KeyMismatch {
                key: missing.unwrap_or("<none>").to_string(),
                other_key: extra.unwrap_or("<none>").to_string(),
            });
        }
    }

    let mut calls = Vec::with_capacity(guide.len());
    for key in guide.keys() {
        let mut call_args = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                DataOp::Flattened(flat) => {
                    let value = flat.get(key).ok_or_else(|| FlattenError::KeyMismatch {
                        key: key.to_string(),
                        other_key: "<none>".to_string(),
                    })?;
                    call_args.push(value.clone());
                }
                other => call_args.push(other.clone()),
            }
        }
        calls.push(SplitCall {
            key: key.to_string(),
            args: call_args,
        });
    }
    Ok(Some(calls))
}

pub mod constant;
pub mod flatten;

use std::collections::{BTreeMap, HashSet};
use serde::{Deserialize, Serialize};

pub use constant::ConstantValue;
pub use flatten::{flatten_op, unflatten_op, FlattenError, FlattenIter};

/// Handle to a node recorded by a graph executor.
#[derive(Debug, Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct OpHandle {
    pub(crate) inner: usize,
}

impl OpHandle {
    pub fn index(&self) -> usize {
        self.inner
    }
}

impl std::fmt::Display for OpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.inner)
    }
}

/// A value flowing through a socket.
///
/// `Dict` and `Tuple` are nested containers, `Flattened` is the path-keyed form
/// produced by [`flatten_op`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataOp {
    Symbolic(OpHandle),
    Constant(ConstantValue),
    Dict(BTreeMap<String, DataOp>),
    Tuple(Vec<DataOp>),
    Flattened(FlattenedDataOp),
}

impl DataOp {
    /// Keys holding `/` or a `_T<n>_` marker do not survive flattening; graph
    /// functions that return such a dict fail with [`FlattenError::ReservedKey`].
    pub fn dict<K: Into<String>>(items: impl IntoIterator<Item = (K, DataOp)>) -> Self {
        DataOp::Dict(items.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// First dict key, at any depth, that would be read back as part of a flat path.
    pub fn find_reserved_key(&self) -> Option<&str> {
        match self {
            DataOp::Dict(items) => items.iter().find_map(|(key, value)| {
                if flatten::is_reserved_dict_key(key) {
                    Some(key.as_str())
                } else {
                    value.find_reserved_key()
                }
            }),
            DataOp::Tuple(items) => items.iter().find_map(DataOp::find_reserved_key),
            DataOp::Flattened(flat) => flat.values().find_map(DataOp::find_reserved_key),
            DataOp::Symbolic(_) | DataOp::Constant(_) => None,
        }
    }

    pub fn tuple(items: impl IntoIterator<Item = DataOp>) -> Self {
        DataOp::Tuple(items.into_iter().collect())
    }

    pub fn constant(value: impl Into<ConstantValue>) -> Self {
        DataOp::Constant(value.into())
    }

    pub fn is_container(&self) -> bool {
        matches!(self, DataOp::Dict(_) | DataOp::Tuple(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, DataOp::Constant(_))
    }

    pub fn as_symbolic(&self) -> Option<OpHandle> {
        match self {
            DataOp::Symbolic(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&ConstantValue> {
        match self {
            DataOp::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_flattened(&self) -> Option<&FlattenedDataOp> {
        match self {
            DataOp::Flattened(flat) => Some(flat),
            _ => None,
        }
    }

    /// All symbolic handles reachable from this op, in traversal order.
    pub fn symbolic_handles(&self) -> Vec<OpHandle> {
        let mut ret = vec![];
        self.collect_handles(&mut ret);
        ret
    }

    fn collect_handles(&self, ret: &mut Vec<OpHandle>) {
        match self {
            DataOp::Symbolic(handle) => ret.push(*handle),
            DataOp::Constant(_) => {}
            DataOp::Dict(items) => items.values().for_each(|v| v.collect_handles(ret)),
            DataOp::Tuple(items) => items.iter().for_each(|v| v.collect_handles(ret)),
            DataOp::Flattened(flat) => flat.values().for_each(|v| v.collect_handles(ret)),
        }
    }
}

impl std::fmt::Display for DataOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataOp::Symbolic(handle) => write!(f, "{handle}"),
            DataOp::Constant(value) => write!(f, "{value}"),
            DataOp::Dict(items) => {
                write!(f, "{{")?;
                for (i, (k, v)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            DataOp::Tuple(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            DataOp::Flattened(flat) => {
                write!(f, "flat{{")?;
                for (i, (k, v)) in flat.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<OpHandle> for DataOp {
    fn from(value: OpHandle) -> Self {
        DataOp::Symbolic(value)
    }
}

impl From<ConstantValue> for DataOp {
    fn from(value: ConstantValue) -> Self {
        DataOp::Constant(value)
    }
}

/// Ordered mapping from auto-generated path keys to primitive ops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlattenedDataOp {
    entries: Vec<(String, DataOp)>,
}

impl FlattenedDataOp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value under `key`; new keys keep insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: DataOp) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&DataOp> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &DataOp> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataOp)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, DataOp)> for FlattenedDataOp {
    fn from_iter<T: IntoIterator<Item = (K, DataOp)>>(iter: T) -> Self {
        let mut ret = Self::new();
        for (k, v) in iter {
            ret.insert(k, v);
        }
        ret
    }
}

impl IntoIterator for FlattenedDataOp {
    type Item = (String, DataOp);
    type IntoIter = std::vec::IntoIter<(String, DataOp)>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Insertion-ordered set of alternative ops.
///
/// Iteration order is the order in which ops first arrived, which fixes the
/// enumeration order of input combinations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OpSet {
    ops: Vec<DataOp>,
    #[serde(skip)]
    index: HashSet<DataOp>,
}

impl OpSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the op was not present yet.
    pub fn insert(&mut self, op: DataOp) -> bool {
        if self.index.contains(&op) {
            return false;
        }
        self.index.insert(op.clone());
        self.ops.push(op);
        true
    }

    /// Inserts all ops and returns the ones that were new, in order.
    pub fn extend_new(&mut self, ops: impl IntoIterator<Item = DataOp>) -> Vec<DataOp> {
        ops.into_iter().filter(|op| self.insert(op.clone())).collect()
    }

    pub fn contains(&self, op: &DataOp) -> bool {
        self.index.contains(op)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataOp> {
        self.ops.iter()
    }

    pub fn as_slice(&self) -> &[DataOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl PartialEq for OpSet {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<'a> IntoIterator for &'a OpSet {
    type Item = &'a DataOp;
    type IntoIter = std::slice::Iter<'a, DataOp>;
    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl FromIterator<DataOp> for OpSet {
    fn from_iter<T: IntoIterator<Item = DataOp>>(iter: T) -> Self {
        let mut ret = Self::new();
        ret.extend_new(iter);
        ret
    }
}

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::dtype::DType;
use crate::executor::{ExecutorError, GraphExecutor};
use crate::ops::flatten::{dict_member_key, is_reserved_dict_key, tuple_member_key};
use crate::ops::{ConstantValue, DataOp};

#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error("Key to Dict space must not be empty or contain '/' or '_T<n>_': \"{0}\"")]
    ReservedKey(String),
}

/// A primitive space: a (possibly batched) tensor of fixed dtype and shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoxSpace {
    pub dtype: DType,
    pub shape: Vec<usize>,
    #[serde(default)]
    pub add_batch_rank: bool,
}

impl BoxSpace {
    pub fn new(dtype: DType, shape: Vec<usize>) -> Self {
        Self {
            dtype,
            shape,
            add_batch_rank: false,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn flat_dim(&self) -> usize {
        self.shape.iter().product()
    }

    /// The shape with a leading `None` batch dimension when the space is batched.
    pub fn get_shape(&self, with_batch_rank: bool) -> Vec<Option<usize>> {
        let mut ret = vec![];
        if with_batch_rank && self.add_batch_rank {
            ret.push(None);
        }
        ret.extend(self.shape.iter().map(|d| Some(*d)));
        ret
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Space {
    Box(BoxSpace),
    Dict(BTreeMap<String, Space>),
    Tuple(Vec<Space>),
}

impl Space {
    pub fn float(shape: Vec<usize>) -> Self {
        Space::Box(BoxSpace::new(DType::F32, shape))
    }

    pub fn int(shape: Vec<usize>) -> Self {
        Space::Box(BoxSpace::new(DType::I64, shape))
    }

    pub fn bool() -> Self {
        Space::Box(BoxSpace::new(DType::BOOL, vec![]))
    }

    pub fn dict<K: Into<String>>(items: impl IntoIterator<Item = (K, Space)>) -> Result<Self, SpaceError> {
        let mut ret = BTreeMap::new();
        for (key, value) in items {
            let key = key.into();
            if is_reserved_dict_key(&key) {
                return Err(SpaceError::ReservedKey(key));
            }
            ret.insert(key, value);
        }
        Ok(Space::Dict(ret))
    }

    pub fn tuple(items: impl IntoIterator<Item = Space>) -> Self {
        Space::Tuple(items.into_iter().collect())
    }

    /// The space of a literal value.
    pub fn from_constant(value: &ConstantValue) -> Self {
        Space::Box(BoxSpace::new(value.dtype(), value.shape()))
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Space::Box(_))
    }

    /// Returns a copy with `add_batch_rank` set on every primitive sub-space.
    pub fn with_batch_rank(&self, add_batch_rank: bool) -> Self {
        match self {
            Space::Box(b) => Space::Box(BoxSpace {
                add_batch_rank,
                ..b.clone()
            }),
            Space::Dict(items) => Space::Dict(
                items
                    .iter()
                    .map(|(k, v)| (k.clone(), v.with_batch_rank(add_batch_rank)))
                    .collect(),
            ),
            Space::Tuple(items) => Space::Tuple(items.iter().map(|v| v.with_batch_rank(add_batch_rank)).collect()),
        }
    }

    /// Flattens this space into its primitive sub-spaces, keyed like flattened ops.
    pub fn flatten(&self) -> Vec<(String, &BoxSpace)> {
        let mut ret = vec![];
        self.flatten_into("", &mut ret);
        ret
    }

    fn flatten_into<'a>(&'a self, scope: &str, ret: &mut Vec<(String, &'a BoxSpace)>) {
        match self {
            Space::Box(b) => ret.push((scope.to_string(), b)),
            Space::Dict(items) => {
                for (key, value) in items {
                    value.flatten_into(&dict_member_key(scope, key), ret);
                }
            }
            Space::Tuple(items) => {
                for (i, value) in items.iter().enumerate() {
                    value.flatten_into(&tuple_member_key(scope, i), ret);
                }
            }
        }
    }

    /// Materializes this space through `executor`: a placeholder (or variable) per
    /// primitive sub-space, nested like the space. Sub-op names are
    /// `name/key` for dict members and `name/i` for tuple members.
    pub fn get_tensor_variable(
        &self,
        executor: &mut dyn GraphExecutor,
        name: &str,
        is_input_feed: bool,
        add_batch_rank: Option<bool>,
    ) -> Result<DataOp, ExecutorError> {
        Ok(match self {
            Space::Box(b) => {
                let batch = add_batch_rank.unwrap_or(b.add_batch_rank);
                DataOp::Symbolic(executor.create_placeholder(name, b, is_input_feed, batch)?)
            }
            Space::Dict(items) => {
                let mut ret = BTreeMap::new();
                for (key, value) in items {
                    let op = value.get_tensor_variable(executor, &format!("{name}/{key}"), is_input_feed, add_batch_rank)?;
                    ret.insert(key.clone(), op);
                }
                DataOp::Dict(ret)
            }
            Space::Tuple(items) => {
                let mut ret = Vec::with_capacity(items.len());
                for (i, value) in items.iter().enumerate() {
                    ret.push(value.get_tensor_variable(executor, &format!("{name}/{i}"), is_input_feed, add_batch_rank)?);
                }
                DataOp::Tuple(ret)
            }
        })
    }
}

impl std::fmt::Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Space::Box(b) => write!(f, "{}{:?}", b.dtype, b.shape),
            Space::Dict(items) => {
                write!(f, "Dict(")?;
                for (i, (k, v)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, ")")
            }
            Space::Tuple(items) => {
                write!(f, "Tuple(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
        }
    }
}

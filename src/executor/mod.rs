pub mod symbolic;

use std::collections::BTreeMap;
use crate::ops::{unflatten_op, DataOp, OpHandle};
use crate::space::{BoxSpace, Space};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Container op passed where a primitive op was expected: {0}")]
    ContainerInput(String),
    #[error("Unknown op {0}")]
    UnknownOp(OpHandle),
    #[error("Unable to infer a space for op {0}")]
    NoSpace(String),
}

/// Backend that materializes the symbolic ops of an assembled graph.
///
/// One executor is selected when a `ComponentGraph` is created and every graph
/// function receives it; the resolution engine never looks at which backend it is.
pub trait GraphExecutor {
    /// Creates a placeholder (`is_input_feed`) or variable for a primitive space.
    fn create_placeholder(
        &mut self,
        name: &str,
        space: &BoxSpace,
        is_input_feed: bool,
        add_batch_rank: bool,
    ) -> Result<OpHandle, ExecutorError>;

    /// Records an op of `kind` over primitive `inputs`. The output space defaults
    /// to the space of the first input.
    fn create_op(&mut self, kind: &str, inputs: &[DataOp], space: Option<BoxSpace>) -> Result<OpHandle, ExecutorError>;

    fn symbolic_space(&self, handle: &OpHandle) -> Option<BoxSpace>;

    /// Infers a space back from any op.
    fn space_of(&self, op: &DataOp) -> Option<Space> {
        match op {
            DataOp::Symbolic(handle) => self.symbolic_space(handle).map(Space::Box),
            DataOp::Constant(value) => Some(Space::from_constant(value)),
            DataOp::Dict(items) => {
                let mut ret = BTreeMap::new();
                for (k, v) in items {
                    ret.insert(k.clone(), self.space_of(v)?);
                }
                Some(Space::Dict(ret))
            }
            DataOp::Tuple(items) => items
                .iter()
                .map(|v| self.space_of(v))
                .collect::<Option<Vec<_>>>()
                .map(Space::Tuple),
            DataOp::Flattened(flat) => self.space_of(&unflatten_op(flat).ok()?),
        }
    }

    fn get_tensor_variable(
        &mut self,
        space: &Space,
        name: &str,
        is_input_feed: bool,
        add_batch_rank: Option<bool>,
    ) -> Result<DataOp, ExecutorError>
    where
        Self: Sized,
    {
        space.get_tensor_variable(self, name, is_input_feed, add_batch_rank)
    }
}

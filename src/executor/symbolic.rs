use serde::{Deserialize, Serialize};
use crate::executor::{ExecutorError, GraphExecutor};
use crate::ops::{ConstantValue, DataOp, OpHandle};
use crate::space::BoxSpace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolicNodeKind {
    Placeholder,
    Variable,
    Constant(ConstantValue),
    Op(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicNode {
    pub name: String,
    pub kind: SymbolicNodeKind,
    pub inputs: Vec<OpHandle>,
    pub space: BoxSpace,
}

/// Reference backend: records every node into an in-memory symbolic graph.
///
/// Handles are allocated sequentially, so ascending handle order is a valid
/// topological order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolicExecutor {
    nodes: Vec<SymbolicNode>,
    input_ordering: Vec<OpHandle>,
}

impl SymbolicExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_node(&mut self, node: SymbolicNode) -> OpHandle {
        let handle = OpHandle {
            inner: self.nodes.len(),
        };
        log::trace!("Recorded node {handle} '{}'", node.name);
        self.nodes.push(node);
        handle
    }

    pub fn get_node(&self, handle: &OpHandle) -> Option<&SymbolicNode> {
        self.nodes.get(handle.inner)
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> Vec<(OpHandle, &SymbolicNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (OpHandle { inner: i }, n))
            .collect()
    }

    /// Input feeds in creation order.
    pub fn placeholders(&self) -> Vec<OpHandle> {
        self.input_ordering.clone()
    }

    /// Nodes of the given op kind, in creation order.
    pub fn ops_of_kind(&self, kind: &str) -> Vec<OpHandle> {
        self.nodes()
            .into_iter()
            .filter(|(_, n)| matches!(&n.kind, SymbolicNodeKind::Op(k) if k == kind))
            .map(|(h, _)| h)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl GraphExecutor for SymbolicExecutor {
    fn create_placeholder(
        &mut self,
        name: &str,
        space: &BoxSpace,
        is_input_feed: bool,
        add_batch_rank: bool,
    ) -> Result<OpHandle, ExecutorError> {
        let kind = if is_input_feed {
            SymbolicNodeKind::Placeholder
        } else {
            SymbolicNodeKind::Variable
        };
        let handle = self.push_node(SymbolicNode {
            name: name.to_string(),
            kind,
            inputs: vec![],
            space: BoxSpace {
                add_batch_rank,
                ..space.clone()
            },
        });
        if is_input_feed {
            self.input_ordering.push(handle);
        }
        Ok(handle)
    }

    fn create_op(&mut self, kind: &str, inputs: &[DataOp], space: Option<BoxSpace>) -> Result<OpHandle, ExecutorError> {
        let mut input_handles = Vec::with_capacity(inputs.len());
        for input in inputs {
            let handle = match input {
                DataOp::Symbolic(handle) => {
                    if self.get_node(handle).is_none() {
                        return Err(ExecutorError::UnknownOp(*handle));
                    }
                    *handle
                }
                DataOp::Constant(value) => self.push_node(SymbolicNode {
                    name: format!("const_{value}"),
                    kind: SymbolicNodeKind::Constant(value.clone()),
                    inputs: vec![],
                    space: BoxSpace::new(value.dtype(), value.shape()),
                }),
                other => return Err(ExecutorError::ContainerInput(other.to_string())),
            };
            input_handles.push(handle);
        }

        let space = match space {
            Some(space) => space,
            None => input_handles
                .first()
                .and_then(|h| self.symbolic_space(h))
                .ok_or_else(|| ExecutorError::NoSpace(kind.to_string()))?,
        };

        Ok(self.push_node(SymbolicNode {
            name: kind.to_string(),
            kind: SymbolicNodeKind::Op(kind.to_string()),
            inputs: input_handles,
            space,
        }))
    }

    fn symbolic_space(&self, handle: &OpHandle) -> Option<BoxSpace> {
        self.get_node(handle).map(|n| n.space.clone())
    }
}

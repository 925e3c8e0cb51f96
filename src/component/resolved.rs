use std::collections::{BTreeMap, HashMap, HashSet};
use serde::Serialize;
use crate::ops::DataOp;

/// What a component resolved to once propagation settled.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedGraph {
    pub component: String,
    /// Ops reaching each output socket, in arrival order.
    pub outputs: BTreeMap<String, Vec<DataOp>>,
    /// Placeholder ops behind each input socket.
    pub inputs: BTreeMap<String, Vec<DataOp>>,
    pub incomplete_graph_fns: Vec<String>,
    #[serde(skip)]
    op_registry: HashMap<DataOp, Vec<DataOp>>,
    #[serde(skip)]
    placeholders: HashSet<DataOp>,
}

impl ResolvedGraph {
    pub(crate) fn new(
        component: String,
        outputs: BTreeMap<String, Vec<DataOp>>,
        inputs: BTreeMap<String, Vec<DataOp>>,
        incomplete_graph_fns: Vec<String>,
        op_registry: HashMap<DataOp, Vec<DataOp>>,
        placeholders: HashSet<DataOp>,
    ) -> Self {
        Self {
            component,
            outputs,
            inputs,
            incomplete_graph_fns,
            op_registry,
            placeholders,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete_graph_fns.is_empty()
    }

    pub fn output(&self, name: &str) -> &[DataOp] {
        self.outputs.get(name).map(|ops| ops.as_slice()).unwrap_or(&[])
    }

    /// Placeholder ops that must be fed to compute `op`, in discovery order.
    pub fn feeds_for(&self, op: &DataOp) -> Vec<DataOp> {
        let mut ret = vec![];
        let mut seen = HashSet::new();
        let mut stack = vec![op];
        while let Some(op) = stack.pop() {
            if !seen.insert(op) {
                continue;
            }
            if self.placeholders.contains(op) {
                ret.push(op.clone());
                continue;
            }
            match self.op_registry.get(op) {
                Some(required) => stack.extend(required.iter().rev()),
                None => match op {
                    DataOp::Dict(items) => stack.extend(items.values().rev()),
                    DataOp::Tuple(items) => stack.extend(items.iter().rev()),
                    DataOp::Flattened(flat) => stack.extend(flat.values().collect::<Vec<_>>().into_iter().rev()),
                    _ => {}
                },
            }
        }
        ret
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

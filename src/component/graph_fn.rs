use std::collections::{BTreeSet, HashMap};
use serde::{Deserialize, Serialize};
use crate::component::registry::GraphFnMethod;
use crate::component::{ComponentId, SocketId};
use crate::ops::{flatten_op, DataOp, OpSet};

/// Which container arguments a graph function flattens before calling its method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlattenMode {
    All,
    Off,
    /// Only arguments arriving through the named input sockets.
    Sockets(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphFnOptions {
    pub flatten_ops: FlattenMode,
    pub split_ops: bool,
    /// Hands each split call its flat key through [`GraphFnCall::key`]; the
    /// argument list itself is left untouched.
    ///
    /// [`GraphFnCall::key`]: crate::component::GraphFnCall::key
    pub add_auto_key_as_first_param: bool,
    pub unflatten_ops: bool,
}

impl Default for GraphFnOptions {
    fn default() -> Self {
        Self {
            flatten_ops: FlattenMode::All,
            split_ops: true,
            add_auto_key_as_first_param: false,
            unflatten_ops: true,
        }
    }
}

impl GraphFnOptions {
    pub fn with_flatten(mut self, flatten_ops: FlattenMode) -> Self {
        self.flatten_ops = flatten_ops;
        self
    }

    pub fn with_flatten_sockets<'a>(self, sockets: impl IntoIterator<Item = &'a str>) -> Self {
        self.with_flatten(FlattenMode::Sockets(sockets.into_iter().map(|s| s.to_string()).collect()))
    }

    pub fn with_split(mut self, split_ops: bool) -> Self {
        self.split_ops = split_ops;
        self
    }

    pub fn with_auto_key(mut self, add_auto_key_as_first_param: bool) -> Self {
        self.add_auto_key_as_first_param = add_auto_key_as_first_param;
        self
    }

    pub fn with_unflatten(mut self, unflatten_ops: bool) -> Self {
        self.unflatten_ops = unflatten_ops;
        self
    }

    pub(crate) fn flattens(&self, socket_name: &str) -> bool {
        match &self.flatten_ops {
            FlattenMode::All => true,
            FlattenMode::Off => false,
            FlattenMode::Sockets(names) => names.contains(socket_name),
        }
    }
}

/// Outputs of every processed input combination, keyed by the combination with
/// constants removed. Iteration follows processing order.
#[derive(Debug, Clone, Default)]
pub struct ProcessedOps {
    order: Vec<Vec<DataOp>>,
    outputs: HashMap<Vec<DataOp>, Vec<DataOp>>,
}

impl ProcessedOps {
    pub fn contains(&self, key: &[DataOp]) -> bool {
        self.outputs.contains_key(key)
    }

    pub fn get(&self, key: &[DataOp]) -> Option<&Vec<DataOp>> {
        self.outputs.get(key)
    }

    pub(crate) fn insert(&mut self, key: Vec<DataOp>, outputs: Vec<DataOp>) {
        if self.outputs.insert(key.clone(), outputs).is_none() {
            self.order.push(key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<DataOp>, &Vec<DataOp>)> {
        self.order.iter().filter_map(|k| self.outputs.get(k).map(|v| (k, v)))
    }

    /// The op produced at output `slot` by each processed combination.
    pub fn outputs_at(&self, slot: usize) -> Vec<DataOp> {
        self.iter().filter_map(|(_, outputs)| outputs.get(slot).cloned()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct GraphFnInput {
    pub socket: SocketId,
    pub socket_name: String,
    pub ops: OpSet,
}

/// A named, memoized transformation owned by a component.
#[derive(Debug, Clone)]
pub struct GraphFunction {
    pub(crate) name: String,
    pub(crate) qualified_name: String,
    pub(crate) component: ComponentId,
    pub(crate) method: GraphFnMethod,
    pub(crate) options: GraphFnOptions,
    pub(crate) inputs: Vec<GraphFnInput>,
    pub(crate) output_sockets: Vec<SocketId>,
    pub(crate) input_complete: bool,
    pub(crate) processed_ops: ProcessedOps,
}

impl GraphFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn options(&self) -> &GraphFnOptions {
        &self.options
    }

    pub fn inputs(&self) -> &[GraphFnInput] {
        &self.inputs
    }

    pub fn output_sockets(&self) -> &[SocketId] {
        &self.output_sockets
    }

    pub fn input_complete(&self) -> bool {
        self.input_complete
    }

    pub fn processed_ops(&self) -> &ProcessedOps {
        &self.processed_ops
    }

    pub fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    /// Copies the current ops of `socket` into every input record fed by it.
    /// Returns true if this made the function input-complete.
    pub(crate) fn update_input(&mut self, socket: SocketId, ops: &OpSet) -> bool {
        for input in self.inputs.iter_mut().filter(|i| i.socket == socket) {
            input.ops.extend_new(ops.iter().cloned());
        }
        self.check_input_completeness()
    }

    /// Returns true on the transition to input-complete only.
    pub(crate) fn check_input_completeness(&mut self) -> bool {
        if self.input_complete {
            return false;
        }
        self.input_complete = self.inputs.iter().all(|i| !i.ops.is_empty());
        self.input_complete
    }

    /// Every combination of one op per input, in odometer order: the last input
    /// varies fastest and each input follows its arrival order.
    pub fn input_combinations(&self) -> Vec<Vec<DataOp>> {
        let sets: Vec<&[DataOp]> = self.inputs.iter().map(|i| i.ops.as_slice()).collect();
        cartesian_product(&sets)
    }

    /// Flattens container arguments according to the flatten mode.
    pub(crate) fn prepare_args(&self, combination: &[DataOp]) -> Vec<DataOp> {
        combination
            .iter()
            .zip(self.inputs.iter())
            .map(|(op, input)| {
                if op.is_container() && self.options.flattens(&input.socket_name) {
                    DataOp::Flattened(flatten_op(op))
                } else {
                    op.clone()
                }
            })
            .collect()
    }
}

/// The memoization key of a combination: the combination without its constants.
pub fn real_key(combination: &[DataOp]) -> Vec<DataOp> {
    combination.iter().filter(|op| !op.is_constant()).cloned().collect()
}

pub(crate) fn cartesian_product(sets: &[&[DataOp]]) -> Vec<Vec<DataOp>> {
    if sets.iter().any(|s| s.is_empty()) {
        return vec![];
    }
    let mut ret = vec![];
    let mut indices = vec![0usize; sets.len()];
    loop {
        ret.push(indices.iter().zip(sets).map(|(i, s)| s[*i].clone()).collect());
        let mut pos = sets.len();
        loop {
            if pos == 0 {
                return ret;
            }
            pos -= 1;
            indices[pos] += 1;
            if indices[pos] < sets[pos].len() {
                break;
            }
            indices[pos] = 0;
        }
    }
}

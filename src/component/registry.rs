use std::collections::BTreeMap;
use std::rc::Rc;
use anyhow::anyhow;
use crate::executor::GraphExecutor;
use crate::ops::DataOp;

type MethodFn = dyn Fn(&mut GraphFnCall<'_>) -> anyhow::Result<Vec<DataOp>>;

/// A graph-function method: receives one call's arguments and returns one op per
/// output socket.
#[derive(Clone)]
pub struct GraphFnMethod(Rc<MethodFn>);

impl GraphFnMethod {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut GraphFnCall<'_>) -> anyhow::Result<Vec<DataOp>> + 'static,
    {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, call: &mut GraphFnCall<'_>) -> anyhow::Result<Vec<DataOp>> {
        (self.0)(call)
    }
}

impl std::fmt::Debug for GraphFnMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GraphFnMethod")
    }
}

/// Table of the graph-function methods a component offers, by name.
#[derive(Clone, Debug, Default)]
pub struct MethodRegistry {
    methods: BTreeMap<String, GraphFnMethod>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut GraphFnCall<'_>) -> anyhow::Result<Vec<DataOp>> + 'static,
    {
        self.insert(name, GraphFnMethod::new(f));
        self
    }

    pub fn insert(&mut self, name: &str, method: GraphFnMethod) {
        self.methods.insert(name.to_string(), method);
    }

    pub fn get(&self, name: &str) -> Option<&GraphFnMethod> {
        self.methods.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(|k| k.as_str())
    }
}

/// Arguments and backend access for one invocation of a graph-function method.
///
/// When the function splits flattened containers and passes the auto key, `key()`
/// holds the flat key of the primitive currently being processed.
pub struct GraphFnCall<'a> {
    key: Option<&'a str>,
    args: &'a [DataOp],
    executor: &'a mut dyn GraphExecutor,
    graph_fn: &'a str,
}

impl<'a> GraphFnCall<'a> {
    pub(crate) fn new(
        key: Option<&'a str>,
        args: &'a [DataOp],
        executor: &'a mut dyn GraphExecutor,
        graph_fn: &'a str,
    ) -> Self {
        Self {
            key,
            args,
            executor,
            graph_fn,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key
    }

    pub fn args(&self) -> &[DataOp] {
        self.args
    }

    pub fn arg(&self, i: usize) -> anyhow::Result<&DataOp> {
        self.args
            .get(i)
            .ok_or_else(|| anyhow!("{} expects at least {} arguments, got {}", self.graph_fn, i + 1, self.args.len()))
    }

    pub fn graph_fn(&self) -> &str {
        self.graph_fn
    }

    pub fn executor(&mut self) -> &mut dyn GraphExecutor {
        &mut *self.executor
    }

    /// Records a primitive op of `kind` over `inputs` and returns it.
    pub fn op(&mut self, kind: &str, inputs: &[DataOp]) -> anyhow::Result<DataOp> {
        Ok(DataOp::Symbolic(self.executor.create_op(kind, inputs, None)?))
    }
}

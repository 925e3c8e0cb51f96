pub mod graph_fn;
mod propagation;
pub mod registry;
pub mod resolved;
pub mod socket;

use std::collections::{BTreeMap, HashMap, VecDeque};
use serde::{Deserialize, Serialize};
use crate::config::AssemblyConfig;
use crate::executor::symbolic::SymbolicExecutor;
use crate::executor::{ExecutorError, GraphExecutor};
use crate::observer::AssemblyObserver;
use crate::ops::{DataOp, FlattenError, OpSet};
use crate::space::Space;
use propagation::Propagation;

pub use graph_fn::{real_key, FlattenMode, GraphFnInput, GraphFnOptions, GraphFunction, ProcessedOps};
pub use registry::{GraphFnCall, GraphFnMethod, MethodRegistry};
pub use resolved::ResolvedGraph;
pub use socket::{Connection, Socket, SocketDirection};

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("Socket {0} already has a space attached")]
    DuplicateSpaceBinding(String),
    #[error("Socket {0} is already bound to a different constant")]
    MultipleConstantBindings(String),
    #[error("{from} cannot feed socket {socket}")]
    InvalidConnectionSource { from: String, socket: String },
    #[error("Flattened arguments of {graph_fn} do not share the same keys: '{key}' vs '{other_key}'")]
    StructuralMismatch {
        graph_fn: String,
        key: String,
        other_key: String,
    },
    #[error("Graph function {0} takes no inputs but returned no ops")]
    EmptyResult(String),
    #[error("Component {component} has no graph-function method '{method}'")]
    MissingMethod { component: String, method: String },
    #[error("Component {component} has no socket '{socket}'")]
    UnknownSocket { component: String, socket: String },
    #[error("Unknown socket {0}")]
    UnknownSocketId(SocketId),
    #[error("Unknown component {0}")]
    UnknownComponent(ComponentId),
    #[error("Component {component} already has a socket '{socket}'")]
    DuplicateSocket { component: String, socket: String },
    #[error("Graph function {graph_fn} returned {got} ops, expected {expected}")]
    ReturnArityMismatch {
        graph_fn: String,
        expected: usize,
        got: usize,
    },
    #[error("Graph function {graph_fn} failed: {source}")]
    MethodFailed {
        graph_fn: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Propagation did not settle within {0} steps")]
    PropagationLimitExceeded(usize),
    #[error(transparent)]
    Flatten(#[from] FlattenError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

#[derive(Debug, Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComponentId(pub(crate) usize);

#[derive(Debug, Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct SocketId(pub(crate) usize);

#[derive(Debug, Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct GraphFnId(pub(crate) usize);

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

impl std::fmt::Display for SocketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

impl std::fmt::Display for GraphFnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "graph_fn#{}", self.0)
    }
}

/// A node of the component tree: named sockets plus the graph functions that
/// connect them.
#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    scope: String,
    parent: Option<ComponentId>,
    children: Vec<ComponentId>,
    methods: MethodRegistry,
    input_sockets: Vec<SocketId>,
    output_sockets: Vec<SocketId>,
    graph_fns: Vec<GraphFnId>,
    no_input_entry_points: Vec<SocketId>,
    input_complete: bool,
}

impl Component {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slash-joined names from the root component down to this one.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    pub fn input_sockets(&self) -> &[SocketId] {
        &self.input_sockets
    }

    pub fn output_sockets(&self) -> &[SocketId] {
        &self.output_sockets
    }

    pub fn graph_fns(&self) -> &[GraphFnId] {
        &self.graph_fns
    }

    /// Sockets fed by constants, which need no external input.
    pub fn no_input_entry_points(&self) -> &[SocketId] {
        &self.no_input_entry_points
    }

    pub fn input_complete(&self) -> bool {
        self.input_complete
    }
}

/// Arena owning the component tree, its sockets and graph functions, and the
/// executor they build into.
///
/// Every mutating call runs propagation until the work queue is empty, so the
/// graph is always settled between calls.
pub struct ComponentGraph<E = SymbolicExecutor, O = ()> {
    components: Vec<Component>,
    sockets: Vec<Socket>,
    graph_fns: Vec<GraphFunction>,
    executor: E,
    observer: O,
    config: AssemblyConfig,
    op_registry: HashMap<DataOp, Vec<DataOp>>,
    in_socket_registry: BTreeMap<String, OpSet>,
    queue: VecDeque<Propagation>,
}

impl<E: GraphExecutor> ComponentGraph<E, ()> {
    pub fn new(executor: E) -> Self {
        Self::with_observer(executor, (), AssemblyConfig::default())
    }

    pub fn with_config(executor: E, config: AssemblyConfig) -> Self {
        Self::with_observer(executor, (), config)
    }
}

impl<E: GraphExecutor, O: AssemblyObserver> ComponentGraph<E, O> {
    pub fn with_observer(executor: E, observer: O, config: AssemblyConfig) -> Self {
        Self {
            components: vec![],
            sockets: vec![],
            graph_fns: vec![],
            executor,
            observer,
            config,
            op_registry: HashMap::new(),
            in_socket_registry: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub fn into_parts(self) -> (E, O) {
        (self.executor, self.observer)
    }

    pub fn get_component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.0)
    }

    pub fn get_socket(&self, id: SocketId) -> Option<&Socket> {
        self.sockets.get(id.0)
    }

    pub fn get_graph_fn(&self, id: GraphFnId) -> Option<&GraphFunction> {
        self.graph_fns.get(id.0)
    }

    /// Which input ops each produced op was derived from.
    pub fn op_registry(&self) -> &HashMap<DataOp, Vec<DataOp>> {
        &self.op_registry
    }

    /// Placeholder ops created for each space-fed socket, by qualified name.
    pub fn in_socket_registry(&self) -> &BTreeMap<String, OpSet> {
        &self.in_socket_registry
    }

    fn component_checked(&self, id: ComponentId) -> Result<&Component, AssemblyError> {
        self.components.get(id.0).ok_or(AssemblyError::UnknownComponent(id))
    }

    fn socket_checked(&self, id: SocketId) -> Result<&Socket, AssemblyError> {
        self.sockets.get(id.0).ok_or(AssemblyError::UnknownSocketId(id))
    }

    pub fn add_component(&mut self, name: &str, methods: MethodRegistry) -> ComponentId {
        self.push_component(name, name.to_string(), None, methods)
    }

    pub fn add_sub_component(
        &mut self,
        parent: ComponentId,
        name: &str,
        methods: MethodRegistry,
    ) -> Result<ComponentId, AssemblyError> {
        let scope = format!("{}/{name}", self.component_checked(parent)?.scope);
        let id = self.push_component(name, scope, Some(parent), methods);
        self.components[parent.0].children.push(id);
        Ok(id)
    }

    fn push_component(
        &mut self,
        name: &str,
        scope: String,
        parent: Option<ComponentId>,
        methods: MethodRegistry,
    ) -> ComponentId {
        let id = ComponentId(self.components.len());
        log::debug!("Adding component {scope}");
        self.components.push(Component {
            name: name.to_string(),
            scope,
            parent,
            children: vec![],
            methods,
            input_sockets: vec![],
            output_sockets: vec![],
            graph_fns: vec![],
            no_input_entry_points: vec![],
            input_complete: false,
        });
        id
    }

    pub fn define_inputs(&mut self, component: ComponentId, names: &[&str]) -> Result<Vec<SocketId>, AssemblyError> {
        self.define_sockets(component, names, SocketDirection::In)
    }

    pub fn define_outputs(&mut self, component: ComponentId, names: &[&str]) -> Result<Vec<SocketId>, AssemblyError> {
        self.define_sockets(component, names, SocketDirection::Out)
    }

    fn define_sockets(
        &mut self,
        component: ComponentId,
        names: &[&str],
        direction: SocketDirection,
    ) -> Result<Vec<SocketId>, AssemblyError> {
        let scope = self.component_checked(component)?.scope.clone();
        let mut ret = Vec::with_capacity(names.len());
        for name in names {
            if self.find_socket(component, name).is_some() {
                return Err(AssemblyError::DuplicateSocket {
                    component: scope,
                    socket: name.to_string(),
                });
            }
            let id = SocketId(self.sockets.len());
            self.sockets.push(Socket::new(name, &scope, direction, component));
            let comp = &mut self.components[component.0];
            match direction {
                SocketDirection::In => comp.input_sockets.push(id),
                SocketDirection::Out => comp.output_sockets.push(id),
            }
            ret.push(id);
        }
        Ok(ret)
    }

    fn find_socket(&self, component: ComponentId, name: &str) -> Option<SocketId> {
        let comp = self.components.get(component.0)?;
        comp.input_sockets
            .iter()
            .chain(comp.output_sockets.iter())
            .copied()
            .find(|id| self.sockets[id.0].name == name)
    }

    /// Looks up a socket of `component` by its local name.
    pub fn socket(&self, component: ComponentId, name: &str) -> Result<SocketId, AssemblyError> {
        let scope = &self.component_checked(component)?.scope;
        self.find_socket(component, name).ok_or_else(|| AssemblyError::UnknownSocket {
            component: scope.clone(),
            socket: name.to_string(),
        })
    }

    /// Registers a graph function over sockets of `component`, backed by the
    /// component's method `method`. `inputs` of `None` declares a no-input
    /// function, which is called once right away whatever sockets the component has.
    pub fn add_graph_fn(
        &mut self,
        component: ComponentId,
        inputs: Option<&[&str]>,
        outputs: &[&str],
        method: &str,
        options: Option<GraphFnOptions>,
    ) -> Result<GraphFnId, AssemblyError> {
        let comp = self.component_checked(component)?;
        let scope = comp.scope.clone();
        let graph_fn_method = comp.methods.get(method).cloned().ok_or_else(|| AssemblyError::MissingMethod {
            component: scope.clone(),
            method: method.to_string(),
        })?;

        let input_sockets = match inputs {
            Some(names) => names
                .iter()
                .map(|n| self.socket(component, n))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![],
        };
        let output_sockets = outputs
            .iter()
            .map(|n| self.socket(component, n))
            .collect::<Result<Vec<_>, _>>()?;

        let id = GraphFnId(self.graph_fns.len());
        let qualified_name = format!("{scope}/{method}");
        log::debug!(
            "Adding graph function {qualified_name} ({} in, {} out)",
            input_sockets.len(),
            output_sockets.len()
        );

        let mut graph_fn_inputs = Vec::with_capacity(input_sockets.len());
        for (position, socket) in input_sockets.iter().enumerate() {
            self.sockets[socket.0].connect_to(Connection::GraphFnInput { graph_fn: id, position });
            graph_fn_inputs.push(GraphFnInput {
                socket: *socket,
                socket_name: self.sockets[socket.0].name.clone(),
                ops: OpSet::new(),
            });
        }
        for (slot, socket) in output_sockets.iter().enumerate() {
            self.sockets[socket.0].connect_from(Connection::GraphFnOutput { graph_fn: id, slot });
        }

        self.graph_fns.push(GraphFunction {
            name: method.to_string(),
            qualified_name,
            component,
            method: graph_fn_method,
            options: options.unwrap_or_else(|| self.config.graph_fn.clone()),
            inputs: graph_fn_inputs,
            output_sockets,
            input_complete: false,
            processed_ops: ProcessedOps::default(),
        });
        self.components[component.0].graph_fns.push(id);

        if input_sockets.is_empty() {
            self.queue.push_back(Propagation::GraphFnNoInput { graph_fn: id });
        } else {
            let mut notified = vec![];
            for socket in input_sockets {
                if !self.sockets[socket.0].ops.is_empty() && !notified.contains(&socket) {
                    self.queue.push_back(Propagation::GraphFnInput { graph_fn: id, socket });
                    notified.push(socket);
                }
            }
        }
        self.run_queue()?;
        Ok(id)
    }

    /// Registers `f` as method `name` on `component` and adds a graph function
    /// backed by it.
    pub fn add_graph_fn_with<F>(
        &mut self,
        component: ComponentId,
        inputs: Option<&[&str]>,
        outputs: &[&str],
        name: &str,
        options: Option<GraphFnOptions>,
        f: F,
    ) -> Result<GraphFnId, AssemblyError>
    where
        F: Fn(&mut GraphFnCall<'_>) -> anyhow::Result<Vec<DataOp>> + 'static,
    {
        self.component_checked(component)?;
        self.components[component.0].methods.insert(name, GraphFnMethod::new(f));
        self.add_graph_fn(component, inputs, outputs, name, options)
    }

    /// Connects `source` (a socket, space or constant) to `target` and
    /// propagates whatever ops the source already provides.
    pub fn connect(&mut self, source: impl Into<Connection>, target: SocketId) -> Result<(), AssemblyError> {
        let source = source.into();
        let target_socket = self.socket_checked(target)?;
        let target_component = target_socket.component;
        match &source {
            Connection::Socket(src) => {
                let has_ops = !self.socket_checked(*src)?.ops.is_empty();
                self.sockets[src.0].connect_to(Connection::Socket(target));
                self.sockets[target.0].connect_from(source.clone());
                if has_ops {
                    self.queue.push_back(Propagation::SocketUpdate {
                        socket: target,
                        incoming: source,
                        only: None,
                    });
                }
            }
            Connection::Space(_) => {
                self.sockets[target.0].connect_from(source.clone());
                self.queue.push_back(Propagation::SocketUpdate {
                    socket: target,
                    incoming: source,
                    only: None,
                });
            }
            Connection::Constant(_) => {
                self.sockets[target.0].connect_from(source.clone());
                let entry_points = &mut self.components[target_component.0].no_input_entry_points;
                if !entry_points.contains(&target) {
                    entry_points.push(target);
                }
                self.queue.push_back(Propagation::SocketUpdate {
                    socket: target,
                    incoming: source,
                    only: None,
                });
            }
            other => {
                return Err(AssemblyError::InvalidConnectionSource {
                    from: other.to_string(),
                    socket: target_socket.qualified_name.clone(),
                });
            }
        }
        self.run_queue()
    }

    pub fn attach_space(&mut self, socket: SocketId, space: Space) -> Result<(), AssemblyError> {
        self.connect(space, socket)
    }

    /// Removes the edge between `source` and `target`. Ops already propagated
    /// stay where they are. Returns whether an edge was removed.
    pub fn disconnect(&mut self, source: impl Into<Connection>, target: SocketId) -> Result<bool, AssemblyError> {
        let source = source.into();
        self.socket_checked(target)?;
        let removed = self.sockets[target.0].disconnect_from(&source);
        match source {
            Connection::Socket(src) => {
                self.socket_checked(src)?;
                self.sockets[src.0].disconnect_to(&Connection::Socket(target));
            }
            Connection::Constant(_) if removed => {
                let component = self.sockets[target.0].component;
                self.components[component.0].no_input_entry_points.retain(|s| *s != target);
            }
            _ => {}
        }
        Ok(removed)
    }

    /// Marks `component` input-complete once every one of its input sockets holds
    /// at least one op. Completeness never reverts.
    pub fn check_input_completeness(&mut self, component: ComponentId) -> bool {
        let Some(comp) = self.components.get(component.0) else {
            return false;
        };
        if comp.input_complete {
            return true;
        }
        let complete = comp.input_sockets.iter().all(|s| !self.sockets[s.0].ops.is_empty());
        if complete {
            let comp = &mut self.components[component.0];
            comp.input_complete = true;
            log::debug!("Component {} is input-complete", comp.scope);
            self.observer.on_component_input_complete(&comp.scope);
        }
        complete
    }

    /// Snapshot of what `component` resolved to: its output ops, the
    /// placeholders behind its inputs and any graph function in its subtree
    /// still waiting for input.
    pub fn build(&mut self, component: ComponentId) -> Result<ResolvedGraph, AssemblyError> {
        self.run_queue()?;
        let comp = self.component_checked(component)?;

        let outputs = comp
            .output_sockets
            .iter()
            .map(|s| {
                let socket = &self.sockets[s.0];
                (socket.name.clone(), socket.ops.as_slice().to_vec())
            })
            .collect();
        let inputs = comp
            .input_sockets
            .iter()
            .map(|s| {
                let socket = &self.sockets[s.0];
                let placeholders = self
                    .in_socket_registry
                    .get(&socket.qualified_name)
                    .map(|ops| ops.as_slice().to_vec())
                    .unwrap_or_default();
                (socket.name.clone(), placeholders)
            })
            .collect();

        let mut incomplete_graph_fns = vec![];
        let mut stack = vec![component];
        while let Some(id) = stack.pop() {
            let comp = &self.components[id.0];
            for graph_fn in &comp.graph_fns {
                let graph_fn = &self.graph_fns[graph_fn.0];
                if !graph_fn.input_complete {
                    log::warn!("Graph function {} never received all of its inputs", graph_fn.qualified_name);
                    incomplete_graph_fns.push(graph_fn.qualified_name.clone());
                }
            }
            stack.extend(comp.children.iter().rev().copied());
        }

        Ok(ResolvedGraph::new(
            comp.scope.clone(),
            outputs,
            inputs,
            incomplete_graph_fns,
            self.op_registry.clone(),
            self.in_socket_registry.values().flat_map(|ops| ops.iter().cloned()).collect(),
        ))
    }
}

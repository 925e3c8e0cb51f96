use serde::{Deserialize, Serialize};
use crate::component::{ComponentId, GraphFnId, SocketId};
use crate::ops::{ConstantValue, OpSet};
use crate::space::Space;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum SocketDirection {
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "out")]
    Out,
}

/// One end of a connection into or out of a socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Connection {
    Socket(SocketId),
    Space(Space),
    Constant(ConstantValue),
    GraphFnInput { graph_fn: GraphFnId, position: usize },
    GraphFnOutput { graph_fn: GraphFnId, slot: usize },
}

impl From<SocketId> for Connection {
    fn from(value: SocketId) -> Self {
        Connection::Socket(value)
    }
}

impl From<Space> for Connection {
    fn from(value: Space) -> Self {
        Connection::Space(value)
    }
}

impl From<ConstantValue> for Connection {
    fn from(value: ConstantValue) -> Self {
        Connection::Constant(value)
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::Socket(id) => write!(f, "socket {id}"),
            Connection::Space(space) => write!(f, "space {space}"),
            Connection::Constant(value) => write!(f, "constant {value}"),
            Connection::GraphFnInput { graph_fn, position } => write!(f, "input {position} of {graph_fn}"),
            Connection::GraphFnOutput { graph_fn, slot } => write!(f, "output {slot} of {graph_fn}"),
        }
    }
}

/// A named connection point on a component, holding every alternative op that
/// has reached it so far.
#[derive(Debug, Clone)]
pub struct Socket {
    pub(crate) name: String,
    pub(crate) qualified_name: String,
    pub(crate) direction: SocketDirection,
    pub(crate) component: ComponentId,
    pub(crate) incoming_connections: Vec<Connection>,
    pub(crate) outgoing_connections: Vec<Connection>,
    pub(crate) space: Option<Space>,
    pub(crate) ops: OpSet,
    pub(crate) space_bound: bool,
}

impl Socket {
    pub(crate) fn new(name: &str, scope: &str, direction: SocketDirection, component: ComponentId) -> Self {
        Self {
            name: name.to_string(),
            qualified_name: format!("{scope}/{name}"),
            direction,
            component,
            incoming_connections: vec![],
            outgoing_connections: vec![],
            space: None,
            ops: OpSet::new(),
            space_bound: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<component scope>/<name>`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn direction(&self) -> SocketDirection {
        self.direction
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn space(&self) -> Option<&Space> {
        self.space.as_ref()
    }

    pub fn ops(&self) -> &OpSet {
        &self.ops
    }

    pub fn incoming_connections(&self) -> &[Connection] {
        &self.incoming_connections
    }

    pub fn outgoing_connections(&self) -> &[Connection] {
        &self.outgoing_connections
    }

    /// Records an incoming edge. Returns false if it was already present.
    pub(crate) fn connect_from(&mut self, from: Connection) -> bool {
        if self.incoming_connections.contains(&from) {
            return false;
        }
        self.incoming_connections.push(from);
        true
    }

    /// Records an outgoing edge. Returns false if it was already present.
    pub(crate) fn connect_to(&mut self, to: Connection) -> bool {
        if self.outgoing_connections.contains(&to) {
            return false;
        }
        self.outgoing_connections.push(to);
        true
    }

    pub(crate) fn disconnect_from(&mut self, from: &Connection) -> bool {
        let before = self.incoming_connections.len();
        self.incoming_connections.retain(|c| c != from);
        before != self.incoming_connections.len()
    }

    pub(crate) fn disconnect_to(&mut self, to: &Connection) -> bool {
        let before = self.outgoing_connections.len();
        self.outgoing_connections.retain(|c| c != to);
        before != self.outgoing_connections.len()
    }
}

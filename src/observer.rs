use crate::ops::DataOp;

/// Hooks into the assembly process. Every method defaults to a no-op.
pub trait AssemblyObserver {
    fn on_socket_updated(&mut self, _socket: &str, _new_ops: &[DataOp]) {}
    fn on_graph_fn_called(&mut self, _graph_fn: &str, _key: Option<&str>) {}
    fn on_combination_skipped(&mut self, _graph_fn: &str, _real_key: &[DataOp]) {}
    fn on_graph_fn_input_complete(&mut self, _graph_fn: &str) {}
    fn on_component_input_complete(&mut self, _component: &str) {}
}

impl AssemblyObserver for () {}

#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyEvent {
    SocketUpdated { socket: String, new_ops: usize },
    GraphFnCalled { graph_fn: String, key: Option<String> },
    CombinationSkipped { graph_fn: String },
    GraphFnInputComplete(String),
    ComponentInputComplete(String),
}

/// Observer that keeps every event in order, mostly for tests and debugging.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    pub events: Vec<AssemblyEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of method invocations of a graph function (one per split key).
    pub fn calls_of(&self, graph_fn: &str) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AssemblyEvent::GraphFnCalled { graph_fn: g, .. } if g == graph_fn))
            .count()
    }

    /// Keys passed to a graph function's invocations, in call order.
    pub fn keys_of(&self, graph_fn: &str) -> Vec<Option<String>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AssemblyEvent::GraphFnCalled { graph_fn: g, key } if g == graph_fn => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn skips_of(&self, graph_fn: &str) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AssemblyEvent::CombinationSkipped { graph_fn: g } if g == graph_fn))
            .count()
    }
}

impl AssemblyObserver for RecordingObserver {
    fn on_socket_updated(&mut self, socket: &str, new_ops: &[DataOp]) {
        self.events.push(AssemblyEvent::SocketUpdated {
            socket: socket.to_string(),
            new_ops: new_ops.len(),
        });
    }

    fn on_graph_fn_called(&mut self, graph_fn: &str, key: Option<&str>) {
        self.events.push(AssemblyEvent::GraphFnCalled {
            graph_fn: graph_fn.to_string(),
            key: key.map(|k| k.to_string()),
        });
    }

    fn on_combination_skipped(&mut self, graph_fn: &str, _real_key: &[DataOp]) {
        self.events.push(AssemblyEvent::CombinationSkipped {
            graph_fn: graph_fn.to_string(),
        });
    }

    fn on_graph_fn_input_complete(&mut self, graph_fn: &str) {
        self.events.push(AssemblyEvent::GraphFnInputComplete(graph_fn.to_string()));
    }

    fn on_component_input_complete(&mut self, component: &str) {
        self.events.push(AssemblyEvent::ComponentInputComplete(component.to_string()));
    }
}

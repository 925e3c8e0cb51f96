use crate::component::{
    real_key, AssemblyError, ComponentGraph, Connection, GraphFnCall, GraphFnId, GraphFnMethod, SocketId,
};
use crate::executor::GraphExecutor;
use crate::observer::AssemblyObserver;
use crate::ops::flatten::split_flattened_args;
use crate::ops::{unflatten_op, DataOp, FlattenError, FlattenedDataOp};
use crate::space::Space;

/// One unit of pending propagation work.
#[derive(Debug, Clone)]
pub(crate) enum Propagation {
    /// Pull ops from `incoming` into `socket`; `only` restricts a socket source
    /// to the ops that just arrived there.
    SocketUpdate {
        socket: SocketId,
        incoming: Connection,
        only: Option<Vec<DataOp>>,
    },
    GraphFnInput {
        graph_fn: GraphFnId,
        socket: SocketId,
    },
    GraphFnNoInput {
        graph_fn: GraphFnId,
    },
}

impl<E: GraphExecutor, O: AssemblyObserver> ComponentGraph<E, O> {
    /// Drains the work queue. On error the remaining work is discarded.
    pub(crate) fn run_queue(&mut self) -> Result<(), AssemblyError> {
        let limit = self.config.max_propagation_steps;
        let mut steps = 0usize;
        while let Some(item) = self.queue.pop_front() {
            steps += 1;
            if steps > limit {
                self.queue.clear();
                return Err(AssemblyError::PropagationLimitExceeded(limit));
            }
            if let Err(err) = self.process(item) {
                self.queue.clear();
                return Err(err);
            }
        }
        Ok(())
    }

    fn process(&mut self, item: Propagation) -> Result<(), AssemblyError> {
        match item {
            Propagation::SocketUpdate {
                socket,
                incoming,
                only,
            } => self.update_socket(socket, incoming, only),
            Propagation::GraphFnInput { graph_fn, socket } => self.notify_graph_fn(graph_fn, socket),
            Propagation::GraphFnNoInput { graph_fn } => self.call_no_input_graph_fn(graph_fn),
        }
    }

    fn update_socket(
        &mut self,
        socket: SocketId,
        incoming: Connection,
        only: Option<Vec<DataOp>>,
    ) -> Result<(), AssemblyError> {
        let qualified = self.socket_checked(socket)?.qualified_name.clone();
        let invalid_source = |incoming: &Connection| AssemblyError::InvalidConnectionSource {
            from: incoming.to_string(),
            socket: qualified.clone(),
        };

        let (ops, space) = match &incoming {
            Connection::Space(space) => {
                let batch_rank = self.config.add_batch_rank;
                let bound = match batch_rank {
                    Some(batch_rank) => space.with_batch_rank(batch_rank),
                    None => space.clone(),
                };
                let target = &self.sockets[socket.0];
                // A socket carries one space for its lifetime, however it got there.
                if target.space_bound || target.space.as_ref().is_some_and(|s| *s != bound) {
                    return Err(AssemblyError::DuplicateSpaceBinding(qualified.clone()));
                }
                let name = target.name.clone();
                let op = space.get_tensor_variable(&mut self.executor, &name, true, batch_rank)?;
                self.sockets[socket.0].space_bound = true;
                self.in_socket_registry.entry(qualified.clone()).or_default().insert(op.clone());
                self.op_registry.entry(op.clone()).or_default();
                (vec![op], Some(bound))
            }
            Connection::Constant(value) => {
                let op = DataOp::Constant(value.clone());
                if self.sockets[socket.0].ops.iter().any(|o| o.is_constant() && *o != op) {
                    return Err(AssemblyError::MultipleConstantBindings(qualified.clone()));
                }
                (vec![op], Some(Space::from_constant(value)))
            }
            Connection::Socket(src) => {
                let src = self.socket_checked(*src)?;
                let ops = only.unwrap_or_else(|| src.ops.as_slice().to_vec());
                (ops, src.space.clone())
            }
            Connection::GraphFnOutput { graph_fn, slot } => {
                let graph_fn = self
                    .graph_fns
                    .get(graph_fn.0)
                    .filter(|g| *slot < g.output_sockets.len())
                    .ok_or_else(|| invalid_source(&incoming))?;
                let ops = graph_fn.processed_ops.outputs_at(*slot);
                let space = ops.first().and_then(|op| self.executor.space_of(op));
                (ops, space)
            }
            Connection::GraphFnInput { .. } => return Err(invalid_source(&incoming)),
        };

        let target = &mut self.sockets[socket.0];
        if target.space.is_none() {
            target.space = space;
        }
        let new_ops = target.ops.extend_new(ops);
        let component = target.component;

        if !new_ops.is_empty() {
            log::trace!("Socket {qualified} gained {} op(s) from {incoming}", new_ops.len());
            self.observer.on_socket_updated(&qualified, &new_ops);

            let mut notified_graph_fns = vec![];
            for connection in self.sockets[socket.0].outgoing_connections.clone() {
                match connection {
                    Connection::Socket(next) => self.queue.push_back(Propagation::SocketUpdate {
                        socket: next,
                        incoming: Connection::Socket(socket),
                        only: Some(new_ops.clone()),
                    }),
                    Connection::GraphFnInput { graph_fn, .. } if !notified_graph_fns.contains(&graph_fn) => {
                        notified_graph_fns.push(graph_fn);
                        self.queue.push_back(Propagation::GraphFnInput { graph_fn, socket });
                    }
                    _ => {}
                }
            }
        }
        self.check_input_completeness(component);
        Ok(())
    }

    fn notify_graph_fn(&mut self, graph_fn: GraphFnId, socket: SocketId) -> Result<(), AssemblyError> {
        let ops = self.socket_checked(socket)?.ops.clone();
        let target = &mut self.graph_fns[graph_fn.0];
        if target.update_input(socket, &ops) {
            log::debug!("Graph function {} is input-complete", target.qualified_name);
            self.observer.on_graph_fn_input_complete(&target.qualified_name);
        }
        if !target.input_complete {
            return Ok(());
        }
        self.run_combinations(graph_fn)
    }

    fn call_no_input_graph_fn(&mut self, graph_fn: GraphFnId) -> Result<(), AssemblyError> {
        let target = &mut self.graph_fns[graph_fn.0];
        if !target.processed_ops.is_empty() {
            return Ok(());
        }
        if target.check_input_completeness() {
            self.observer.on_graph_fn_input_complete(&target.qualified_name);
        }
        let outputs = self.call_graph_fn(graph_fn, &[])?;
        self.record_outputs(graph_fn, vec![], outputs);
        self.publish_outputs(graph_fn);
        Ok(())
    }

    /// Calls the function once for every input combination whose real key has
    /// not been processed yet.
    fn run_combinations(&mut self, graph_fn: GraphFnId) -> Result<(), AssemblyError> {
        let combinations = self.graph_fns[graph_fn.0].input_combinations();
        let mut produced = false;
        for combination in combinations {
            let key = real_key(&combination);
            let target = &self.graph_fns[graph_fn.0];
            if target.processed_ops.contains(&key) {
                log::trace!("Skipping already processed combination of {}", target.qualified_name);
                self.observer.on_combination_skipped(&target.qualified_name, &key);
                continue;
            }
            let outputs = self.call_graph_fn(graph_fn, &combination)?;
            self.record_outputs(graph_fn, key, outputs);
            produced = true;
        }
        if produced {
            self.publish_outputs(graph_fn);
        }
        Ok(())
    }

    fn record_outputs(&mut self, graph_fn: GraphFnId, key: Vec<DataOp>, outputs: Vec<DataOp>) {
        for op in &outputs {
            self.op_registry.entry(op.clone()).or_insert_with(|| key.clone());
        }
        self.graph_fns[graph_fn.0].processed_ops.insert(key, outputs);
    }

    fn publish_outputs(&mut self, graph_fn: GraphFnId) {
        for (slot, socket) in self.graph_fns[graph_fn.0].output_sockets.iter().enumerate() {
            self.queue.push_back(Propagation::SocketUpdate {
                socket: *socket,
                incoming: Connection::GraphFnOutput { graph_fn, slot },
                only: None,
            });
        }
    }

    /// Runs the method on one combination: flattens container arguments, splits
    /// them into per-key calls, then reassembles and unflattens the results.
    fn call_graph_fn(&mut self, graph_fn: GraphFnId, combination: &[DataOp]) -> Result<Vec<DataOp>, AssemblyError> {
        let target = &self.graph_fns[graph_fn.0];
        let method = target.method.clone();
        let options = target.options.clone();
        let name = target.qualified_name.clone();
        let expected = target.output_sockets.len();
        let has_inputs = target.has_inputs();
        let args = target.prepare_args(combination);

        let split = if options.split_ops {
            split_flattened_args(&args).map_err(|err| match err {
                FlattenError::KeyMismatch { key, other_key } => AssemblyError::StructuralMismatch {
                    graph_fn: name.clone(),
                    key,
                    other_key,
                },
                other => other.into(),
            })?
        } else {
            None
        };

        let mut results: Vec<DataOp> = match split {
            Some(calls) => {
                let mut per_slot: Option<Vec<FlattenedDataOp>> = None;
                for call in calls {
                    let key = options.add_auto_key_as_first_param.then_some(call.key.as_str());
                    let outputs = self.invoke(&method, &name, key, &call.args)?;
                    let slots = per_slot.get_or_insert_with(|| vec![FlattenedDataOp::new(); outputs.len()]);
                    if slots.len() != outputs.len() {
                        return Err(AssemblyError::ReturnArityMismatch {
                            graph_fn: name,
                            expected: slots.len(),
                            got: outputs.len(),
                        });
                    }
                    for (slot, op) in slots.iter_mut().zip(outputs) {
                        slot.insert(call.key.clone(), op);
                    }
                }
                per_slot
                    .unwrap_or_else(|| vec![FlattenedDataOp::new(); expected])
                    .into_iter()
                    .map(DataOp::Flattened)
                    .collect()
            }
            None => self.invoke(&method, &name, None, &args)?,
        };

        if options.unflatten_ops {
            results = results
                .into_iter()
                .map(|op| match op {
                    DataOp::Flattened(flat) => unflatten_op(&flat),
                    other => Ok(other),
                })
                .collect::<Result<Vec<_>, _>>()?;
        }

        if results.is_empty() && !has_inputs {
            return Err(AssemblyError::EmptyResult(name));
        }
        if results.len() < expected {
            return Err(AssemblyError::ReturnArityMismatch {
                graph_fn: name,
                expected,
                got: results.len(),
            });
        }
        if results.len() > expected {
            log::warn!(
                "Graph function {name} returned {} ops for {expected} outputs, ignoring the rest",
                results.len()
            );
        }
        Ok(results)
    }

    fn invoke(
        &mut self,
        method: &GraphFnMethod,
        name: &str,
        key: Option<&str>,
        args: &[DataOp],
    ) -> Result<Vec<DataOp>, AssemblyError> {
        match key {
            Some(key) => log::debug!("Calling {name} for key '{key}'"),
            None => log::debug!("Calling {name} with {} arg(s)", args.len()),
        }
        self.observer.on_graph_fn_called(name, key);
        let mut call = GraphFnCall::new(key, args, &mut self.executor, name);
        let outputs = method.call(&mut call).map_err(|err| AssemblyError::MethodFailed {
            graph_fn: name.to_string(),
            source: err.into(),
        })?;
        if let Some(key) = outputs.iter().find_map(DataOp::find_reserved_key) {
            return Err(FlattenError::ReservedKey(key.to_string()).into());
        }
        Ok(outputs)
    }
}

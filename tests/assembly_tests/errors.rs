use component_graph::{AssemblyError, ConstantValue, Connection, DataOp, FlattenError, MethodRegistry, Space};
use super::{ops_of, unary, TestGraph};

pub fn test_duplicate_space_binding(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new());
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph.attach_space(x, Space::float(vec![2])).unwrap();
    let err = graph.attach_space(x, Space::float(vec![2])).unwrap_err();
    assert!(matches!(err, AssemblyError::DuplicateSpaceBinding(ref s) if s == "root/x"), "{err}");
    assert_eq!(ops_of(graph, x).len(), 1);
}

pub fn test_space_conflicts_with_inherited_space(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new());
    let &[a, s] = &graph.define_inputs(root, &["a", "s"]).unwrap()[..] else {
        panic!("expected two sockets");
    };
    graph.connect(a, s).unwrap();
    graph.attach_space(a, Space::float(vec![2])).unwrap();
    let inherited = graph.get_socket(s).unwrap().space().cloned();
    assert!(inherited.is_some());

    let err = graph.attach_space(s, Space::int(vec![5])).unwrap_err();
    assert!(matches!(err, AssemblyError::DuplicateSpaceBinding(ref name) if name == "root/s"), "{err}");
    assert_eq!(graph.get_socket(s).unwrap().space().cloned(), inherited);
    assert_eq!(ops_of(graph, s).len(), 1);
}

pub fn test_multiple_constant_bindings(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new());
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph.connect(ConstantValue::from(1.0), x).unwrap();
    graph.connect(ConstantValue::from(1.0), x).unwrap();
    let err = graph.connect(ConstantValue::from(2.0), x).unwrap_err();
    assert!(matches!(err, AssemblyError::MultipleConstantBindings(ref s) if s == "root/x"), "{err}");
    assert_eq!(ops_of(graph, x), vec![DataOp::constant(1.0)]);
}

pub fn test_invalid_connection_source(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("neg", unary("neg")));
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph.define_outputs(root, &["y"]).unwrap();
    let neg = graph.add_graph_fn(root, Some(&["x"][..]), &["y"], "neg", None).unwrap();

    let err = graph
        .connect(Connection::GraphFnInput { graph_fn: neg, position: 0 }, x)
        .unwrap_err();
    assert!(matches!(err, AssemblyError::InvalidConnectionSource { ref socket, .. } if socket == "root/x"), "{err}");
}

pub fn test_missing_method(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("neg", unary("neg")));
    graph.define_outputs(root, &["y"]).unwrap();
    let err = graph.add_graph_fn(root, None, &["y"], "negate", None).unwrap_err();
    assert!(
        matches!(err, AssemblyError::MissingMethod { ref component, ref method } if component == "root" && method == "negate"),
        "{err}"
    );
    assert!(graph.get_component(root).unwrap().graph_fns().is_empty());
}

pub fn test_empty_result(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("nothing", |_call| Ok(vec![])));
    let err = graph.add_graph_fn(root, None, &[], "nothing", None).unwrap_err();
    assert!(matches!(err, AssemblyError::EmptyResult(ref g) if g == "root/nothing"), "{err}");
}

pub fn test_return_arity_mismatch(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("neg", unary("neg")));
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph.define_outputs(root, &["y", "z"]).unwrap();
    graph.add_graph_fn(root, Some(&["x"][..]), &["y", "z"], "neg", None).unwrap();
    let err = graph.attach_space(x, Space::float(vec![])).unwrap_err();
    assert!(
        matches!(err, AssemblyError::ReturnArityMismatch { expected: 2, got: 1, .. }),
        "{err}"
    );
}

pub fn test_method_failure_keeps_cause(graph: &mut TestGraph) {
    let root = graph.add_component(
        "root",
        MethodRegistry::new().register("explode", |_call| anyhow::bail!("boom")),
    );
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph.add_graph_fn(root, Some(&["x"][..]), &[], "explode", None).unwrap();
    let err = graph.attach_space(x, Space::bool()).unwrap_err();
    assert!(matches!(err, AssemblyError::MethodFailed { .. }));
    assert!(err.to_string().contains("boom"), "{err}");
    assert!(std::error::Error::source(&err).is_some());
}

pub fn test_socket_lookup_errors(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new());
    graph.define_inputs(root, &["x"]).unwrap();
    assert!(matches!(
        graph.define_outputs(root, &["x"]),
        Err(AssemblyError::DuplicateSocket { .. })
    ));
    assert!(matches!(
        graph.socket(root, "missing"),
        Err(AssemblyError::UnknownSocket { ref socket, .. }) if socket == "missing"
    ));
    assert!(matches!(
        graph.add_graph_fn(root, Some(&["missing"][..]), &[], "anything", None),
        Err(AssemblyError::MissingMethod { .. })
    ));
}

pub fn test_executor_errors_surface(graph: &mut TestGraph) {
    let root = graph.add_component(
        "root",
        MethodRegistry::new().register("bad", |call| {
            let container = DataOp::tuple(call.args().iter().cloned());
            Ok(vec![call.op("neg", &[container])?])
        }),
    );
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph.define_outputs(root, &["y"]).unwrap();
    graph.add_graph_fn(root, Some(&["x"][..]), &["y"], "bad", None).unwrap();
    let err = graph.attach_space(x, Space::float(vec![])).unwrap_err();
    assert!(matches!(err, AssemblyError::MethodFailed { .. }), "{err}");
}

pub fn test_reserved_key_in_method_output(graph: &mut TestGraph) {
    let root = graph.add_component(
        "root",
        MethodRegistry::new().register("wrap", |call| Ok(vec![DataOp::dict([("_T0_", call.arg(0)?.clone())])])),
    );
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    let y = graph.define_outputs(root, &["y"]).unwrap()[0];
    graph.add_graph_fn(root, Some(&["x"][..]), &["y"], "wrap", None).unwrap();

    let err = graph.attach_space(x, Space::float(vec![])).unwrap_err();
    assert!(
        matches!(err, AssemblyError::Flatten(FlattenError::ReservedKey(ref key)) if key == "_T0_"),
        "{err}"
    );
    assert!(ops_of(graph, y).is_empty());
}

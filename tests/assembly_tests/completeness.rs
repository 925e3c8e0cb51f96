use component_graph::{AssemblyEvent, ConstantValue, DataOp, MethodRegistry, Space, SocketDirection};
use super::{nary, ops_of, unary, TestGraph};

pub fn test_monotonic_completeness(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("add", nary("add")));
    let &[a, b] = &graph.define_inputs(root, &["a", "b"]).unwrap()[..] else {
        panic!("expected two sockets");
    };
    graph.define_outputs(root, &["sum"]).unwrap();
    let add = graph.add_graph_fn(root, Some(&["a", "b"][..]), &["sum"], "add", None).unwrap();

    graph.attach_space(a, Space::float(vec![])).unwrap();
    assert!(!graph.get_component(root).unwrap().input_complete());
    assert!(!graph.get_graph_fn(add).unwrap().input_complete());
    assert!(!graph.check_input_completeness(root));

    graph.attach_space(b, Space::float(vec![])).unwrap();
    assert!(graph.get_component(root).unwrap().input_complete());
    assert!(graph.get_graph_fn(add).unwrap().input_complete());

    let outer = graph.add_component("outer", MethodRegistry::new());
    let feed = graph.define_outputs(outer, &["feed"]).unwrap()[0];
    graph.connect(feed, a).unwrap();
    graph.disconnect(feed, a).unwrap();
    assert!(graph.check_input_completeness(root));

    let completions = graph
        .observer()
        .events
        .iter()
        .filter(|e| matches!(e, AssemblyEvent::ComponentInputComplete(c) if c == "root"))
        .count();
    assert_eq!(completions, 1);
    assert!(graph
        .observer()
        .events
        .contains(&AssemblyEvent::GraphFnInputComplete("root/add".to_string())));
}

pub fn test_sub_component_scopes(graph: &mut TestGraph) {
    let root = graph.add_component("agent", MethodRegistry::new());
    let policy = graph
        .add_sub_component(root, "policy", MethodRegistry::new().register("act", unary("tanh")))
        .unwrap();
    let net = graph.add_sub_component(policy, "net", MethodRegistry::new()).unwrap();
    let state = graph.define_inputs(policy, &["state"]).unwrap()[0];
    let hidden = graph.define_outputs(net, &["hidden"]).unwrap()[0];
    let act = graph.add_graph_fn(policy, Some(&["state"][..]), &[], "act", None).unwrap();

    assert_eq!(graph.get_component(net).unwrap().scope(), "agent/policy/net");
    assert_eq!(graph.get_component(policy).unwrap().children(), &[net]);
    assert_eq!(graph.get_component(net).unwrap().parent(), Some(policy));
    assert_eq!(graph.get_socket(state).unwrap().qualified_name(), "agent/policy/state");
    assert_eq!(graph.get_socket(hidden).unwrap().direction(), SocketDirection::Out);
    assert_eq!(graph.get_graph_fn(act).unwrap().qualified_name(), "agent/policy/act");
    assert_eq!(graph.socket(policy, "state").unwrap(), state);
}

pub fn test_constant_entry_point(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("neg", unary("neg")));
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    let y = graph.define_outputs(root, &["y"]).unwrap()[0];
    graph.add_graph_fn(root, Some(&["x"][..]), &["y"], "neg", None).unwrap();

    graph.connect(ConstantValue::from(3_i64), x).unwrap();
    graph.connect(ConstantValue::from(3_i64), x).unwrap();

    let component = graph.get_component(root).unwrap();
    assert_eq!(component.no_input_entry_points(), &[x]);
    assert!(component.input_complete());
    assert_eq!(ops_of(graph, x), vec![DataOp::constant(3_i64)]);
    assert_eq!(graph.get_socket(x).unwrap().space(), Some(&Space::int(vec![])));
    assert_eq!(graph.observer().calls_of("root/neg"), 1);
    assert_eq!(ops_of(graph, y).len(), 1);
}

pub fn test_graph_fn_added_after_inputs_arrive(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new());
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph.define_outputs(root, &["y"]).unwrap();
    graph.attach_space(x, Space::float(vec![8])).unwrap();
    assert_eq!(graph.observer().calls_of("root/double"), 0);

    graph
        .add_graph_fn_with(root, Some(&["x"][..]), &["y"], "double", None, |call| {
            let x = call.arg(0)?.clone();
            Ok(vec![call.op("add", &[x.clone(), x])?])
        })
        .unwrap();

    assert_eq!(graph.observer().calls_of("root/double"), 1);
    assert!(graph.get_component(root).unwrap().methods().get("double").is_some());
}

pub fn test_socket_space_follows_batch_rank(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new());
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph
        .attach_space(x, Space::float(vec![4]).with_batch_rank(true))
        .unwrap();

    let batched = graph.config().add_batch_rank.unwrap_or(true);
    let handle = ops_of(graph, x)[0].as_symbolic().unwrap();
    let node = graph.executor().get_node(&handle).unwrap();
    assert_eq!(node.space.add_batch_rank, batched);
    assert_eq!(
        graph.get_socket(x).unwrap().space(),
        Some(&Space::float(vec![4]).with_batch_rank(batched))
    );
}

pub fn test_no_input_graph_fn_ignores_component_inputs(graph: &mut TestGraph) {
    let root = graph.add_component(
        "root",
        MethodRegistry::new().register("reset", |_call| Ok(vec![DataOp::constant(0.0)])),
    );
    let input = graph.define_inputs(root, &["input"]).unwrap()[0];
    let reset = graph.define_outputs(root, &["reset"]).unwrap()[0];
    let id = graph.add_graph_fn(root, None, &["reset"], "reset", None).unwrap();

    assert!(!graph.get_graph_fn(id).unwrap().has_inputs());
    assert!(graph.get_graph_fn(id).unwrap().input_complete());
    assert_eq!(graph.observer().calls_of("root/reset"), 1);
    assert_eq!(ops_of(graph, reset), vec![DataOp::constant(0.0)]);

    graph.attach_space(input, Space::float(vec![2])).unwrap();
    assert_eq!(graph.observer().calls_of("root/reset"), 1);
}

pub fn test_disconnect_constant_drops_entry_point(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new());
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    graph.connect(ConstantValue::from(1.0), x).unwrap();
    assert_eq!(graph.get_component(root).unwrap().no_input_entry_points(), &[x]);

    assert!(graph.disconnect(ConstantValue::from(1.0), x).unwrap());
    assert!(graph.get_component(root).unwrap().no_input_entry_points().is_empty());
    assert!(graph.get_socket(x).unwrap().incoming_connections().is_empty());
    assert_eq!(ops_of(graph, x), vec![DataOp::constant(1.0)]);
    assert!(!graph.disconnect(ConstantValue::from(1.0), x).unwrap());
}

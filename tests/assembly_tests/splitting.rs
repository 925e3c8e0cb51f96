use component_graph::{
    AssemblyError, DataOp, FlattenMode, FlattenedDataOp, GraphFnOptions, MethodRegistry, Space,
};
use super::{nary, ops_of, placeholder_of, TestGraph};

fn pair_space(second: &str) -> Space {
    Space::dict([("a", Space::float(vec![2])), (second, Space::float(vec![2]))]).unwrap()
}

pub fn test_split_over_matching_containers(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("add3", nary("add3")));
    let &[x, y, z] = &graph.define_inputs(root, &["x", "y", "z"]).unwrap()[..] else {
        panic!("expected three sockets");
    };
    let out = graph.define_outputs(root, &["out"]).unwrap()[0];
    graph
        .add_graph_fn(
            root,
            Some(&["x", "y", "z"][..]),
            &["out"],
            "add3",
            Some(GraphFnOptions::default().with_auto_key(true)),
        )
        .unwrap();

    graph.attach_space(x, pair_space("b")).unwrap();
    graph.attach_space(y, pair_space("b")).unwrap();
    graph.attach_space(z, Space::float(vec![])).unwrap();

    assert_eq!(graph.observer().calls_of("root/add3"), 2);
    assert_eq!(
        graph.observer().keys_of("root/add3"),
        vec![Some("/a".to_string()), Some("/b".to_string())]
    );

    let results = ops_of(graph, out);
    assert_eq!(results.len(), 1);
    let DataOp::Dict(items) = &results[0] else {
        panic!("expected a dict result, got {}", results[0]);
    };
    assert_eq!(items.keys().collect::<Vec<_>>(), vec!["a", "b"]);

    let z_op = placeholder_of(graph, z).as_symbolic().unwrap();
    for op in items.values() {
        let node = graph.executor().get_node(&op.as_symbolic().unwrap()).unwrap();
        assert_eq!(node.inputs.len(), 3);
        assert_eq!(node.inputs[2], z_op);
    }
}

pub fn test_structural_mismatch_names_keys(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("add", nary("add")));
    let &[x, y] = &graph.define_inputs(root, &["x", "y"]).unwrap()[..] else {
        panic!("expected two sockets");
    };
    graph.define_outputs(root, &["out"]).unwrap();
    graph.add_graph_fn(root, Some(&["x", "y"][..]), &["out"], "add", None).unwrap();

    graph.attach_space(x, pair_space("b")).unwrap();
    let err = graph.attach_space(y, pair_space("c")).unwrap_err();
    match err {
        AssemblyError::StructuralMismatch {
            graph_fn,
            key,
            other_key,
        } => {
            assert_eq!(graph_fn, "root/add");
            assert_eq!(key, "/b");
            assert_eq!(other_key, "/c");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(graph.observer().calls_of("root/add"), 0);
}

pub fn test_split_over_tuples(graph: &mut TestGraph) {
    let root = graph.add_component("root", MethodRegistry::new().register("relu", nary("relu")));
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    let out = graph.define_outputs(root, &["out"]).unwrap()[0];
    graph
        .add_graph_fn(root, Some(&["x"][..]), &["out"], "relu", Some(GraphFnOptions::default().with_auto_key(true)))
        .unwrap();
    graph
        .attach_space(x, Space::tuple([Space::float(vec![3]), Space::float(vec![5])]))
        .unwrap();

    assert_eq!(
        graph.observer().keys_of("root/relu"),
        vec![Some("/_T0_".to_string()), Some("/_T1_".to_string())]
    );
    assert!(matches!(&ops_of(graph, out)[0], DataOp::Tuple(items) if items.len() == 2));
}

pub fn test_flatten_selected_sockets(graph: &mut TestGraph) {
    let root = graph.add_component(
        "root",
        MethodRegistry::new().register("gather", |call| {
            anyhow::ensure!(matches!(call.arg(1)?, DataOp::Dict(_)), "config argument was flattened");
            let x = call.arg(0)?.clone();
            Ok(vec![call.op("gather", &[x])?])
        }),
    );
    let &[x, cfg] = &graph.define_inputs(root, &["x", "cfg"]).unwrap()[..] else {
        panic!("expected two sockets");
    };
    let out = graph.define_outputs(root, &["out"]).unwrap()[0];
    graph
        .add_graph_fn(
            root,
            Some(&["x", "cfg"][..]),
            &["out"],
            "gather",
            Some(GraphFnOptions::default().with_flatten_sockets(["x"])),
        )
        .unwrap();

    graph.attach_space(cfg, pair_space("b")).unwrap();
    graph.attach_space(x, pair_space("b")).unwrap();

    assert_eq!(graph.observer().calls_of("root/gather"), 2);
    assert!(matches!(&ops_of(graph, out)[0], DataOp::Dict(items) if items.len() == 2));
}

pub fn test_unsplit_call_round_trips_container(graph: &mut TestGraph) {
    let root = graph.add_component(
        "root",
        MethodRegistry::new().register("pass", |call| {
            anyhow::ensure!(call.arg(0)?.as_flattened().is_some(), "expected a flattened argument");
            Ok(vec![call.arg(0)?.clone()])
        }),
    );
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    let out = graph.define_outputs(root, &["out"]).unwrap()[0];
    graph
        .add_graph_fn(root, Some(&["x"][..]), &["out"], "pass", Some(GraphFnOptions::default().with_split(false)))
        .unwrap();
    let space = Space::dict([
        ("pos", Space::float(vec![3])),
        ("flags", Space::tuple([Space::bool(), Space::int(vec![])])),
    ])
    .unwrap();
    graph.attach_space(x, space).unwrap();

    assert_eq!(graph.observer().calls_of("root/pass"), 1);
    assert_eq!(ops_of(graph, out), vec![placeholder_of(graph, x)]);
}

pub fn test_merger_output_is_unflattened(graph: &mut TestGraph) {
    let root = graph.add_component(
        "root",
        MethodRegistry::new().register("merge", |call| {
            let merged: FlattenedDataOp = [("/a", call.arg(0)?.clone()), ("/b", call.arg(1)?.clone())]
                .into_iter()
                .collect();
            Ok(vec![DataOp::Flattened(merged)])
        }),
    );
    let &[a, b] = &graph.define_inputs(root, &["a", "b"]).unwrap()[..] else {
        panic!("expected two sockets");
    };
    let out = graph.define_outputs(root, &["merged"]).unwrap()[0];
    graph.add_graph_fn(root, Some(&["a", "b"][..]), &["merged"], "merge", None).unwrap();
    graph.attach_space(a, Space::float(vec![])).unwrap();
    graph.attach_space(b, Space::int(vec![])).unwrap();

    let expected = DataOp::dict([("a", placeholder_of(graph, a)), ("b", placeholder_of(graph, b))]);
    assert_eq!(ops_of(graph, out), vec![expected]);
    assert_eq!(
        graph.get_socket(out).unwrap().space(),
        Some(&Space::dict([("a", Space::float(vec![])), ("b", Space::int(vec![]))]).unwrap().with_batch_rank(
            graph.config().add_batch_rank.unwrap_or(false)
        ))
    );
}

pub fn test_splitter_outputs(graph: &mut TestGraph) {
    let root = graph.add_component(
        "root",
        MethodRegistry::new().register("split", |call| match call.arg(0)? {
            DataOp::Dict(items) => Ok(items.values().cloned().collect()),
            other => anyhow::bail!("expected a dict, got {other}"),
        }),
    );
    let x = graph.define_inputs(root, &["x"]).unwrap()[0];
    let &[a, b] = &graph.define_outputs(root, &["a", "b"]).unwrap()[..] else {
        panic!("expected two sockets");
    };
    graph
        .add_graph_fn(
            root,
            Some(&["x"][..]),
            &["a", "b"],
            "split",
            Some(GraphFnOptions::default().with_flatten(FlattenMode::Off)),
        )
        .unwrap();
    graph.attach_space(x, pair_space("b")).unwrap();

    let DataOp::Dict(items) = placeholder_of(graph, x) else {
        panic!("expected a dict placeholder");
    };
    assert_eq!(ops_of(graph, a), vec![items["a"].clone()]);
    assert_eq!(ops_of(graph, b), vec![items["b"].clone()]);
}

use approx::assert_relative_eq;

use super::*;
use crate::component::Exec;
use crate::error::{BoxError, Interrupted};
use crate::io::VarDecl;
use crate::FnComponent;

/// `c = a + b` and `d = a - b`.
fn simple() -> impl Component {
    FnComponent::new(
        [
            VarDecl::input("a", 1.0),
            VarDecl::input("b", 2.0),
            VarDecl::output("c", 0.0),
            VarDecl::output("d", 0.0),
        ],
        |exec| {
            let a = exec.get_f64("a")?;
            let b = exec.get_f64("b")?;
            exec.set("c", a + b)?;
            exec.set("d", a - b)?;
            Ok(())
        },
    )
}

/// `y = factor * x`.
fn scale(factor: f64) -> impl Component {
    FnComponent::new(
        [VarDecl::input("x", 1.0), VarDecl::output("y", 0.0)],
        move |exec| {
            let x = exec.get_f64("x")?;
            exec.set("y", factor * x)?;
            Ok(())
        },
    )
}

fn f64_at(top: &Assembly, path: &str) -> f64 {
    top.get(path).unwrap().as_f64().unwrap()
}

fn valid(top: &Assembly, paths: &[&str]) -> Vec<bool> {
    paths.iter().map(|p| top.get_valid(p).unwrap()).collect()
}

fn pair() -> Assembly {
    let mut top = Assembly::new();
    top.add("comp1", simple()).unwrap();
    top.add("comp2", simple()).unwrap();
    top.connect("comp1.c", "comp2.a").unwrap();
    top.connect("comp1.d", "comp2.b").unwrap();
    top
}

fn chain() -> Assembly {
    let mut top = Assembly::new();
    for name in ["comp1", "comp2", "comp3"] {
        top.add(name, scale(2.0)).unwrap();
    }
    top.connect("comp1.y", "comp2.x").unwrap();
    top.connect("comp2.y", "comp3.x").unwrap();
    top
}

#[test]
fn connected_inputs_start_invalid_and_run_validates() {
    let mut top = pair();
    assert_eq!(
        valid(&top, &["comp1.a", "comp1.c", "comp2.a", "comp2.b", "comp2.c"]),
        [true, false, false, false, false]
    );

    top.run().unwrap();

    assert_eq!(
        valid(&top, &["comp1.c", "comp1.d", "comp2.a", "comp2.b", "comp2.c", "comp2.d"]),
        [true; 6]
    );
    assert_relative_eq!(f64_at(&top, "comp1.c"), 3.0);
    assert_relative_eq!(f64_at(&top, "comp1.d"), -1.0);
    assert_relative_eq!(f64_at(&top, "comp2.c"), 2.0);
    assert_relative_eq!(f64_at(&top, "comp2.d"), 4.0);
}

#[test]
fn setting_an_input_invalidates_downstream() {
    let mut top = pair();
    top.run().unwrap();

    top.set("comp1.a", 5.0).unwrap();
    assert_eq!(
        valid(&top, &["comp1.a", "comp1.b", "comp1.c", "comp1.d"]),
        [true, true, false, false]
    );
    assert_eq!(
        valid(&top, &["comp2.a", "comp2.b", "comp2.c", "comp2.d"]),
        [false; 4]
    );

    top.run().unwrap();
    assert_relative_eq!(f64_at(&top, "comp2.c"), 10.0);
    assert_relative_eq!(f64_at(&top, "comp2.d"), 4.0);
}

#[test]
fn unchanged_model_does_not_rerun() {
    let mut top = chain();
    top.run().unwrap();
    top.run().unwrap();
    assert_eq!(top.runs(), 2);
    for name in ["comp1", "comp2", "comp3"] {
        assert_eq!(top.run_count(name).unwrap(), 1);
    }

    top.set("comp1.x", 3.0).unwrap();
    top.run().unwrap();
    assert_eq!(top.run_count("comp1").unwrap(), 2);
    assert_eq!(top.run_count("comp3").unwrap(), 2);
    assert_relative_eq!(f64_at(&top, "comp3.y"), 24.0);
}

#[test]
fn connected_input_cannot_be_set() {
    let mut top = pair();
    let err = top.set("comp2.a", 1.0).unwrap_err();
    assert!(matches!(err, Error::ConnectedInput { .. }));
    assert_eq!(
        err.to_string(),
        "'comp2.a' is already connected to source 'comp1.c' and cannot be directly set"
    );
}

#[test]
fn evaluate_runs_only_what_an_output_needs() {
    let mut top = chain();
    top.set("comp1.x", 3.0).unwrap();

    let y = top.evaluate("comp2.y").unwrap();
    assert_eq!(y.as_f64(), Some(12.0));
    assert_eq!(top.run_count("comp1").unwrap(), 1);
    assert_eq!(top.run_count("comp2").unwrap(), 1);
    assert_eq!(top.run_count("comp3").unwrap(), 0);
    assert!(!top.get_valid("comp3.y").unwrap());

    top.update_outputs(&["comp3.y"]).unwrap();
    assert_relative_eq!(f64_at(&top, "comp3.y"), 24.0);
    assert_eq!(top.run_count("comp2").unwrap(), 1);
}

#[test]
fn invalidation_does_not_depend_on_insertion_order() {
    let mut top = Assembly::new();
    top.add("last", scale(1.0)).unwrap();
    top.add("first", scale(1.0)).unwrap();
    top.add("middle", scale(1.0)).unwrap();
    top.connect("first.y", "middle.x").unwrap();
    top.connect("middle.y", "last.x").unwrap();
    top.run().unwrap();
    assert_eq!(top.run_count("last").unwrap(), 1);

    top.set("first.x", 4.0).unwrap();
    assert_eq!(valid(&top, &["middle.x", "last.x", "last.y"]), [false; 3]);
    top.run().unwrap();
    assert_relative_eq!(f64_at(&top, "last.y"), 4.0);
    assert_eq!(top.run_count("last").unwrap(), 2);
}

#[test]
fn cycles_are_rejected() {
    let mut top = chain();
    let err = top.connect("comp3.y", "comp1.x").unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Circular { .. })));
    assert_eq!(
        err.to_string(),
        "circular dependency (comp1, comp2, comp3) would be created by connecting 'comp3.y' to 'comp1.x'"
    );
    assert_eq!(top.connections().len(), 2);
}

#[test]
fn malformed_connections_are_rejected() {
    let mut top = pair();
    top.add("flag", FnComponent::new([VarDecl::output("on", true)], |_: &mut Exec<'_>| Ok(())))
        .unwrap();

    let config = |result: Result<(), Error>| match result {
        Err(Error::Config(err)) => err,
        other => panic!("expected a configuration error, got {other:?}"),
    };

    assert!(matches!(
        config(top.connect("comp1.c", "comp1.a")),
        ConfigError::SameComponent { .. }
    ));
    assert!(matches!(
        config(top.connect("comp2.a", "comp1.a")),
        ConfigError::NotASource { .. }
    ));
    assert!(matches!(
        config(top.connect("comp2.c", "comp1.d")),
        ConfigError::NotADestination { .. }
    ));
    assert_eq!(
        config(top.connect("comp1.d", "comp2.a")),
        ConfigError::AlreadyConnected {
            path: "comp2.a".into(),
            from: "comp1.c".into(),
        }
    );
    assert!(matches!(
        config(top.connect("flag.on", "comp1.a")),
        ConfigError::Incompatible { .. }
    ));
    assert!(matches!(
        config(top.connect("comp1.nope", "comp2.a")),
        ConfigError::Unresolvable { .. }
    ));
}

#[test]
fn disconnect_restores_inputs() {
    let mut top = pair();
    top.disconnect("comp2.a", Some("comp1.c")).unwrap();
    assert!(top.get_valid("comp2.a").unwrap());
    assert!(!top.get_valid("comp2.b").unwrap());
    top.set("comp2.a", 7.0).unwrap();

    let err = top.disconnect("comp2.a", Some("comp1.c")).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::NotConnected { .. })));

    top.disconnect("comp1", None).unwrap();
    assert!(top.connections().is_empty());
    assert!(top.get_valid("comp2.b").unwrap());
}

#[test]
fn removing_a_child_drops_its_connections() {
    let mut top = chain();
    top.remove("comp2").unwrap();
    assert!(!top.has_child("comp2"));
    assert!(top.connections().is_empty());
    top.set("comp3.x", 1.0).unwrap();
    top.run().unwrap();
    assert_relative_eq!(f64_at(&top, "comp3.y"), 2.0);

    assert!(matches!(
        top.remove("comp2"),
        Err(Error::UnknownComponent { .. })
    ));
}

#[test]
fn names_must_be_unique() {
    let mut top = Assembly::new();
    top.add("comp", scale(1.0)).unwrap();
    top.add_variable(VarDecl::input("x", 0.0)).unwrap();

    let err = top.add("comp", scale(1.0)).unwrap_err();
    assert_eq!(err.to_string(), "'comp' already exists");
    assert!(top.add("x", scale(1.0)).is_err());
    assert!(top.add_variable(VarDecl::output("comp", 0.0)).is_err());
}

fn nested() -> Assembly {
    let mut sub = Assembly::new();
    sub.add("inner", scale(10.0)).unwrap();
    assert_eq!(sub.create_passthrough("inner.x", None).unwrap(), "x");
    assert_eq!(sub.create_passthrough("inner.y", Some("out")).unwrap(), "out");

    let mut top = Assembly::new();
    top.add("source", scale(1.0)).unwrap();
    top.add_assembly("sub", sub).unwrap();
    top.add("sink", scale(1.0)).unwrap();
    top.connect("source.y", "sub.x").unwrap();
    top.connect("sub.out", "sink.x").unwrap();
    top
}

#[test]
fn nested_assemblies_pass_values_through() {
    let mut top = nested();
    top.set("source.x", 2.0).unwrap();
    top.run().unwrap();

    assert_relative_eq!(f64_at(&top, "sub.inner.y"), 20.0);
    assert_relative_eq!(f64_at(&top, "sink.y"), 20.0);
    assert_eq!(top.run_count("sub").unwrap(), 1);
    assert_eq!(top.run_count("sub.inner").unwrap(), 1);

    top.set("source.x", 3.0).unwrap();
    assert_eq!(
        valid(&top, &["sub.x", "sub.inner.x", "sub.inner.y", "sub.out", "sink.x"]),
        [false; 5]
    );

    top.run().unwrap();
    assert_relative_eq!(f64_at(&top, "sink.y"), 30.0);
    assert_eq!(top.run_count("sub.inner").unwrap(), 2);
}

#[test]
fn setting_inside_a_nested_assembly_reaches_the_parent() {
    let mut top = nested();
    top.run().unwrap();

    top.configure("sub", |sub| sub.disconnect("x", None)).unwrap();
    top.set("sub.inner.x", 5.0).unwrap();
    assert!(!top.get_valid("sub.out").unwrap());
    assert!(!top.get_valid("sink.x").unwrap());

    assert_eq!(top.evaluate("sink.y").unwrap().as_f64(), Some(50.0));
}

#[test]
fn passthroughs_are_recorded() {
    let top = nested();
    let Ok(Node::Assembly(sub)) = top.node("sub") else {
        panic!("sub is an assembly");
    };
    let passthroughs: Vec<_> = sub
        .passthroughs()
        .map(|(name, p)| (name.to_owned(), p.target.clone(), p.direction))
        .collect();
    assert_eq!(
        passthroughs,
        vec![
            ("out".to_owned(), "inner.y".to_owned(), Direction::Out),
            ("x".to_owned(), "inner.x".to_owned(), Direction::In),
        ]
    );
}

#[test]
fn unconnected_boundary_outputs_become_valid() {
    let mut top = Assembly::new();
    top.add_variable(VarDecl::output("total", 0.0)).unwrap();
    assert!(!top.get_valid("total").unwrap());
    top.run().unwrap();
    assert!(top.get_valid("total").unwrap());
}

#[test]
fn stop_request_ends_the_run_after_the_current_component() {
    let mut top = chain();
    let mut first = true;
    top.remove("comp2").unwrap();
    top.add(
        "comp2",
        FnComponent::new(
            [VarDecl::input("x", 0.0), VarDecl::output("y", 0.0)],
            move |exec| {
                if first {
                    first = false;
                    exec.request_stop();
                }
                let x = exec.get_f64("x")?;
                exec.set("y", x)?;
                Ok(())
            },
        ),
    )
    .unwrap();
    top.connect("comp1.y", "comp2.x").unwrap();
    top.connect("comp2.y", "comp3.x").unwrap();

    let err = top.run().unwrap_err();
    assert_eq!(err.to_string(), "comp2: stop requested");
    assert_eq!(top.state(), RunState::Stopped);
    assert_eq!(top.run_count("comp2").unwrap(), 1);
    assert_eq!(top.run_count("comp3").unwrap(), 0);

    // A single step resumes with the component after the one that stopped.
    assert_eq!(top.step().unwrap().as_deref(), Some("comp3"));
    assert_eq!(top.run_count("comp1").unwrap(), 1);
    assert_eq!(top.run_count("comp2").unwrap(), 1);
    assert_eq!(top.run_count("comp3").unwrap(), 1);
    assert_eq!(top.step().unwrap(), None);
    assert_eq!(top.state(), RunState::Completed);

    top.run().unwrap();
    assert_eq!(top.run_count("comp3").unwrap(), 1);
}

#[test]
fn step_executes_one_item_at_a_time() {
    let mut top = chain();
    assert_eq!(top.step().unwrap().as_deref(), Some("comp1"));
    assert_eq!(top.state(), RunState::Running);
    assert_eq!(top.step().unwrap().as_deref(), Some("comp2"));
    assert_eq!(top.run_count("comp3").unwrap(), 0);
    assert_eq!(top.step().unwrap().as_deref(), Some("comp3"));
    assert_eq!(top.step().unwrap(), None);
    assert_eq!(top.state(), RunState::Completed);
    assert_relative_eq!(f64_at(&top, "comp3.y"), 8.0);
}

fn failing(cause: fn() -> BoxError) -> impl Component {
    FnComponent::new([VarDecl::input("x", 0.0)], move |_| Err(cause()))
}

#[test]
fn failures_carry_the_component_path() {
    let mut top = Assembly::new();
    top.add("broken", failing(|| "boom".into())).unwrap();

    let err = top.run().unwrap_err();
    assert_eq!(err.to_string(), "broken: execution failed");
    let source = std::error::Error::source(&err).map(ToString::to_string);
    assert_eq!(source.as_deref(), Some("boom"));
    assert_eq!(top.state(), RunState::Error);
}

#[test]
fn interruptions_are_reported_separately() {
    let mut top = Assembly::new();
    top.add("halted", failing(|| Interrupted.into())).unwrap();

    let err = top.run().unwrap_err();
    assert!(matches!(err, Error::Interrupted { ref path } if path == "halted"));
    assert_eq!(top.state(), RunState::Interrupted);
}

#[test]
fn disabled_inputs_block_downstream_execution() {
    let mut top = chain();
    let changed = top.set_enabled("comp1.x", false).unwrap();
    assert!(changed.is_empty());
    assert!(!top.get_enabled("comp2.x").unwrap());
    assert!(!top.get_enabled("comp3.y").unwrap());

    top.run().unwrap();
    for name in ["comp1", "comp2", "comp3"] {
        assert_eq!(top.run_count(name).unwrap(), 0);
    }
    assert!(matches!(
        top.run_child("comp1"),
        Err(Error::NotReady { .. })
    ));

    top.set_enabled("comp1.x", true).unwrap();
    assert!(top.get_enabled("comp3.y").unwrap());
    top.run().unwrap();
    assert_eq!(top.run_count("comp3").unwrap(), 1);
}

struct Counter {
    calls: usize,
}

impl Component for Counter {
    fn variables(&self) -> Vec<VarDecl> {
        vec![VarDecl::input("x", 0), VarDecl::output("calls", 0)]
    }

    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError> {
        self.calls += 1;
        exec.set("calls", i64::try_from(self.calls)?)?;
        Ok(())
    }
}

#[test]
fn components_can_be_downcast() {
    let mut top = Assembly::new();
    top.add("count", Counter { calls: 0 }).unwrap();
    top.run().unwrap();
    top.set("count.x", 3).unwrap();
    top.run().unwrap();

    assert_eq!(top.component::<Counter>("count").unwrap().calls, 2);
    assert_eq!(top.get("count.calls").unwrap(), &Value::Int(2));
    top.component_mut::<Counter>("count").unwrap().calls = 10;
    assert_eq!(top.component::<Counter>("count").unwrap().calls, 10);
}

#[test]
fn snapshot_captures_structure_and_flags() {
    let mut top = nested();
    top.run().unwrap();
    let snapshot = top.snapshot();

    assert_eq!(snapshot.runs, 1);
    assert_eq!(
        snapshot.children.iter().map(|c| c.kind).collect::<Vec<_>>(),
        [ChildKind::Component, ChildKind::Assembly, ChildKind::Component]
    );
    let inner = snapshot.child("sub.inner").unwrap();
    assert_eq!(inner.runs, 1);
    assert!(inner.variables.iter().all(|v| v.valid));
    assert_eq!(
        snapshot.connections,
        vec![
            ("source.y".to_owned(), "sub.x".to_owned()),
            ("sub.out".to_owned(), "sink.x".to_owned()),
        ]
    );
    let sink_x = &snapshot.child("sink").unwrap().variables[0];
    assert_eq!(sink_x.source.as_deref(), Some("sub.out"));
}

#[test]
fn child_validity_follows_its_outputs() {
    let mut top = pair();
    let outputs_valid = |top: &Assembly, name: &str| {
        top.child_io(name).unwrap().outputs().all(Variable::is_valid)
    };

    assert!(top.is_child_ready("comp1").unwrap());
    assert!(!top.is_child_ready("comp2").unwrap());
    assert!(!top.is_child_valid("comp1").unwrap());

    top.run().unwrap();
    for name in ["comp1", "comp2"] {
        assert!(top.is_child_valid(name).unwrap());
        assert!(!top.is_child_ready(name).unwrap());
    }

    top.set("comp1.a", 5.0).unwrap();
    assert_eq!(
        (top.is_child_valid("comp1").unwrap(), top.is_child_valid("comp2").unwrap()),
        (false, false)
    );
    assert!(top.is_child_ready("comp1").unwrap());
    assert!(!top.is_child_ready("comp2").unwrap());

    top.run().unwrap();
    for name in ["comp1", "comp2"] {
        assert_eq!(top.is_child_valid(name).unwrap(), outputs_valid(&top, name));
        assert!(top.is_child_valid(name).unwrap());
    }

    let err = top.is_child_valid("comp9").unwrap_err();
    assert!(matches!(err, Error::UnknownComponent { .. }));
}

#[test]
fn mismatched_output_kind_fails_the_writer() {
    let mut top = Assembly::new();
    top.add(
        "src",
        FnComponent::new([VarDecl::output("y", 0.0)], |exec| {
            exec.set("y", "oops")?;
            Ok(())
        }),
    )
    .unwrap();
    top.add("dst", scale(2.0)).unwrap();
    top.connect("src.y", "dst.x").unwrap();

    match top.run().unwrap_err() {
        Error::Execution { path, cause } => {
            assert_eq!(path, "src");
            assert_eq!(cause.to_string(), "src.y: not a float");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(top.get("dst.x").unwrap(), &Value::Float(1.0));
    assert_eq!(top.run_count("dst").unwrap(), 0);

    let err = top.set("src.y", true).unwrap_err();
    assert_eq!(err.to_string(), "src.y: not a float");
}

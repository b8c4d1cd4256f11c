use integration_tests::{Binary, ExecLog, Summer, Unary};
use weave_core::{Assembly, Error, Overlap};

fn f64_at(top: &Assembly, path: &str) -> f64 {
    top.get(path).unwrap().as_f64().unwrap()
}

fn order(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|&l| l.to_owned()).collect()
}

fn repeat(prefix: &[&str], body: &[&str], times: usize) -> Vec<String> {
    let mut out = order(prefix);
    for _ in 0..times {
        out.extend(order(body));
    }
    out
}

/// `C1 -> C2 -> C3`, with `D1` iterating `C2` inside `D2`, which spans all three.
fn two_nested(log: &ExecLog) -> Assembly {
    let mut top = Assembly::new();
    top.add("C1", Unary::new("C1", log, |x| x + 1.0)).unwrap();
    top.add("C2", Binary::new("C2", log, |x, y| x + y)).unwrap();
    top.add("C3", Unary::new("C3", log, |x| x + 1.0)).unwrap();
    top.add_driver("D1", Summer::new("D1", log, "C2.y", "C2.f_xy"))
        .unwrap();
    top.add_driver("D2", Summer::new("D2", log, "C1.x", "C3.f_x"))
        .unwrap();

    top.connect("C1.f_x", "C2.x").unwrap();
    top.connect("C2.f_xy", "C3.x").unwrap();
    top
}

#[test]
fn nested_driver_runs_inside_its_parent() {
    let log = ExecLog::new();
    let mut top = two_nested(&log);
    top.set("D1.max_iterations", 2).unwrap();
    top.set("D2.max_iterations", 3).unwrap();
    top.run().unwrap();

    assert_eq!(
        log.take(),
        repeat(&["D2"], &["C1", "D1", "C2", "C2", "C3"], 3)
    );
    assert_eq!(top.run_count("D2").unwrap(), 1);
    assert_eq!(top.run_count("D1").unwrap(), 3);
    assert_eq!(top.run_count("C1").unwrap(), 3);
    assert_eq!(top.run_count("C2").unwrap(), 6);
    assert_eq!(f64_at(&top, "D1.sum"), 3.0 * 2.0);
    assert_eq!(f64_at(&top, "D2.sum"), 4.0 * 3.0);
}

#[test]
fn iteration_sets_list_the_claimed_components() {
    let log = ExecLog::new();
    let mut top = two_nested(&log);
    assert_eq!(top.iteration_set("D1").unwrap(), ["C2"]);
    assert_eq!(top.iteration_set("D2").unwrap(), ["C1", "C2", "C3"]);
    assert!(matches!(
        top.iteration_set("C1"),
        Err(Error::WrongKind { .. })
    ));
    assert!(log.take().is_empty());
}

#[test]
fn unchanged_nested_model_does_nothing() {
    let log = ExecLog::new();
    let mut top = two_nested(&log);
    top.run().unwrap();
    let _ = log.take();

    top.run().unwrap();
    assert!(log.take().is_empty());
    assert_eq!(top.run_count("D2").unwrap(), 1);
}

#[test]
fn changing_an_inner_setting_reruns_the_outer_driver() {
    let log = ExecLog::new();
    let mut top = two_nested(&log);
    top.set("D1.max_iterations", 2).unwrap();
    top.set("D2.max_iterations", 3).unwrap();
    top.run().unwrap();
    let _ = log.take();

    top.set("D1.max_iterations", 5).unwrap();
    top.set("D2.max_iterations", 4).unwrap();
    top.run().unwrap();

    assert_eq!(
        log.take(),
        repeat(
            &["D2"],
            &["C1", "D1", "C2", "C2", "C2", "C2", "C2", "C3"],
            4
        )
    );
    assert_eq!(top.run_count("D2").unwrap(), 2);
    assert_eq!(top.run_count("C2").unwrap(), 6 + 20);
    assert_eq!(f64_at(&top, "D1.sum"), 3.0 * 5.0);
    assert_eq!(f64_at(&top, "D2.sum"), 4.0 * 4.0);
}

#[test]
fn three_levels_of_nesting() {
    let log = ExecLog::new();
    let mut top = Assembly::new();
    top.add("C1", Unary::new("C1", &log, |x| x + 1.0)).unwrap();
    top.add("C2", Binary::new("C2", &log, |x, y| x + y)).unwrap();
    top.add("C3", Binary::new("C3", &log, |x, _| x + 1.0)).unwrap();
    top.add("C4", Unary::new("C4", &log, |x| x + 1.0)).unwrap();
    top.add("C5", Unary::new("C5", &log, |x| x + 1.0)).unwrap();
    top.add_driver("D1", Summer::new("D1", &log, "C3.y", "C3.f_xy"))
        .unwrap();
    top.add_driver("D2", Summer::new("D2", &log, "C2.y", "C4.f_x"))
        .unwrap();
    top.add_driver("D3", Summer::new("D3", &log, "C1.x", "C5.f_x"))
        .unwrap();

    top.connect("C1.f_x", "C2.x").unwrap();
    top.connect("C2.f_xy", "C3.x").unwrap();
    top.connect("C3.f_xy", "C4.x").unwrap();
    top.connect("C4.f_x", "C5.x").unwrap();

    top.set("D1.max_iterations", 2).unwrap();
    top.set("D2.max_iterations", 3).unwrap();
    top.set("D3.max_iterations", 2).unwrap();
    top.run().unwrap();

    let mut inner = Vec::new();
    for _ in 0..3 {
        inner.extend(["C2", "D1", "C3", "C3", "C4"]);
    }
    let mut expected = vec!["D3"];
    for _ in 0..2 {
        expected.extend(["C1", "D2"]);
        expected.extend(&inner);
        expected.push("C5");
    }
    assert_eq!(log.take(), order(&expected));
    assert_eq!(top.run_count("D2").unwrap(), 2);
    assert_eq!(top.run_count("D1").unwrap(), 6);
    assert_eq!(top.run_count("C3").unwrap(), 12);

    top.set("D1.max_iterations", 3).unwrap();
    top.set("D2.max_iterations", 2).unwrap();
    top.set("D3.max_iterations", 1).unwrap();
    top.run().unwrap();

    assert_eq!(
        log.take(),
        order(&[
            "D3", "C1", "D2", "C2", "D1", "C3", "C3", "C3", "C4", "C2", "D1", "C3", "C3", "C3",
            "C4", "C5",
        ])
    );
}

#[test]
fn peer_drivers_run_in_dataflow_order() {
    let log = ExecLog::new();
    let mut top = Assembly::new();
    top.add("C1", Binary::new("C1", &log, |x, _| x + 1.0)).unwrap();
    top.add("C2", Binary::new("C2", &log, |x, y| x + y)).unwrap();
    // Added in reverse so only the connection can put D1 first.
    top.add_driver("D2", Summer::new("D2", &log, "C2.y", "C2.f_xy"))
        .unwrap();
    top.add_driver("D1", Summer::new("D1", &log, "C1.y", "C1.f_xy"))
        .unwrap();
    top.connect("C1.f_xy", "C2.x").unwrap();

    top.set("D1.max_iterations", 2).unwrap();
    top.set("D2.max_iterations", 3).unwrap();
    top.run().unwrap();
    assert_eq!(
        log.take(),
        order(&["D1", "C1", "C1", "D2", "C2", "C2", "C2"])
    );

    top.set("D1.max_iterations", 5).unwrap();
    top.set("D2.max_iterations", 4).unwrap();
    top.run().unwrap();
    assert_eq!(
        log.take(),
        order(&["D1", "C1", "C1", "C1", "C1", "C1", "D2", "C2", "C2", "C2", "C2"])
    );
    assert_eq!(top.run_count("D1").unwrap(), 2);
    assert_eq!(top.run_count("C2").unwrap(), 7);
}

#[test]
fn drivers_over_the_same_component_are_ambiguous() {
    let log = ExecLog::new();
    let mut top = Assembly::new();
    top.add("C1", Unary::new("C1", &log, |x| x + 1.0)).unwrap();
    top.add_driver("D1", Summer::new("D1", &log, "C1.x", "C1.f_x"))
        .unwrap();
    top.add_driver("D2", Summer::new("D2", &log, "C1.x", "C1.f_x"))
        .unwrap();

    let err = top.run().unwrap_err();
    assert_eq!(
        err.to_string(),
        "drivers 'D1' and 'D2' iterate over the same set of components (C1), \
         so their order cannot be determined"
    );
    assert!(log.take().is_empty());
}

#[test]
fn disconnected_components_still_form_one_set() {
    let log = ExecLog::new();
    let mut top = Assembly::new();
    top.add("C1", Unary::new("C1", &log, |x| x + 1.0)).unwrap();
    top.add("C2", Unary::new("C2", &log, |x| x + 1.0)).unwrap();
    top.add_driver("D1", Summer::new("D1", &log, "C1.x", "C2.f_x"))
        .unwrap();
    top.add_driver("D2", Summer::new("D2", &log, "C2.x", "C1.f_x"))
        .unwrap();

    let err = top.run().unwrap_err();
    assert_eq!(
        err.to_string(),
        "drivers 'D1' and 'D2' iterate over the same set of components (C1, C2), \
         so their order cannot be determined"
    );
}

#[test]
fn overlapping_sets_are_ambiguous() {
    let log = ExecLog::new();
    let mut top = Assembly::new();
    for name in ["C1", "C2", "C3"] {
        top.add(name, Unary::new(name, &log, |x| x + 1.0)).unwrap();
    }
    top.add_driver("D1", Summer::new("D1", &log, "C1.x", "C2.f_x"))
        .unwrap();
    top.add_driver("D2", Summer::new("D2", &log, "C2.x", "C3.f_x"))
        .unwrap();
    top.connect("C1.f_x", "C2.x").unwrap();
    top.connect("C2.f_x", "C3.x").unwrap();

    match top.run().unwrap_err() {
        Error::AmbiguousOrder {
            first,
            second,
            components,
            overlap,
        } => {
            assert_eq!((first.as_str(), second.as_str()), ("D1", "D2"));
            assert_eq!(components, ["C2"]);
            assert_eq!(overlap, Overlap::Partial);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn designated_driver_claims_every_component() {
    let log = ExecLog::new();
    let mut top = two_nested(&log);
    top.add("C4", Unary::new("C4", &log, |x| 2.0 * x)).unwrap();
    top.set_driver("D2").unwrap();
    top.run().unwrap();

    let ran = log.take();
    assert_eq!(ran.first().map(String::as_str), Some("D2"));
    assert_eq!(ran.iter().filter(|l| *l == "C4").count(), 1);
    assert_eq!(top.run_count("C4").unwrap(), 1);
}

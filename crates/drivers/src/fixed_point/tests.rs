use approx::assert_relative_eq;
use weave_core::{Assembly, FnComponent, Value, VarDecl};

use super::*;

/// One Babylonian step toward the square root of two.
fn babylon() -> Assembly {
    let mut top = Assembly::new();
    top.add(
        "step",
        FnComponent::new(
            [VarDecl::input("x", 1.0), VarDecl::output("y", 0.0)],
            |exec| {
                let x = exec.get_f64("x")?;
                exec.set("y", 0.5 * (x + 2.0 / x))?;
                Ok(())
            },
        ),
    )
    .unwrap();
    top
}

#[test]
fn converges_to_the_fixed_point() {
    let mut top = babylon();
    let config = Config::new(50, 1e-12).unwrap();
    top.add_driver("solver", FixedPoint::new("step.x", "step.y", config))
        .unwrap();

    top.run().unwrap();

    let solver = top.driver_ref::<FixedPoint>("solver").unwrap();
    assert_eq!(solver.status(), Some(Status::Converged));
    assert!(solver.iters() < 10);
    assert_relative_eq!(
        top.get("step.x").unwrap().as_f64().unwrap(),
        2.0_f64.sqrt(),
        epsilon = 1e-12
    );
    assert_eq!(top.get("solver.converged").unwrap(), &Value::Bool(true));
    assert!(top.get("solver.residual").unwrap().as_f64().unwrap() <= 1e-12);
    assert_eq!(top.run_count("solver").unwrap(), 1);

    // Already converged, so a second run does nothing.
    top.run().unwrap();
    assert_eq!(top.run_count("solver").unwrap(), 1);
}

#[test]
fn stops_at_the_iteration_limit() {
    let mut top = babylon();
    top.add_driver(
        "solver",
        FixedPoint::new("step.x", "step.y", Config::default()),
    )
    .unwrap();
    top.set("solver.max_iterations", 2).unwrap();

    top.run().unwrap();

    let solver = top.driver_ref::<FixedPoint>("solver").unwrap();
    assert_eq!(solver.status(), Some(Status::MaxIters));
    assert_eq!(top.get("solver.iterations").unwrap(), &Value::Int(2));
    assert_eq!(top.get("solver.converged").unwrap(), &Value::Bool(false));
    assert_eq!(top.run_count("step").unwrap(), 2);
}

#[test]
fn changing_a_setting_reruns_the_driver() {
    let mut top = babylon();
    top.add_driver(
        "solver",
        FixedPoint::new("step.x", "step.y", Config::default()),
    )
    .unwrap();
    top.set("solver.max_iterations", 1).unwrap();
    top.run().unwrap();
    assert_eq!(top.run_count("solver").unwrap(), 1);

    top.set("solver.max_iterations", 100).unwrap();
    top.run().unwrap();
    assert_eq!(top.run_count("solver").unwrap(), 2);
    assert_eq!(top.get("solver.converged").unwrap(), &Value::Bool(true));
}

#[test]
fn observer_can_stop_early() {
    let mut top = babylon();
    let observer = |event: &Event| (event.iter == 2).then_some(Action::StopEarly);
    top.add_driver(
        "solver",
        FixedPoint::new("step.x", "step.y", Config::default()).with_observer(observer),
    )
    .unwrap();

    top.run().unwrap();

    assert_eq!(top.get("solver.iterations").unwrap(), &Value::Int(2));
    assert_eq!(top.get("solver.converged").unwrap(), &Value::Bool(false));
}

#[test]
fn invalid_settings_fail_the_run() {
    let mut top = babylon();
    top.add_driver(
        "solver",
        FixedPoint::new("step.x", "step.y", Config::default()),
    )
    .unwrap();
    top.set("solver.tolerance", -1.0).unwrap();

    let err = top.run().unwrap_err();
    assert_eq!(err.to_string(), "solver: execution failed");
    assert_eq!(
        std::error::Error::source(&err).map(ToString::to_string),
        Some("tolerance must be finite and non-negative".to_owned())
    );
}

#[test]
fn config_rejects_bad_values() {
    assert_eq!(Config::new(0, 1e-6), Err(ConfigError::MaxIters));
    assert_eq!(Config::new(10, f64::NAN), Err(ConfigError::Tolerance));
    assert_eq!(Config::default().max_iters(), 100);
}

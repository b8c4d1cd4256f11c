//! # Paraboloid Design of Experiments
//!
//! Evaluates the paraboloid `f_xy = (x - 3)^2 + x*y + (y + 4)^2 - 3` on a
//! full factorial grid over `x, y in [-50, 50]` and prints the best point.
//!
//! ## Running the Demo
//!
//! ```sh
//! RUST_LOG=info cargo run --bin paraboloid_doe
//! ```

use std::error::Error;

use tracing_subscriber::EnvFilter;
use weave_components::Paraboloid;
use weave_core::Assembly;
use weave_drivers::doe::{Doe, FullFactorial};
use weave_drivers::{ListRecorder, Parameters};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut params = Parameters::new();
    params.add("paraboloid.x", -50.0, 50.0)?;
    params.add("paraboloid.y", -50.0, 50.0)?;

    let recorder = ListRecorder::new();
    let doe = Doe::new(params, FullFactorial::new(31)?)
        .with_response("paraboloid.f_xy")
        .with_recorder(recorder.clone());

    let mut top = Assembly::new();
    top.add("paraboloid", Paraboloid)?;
    top.add_driver("driver", doe)?;
    top.set_driver("driver")?;
    top.run()?;

    let cases = recorder.cases();
    let best = cases
        .iter()
        .filter_map(|case| Some((case, case.output("paraboloid.f_xy")?.as_f64()?)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .ok_or("no successful cases")?;

    println!("evaluated {} cases", cases.len());
    for (path, value) in &best.0.inputs {
        println!("  {path} = {value}");
    }
    println!("  f_xy = {:.4}", best.1);
    Ok(())
}

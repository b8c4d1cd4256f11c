//! # Coupled Disciplines
//!
//! Two disciplines exchange a coupling variable:
//!
//! - `d1`: `y1 = z^2 + x - 0.2 * y2`
//! - `d2`: `y2 = sqrt(y1) + z`
//!
//! A fixed-point driver iterates `y2` until both agree, and a second run
//! after changing `z` shows that only the affected work is redone.
//!
//! ## Running the Demo
//!
//! ```sh
//! RUST_LOG=debug cargo run --bin coupled
//! ```

use std::error::Error;

use tracing::info;
use tracing_subscriber::EnvFilter;
use weave_core::{Assembly, FnComponent, VarDecl};
use weave_drivers::fixed_point::{Config, FixedPoint};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut top = Assembly::new();
    top.add(
        "d1",
        FnComponent::new(
            [
                VarDecl::input("x", 1.0),
                VarDecl::input("z", 2.0),
                VarDecl::input("y2", 1.0),
                VarDecl::output("y1", 0.0),
            ],
            |exec| {
                let (x, z, y2) = (exec.get_f64("x")?, exec.get_f64("z")?, exec.get_f64("y2")?);
                exec.set("y1", z * z + x - 0.2 * y2)?;
                Ok(())
            },
        ),
    )?;
    top.add(
        "d2",
        FnComponent::new(
            [
                VarDecl::input("y1", 1.0),
                VarDecl::input("z", 2.0),
                VarDecl::output("y2", 0.0),
            ],
            |exec| {
                let (y1, z) = (exec.get_f64("y1")?, exec.get_f64("z")?);
                exec.set("y2", y1.abs().sqrt() + z)?;
                Ok(())
            },
        ),
    )?;
    top.connect("d1.y1", "d2.y1")?;
    top.connect("z", "d1.z")?;
    top.connect("z", "d2.z")?;

    let config = Config::new(50, 1e-10)?;
    top.add_driver("solver", FixedPoint::new("d1.y2", "d2.y2", config))?;
    top.set_driver("solver")?;

    for z in [2.0, 3.0] {
        top.set("z", z)?;
        top.run()?;
        info!(z, iterations = %top.get("solver.iterations")?, "converged");
        println!(
            "z = {z}: y1 = {}, y2 = {} after {} iterations",
            top.get("d1.y1")?,
            top.get("d2.y2")?,
            top.get("solver.iterations")?,
        );
    }

    top.run()?;
    println!("unchanged rerun executed d1 {} times in total", top.run_count("d1")?);
    Ok(())
}

use weave_core::{BoxError, Component, Exec, VarDecl};

/// `f_xy = (x - 3)^2 + x*y + (y + 4)^2 - 3`.
///
/// The minimum is at `x = 20/3`, `y = -22/3`, where `f_xy = -82/3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Paraboloid;

impl Paraboloid {
    #[must_use]
    pub fn eval(x: f64, y: f64) -> f64 {
        (x - 3.0).powi(2) + x * y + (y + 4.0).powi(2) - 3.0
    }
}

impl Component for Paraboloid {
    fn variables(&self) -> Vec<VarDecl> {
        vec![
            VarDecl::input("x", 0.0),
            VarDecl::input("y", 0.0),
            VarDecl::output("f_xy", 0.0),
        ]
    }

    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError> {
        let x = exec.get_f64("x")?;
        let y = exec.get_f64("y")?;
        exec.set("f_xy", Self::eval(x, y))?;
        Ok(())
    }
}

use weave_core::{BoxError, Component, Exec, VarDecl};

/// `y = slope * x + offset`.
///
/// The coefficients are inputs, so changing either one through the assembly
/// invalidates `y` like any other input.
#[derive(Debug, Clone, Copy)]
pub struct Linear {
    slope: f64,
    offset: f64,
}

impl Linear {
    #[must_use]
    pub fn new(slope: f64, offset: f64) -> Self {
        Self { slope, offset }
    }
}

impl Default for Linear {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl Component for Linear {
    fn variables(&self) -> Vec<VarDecl> {
        vec![
            VarDecl::input("x", 0.0),
            VarDecl::input("slope", self.slope),
            VarDecl::input("offset", self.offset),
            VarDecl::output("y", self.offset),
        ]
    }

    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError> {
        let y = exec.get_f64("slope")? * exec.get_f64("x")? + exec.get_f64("offset")?;
        exec.set("y", y)?;
        Ok(())
    }
}

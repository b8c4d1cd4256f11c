use weave_core::{BoxError, Component, Exec, VarDecl};

/// `sum = a + b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Adder;

impl Component for Adder {
    fn variables(&self) -> Vec<VarDecl> {
        vec![
            VarDecl::input("a", 0.0),
            VarDecl::input("b", 0.0),
            VarDecl::output("sum", 0.0),
        ]
    }

    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError> {
        let sum = exec.get_f64("a")? + exec.get_f64("b")?;
        exec.set("sum", sum)?;
        Ok(())
    }
}

/// `rval_out = rval_in * mult`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiplier;

impl Component for Multiplier {
    fn variables(&self) -> Vec<VarDecl> {
        vec![
            VarDecl::input("rval_in", 4.0),
            VarDecl::input("mult", 1.5),
            VarDecl::output("rval_out", 0.0),
        ]
    }

    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError> {
        let out = exec.get_f64("rval_in")? * exec.get_f64("mult")?;
        exec.set("rval_out", out)?;
        Ok(())
    }
}

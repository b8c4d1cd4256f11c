use crate::component::{Component, Exec};
use crate::error::BoxError;
use crate::io::VarDecl;

/// A component built from a list of variables and a closure.
///
/// # Example
///
/// ```
/// use weave_core::{Assembly, FnComponent, VarDecl};
///
/// let double = FnComponent::new(
///     [VarDecl::input("x", 1.0), VarDecl::output("y", 0.0)],
///     |exec| {
///         let x = exec.get_f64("x")?;
///         exec.set("y", 2.0 * x)?;
///         Ok(())
///     },
/// );
///
/// let mut top = Assembly::new();
/// top.add("double", double).unwrap();
/// top.run().unwrap();
/// assert_eq!(top.get("double.y").unwrap().as_f64(), Some(2.0));
/// ```
pub struct FnComponent<F> {
    variables: Vec<VarDecl>,
    function: F,
}

impl<F> FnComponent<F>
where
    F: FnMut(&mut Exec<'_>) -> Result<(), BoxError> + 'static,
{
    /// Creates a component from its variables and an execute function.
    pub fn new(variables: impl IntoIterator<Item = VarDecl>, function: F) -> Self {
        Self {
            variables: variables.into_iter().collect(),
            function,
        }
    }
}

impl<F> Component for FnComponent<F>
where
    F: FnMut(&mut Exec<'_>) -> Result<(), BoxError> + 'static,
{
    fn variables(&self) -> Vec<VarDecl> {
        self.variables.clone()
    }

    fn execute(&mut self, exec: &mut Exec<'_>) -> Result<(), BoxError> {
        (self.function)(exec)
    }
}

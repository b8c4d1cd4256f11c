use weave_core::Value;

/// One evaluated design point: the inputs applied, the responses read back,
/// the constraints it violates, and an error message if the evaluation failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Case {
    pub inputs: Vec<(String, Value)>,
    pub outputs: Vec<(String, Value)>,
    pub violated: Vec<String>,
    pub msg: Option<String>,
}

impl Case {
    /// Creates a case from the inputs to apply.
    #[must_use]
    pub fn new(inputs: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds an input to apply, builder style.
    #[must_use]
    pub fn with_input(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.push((path.into(), value.into()));
        self
    }

    #[must_use]
    pub fn input(&self, path: &str) -> Option<&Value> {
        lookup(&self.inputs, path)
    }

    #[must_use]
    pub fn output(&self, path: &str) -> Option<&Value> {
        lookup(&self.outputs, path)
    }

    /// Returns `true` if the evaluation succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.msg.is_none()
    }

    /// Returns `true` if the evaluation succeeded and violated no constraint.
    #[must_use]
    pub fn is_feasible(&self) -> bool {
        self.is_ok() && self.violated.is_empty()
    }
}

fn lookup<'a>(pairs: &'a [(String, Value)], path: &str) -> Option<&'a Value> {
    pairs.iter().find(|(p, _)| p == path).map(|(_, v)| v)
}

/// Renders an error and its chain of causes on one line.
pub(crate) fn describe(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

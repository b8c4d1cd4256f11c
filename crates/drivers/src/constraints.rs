use std::fmt;

use thiserror::Error;
use weave_core::{DriverContext, Error, References};

/// Errors from declaring or removing constraints.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("constraint '{expr}' needs an explicit comparator (=, <, >, <=, or >=)")]
    NoComparator { expr: String },

    #[error("constraint '{expr}' has an invalid {side} side")]
    InvalidSide { expr: String, side: &'static str },

    #[error("scaler must be a finite float above 0, got {0}")]
    Scaler(f64),

    #[error("adder must be finite, got {0}")]
    Adder(f64),

    #[error("constraint '{expr}' already exists")]
    Duplicate { expr: String },

    #[error("constraint '{expr}' was not found")]
    NotFound { expr: String },
}

/// How the two sides of a constraint compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    /// Recognized in this order, so `<=` wins over `<` and `=`.
    const SYMBOLS: [(&'static str, Comparator); 6] = [
        (">=", Comparator::Ge),
        ("<=", Comparator::Le),
        ("==", Comparator::Eq),
        (">", Comparator::Gt),
        ("<", Comparator::Lt),
        ("=", Comparator::Eq),
    ];

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }

    /// Returns `true` if `lhs` and `rhs` satisfy the comparison.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Ge => lhs >= rhs,
        }
    }
}

/// One side of a constraint: a variable path or a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Side {
    Path(String),
    Const(f64),
}

impl Side {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(x) = text.parse::<f64>() {
            return x.is_finite().then_some(Side::Const(x));
        }
        let mut parts = text.split('.');
        let valid = parts.all(|part| {
            part.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_alphanumeric() || c == '_')
        });
        valid.then(|| Side::Path(text.to_owned()))
    }

    fn value(&self, ctx: &mut DriverContext<'_>) -> Result<f64, Error> {
        match self {
            Side::Path(path) => ctx.get_f64(path),
            Side::Const(x) => Ok(*x),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Path(path) => f.write_str(path),
            Side::Const(x) => write!(f, "{x}"),
        }
    }
}

/// A comparison between two sides, each shifted by `adder` and then
/// multiplied by `scaler` before comparing.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub lhs: Side,
    pub comparator: Comparator,
    pub rhs: Side,
    scaler: f64,
    adder: f64,
}

/// The scaled sides of an evaluated constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub lhs: f64,
    pub rhs: f64,
    pub comparator: Comparator,
    pub violated: bool,
}

impl Constraint {
    /// Parses an expression such as `comp.y <= 10` or `a.x = b.x`.
    ///
    /// # Errors
    ///
    /// Returns an error if no comparator is present, a side is neither a
    /// variable path nor a number, `scaler` is not above zero, or `adder` is
    /// not finite.
    pub fn parse(expr: &str, scaler: f64, adder: f64) -> Result<Self, ConstraintError> {
        let (lhs, comparator, rhs) = Comparator::SYMBOLS
            .iter()
            .find_map(|&(symbol, comparator)| {
                expr.split_once(symbol).map(|(l, r)| (l, comparator, r))
            })
            .ok_or_else(|| ConstraintError::NoComparator {
                expr: expr.to_owned(),
            })?;

        let side = |text: &str, side| {
            Side::parse(text).ok_or_else(|| ConstraintError::InvalidSide {
                expr: expr.to_owned(),
                side,
            })
        };
        Self::new(side(lhs, "left")?, comparator, side(rhs, "right")?, scaler, adder)
    }

    /// Creates a constraint from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if `scaler` is not above zero or `adder` is not finite.
    pub fn new(
        lhs: Side,
        comparator: Comparator,
        rhs: Side,
        scaler: f64,
        adder: f64,
    ) -> Result<Self, ConstraintError> {
        if !scaler.is_finite() || scaler <= 0.0 {
            return Err(ConstraintError::Scaler(scaler));
        }
        if !adder.is_finite() {
            return Err(ConstraintError::Adder(adder));
        }
        Ok(Self {
            lhs,
            comparator,
            rhs,
            scaler,
            adder,
        })
    }

    #[must_use]
    pub fn is_equality(&self) -> bool {
        self.comparator == Comparator::Eq
    }

    /// Returns the canonical expression, e.g. `comp.y<=10`.
    #[must_use]
    pub fn expr(&self) -> String {
        format!("{}{}{}", self.lhs, self.comparator.symbol(), self.rhs)
    }

    /// Reads both sides and applies the scaling.
    ///
    /// # Errors
    ///
    /// Returns an error if a side cannot be evaluated or is not numeric.
    pub fn evaluate(&self, ctx: &mut DriverContext<'_>) -> Result<Evaluation, Error> {
        let lhs = (self.lhs.value(ctx)? + self.adder) * self.scaler;
        let rhs = (self.rhs.value(ctx)? + self.adder) * self.scaler;
        Ok(Evaluation {
            lhs,
            rhs,
            comparator: self.comparator,
            violated: !self.comparator.holds(lhs, rhs),
        })
    }

    fn paths(&self) -> impl Iterator<Item = &str> {
        [&self.lhs, &self.rhs].into_iter().filter_map(|side| match side {
            Side::Path(path) => Some(path.as_str()),
            Side::Const(_) => None,
        })
    }
}

/// The constraints a driver checks, keyed by their canonical expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    constraints: Vec<Constraint>,
}

impl Constraints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and adds a constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression does not parse, the scaling is
    /// invalid, or an identical constraint already exists.
    pub fn add(&mut self, expr: &str, scaler: f64, adder: f64) -> Result<(), ConstraintError> {
        self.push(Constraint::parse(expr, scaler, adder)?)
    }

    /// Adds an already built constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if an identical constraint already exists.
    pub fn push(&mut self, constraint: Constraint) -> Result<(), ConstraintError> {
        let expr = constraint.expr();
        if self.constraints.iter().any(|c| c.expr() == expr) {
            return Err(ConstraintError::Duplicate { expr });
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Removes a constraint by expression, matched as it would be parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if no constraint matches.
    pub fn remove(&mut self, expr: &str) -> Result<Constraint, ConstraintError> {
        let key = Constraint::parse(expr, 1.0, 0.0).map_or_else(
            |_| expr.chars().filter(|c| !c.is_whitespace()).collect(),
            |c| c.expr(),
        );
        let index = self
            .constraints
            .iter()
            .position(|c| c.expr() == key)
            .ok_or_else(|| ConstraintError::NotFound {
                expr: expr.to_owned(),
            })?;
        Ok(self.constraints.remove(index))
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Returns the canonical expressions, inequalities first.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.ineq().chain(self.eq()).map(Constraint::expr).collect()
    }

    pub fn eq(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_equality())
    }

    pub fn ineq(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| !c.is_equality())
    }

    /// Evaluates the equality constraints in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    pub fn eval_eq(&self, ctx: &mut DriverContext<'_>) -> Result<Vec<Evaluation>, Error> {
        self.eq().map(|c| c.evaluate(ctx)).collect()
    }

    /// Evaluates the inequality constraints in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    pub fn eval_ineq(&self, ctx: &mut DriverContext<'_>) -> Result<Vec<Evaluation>, Error> {
        self.ineq().map(|c| c.evaluate(ctx)).collect()
    }

    /// Returns the expressions of every violated constraint.
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    pub fn violated(&self, ctx: &mut DriverContext<'_>) -> Result<Vec<String>, Error> {
        let mut violated = Vec::new();
        for constraint in &self.constraints {
            if constraint.evaluate(ctx)?.violated {
                violated.push(constraint.expr());
            }
        }
        Ok(violated)
    }

    /// Adds every referenced variable to a driver's read references.
    #[must_use]
    pub fn references(&self, refs: References) -> References {
        self.constraints
            .iter()
            .flat_map(Constraint::paths)
            .fold(refs, |refs, path| {
                if refs.reads().iter().any(|r| r == path) {
                    refs
                } else {
                    refs.read(path)
                }
            })
    }
}

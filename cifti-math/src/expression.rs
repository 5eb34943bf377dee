use std::collections::BTreeMap;

/// A parsed expression, evaluated once per output cell.
///
/// Parsing is left to the caller. The engine only needs the free variable names, in the order
/// their values will be passed to `evaluate`.
///
pub trait Expression {
    fn var_names(&self) -> &[String];

    /// Compute the expression for one cell. `values[i]` is the value of `var_names()[i]`.
    fn evaluate(&self, values: &[f32]) -> f64;

    /// The value of `name` if the expression language reserves it as a named constant, such as
    /// `PI`. Such names can't be bound to input files.
    fn named_constant(&self, _name: &str) -> Option<f64> {
        None
    }
}

/// An `Expression` backed by a plain function.
///
pub struct FnExpression<F> {
    names: Vec<String>,
    function: F,
    constants: BTreeMap<String, f64>,
}

impl<F> FnExpression<F>
where
    F: Fn(&[f32]) -> f64,
{
    pub fn new<S: AsRef<str>>(names: &[S], function: F) -> Self {
        Self {
            names: names.iter().map(|name| String::from(name.as_ref())).collect(),
            function,
            constants: BTreeMap::new(),
        }
    }

    /// Reserve `name` as a named constant.
    pub fn constant<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.constants.insert(name.into(), value);
        self
    }
}

impl<F> Expression for FnExpression<F>
where
    F: Fn(&[f32]) -> f64,
{
    fn var_names(&self) -> &[String] {
        &self.names
    }

    fn evaluate(&self, values: &[f32]) -> f64 {
        (self.function)(values)
    }

    fn named_constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_expression() {
        let expr = FnExpression::new(&["a", "b"], |values| f64::from(values[0] * values[1]))
            .constant("PI", std::f64::consts::PI);
        assert_eq!(expr.var_names(), &[String::from("a"), String::from("b")]);
        assert_eq!(expr.evaluate(&[3.0, 4.0]), 12.0);
        assert_eq!(expr.named_constant("PI"), Some(std::f64::consts::PI));
        assert_eq!(expr.named_constant("a"), None);
    }
}

//! Evaluating an expression at every cell of aligned input matrices.

use std::collections::BTreeSet;
use std::path::Path;

use cifti::{CiftiVersion, MatrixFile, MatrixHeader, ALONG_COLUMN, ALONG_ROW};

use crate::{
    binding::VariableBinding,
    errors::{Error, Result},
    expression::Expression,
    plan::{OutputPlan, PlanInput},
};

/// Evaluates an expression independently at each (row, column) of the output.
///
/// Inputs are bound to the expression's variables by name. At least one input is needed, even
/// if the expression has no variables, because the inputs decide the shape of the output.
///
/// ```ignore
/// let output = CiftiMath::new(expression)
///     .var(VariableBinding::new("a", MatrixFile::open("a.dtseries.nii")?))
///     .var(VariableBinding::new("b", MatrixFile::open("b.dscalar.nii")?).select(1, 1, true)?)
///     .fix_nan(0.0)
///     .write_to("out.dtseries.nii")?;
/// ```
///
pub struct CiftiMath<E> {
    expression: E,
    bindings: Vec<VariableBinding>,
    fix_nan: Option<f32>,
    override_mapping_check: bool,
}

/// One expression variable during streaming
struct VariableStream {
    binding: usize,
    row: Vec<f32>,
    fixed_row: Option<usize>,
    fixed_column: Option<usize>,
}

impl<E> CiftiMath<E>
where
    E: Expression,
{
    pub fn new(expression: E) -> Self {
        Self {
            expression,
            bindings: vec![],
            fix_nan: None,
            override_mapping_check: false,
        }
    }

    pub fn var(mut self, binding: VariableBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Replace NaN results with `value`.
    pub fn fix_nan(mut self, value: f32) -> Self {
        self.fix_nan = Some(value);
        self
    }

    /// Only compare lengths, not mappings, of axes that inputs share without `-select`.
    pub fn override_mapping_check(mut self, enabled: bool) -> Self {
        self.override_mapping_check = enabled;
        self
    }

    /// For each expression variable, the index of the binding that supplies it.
    fn bind(&self) -> Result<Vec<usize>> {
        if self.bindings.is_empty() {
            return Err(Error::NoInputs);
        }

        let var_names = self.expression.var_names();
        let mut bound: Vec<Option<usize>> = vec![None; var_names.len()];
        let mut seen = BTreeSet::new();
        for (index, binding) in self.bindings.iter().enumerate() {
            let name = binding.name();
            if let Some(value) = self.expression.named_constant(name) {
                return Err(Error::NamedConstant {
                    name: name.to_string(),
                    value,
                });
            }
            if !seen.insert(name) {
                return Err(Error::DuplicateVariable(name.to_string()));
            }

            match var_names.iter().position(|var| var == name) {
                Some(position) => bound[position] = Some(index),
                None => {
                    // A lone input with a constant expression only provides the shape
                    if !var_names.is_empty() || self.bindings.len() != 1 {
                        tracing::warn!("variable '{name}' not used in expression");
                    }
                }
            }
        }

        var_names
            .iter()
            .zip(bound)
            .map(|(name, binding)| binding.ok_or_else(|| Error::MissingVariable(name.clone())))
            .collect()
    }

    /// Check the inputs against each other and the expression, and work out the output header.
    ///
    /// No rows are read or written.
    ///
    pub fn plan(&self) -> Result<OutputPlan> {
        self.bind()?;
        self.build_plan()
    }

    fn build_plan(&self) -> Result<OutputPlan> {
        OutputPlan::build(
            self.bindings.iter().map(PlanInput::from),
            self.override_mapping_check,
        )
    }

    /// Write the output as a new file at `path`, in the current header format.
    pub fn write_to<P: AsRef<Path>>(self, path: P) -> Result<MatrixFile> {
        self.write_to_with_version(path, CiftiVersion::V2)
    }

    pub fn write_to_with_version<P: AsRef<Path>>(
        self,
        path: P,
        version: CiftiVersion,
    ) -> Result<MatrixFile> {
        self.evaluate(|header| MatrixFile::create_with_version(path, header, version))
    }

    /// Keep the output in memory.
    pub fn to_memory(self) -> Result<MatrixFile> {
        self.evaluate(MatrixFile::in_memory)
    }

    /// Plan the output, create it with `create_output`, then stream every row through the
    /// expression.
    ///
    /// Nothing is created if validation fails. If reading or writing fails part way, the
    /// output is left partially written.
    ///
    pub fn evaluate<F>(self, create_output: F) -> Result<MatrixFile>
    where
        F: FnOnce(MatrixHeader) -> cifti::Result<MatrixFile>,
    {
        let used = self.bind()?;
        let plan = self.build_plan()?;
        let (rows, cols) = plan.matrix_shape()?;

        let Self {
            expression,
            mut bindings,
            fix_nan,
            ..
        } = self;

        let mut output = create_output(plan.into_header())?;
        tracing::debug!(rows, cols, variables = used.len(), "evaluating expression");

        let mut streams = Vec::with_capacity(used.len());
        for binding in used {
            let input = &mut bindings[binding];
            let selection = input.selection();
            let mut stream = VariableStream {
                binding,
                row: vec![0.0; input.file().column_count()],
                fixed_row: selection.fixed_index(ALONG_COLUMN),
                fixed_column: selection.fixed_index(ALONG_ROW),
            };
            if let Some(row) = stream.fixed_row {
                input.file_mut().read_row(row, &mut stream.row)?;
            }
            streams.push(stream);
        }

        let mut values = vec![0.0; streams.len()];
        let mut scratch = vec![0.0; cols];
        for row in 0..rows {
            for stream in &mut streams {
                if stream.fixed_row.is_none() {
                    bindings[stream.binding]
                        .file_mut()
                        .read_row(row, &mut stream.row)?;
                }
            }
            for (col, cell) in scratch.iter_mut().enumerate() {
                for (value, stream) in values.iter_mut().zip(&streams) {
                    *value = stream.row[stream.fixed_column.unwrap_or(col)];
                }
                let result = expression.evaluate(&values) as f32;
                *cell = match fix_nan {
                    Some(replacement) if result.is_nan() => replacement,
                    _ => result,
                };
            }
            output.write_row(row, &scratch)?;
        }
        output.flush()?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::FnExpression;
    use crate::testing::{capture_warnings, dense_file, row_file, scalar_header};
    use cifti::{DimensionMap, ScalarsMap};
    use ndarray::{arr2, Array2};
    use tempfile::tempdir;

    fn sum(names: &[&str]) -> FnExpression<impl Fn(&[f32]) -> f64> {
        FnExpression::new(names, |values: &[f32]| {
            values.iter().map(|&value| f64::from(value)).sum()
        })
    }

    fn identity(name: &str) -> FnExpression<impl Fn(&[f32]) -> f64> {
        FnExpression::new(&[name], |values: &[f32]| f64::from(values[0]))
    }

    #[test]
    fn test_add_rows() -> Result<()> {
        let a = row_file(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = row_file(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let mut output = CiftiMath::new(sum(&["A", "B"]))
            .var(VariableBinding::new("A", a))
            .var(VariableBinding::new("B", b))
            .to_memory()?;

        assert_eq!(output.to_array()?, arr2(&[[11.0, 22.0, 33.0, 44.0, 55.0]]));

        Ok(())
    }

    #[test]
    fn test_identity_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("source.dtseries.nii");
        let target = dir.path().join("target.dtseries.nii");
        let data = Array2::from_shape_fn((4, 6), |(row, col)| (row * 6 + col) as f32 / 3.0);
        {
            let mut input = dense_file(data.clone());
            let mut file = MatrixFile::create(&source, input.header().clone())?;
            for row in 0..4 {
                let mut values = vec![0.0; 6];
                input.read_row(row, &mut values)?;
                file.write_row(row, &values)?;
            }
        }

        let input = MatrixFile::open(&source)?;
        let header = input.header().clone();
        CiftiMath::new(identity("x"))
            .var(VariableBinding::new("x", input))
            .write_to(&target)?;

        assert_eq!(std::fs::read(&source)?, std::fs::read(&target)?);
        let mut output = MatrixFile::open(&target)?;
        assert_eq!(output.header(), &header);
        assert_eq!(output.to_array()?, data);

        Ok(())
    }

    #[test]
    fn test_select_collapses_columns() -> Result<()> {
        let data = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let mut output = CiftiMath::new(identity("x"))
            .var(VariableBinding::new("x", dense_file(data)).select(1, 2, false)?)
            .to_memory()?;

        assert_eq!(output.header().dimensions(), vec![Some(1), Some(2)]);
        assert_eq!(output.header().map(0), Some(&DimensionMap::degenerate()));
        assert_eq!(output.to_array()?, arr2(&[[2.0], [5.0]]));

        Ok(())
    }

    #[test]
    fn test_repeat_keeps_length() -> Result<()> {
        let data = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let column = arr2(&[[100.0], [200.0]]);
        let mut output = CiftiMath::new(sum(&["x", "c"]))
            .var(VariableBinding::new("c", dense_file(column)).select(1, 1, true)?)
            .var(VariableBinding::new("x", dense_file(data)))
            .to_memory()?;

        assert_eq!(output.header().dimensions(), vec![Some(3), Some(2)]);
        assert_eq!(
            output.to_array()?,
            arr2(&[[101.0, 102.0, 103.0], [204.0, 205.0, 206.0]])
        );

        Ok(())
    }

    #[test]
    fn test_selected_row_with_single_row() -> Result<()> {
        let three = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        let mut output = CiftiMath::new(sum(&["t", "o"]))
            .var(VariableBinding::new("t", dense_file(three)).select(2, 1, false)?)
            .var(VariableBinding::new("o", dense_file(arr2(&[[10.0, 20.0, 30.0]]))))
            .to_memory()?;

        assert_eq!(output.row_count(), 1);
        assert_eq!(output.to_array()?, arr2(&[[11.0, 22.0, 33.0]]));

        Ok(())
    }

    #[test]
    fn test_select_widened_by_earlier_input() -> Result<()> {
        let data = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let other = arr2(&[[10.0, 20.0], [30.0, 40.0], [50.0, 60.0]]);
        let math = CiftiMath::new(sum(&["a", "b"]))
            .var(VariableBinding::new("a", dense_file(data)))
            .var(VariableBinding::new("b", dense_file(other)).select(2, 3, false)?);
        let (output, logged) = capture_warnings(|| math.to_memory());
        let mut output = output?;

        assert!(logged.contains("WARN"), "nothing logged: {logged}");
        assert!(logged.contains("variable 'b' uses -select for dimension 2 without -repeat"));

        assert_eq!(
            output.to_array()?,
            arr2(&[[51.0, 62.0], [53.0, 64.0], [55.0, 66.0]])
        );

        Ok(())
    }

    #[test]
    fn test_mapping_check() -> Result<()> {
        let a = || row_file(&[1.0, 2.0]);
        let dense = || dense_file(arr2(&[[1.0, 2.0]]));

        let result = CiftiMath::new(sum(&["a", "b"]))
            .var(VariableBinding::new("a", a()))
            .var(VariableBinding::new("b", dense()))
            .to_memory();
        assert!(matches!(result, Err(Error::MappingMismatch { dim: 1, .. })));

        let mut output = CiftiMath::new(sum(&["a", "b"]))
            .var(VariableBinding::new("a", a()))
            .var(VariableBinding::new("b", dense()))
            .override_mapping_check(true)
            .to_memory()?;
        assert_eq!(output.header(), a().header());
        assert_eq!(output.to_array()?, arr2(&[[2.0, 4.0]]));

        Ok(())
    }

    #[test]
    fn test_fix_nan() -> Result<()> {
        let divide = || {
            FnExpression::new(&["a", "b"], |values: &[f32]| {
                f64::from(values[0]) / f64::from(values[1])
            })
        };
        let inputs = |math: CiftiMath<_>| {
            math.var(VariableBinding::new("a", row_file(&[0.0, 1.0, 4.0])))
                .var(VariableBinding::new("b", row_file(&[0.0, 0.0, 2.0])))
        };

        let mut output = inputs(CiftiMath::new(divide())).to_memory()?;
        let values = output.to_array()?;
        assert!(values[[0, 0]].is_nan());
        assert_eq!(values[[0, 1]], f32::INFINITY);
        assert_eq!(values[[0, 2]], 2.0);

        let mut output = inputs(CiftiMath::new(divide())).fix_nan(-1.0).to_memory()?;
        assert_eq!(output.to_array()?, arr2(&[[-1.0, f32::INFINITY, 2.0]]));

        Ok(())
    }

    #[test]
    fn test_too_many_dimensions() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.dscalar.nii");
        let result = CiftiMath::new(identity("x"))
            .var(VariableBinding::new("x", row_file(&[1.0])).select(3, 1, false)?)
            .write_to(&path);

        match result {
            Err(error @ Error::OutputAxisCount(3)) => {
                assert!(error.to_string().contains("must have exactly 2 dimensions"));
            }
            _ => panic!("expected an output axis count error"),
        }
        assert!(!path.exists());

        Ok(())
    }

    #[test]
    fn test_constant_expression() -> Result<()> {
        let five = || FnExpression::new(&[] as &[&str], |_: &[f32]| 5.0);
        let (output, logged) = capture_warnings(|| {
            CiftiMath::new(five())
                .var(VariableBinding::new("x", row_file(&[1.0, 2.0])))
                .to_memory()
        });
        assert_eq!(output?.to_array()?, arr2(&[[5.0, 5.0]]));
        assert_eq!(logged, "");

        // A second input makes both of them unused
        let (output, logged) = capture_warnings(|| {
            CiftiMath::new(five())
                .var(VariableBinding::new("x", row_file(&[1.0, 2.0])))
                .var(VariableBinding::new("y", row_file(&[3.0, 4.0])))
                .to_memory()
        });
        output?;
        assert!(logged.contains("variable 'x' not used in expression"));
        assert!(logged.contains("variable 'y' not used in expression"));

        Ok(())
    }

    #[test]
    fn test_unused_variable_is_not_an_error() -> Result<()> {
        let (output, logged) = capture_warnings(|| {
            CiftiMath::new(identity("x"))
                .var(VariableBinding::new("x", row_file(&[1.0, 2.0])))
                .var(VariableBinding::new("y", row_file(&[7.0, 7.0])))
                .to_memory()
        });
        assert_eq!(output?.to_array()?, arr2(&[[1.0, 2.0]]));
        assert!(logged.contains("variable 'y' not used in expression"));
        assert!(!logged.contains("variable 'x'"));

        // A single unused input warns when the expression has variables of its own
        let (result, logged) = capture_warnings(|| {
            CiftiMath::new(identity("x"))
                .var(VariableBinding::new("y", row_file(&[7.0])))
                .plan()
        });
        assert!(matches!(result, Err(Error::MissingVariable(_))));
        assert!(logged.contains("variable 'y' not used in expression"));

        Ok(())
    }

    #[test]
    fn test_configuration_errors() -> Result<()> {
        let result = CiftiMath::new(identity("x")).plan();
        assert!(matches!(result, Err(Error::NoInputs)));

        let result = CiftiMath::new(identity("x"))
            .var(VariableBinding::new("y", row_file(&[1.0])))
            .plan();
        assert!(matches!(result, Err(Error::MissingVariable(name)) if name == "x"));

        let result = CiftiMath::new(identity("x"))
            .var(VariableBinding::new("x", row_file(&[1.0])))
            .var(VariableBinding::new("x", row_file(&[2.0])))
            .plan();
        assert!(matches!(result, Err(Error::DuplicateVariable(name)) if name == "x"));

        let result = CiftiMath::new(identity("x").constant("PI", std::f64::consts::PI))
            .var(VariableBinding::new("PI", row_file(&[1.0])))
            .plan();
        match result {
            Err(error @ Error::NamedConstant { .. }) => {
                assert_eq!(
                    error.to_string(),
                    "'PI' is a named constant equal to 3.141592653589793, please use a different variable name"
                );
            }
            _ => panic!("expected a named constant error"),
        }

        Ok(())
    }

    #[test]
    fn test_plan_doesnt_read() -> Result<()> {
        let math = CiftiMath::new(identity("x")).var(VariableBinding::new(
            "x",
            MatrixFile::in_memory(scalar_header(2, 3))?,
        ));
        let plan = math.plan()?;
        assert_eq!(plan.dimensions(), vec![3, 2]);
        assert_eq!(
            plan.header().map(0),
            Some(&DimensionMap::Scalars(ScalarsMap::named(&[
                "map 0", "map 1", "map 2"
            ])))
        );

        Ok(())
    }
}

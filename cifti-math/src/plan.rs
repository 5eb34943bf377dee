//! Working out the shape and mappings of the output from every input and its selection.

use cifti::{DimensionMap, MatrixHeader, ALONG_COLUMN, ALONG_ROW};

use crate::{
    binding::VariableBinding,
    errors::{Error, Result},
    select::Selection,
};

/// What the planner needs to know about one `-var` option.
#[derive(Clone, Copy, Debug)]
pub struct PlanInput<'a> {
    pub name: &'a str,
    pub header: &'a MatrixHeader,
    pub selection: &'a Selection,
}

impl<'a> From<&'a VariableBinding> for PlanInput<'a> {
    fn from(binding: &'a VariableBinding) -> Self {
        Self {
            name: binding.name(),
            header: binding.file().header(),
            selection: binding.selection(),
        }
    }
}

/// The header of the output, with every axis mapped and every length known.
///
#[derive(Clone, Debug, PartialEq)]
pub struct OutputPlan {
    header: MatrixHeader,
}

impl OutputPlan {
    /// Scan the inputs in declaration order, accumulating the output length and mapping of each
    /// axis.
    ///
    /// The first input that uses every index of an axis decides its length and mapping. Later
    /// inputs that also use every index must agree on length, and unless
    /// `override_mapping_check` is set, their mapping must `approximate_match`. An axis that is
    /// selected without `-repeat` has length 1, unless its length has already been decided by
    /// another input. Axes no input gives a mapping for get a degenerate one.
    ///
    /// Headers with legacy series axes of unknown length borrow the length from the first
    /// input.
    ///
    pub fn build<'a, I>(inputs: I, override_mapping_check: bool) -> Result<Self>
    where
        I: IntoIterator<Item = PlanInput<'a>>,
    {
        let mut header = MatrixHeader::new(0);
        let mut lengths: Vec<Option<usize>> = vec![];
        let mut reference: Option<Vec<usize>> = None;

        for input in inputs {
            let reference = reference.get_or_insert_with(|| {
                input.header.dimensions().into_iter().map_while(|length| length).collect()
            });
            let mut input_header = input.header.clone();
            input_header.resolve_series_lengths(reference);

            let plan_input = PlanInput {
                name: input.name,
                header: &input_header,
                selection: input.selection,
            };
            plan_input.check_selection()?;

            let axes = plan_input
                .selection
                .axis_count()
                .max(input_header.axis_count())
                .max(lengths.len());
            for axis in 0..axes {
                if axis >= lengths.len() {
                    lengths.push(None);
                    header.set_number_of_axes(axis + 1);
                }
                lengths[axis] = plan_input.apply(
                    axis,
                    lengths[axis],
                    &mut header,
                    override_mapping_check,
                )?;
            }
        }
        if reference.is_none() {
            return Err(Error::NoInputs);
        }

        for (axis, length) in lengths.iter().enumerate() {
            if length.is_none() {
                return Err(Error::UnresolvedAxis(axis + 1));
            }
            if header.map(axis).is_none() {
                header.set_map(axis, DimensionMap::degenerate());
            }
        }

        tracing::debug!(dimensions = ?header.dimensions(), "planned output");

        Ok(Self { header })
    }

    pub fn header(&self) -> &MatrixHeader {
        &self.header
    }

    pub fn into_header(self) -> MatrixHeader {
        self.header
    }

    pub fn dimensions(&self) -> Vec<usize> {
        self.header
            .dimensions()
            .into_iter()
            .map(|length| length.unwrap_or(1))
            .collect()
    }

    /// Rows and columns of the output as a matrix file, which can only hold 2 axes.
    pub fn matrix_shape(&self) -> Result<(usize, usize)> {
        let dimensions = self.dimensions();
        if dimensions.len() != 2 {
            return Err(Error::OutputAxisCount(dimensions.len()));
        }

        Ok((dimensions[ALONG_COLUMN], dimensions[ALONG_ROW]))
    }
}

impl<'a> PlanInput<'a> {
    fn length(&self, axis: usize) -> Result<usize> {
        self.header
            .dimension_length(axis)
            .ok_or_else(|| Error::UnknownLength {
                var: self.name.to_string(),
                dim: axis + 1,
            })
    }

    /// Fixed indices must be in range. Axes the file doesn't have can only be selected at
    /// index 0.
    fn check_selection(&self) -> Result<()> {
        for (axis, index) in self.selection.fixed() {
            if axis >= self.header.axis_count() {
                if index != 0 {
                    return Err(Error::SelectNonexistentDimension(self.name.to_string()));
                }
                continue;
            }
            let length = self.length(axis)?;
            if index >= length {
                return Err(Error::SelectOutOfRange {
                    var: self.name.to_string(),
                    dim: axis + 1,
                    index: index + 1,
                    length,
                });
            }
        }

        Ok(())
    }

    /// Fold this input's use of `axis` into the output, returning the new output length.
    fn apply(
        &self,
        axis: usize,
        current: Option<usize>,
        header: &mut MatrixHeader,
        override_mapping_check: bool,
    ) -> Result<Option<usize>> {
        let spec = self.selection.spec(axis);
        let has_axis = axis < self.header.axis_count();

        let Some(expected) = current else {
            return Ok(match spec.index {
                None if has_axis => {
                    let length = self.length(axis)?;
                    if let Some(map) = self.header.map(axis) {
                        header.set_map(axis, map.clone());
                    }
                    Some(length)
                }
                None => Some(1),
                Some(_) if spec.repeat => None,
                Some(_) => Some(1),
            });
        };

        match spec.index {
            None if has_axis => {
                let actual = self.length(axis)?;
                if actual != expected {
                    return Err(Error::LengthMismatch {
                        var: self.name.to_string(),
                        dim: axis + 1,
                        actual,
                        expected,
                    });
                }
                if let Some(map) = self.header.map(axis) {
                    match header.map(axis) {
                        None => header.set_map(axis, map.clone()),
                        Some(current) => {
                            if !override_mapping_check && !current.approximate_match(map) {
                                return Err(Error::MappingMismatch {
                                    var: self.name.to_string(),
                                    dim: axis + 1,
                                });
                            }
                        }
                    }
                }
            }
            None => {
                if expected != 1 {
                    return Err(Error::LowerDimensionality {
                        var: self.name.to_string(),
                        dim: axis + 1,
                        length: expected,
                    });
                }
            }
            Some(_) => {
                if !spec.repeat && expected != 1 {
                    tracing::warn!(
                        "variable '{}' uses -select for dimension {} without -repeat, but \
                         previous -var options require a length of {}, repeating the selected \
                         values",
                        self.name,
                        axis + 1,
                        expected
                    );
                }
            }
        }

        Ok(Some(expected))
    }
}

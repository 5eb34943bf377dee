//! Per variable `-select` options.

/// What a variable uses along one axis: every index, or one fixed index.
///
/// With `repeat` set, the fixed value is used for every output index along the axis, whose
/// length is then left for other variables to decide.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionSpec {
    pub index: Option<usize>,
    pub repeat: bool,
}

impl SelectionSpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn fixed(index: usize, repeat: bool) -> Self {
        Self {
            index: Some(index),
            repeat,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.index.is_some()
    }
}

/// One `SelectionSpec` per axis, 0-based. Axes past the end use every index.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    specs: Vec<SelectionSpec>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of axes up to and including the highest selected one.
    pub fn axis_count(&self) -> usize {
        self.specs.len()
    }

    pub fn spec(&self, axis: usize) -> SelectionSpec {
        self.specs.get(axis).copied().unwrap_or_default()
    }

    pub fn fixed_index(&self, axis: usize) -> Option<usize> {
        self.spec(axis).index
    }

    /// Select `index` on `axis`. Returns `false`, changing nothing, if the axis was already
    /// selected.
    pub fn select(&mut self, axis: usize, index: usize, repeat: bool) -> bool {
        if self.spec(axis).is_selected() {
            return false;
        }
        if axis >= self.specs.len() {
            self.specs.resize(axis + 1, SelectionSpec::all());
        }
        self.specs[axis] = SelectionSpec::fixed(index, repeat);

        true
    }

    /// Selected axes and their fixed indices.
    pub fn fixed(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.specs
            .iter()
            .enumerate()
            .filter_map(|(axis, spec)| spec.index.map(|index| (axis, index)))
    }
}

use cifti::MatrixFile;

use crate::{
    errors::{Error, Result},
    select::Selection,
};

/// An input file bound to a variable name, with its `-select` options.
///
pub struct VariableBinding {
    name: String,
    file: MatrixFile,
    selection: Selection,
}

impl VariableBinding {
    pub fn new<S: Into<String>>(name: S, file: MatrixFile) -> Self {
        Self {
            name: name.into(),
            file,
            selection: Selection::new(),
        }
    }

    /// Use only one index along a dimension.
    ///
    /// `dim` and `index` are 1-based, as on the command line: `select(2, 1, false)` picks the
    /// first row.
    ///
    pub fn select(mut self, dim: usize, index: usize, repeat: bool) -> Result<Self> {
        if dim == 0 || index == 0 {
            return Err(Error::InvalidSelect {
                var: self.name,
                dim,
                index,
            });
        }
        if !self.selection.select(dim - 1, index - 1, repeat) {
            return Err(Error::DuplicateSelect {
                var: self.name,
                dim,
            });
        }

        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &MatrixFile {
        &self.file
    }

    pub(crate) fn file_mut(&mut self) -> &mut MatrixFile {
        &mut self.file
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn into_file(self) -> MatrixFile {
        self.file
    }
}

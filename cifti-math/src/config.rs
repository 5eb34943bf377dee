//! Running an operation described by a TOML document.
//!
//! ```toml
//! expression = "(a - b) / b"
//! output = "change.dscalar.nii"
//! fix_nan = 0.0
//!
//! [[var]]
//! name = "a"
//! path = "after.dscalar.nii"
//!
//! [[var]]
//! name = "b"
//! path = "before.dtseries.nii"
//!
//! [[var.select]]
//! dim = 1
//! index = 1
//! repeat = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use cifti::{CiftiVersion, MatrixFile};
use serde::Deserialize;

use crate::{
    binding::VariableBinding,
    engine::CiftiMath,
    errors::Result,
    expression::Expression,
};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MathConfig {
    /// Expression text, for the caller to parse
    pub expression: String,

    pub output: PathBuf,

    #[serde(default)]
    pub output_version: OutputVersion,

    /// Replace NaN results with this value
    #[serde(default)]
    pub fix_nan: Option<f32>,

    #[serde(default)]
    pub override_mapping_check: bool,

    #[serde(default, rename = "var")]
    pub vars: Vec<VarConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VarConfig {
    pub name: String,
    pub path: PathBuf,

    #[serde(default)]
    pub select: Vec<SelectConfig>,
}

/// 1-based, like `VariableBinding::select`
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SelectConfig {
    pub dim: usize,
    pub index: usize,

    #[serde(default)]
    pub repeat: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum OutputVersion {
    #[serde(rename = "1")]
    V1,

    #[default]
    #[serde(rename = "2")]
    V2,
}

impl From<OutputVersion> for CiftiVersion {
    fn from(version: OutputVersion) -> Self {
        match version {
            OutputVersion::V1 => CiftiVersion::V1,
            OutputVersion::V2 => CiftiVersion::V2,
        }
    }
}

impl MathConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Open every input, evaluate `expression` and write the output file.
    ///
    /// `expression` should be the parsed form of `self.expression`.
    ///
    pub fn run<E: Expression>(&self, expression: E) -> Result<MatrixFile> {
        let mut math =
            CiftiMath::new(expression).override_mapping_check(self.override_mapping_check);
        if let Some(value) = self.fix_nan {
            math = math.fix_nan(value);
        }
        for var in &self.vars {
            let mut binding = VariableBinding::new(&var.name, MatrixFile::open(&var.path)?);
            for select in &var.select {
                binding = binding.select(select.dim, select.index, select.repeat)?;
            }
            math = math.var(binding);
        }

        math.write_to_with_version(&self.output, self.output_version.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::expression::FnExpression;
    use crate::testing::row_file;
    use ndarray::arr2;
    use tempfile::tempdir;

    #[test]
    fn test_parse() -> Result<()> {
        let config = MathConfig::from_toml_str(
            r#"
            expression = "a * 2"
            output = "out.dscalar.nii"
            override_mapping_check = true

            [[var]]
            name = "a"
            path = "a.dscalar.nii"

            [[var.select]]
            dim = 2
            index = 3

            [[var.select]]
            dim = 1
            index = 1
            repeat = true

            [[var]]
            name = "b"
            path = "b.dscalar.nii"
            "#,
        )?;

        assert_eq!(config.expression, "a * 2");
        assert_eq!(config.output, PathBuf::from("out.dscalar.nii"));
        assert_eq!(config.output_version, OutputVersion::V2);
        assert_eq!(config.fix_nan, None);
        assert!(config.override_mapping_check);
        assert_eq!(config.vars.len(), 2);
        assert_eq!(
            config.vars[0].select,
            vec![
                SelectConfig {
                    dim: 2,
                    index: 3,
                    repeat: false
                },
                SelectConfig {
                    dim: 1,
                    index: 1,
                    repeat: true
                },
            ]
        );
        assert!(config.vars[1].select.is_empty());

        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let result = MathConfig::from_toml_str("output = \"out.nii\"");
        assert!(matches!(result, Err(Error::Toml(_))));

        let result = MathConfig::from_toml_str(
            "expression = \"x\"\noutput = \"out.nii\"\noutput_version = \"3\"",
        );
        assert!(matches!(result, Err(Error::Toml(_))));

        let result = MathConfig::from_toml_str(
            "expression = \"x\"\noutput = \"out.nii\"\nfixnan = 1.0",
        );
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_load_missing() {
        let dir = tempdir().expect("temp dir");
        let result = MathConfig::load(dir.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::IO(_))));
    }

    #[test]
    fn test_run() -> Result<()> {
        let dir = tempdir()?;
        let a = dir.path().join("a.dscalar.nii");
        let b = dir.path().join("b.dscalar.nii");
        for (path, values) in [(&a, [1.0, 2.0, 3.0]), (&b, [10.0, f32::NAN, 30.0])] {
            let mut file = MatrixFile::create(path, row_file(&values).header().clone())?;
            file.write_row(0, &values)?;
        }

        let text = format!(
            r#"
            expression = "a + b"
            output = "{output}"
            output_version = "1"
            fix_nan = -5.0

            [[var]]
            name = "a"
            path = "{a}"

            [[var]]
            name = "b"
            path = "{b}"

            [[var.select]]
            dim = 1
            index = 3
            repeat = true
            "#,
            output = dir.path().join("sum.dscalar.nii").display(),
            a = a.display(),
            b = b.display(),
        );
        let config_path = dir.path().join("math.toml");
        fs::write(&config_path, text)?;

        let config = MathConfig::load(&config_path)?;
        let expression = FnExpression::new(&["a", "b"], |values: &[f32]| {
            f64::from(values[0]) + f64::from(values[1])
        });
        config.run(expression)?;

        let mut output = MatrixFile::open(&config.output)?;
        assert_eq!(output.to_array()?, arr2(&[[31.0, 32.0, 33.0]]));

        // NaN in the unselected part of b never reaches the output; select it to see fix_nan
        let config = MathConfig {
            vars: vec![
                config.vars[0].clone(),
                VarConfig {
                    select: vec![SelectConfig {
                        dim: 1,
                        index: 2,
                        repeat: true,
                    }],
                    ..config.vars[1].clone()
                },
            ],
            ..config
        };
        let expression = FnExpression::new(&["a", "b"], |values: &[f32]| {
            f64::from(values[0]) + f64::from(values[1])
        });
        config.run(expression)?;
        let mut output = MatrixFile::open(&config.output)?;
        assert_eq!(output.to_array()?, arr2(&[[-5.0, -5.0, -5.0]]));

        Ok(())
    }
}

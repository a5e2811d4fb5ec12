//! Legislative parameters.
//!
//! Parameters are the year-scoped constants of the legislation: thresholds, weights, caps and
//! scales. Each one is identified by a dotted path (e.g.
//! `dotation_solidarite_rurale.seuil_nombre_habitants`) and has a history of values, each in force
//! from a given date. Formulas only ever see the value in force on the first day of the period
//! they are evaluated for.
use crate::error::EvaluationError;
use crate::input::{input_err_msg, read_toml};
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// The legislation parameters bundled with the crate
const LEGISLATION_TOML: &str = include_str!("../data/parameters.toml");

/// One breakpoint of a [`Scale`]
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bracket {
    /// Upper bound (exclusive) of the inputs this bracket applies to
    pub threshold: f64,
    /// The value for inputs below the threshold
    pub value: f64,
}

/// A piecewise-constant scale ("barème") mapping an input to a value.
///
/// Brackets are ordered by strictly increasing threshold. An input takes the value of the first
/// bracket whose threshold exceeds it, or of the last bracket when none does.
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    brackets: Vec<Bracket>,
}

impl Scale {
    /// Create a scale, checking that it has brackets and that thresholds increase
    pub fn new(brackets: Vec<Bracket>) -> Result<Self> {
        ensure!(!brackets.is_empty(), "A scale must have at least one bracket");
        ensure!(
            brackets.windows(2).all(|w| w[0].threshold < w[1].threshold),
            "Scale thresholds must be strictly increasing"
        );

        Ok(Self { brackets })
    }

    /// The brackets of this scale
    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    /// The value for a single input
    pub fn calc_one(&self, x: f64) -> f64 {
        let idx = self.brackets.partition_point(|b| b.threshold <= x);
        self.brackets
            .get(idx)
            .or(self.brackets.last())
            .map_or(0.0, |b| b.value)
    }

    /// Map each input through the scale
    pub fn calc(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&x| self.calc_one(x)).collect()
    }
}

/// The value of a parameter at a given date
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// A single number
    Scalar(f64),
    /// A piecewise scale
    Scale(Scale),
}

/// Looks up the value of a parameter in force on a date
pub trait ParameterResolver {
    /// Get the version of the parameter at `path` in force on `as_of`
    fn resolve(&self, path: &str, as_of: NaiveDate) -> Result<ParameterValue, EvaluationError>;
}

/// The dated history of one parameter, ordered by date
type History = Vec<(NaiveDate, ParameterValue)>;

/// An in-memory tree of parameters, addressed by dotted paths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTree {
    parameters: IndexMap<String, History>,
}

/// A leaf of the parameter TOML file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterNode {
    #[allow(dead_code)]
    description: Option<String>,
    values: Option<IndexMap<String, f64>>,
    brackets: Option<IndexMap<String, Vec<Bracket>>>,
}

impl ParameterTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a version of a parameter, in force from `from`.
    ///
    /// A version already present for the same date is replaced.
    pub fn insert(&mut self, path: &str, from: NaiveDate, value: ParameterValue) {
        let history = self.parameters.entry(path.to_string()).or_default();
        match history.binary_search_by_key(&from, |(date, _)| *date) {
            Ok(idx) => history[idx].1 = value,
            Err(idx) => history.insert(idx, (from, value)),
        }
    }

    /// Builder-style version of [`ParameterTree::insert`] for a scalar
    pub fn with_scalar(mut self, path: &str, from: NaiveDate, value: f64) -> Self {
        self.insert(path, from, ParameterValue::Scalar(value));
        self
    }

    /// Whether a parameter with this path exists (at any date)
    pub fn contains(&self, path: &str) -> bool {
        self.parameters.contains_key(path)
    }

    /// Iterate over the paths of all parameters
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    /// Load the legislation parameters bundled with the crate
    pub fn legislation() -> Result<Self> {
        Self::from_toml_str(LEGISLATION_TOML).context("Invalid bundled legislation parameters")
    }

    /// Read parameters from a TOML file
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let table: toml::Table = read_toml(file_path)?;
        Self::from_table(&table).with_context(|| input_err_msg(file_path))
    }

    /// Read parameters from a TOML string.
    ///
    /// Tables nest to form the dotted path. A table with a `values` key is a scalar parameter
    /// (`values = { "2019-01-01" = 10000 }`) and one with a `brackets` key is a scale
    /// (`brackets = { "2019-01-01" = [{ threshold = 100, value = 500 }] }`).
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(toml_str)?;
        Self::from_table(&table)
    }

    fn from_table(table: &toml::Table) -> Result<Self> {
        let mut tree = Self::new();
        tree.add_table("", table)?;
        Ok(tree)
    }

    fn add_table(&mut self, prefix: &str, table: &toml::Table) -> Result<()> {
        for (key, value) in table {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };

            let Some(child) = value.as_table() else {
                bail!("Invalid parameter {path}: expected a table");
            };

            if child.contains_key("values") || child.contains_key("brackets") {
                let node: ParameterNode = value
                    .clone()
                    .try_into()
                    .with_context(|| format!("Invalid parameter {path}"))?;
                self.add_leaf(&path, node)
                    .with_context(|| format!("Invalid parameter {path}"))?;
            } else {
                self.add_table(&path, child)?;
            }
        }

        Ok(())
    }

    fn add_leaf(&mut self, path: &str, node: ParameterNode) -> Result<()> {
        ensure!(
            node.values.is_none() || node.brackets.is_none(),
            "A parameter cannot have both values and brackets"
        );

        for (date, value) in node.values.into_iter().flatten() {
            self.insert(path, parse_date(&date)?, ParameterValue::Scalar(value));
        }
        for (date, brackets) in node.brackets.into_iter().flatten() {
            let scale = Scale::new(brackets)?;
            self.insert(path, parse_date(&date)?, ParameterValue::Scale(scale));
        }

        Ok(())
    }
}

impl ParameterResolver for ParameterTree {
    fn resolve(&self, path: &str, as_of: NaiveDate) -> Result<ParameterValue, EvaluationError> {
        let unknown = || EvaluationError::UnknownParameter {
            path: path.to_string(),
            date: as_of,
        };

        let history = self.parameters.get(path).ok_or_else(unknown)?;
        let idx = history.partition_point(|(date, _)| *date <= as_of);
        if idx == 0 {
            return Err(unknown());
        }

        Ok(history[idx - 1].1.clone())
    }
}

fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").with_context(|| format!("Invalid date: {date}"))
}

//! Variable definitions and the registry which holds them.
//!
//! A variable has a name, a value type, the kind of entity it is defined for and the granularity
//! of the periods it is defined over. It may have formulas, each in force from a given date; a
//! variable without any formula is a raw input.
use crate::entity::EntityKind;
use crate::error::EvaluationError;
use crate::id::VariableID;
use crate::period::{Period, PeriodUnit};
use crate::simulation::Accessor;
use crate::value::ValueType;
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// A function computing the values of a variable for a period.
///
/// The formula receives an accessor through which it can request other variables (at any period)
/// and parameters. It returns one value per member of the variable's entity; a formula for a
/// commune variable may also return a single value, which is given to every commune.
pub type Formula = Rc<dyn Fn(&dyn Accessor, Period) -> Result<Vec<f64>, EvaluationError>>;

/// The definition of a variable
#[derive(Clone)]
pub struct VariableDefinition {
    /// The variable's name
    pub name: VariableID,
    /// The type of its values
    pub value_type: ValueType,
    /// The entity it is defined for
    pub entity: EntityKind,
    /// The granularity of the periods it is defined over
    pub definition_period: PeriodUnit,
    /// Human-readable description
    pub label: Option<String>,
    /// The value used when neither an input nor a formula is available
    pub default_value: f64,
    /// If set, a missing input is an error rather than falling back to the default value
    pub required: bool,
    /// Formulas, ordered by the date from which they are in force
    formulas: Vec<(NaiveDate, Formula)>,
}

impl fmt::Debug for VariableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableDefinition")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("entity", &self.entity)
            .field("definition_period", &self.definition_period)
            .field("label", &self.label)
            .field("default_value", &self.default_value)
            .field("required", &self.required)
            .field(
                "formulas",
                &self.formulas.iter().map(|(date, _)| date).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl VariableDefinition {
    /// Define a new variable with no formula
    pub fn new(
        name: &str,
        value_type: ValueType,
        entity: EntityKind,
        definition_period: PeriodUnit,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            entity,
            definition_period,
            label: None,
            default_value: 0.0,
            required: false,
            formulas: Vec::new(),
        }
    }

    /// Set the label
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Set the default value
    pub fn default_value(mut self, value: f64) -> Self {
        self.default_value = value;
        self
    }

    /// Require an input to be supplied when there is no formula
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Add a formula which is in force at all dates (until superseded by a later one)
    pub fn formula<F>(self, formula: F) -> Self
    where
        F: Fn(&dyn Accessor, Period) -> Result<Vec<f64>, EvaluationError> + 'static,
    {
        self.formula_from(NaiveDate::MIN, formula)
    }

    /// Add a formula in force from the given date.
    ///
    /// A formula already in force from the same date is replaced.
    pub fn formula_from<F>(mut self, from: NaiveDate, formula: F) -> Self
    where
        F: Fn(&dyn Accessor, Period) -> Result<Vec<f64>, EvaluationError> + 'static,
    {
        let formula: Formula = Rc::new(formula);
        match self.formulas.binary_search_by_key(&from, |(date, _)| *date) {
            Ok(idx) => self.formulas[idx].1 = formula,
            Err(idx) => self.formulas.insert(idx, (from, formula)),
        }

        self
    }

    /// Whether the variable has any formula
    pub fn has_formulas(&self) -> bool {
        !self.formulas.is_empty()
    }

    /// The dates from which each formula is in force
    pub fn formula_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.formulas.iter().map(|(date, _)| *date)
    }

    /// The formula in force on `date`: the latest one starting on or before it
    pub fn formula_at(&self, date: NaiveDate) -> Option<&Formula> {
        let idx = self.formulas.partition_point(|(from, _)| *from <= date);
        idx.checked_sub(1).map(|idx| &self.formulas[idx].1)
    }

    /// The period under which values for `period` are stored.
    ///
    /// All periods map to eternity for variables defined for all eternity. Yearly variables can
    /// only be evaluated for single years.
    pub fn normalise_period(&self, period: Period) -> Result<Period, EvaluationError> {
        match self.definition_period {
            PeriodUnit::Eternity => Ok(Period::eternity()),
            PeriodUnit::Year if period.is_whole_year() => Ok(period),
            PeriodUnit::Year => Err(EvaluationError::PeriodMismatch {
                name: self.name.clone(),
                period,
            }),
        }
    }
}

/// All the variables known to a simulation, in registration order
#[derive(Debug, Clone, Default)]
pub struct Registry {
    variables: IndexMap<VariableID, VariableDefinition>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, failing if one with the same name is already registered
    pub fn register(&mut self, definition: VariableDefinition) -> Result<(), EvaluationError> {
        if self.variables.contains_key(&definition.name) {
            return Err(EvaluationError::DuplicateVariable(definition.name));
        }

        self.variables.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Get a variable's definition, if registered
    pub fn get(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.get(name)
    }

    /// Get a variable's definition, failing if it is not registered
    pub fn definition(&self, name: &str) -> Result<&VariableDefinition, EvaluationError> {
        self.get(name)
            .ok_or_else(|| EvaluationError::UnknownVariable(name.into()))
    }

    /// Select the formula in force for `period`, using the date on which the period starts
    pub fn lookup_formula(&self, name: &str, period: Period) -> Result<Formula, EvaluationError> {
        let definition = self.definition(name)?;
        definition
            .formula_at(period.start_date())
            .cloned()
            .ok_or_else(|| EvaluationError::NoApplicableFormula {
                name: definition.name.clone(),
                period,
            })
    }

    /// The number of registered variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether no variable is registered
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate over variable definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.variables.values()
    }
}

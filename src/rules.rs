//! The legislation: every variable of the endowment rules, with their formulas.
//!
//! Variables are grouped by topic: raw inputs, population, fiscal metrics and one module per
//! endowment fraction. [`registry`] gathers them all into a [`Registry`] ready to be given to a
//! simulation, and the matching parameters are loaded with
//! [`ParameterTree::legislation`](crate::parameter::ParameterTree::legislation).
use crate::entity::EntityKind;
use crate::error::EvaluationError;
use crate::period::PeriodUnit;
use crate::value::ValueType;
use crate::variable::{Registry, VariableDefinition};
use chrono::NaiveDate;

mod dsr_bourg_centre;
mod dsr_cible;
mod dsr_perequation;
mod dsu;
mod fiscal;
mod inputs;
mod population;

/// The value returned by formulas
type FormulaResult = Result<Vec<f64>, EvaluationError>;

/// Build the registry of all variables of the legislation
pub fn registry() -> Result<Registry, EvaluationError> {
    let mut registry = Registry::new();
    let definitions = inputs::variables()
        .into_iter()
        .chain(population::variables())
        .chain(fiscal::variables())
        .chain(dsr_bourg_centre::variables())
        .chain(dsr_perequation::variables())
        .chain(dsr_cible::variables())
        .chain(dsu::variables());
    for definition in definitions {
        registry.register(definition)?;
    }

    Ok(registry)
}

/// A commune variable defined per year
fn commune(name: &str, value_type: ValueType, label: &str) -> VariableDefinition {
    VariableDefinition::new(name, value_type, EntityKind::Commune, PeriodUnit::Year).label(label)
}

/// A nationwide variable defined per year
fn etat(name: &str, value_type: ValueType, label: &str) -> VariableDefinition {
    VariableDefinition::new(name, value_type, EntityKind::Etat, PeriodUnit::Year).label(label)
}

/// 1 January of `year`, for dating formula versions
const fn first_of_january(year: i32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, 1, 1) {
        Some(date) => date,
        None => panic!("Invalid year"),
    }
}

/// Element-wise logical or of two masks
fn or(a: &[bool], b: &[bool]) -> Vec<bool> {
    a.iter().zip(b).map(|(a, b)| *a || *b).collect()
}

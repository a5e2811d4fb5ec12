//! Fixtures for tests

use crate::entity::{EntityKind, Population};
use crate::period::PeriodUnit;
use crate::value::ValueType;
use crate::variable::VariableDefinition;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn population() -> Population {
    Population::new(["01001", "01002", "01003"]).unwrap()
}

/// A yearly commune variable with no formula
pub fn commune_input(name: &str, value_type: ValueType) -> VariableDefinition {
    VariableDefinition::new(name, value_type, EntityKind::Commune, PeriodUnit::Year)
}

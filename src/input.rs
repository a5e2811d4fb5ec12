//! Raw input data supplied to a simulation, plus common routines for reading input files.
//!
//! The input table holds the facts which formulas are computed from (populations, fiscal
//! potential, housing stock and so on), keyed by variable name and period. It can also hold values
//! for variables which do have formulas, in which case the supplied value wins for that period.
//! This is how a caller provides last year's amounts as the starting point of a guarantee which
//! refers to the previous year.
use crate::entity::Population;
use crate::id::VariableID;
use crate::period::Period;
use crate::value::Array;
use crate::variable::Registry;
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::warn;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read a TOML file and deserialise it into a `T`.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Values of raw variables, keyed by variable name and then by period
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    values: IndexMap<VariableID, IndexMap<Period, Array>>,
}

impl InputTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the values of a variable for a period, replacing any already present
    pub fn set<T: Into<Array>>(&mut self, name: &str, period: Period, values: T) {
        self.values
            .entry(name.into())
            .or_default()
            .insert(period, values.into());
    }

    /// Builder-style version of [`InputTable::set`]
    pub fn with<T: Into<Array>>(mut self, name: &str, period: Period, values: T) -> Self {
        self.set(name, period, values);
        self
    }

    /// Set the values of a variable from (commune code, value) pairs.
    ///
    /// Communes without a value get `default`. Codes which are not part of the population are an
    /// error.
    ///
    /// # Arguments
    ///
    /// * `name` - The variable
    /// * `period` - The period the values are for
    /// * `population` - The communes of the simulation
    /// * `values` - Values keyed by commune code
    /// * `default` - Value for communes missing from `values`
    pub fn set_by_commune<'a, I>(
        &mut self,
        name: &str,
        period: Period,
        population: &Population,
        values: I,
        default: f64,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut column = vec![default; population.size()];
        for (commune, value) in values {
            let Some(idx) = population.index_of(commune) else {
                bail!("Unknown commune {commune} in values for {name}");
            };
            column[idx] = value;
        }

        self.set(name, period, column);
        Ok(())
    }

    /// The values of a variable for a period, if supplied
    pub fn get(&self, name: &str, period: Period) -> Option<&Array> {
        self.values.get(name)?.get(&period)
    }

    /// Whether any values are supplied for the variable
    pub fn contains_variable(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate over (variable, period, values)
    pub fn iter(&self) -> impl Iterator<Item = (&VariableID, &Period, &Array)> {
        self.values
            .iter()
            .flat_map(|(name, by_period)| by_period.iter().map(move |(p, v)| (name, p, v)))
    }

    /// The number of (variable, period) entries
    pub fn len(&self) -> usize {
        self.values.values().map(IndexMap::len).sum()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the table against the variables and communes of a simulation.
    ///
    /// Values for variables defined for all eternity are moved to the eternity period. Values for
    /// yearly variables must be for a single year and every column must have one value per member
    /// of the variable's entity.
    pub fn validate(&mut self, registry: &Registry, population: &Population) -> Result<()> {
        for (name, by_period) in &mut self.values {
            let Some(definition) = registry.get(name.as_str()) else {
                warn!("Input {name} does not match any registered variable");
                for (period, values) in by_period.iter() {
                    ensure!(
                        values.len() == population.size(),
                        "Input {name} for period {period} has {} values but there are {} communes",
                        values.len(),
                        population.size()
                    );
                }
                continue;
            };

            let expected = population.count(definition.entity);
            let mut normalised = IndexMap::new();
            for (period, values) in by_period.drain(..) {
                ensure!(
                    values.len() == expected,
                    "Input {name} for period {period} has {} values but {expected} were expected",
                    values.len()
                );

                let key = definition.normalise_period(period).map_err(|_| {
                    anyhow::anyhow!(
                        "Input {name} is defined per year, but was given for period {period}"
                    )
                })?;
                if key != period {
                    warn!("Input {name} given for {period} is used for all periods");
                }

                match normalised.entry(key) {
                    Entry::Vacant(entry) => {
                        entry.insert(values.cast(definition.value_type));
                    }
                    Entry::Occupied(_) => {
                        warn!("Input {name} given more than once for {key}; keeping the first");
                    }
                }
            }
            *by_period = normalised;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::fixture::{assert_error, population};
    use crate::period::PeriodUnit;
    use crate::value::ValueType;
    use crate::variable::VariableDefinition;
    use rstest::{fixture, rstest};
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        a: u32,
        b: String,
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "a = 1\nb = \"hello\"").unwrap();
        }

        assert_eq!(
            read_toml::<Record>(&file_path).unwrap(),
            Record {
                a: 1,
                b: "hello".to_string()
            }
        );

        // Missing file
        assert!(read_toml::<Record>(&dir.path().join("missing.toml")).is_err());
    }

    #[fixture]
    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(VariableDefinition::new(
                "zrr",
                ValueType::Bool,
                EntityKind::Commune,
                PeriodUnit::Eternity,
            ))
            .unwrap();
        registry
            .register(VariableDefinition::new(
                "population_dgf",
                ValueType::Int,
                EntityKind::Commune,
                PeriodUnit::Year,
            ))
            .unwrap();
        registry
    }

    #[rstest]
    fn test_set_by_commune(population: Population) {
        let mut inputs = InputTable::new();
        inputs
            .set_by_commune(
                "population_dgf",
                Period::year(2019),
                &population,
                [("01003", 30.0), ("01001", 10.0)],
                0.0,
            )
            .unwrap();

        assert_eq!(
            inputs.get("population_dgf", Period::year(2019)).unwrap().to_vec(),
            vec![10.0, 0.0, 30.0]
        );
        assert!(inputs.get("population_dgf", Period::year(2020)).is_none());
    }

    #[rstest]
    fn test_set_by_commune_unknown(population: Population) {
        let mut inputs = InputTable::new();
        assert_error!(
            inputs.set_by_commune(
                "population_dgf",
                Period::year(2019),
                &population,
                [("99999", 1.0)],
                0.0
            ),
            "Unknown commune 99999 in values for population_dgf"
        );
    }

    #[rstest]
    fn test_validate_rekeys_eternity(registry: Registry, population: Population) {
        let mut inputs = InputTable::new()
            .with("zrr", Period::year(2019), vec![1.0, 0.0, 2.0])
            .with("population_dgf", Period::year(2019), vec![1.5, 2.0, 3.0]);
        inputs.validate(&registry, &population).unwrap();

        assert!(inputs.get("zrr", Period::year(2019)).is_none());
        assert_eq!(
            inputs.get("zrr", Period::eternity()).unwrap().to_vec(),
            vec![1.0, 0.0, 1.0]
        );
        assert_eq!(
            inputs.get("population_dgf", Period::year(2019)).unwrap().to_vec(),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(inputs.len(), 2);
    }

    #[rstest]
    #[case(
        "population_dgf",
        Period::year(2019),
        vec![1.0],
        "Input population_dgf for period 2019 has 1 values but 3 were expected"
    )]
    #[case(
        "population_dgf",
        Period::years(2019, 2),
        vec![1.0; 3],
        "Input population_dgf is defined per year, but was given for period year:2019:2"
    )]
    #[case(
        "unregistered",
        Period::year(2019),
        vec![1.0; 2],
        "Input unregistered for period 2019 has 2 values but there are 3 communes"
    )]
    fn test_validate_invalid(
        registry: Registry,
        population: Population,
        #[case] name: &str,
        #[case] period: Period,
        #[case] values: Vec<f64>,
        #[case] msg: &str,
    ) {
        let mut inputs = InputTable::new().with(name, period, values);
        assert_error!(inputs.validate(&registry, &population), msg);
    }
}

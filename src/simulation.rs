//! The evaluation engine.
//!
//! A [`Simulation`] answers requests for the value of a variable at a period. On a cache miss it
//! uses, in order: a supplied input for exactly that variable and period, the formula in force on
//! the first day of the period, and finally the variable's default value. Formulas request the
//! values they depend on through the same entry point, so evaluation is a recursive descent which
//! bottoms out at inputs and parameters.
use crate::entity::{EntityKind, Population};
use crate::error::EvaluationError;
use crate::id::VariableID;
use crate::input::InputTable;
use crate::parameter::{ParameterResolver, ParameterTree, ParameterValue, Scale};
use crate::period::Period;
use crate::settings::Settings;
use crate::store::ValueStore;
use crate::trace::DependencyTrace;
use crate::value::Array;
use crate::variable::{Registry, VariableDefinition};
use anyhow::Result;
use log::{debug, info, trace};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// What a formula can see: other variables, parameters and the population.
///
/// Only the first four methods need implementing; the rest are conveniences built on them.
pub trait Accessor {
    /// The values of a variable for a period
    fn get(&self, name: &str, period: Period) -> Result<Array, EvaluationError>;

    /// The values supplied as input for a variable and period, or else its default value.
    ///
    /// No formula is run. Formulas which depend on their own value for an earlier year use this,
    /// so that the earlier amount is taken as given and the chain stops after one step.
    fn input_or_default(&self, name: &str, period: Period) -> Result<Array, EvaluationError>;

    /// The value of a parameter in force on the first day of `period`
    fn parameter(&self, path: &str, period: Period) -> Result<ParameterValue, EvaluationError>;

    /// The communes of the simulation
    fn population(&self) -> &Population;

    /// The values of a boolean variable
    fn bools(&self, name: &str, period: Period) -> Result<Vec<bool>, EvaluationError> {
        Ok(self.get(name, period)?.to_bools())
    }

    /// The single value of a nationwide variable
    fn scalar(&self, name: &str, period: Period) -> Result<f64, EvaluationError> {
        let values = self.get(name, period)?;
        values.scalar().ok_or_else(|| EvaluationError::ShapeMismatch {
            name: name.into(),
            expected: 1,
            actual: values.len(),
        })
    }

    /// A numeric parameter
    fn param(&self, path: &str, period: Period) -> Result<f64, EvaluationError> {
        match self.parameter(path, period)? {
            ParameterValue::Scalar(value) => Ok(value),
            ParameterValue::Scale(_) => Err(EvaluationError::ParameterType {
                path: path.to_string(),
                expected: "number",
            }),
        }
    }

    /// A scale parameter
    fn scale(&self, path: &str, period: Period) -> Result<Scale, EvaluationError> {
        match self.parameter(path, period)? {
            ParameterValue::Scale(scale) => Ok(scale),
            ParameterValue::Scalar(_) => Err(EvaluationError::ParameterType {
                path: path.to_string(),
                expected: "scale",
            }),
        }
    }
}

/// One run of the rules over a population.
///
/// Values are computed lazily and memoised for the lifetime of the run; see
/// [`Simulation::reset`] to start a new one.
pub struct Simulation<R = ParameterTree> {
    registry: Rc<Registry>,
    population: Population,
    inputs: InputTable,
    parameters: R,
    store: RefCell<ValueStore>,
    /// The (variable, period) cells whose formulas are currently running, innermost last
    stack: RefCell<Vec<(VariableID, Period)>>,
    trace: Option<RefCell<DependencyTrace>>,
    max_depth: usize,
}

impl<R: ParameterResolver> Simulation<R> {
    /// Set up a simulation.
    ///
    /// # Arguments
    ///
    /// * `registry` - The variables and their formulas
    /// * `population` - The communes to compute values for
    /// * `inputs` - Raw input values, which are checked against `registry` and `population`
    /// * `parameters` - Where parameters are looked up
    pub fn new<T: Into<Rc<Registry>>>(
        registry: T,
        population: Population,
        mut inputs: InputTable,
        parameters: R,
    ) -> Result<Self> {
        let registry = registry.into();
        inputs.validate(&registry, &population)?;
        info!(
            "Simulation set up with {} communes, {} variables and {} inputs",
            population.size(),
            registry.len(),
            inputs.len()
        );

        let settings = Settings::default();
        let mut simulation = Self {
            registry,
            population,
            inputs,
            parameters,
            store: RefCell::new(ValueStore::new()),
            stack: RefCell::new(Vec::new()),
            trace: None,
            max_depth: 0,
        };
        simulation.apply_settings(&settings);

        Ok(simulation)
    }

    /// Apply program settings (evaluation depth limit, dependency tracing)
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.apply_settings(settings);
        self
    }

    fn apply_settings(&mut self, settings: &Settings) {
        self.max_depth = settings.max_evaluation_depth;
        self.trace = settings
            .trace_dependencies
            .then(|| RefCell::new(DependencyTrace::new()));
    }

    /// Evaluate a variable for a period.
    ///
    /// This is the sole entry point for computing values. Values are cached, so asking twice for
    /// the same variable and period returns the same array without recomputing it. Variables
    /// defined for all eternity return the same array whatever the period.
    pub fn evaluate(&self, name: &str, period: Period) -> Result<Array, EvaluationError> {
        let Some(definition) = self.registry.get(name) else {
            return self.evaluate_unregistered(name, period);
        };

        let period = definition.normalise_period(period)?;
        self.record_dependency(&definition.name, period);
        ValueStore::get_or_compute(&self.store, &definition.name, period, || {
            self.compute(definition, period)
        })
    }

    /// Evaluate several variables for the same period, returning values in request order
    pub fn evaluate_all(
        &self,
        names: &[&str],
        period: Period,
    ) -> Result<Vec<Array>, EvaluationError> {
        names.iter().map(|name| self.evaluate(name, period)).collect()
    }

    /// Release all computed values, starting a new run
    pub fn reset(&mut self) {
        self.store.get_mut().clear();
        self.stack.get_mut().clear();
        if let Some(trace) = &mut self.trace {
            trace.get_mut().clear();
        }
    }

    /// The number of (variable, period) values currently cached
    pub fn cached_len(&self) -> usize {
        self.store.borrow().len()
    }

    /// The dependencies observed so far, if tracing is enabled
    pub fn dependency_trace(&self) -> Option<Ref<'_, DependencyTrace>> {
        self.trace.as_ref().map(RefCell::borrow)
    }

    /// The variables of this simulation
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The inputs of this simulation
    pub fn inputs(&self) -> &InputTable {
        &self.inputs
    }

    /// Record an edge from the formula currently running (if any) to the requested value
    fn record_dependency(&self, name: &VariableID, period: Period) {
        let Some(trace) = &self.trace else {
            return;
        };

        if let Some((from, from_period)) = self.stack.borrow().last() {
            trace
                .borrow_mut()
                .record((from, *from_period), (name, period));
        }
    }

    /// Serve a variable which isn't registered from the input table
    fn evaluate_unregistered(&self, name: &str, period: Period) -> Result<Array, EvaluationError> {
        if !self.inputs.contains_variable(name) {
            return Err(EvaluationError::UnknownVariable(name.into()));
        }

        let id = VariableID::from(name);
        self.record_dependency(&id, period);
        ValueStore::get_or_compute(&self.store, &id, period, || {
            self.inputs
                .get(name, period)
                .cloned()
                .ok_or_else(|| EvaluationError::MissingInput {
                    name: id.clone(),
                    period,
                })
        })
    }

    /// Compute a value on a cache miss
    fn compute(
        &self,
        definition: &VariableDefinition,
        period: Period,
    ) -> Result<Array, EvaluationError> {
        let name = &definition.name;
        if let Some(values) = self.inputs.get(name.as_str(), period) {
            trace!("Using input value of {name} for {period}");
            return Ok(values.clone());
        }

        let expected = self.population.count(definition.entity);
        let formula = match self.registry.lookup_formula(name.as_str(), period) {
            Ok(formula) => formula,
            Err(EvaluationError::NoApplicableFormula { .. }) if !definition.required => {
                trace!("Using default value of {name} for {period}");
                return Ok(Array::filled(expected, definition.default_value));
            }
            Err(EvaluationError::NoApplicableFormula { .. }) if !definition.has_formulas() => {
                return Err(EvaluationError::MissingInput {
                    name: name.clone(),
                    period,
                });
            }
            Err(err) => return Err(err),
        };

        self.enter(name, period)?;
        debug!("Computing {name} for {period}");
        let result = formula(self, period);
        self.stack.borrow_mut().pop();
        let values = result.map_err(|err| err.in_formula(name, period))?;

        let values = match values.len() {
            len if len == expected => Array::from(values),
            1 if definition.entity == EntityKind::Commune => {
                self.population.broadcast_from_aggregate(values[0])
            }
            actual => {
                return Err(EvaluationError::ShapeMismatch {
                    name: name.clone(),
                    expected,
                    actual,
                });
            }
        };

        Ok(values.cast(definition.value_type))
    }

    /// Push a cell onto the stack of running formulas, refusing re-entrance and runaway depth
    fn enter(&self, name: &VariableID, period: Period) -> Result<(), EvaluationError> {
        let mut stack = self.stack.borrow_mut();
        if stack.iter().any(|(n, p)| n == name && *p == period) {
            return Err(EvaluationError::CyclicSamePeriodDependency {
                name: name.clone(),
                period,
            });
        }
        if stack.len() >= self.max_depth {
            return Err(EvaluationError::DepthExceeded(self.max_depth));
        }

        stack.push((name.clone(), period));
        Ok(())
    }
}

impl<R: ParameterResolver> Accessor for Simulation<R> {
    fn get(&self, name: &str, period: Period) -> Result<Array, EvaluationError> {
        self.evaluate(name, period)
    }

    fn input_or_default(&self, name: &str, period: Period) -> Result<Array, EvaluationError> {
        let Some(definition) = self.registry.get(name) else {
            return self.evaluate_unregistered(name, period);
        };

        let period = definition.normalise_period(period)?;
        self.record_dependency(&definition.name, period);
        if let Some(values) = self.inputs.get(name, period) {
            return Ok(values.clone());
        }
        if definition.required {
            return Err(EvaluationError::MissingInput {
                name: definition.name.clone(),
                period,
            });
        }

        trace!("No input for {name} in {period}, using its default value");
        Ok(Array::filled(
            self.population.count(definition.entity),
            definition.default_value,
        ))
    }

    fn parameter(&self, path: &str, period: Period) -> Result<ParameterValue, EvaluationError> {
        self.parameters.resolve(path, period.start_date())
    }

    fn population(&self) -> &Population {
        &self.population
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::population;
    use crate::period::PeriodUnit;
    use crate::value::ValueType;
    use chrono::NaiveDate;
    use rstest::rstest;
    use std::cell::Cell;

    fn date(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap()
    }

    fn commune_variable(name: &str, value_type: ValueType) -> VariableDefinition {
        VariableDefinition::new(name, value_type, EntityKind::Commune, PeriodUnit::Year)
    }

    fn simulation(registry: Registry, population: Population, inputs: InputTable) -> Simulation {
        let parameters = ParameterTree::new().with_scalar("facteur", date(2019), 2.0);
        Simulation::new(registry, population, inputs, parameters).unwrap()
    }

    #[rstest]
    fn test_formula_and_parameter(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(commune_variable("base", ValueType::Float).required())
            .unwrap();
        registry
            .register(
                commune_variable("double", ValueType::Float).formula(|sim: &dyn Accessor, period| {
                    let facteur = sim.param("facteur", period)?;
                    Ok(sim.get("base", period)?.iter().map(|v| v * facteur).collect())
                }),
            )
            .unwrap();

        let inputs = InputTable::new().with("base", Period::year(2020), vec![1.0, 2.0, 3.5]);
        let sim = simulation(registry, population, inputs);
        assert_eq!(
            sim.evaluate("double", Period::year(2020)).unwrap().to_vec(),
            vec![2.0, 4.0, 7.0]
        );
        assert_eq!(sim.cached_len(), 2);
    }

    #[rstest]
    fn test_memoisation(population: Population) {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut registry = Registry::new();
        registry
            .register(commune_variable("x", ValueType::Float).formula(move |_, _| {
                counter.set(counter.get() + 1);
                Ok(vec![1.0])
            }))
            .unwrap();

        let mut sim = simulation(registry, population, InputTable::new());
        let first = sim.evaluate("x", Period::year(2020)).unwrap();
        let second = sim.evaluate("x", Period::year(2020)).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(first.ptr_eq(&second));
        assert_eq!(first.to_vec(), vec![1.0; 3]);

        sim.evaluate("x", Period::year(2021)).unwrap();
        assert_eq!(calls.get(), 2);

        sim.reset();
        assert_eq!(sim.cached_len(), 0);
        sim.evaluate("x", Period::year(2020)).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[rstest]
    fn test_eternity_identity(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(VariableDefinition::new(
                "zrr",
                ValueType::Bool,
                EntityKind::Commune,
                PeriodUnit::Eternity,
            ))
            .unwrap();

        let inputs = InputTable::new().with("zrr", Period::year(2019), vec![1.0, 0.0, 1.0]);
        let sim = simulation(registry, population, inputs);
        let a = sim.evaluate("zrr", Period::year(2019)).unwrap();
        let b = sim.evaluate("zrr", Period::year(2020)).unwrap();
        let c = sim.evaluate("zrr", Period::eternity()).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(&c));
        assert_eq!(a.to_bools(), vec![true, false, true]);
    }

    #[rstest]
    fn test_prior_year_recursion(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(
                commune_variable("montant", ValueType::Float)
                    .formula_from(date(2015), |sim: &dyn Accessor, period: Period| {
                        let previous = sim.get("montant", period.last_year())?;
                        Ok(previous.iter().map(|v| v + 1.0).collect())
                    }),
            )
            .unwrap();

        let inputs = InputTable::new().with("montant", Period::year(2016), vec![10.0; 3]);
        let sim = simulation(registry, population, inputs);

        // Input for 2016 overrides the formula
        assert_eq!(
            sim.evaluate("montant", Period::year(2018)).unwrap().to_vec(),
            vec![12.0; 3]
        );

        // Before the first formula, the default value is used
        assert_eq!(
            sim.evaluate("montant", Period::year(2015)).unwrap().to_vec(),
            vec![1.0; 3]
        );
    }

    #[rstest]
    fn test_prior_year_input_or_default(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(
                commune_variable("montant", ValueType::Float)
                    .formula_from(date(2015), |sim: &dyn Accessor, period: Period| {
                        let previous = sim.input_or_default("montant", period.last_year())?;
                        Ok(previous.iter().map(|v| v + 1.0).collect())
                    }),
            )
            .unwrap();
        registry
            .register(commune_variable("pop", ValueType::Int).required())
            .unwrap();

        let inputs = InputTable::new().with("montant", Period::year(2018), vec![10.0; 3]);
        let sim = simulation(registry, population, inputs);

        // Only one step back: no input for 2019, so 2020 builds on the default
        assert_eq!(
            sim.evaluate("montant", Period::year(2020)).unwrap().to_vec(),
            vec![1.0; 3]
        );
        assert_eq!(
            sim.evaluate("montant", Period::year(2019)).unwrap().to_vec(),
            vec![11.0; 3]
        );

        // The earlier year is neither computed nor cached
        sim.evaluate("montant", Period::year(2020)).unwrap();
        assert_eq!(sim.cached_len(), 2);

        assert!(matches!(
            sim.input_or_default("pop", Period::year(2020)),
            Err(EvaluationError::MissingInput { .. })
        ));
    }

    #[rstest]
    fn test_parameter_type(population: Population) {
        let scale = Scale::new(vec![crate::parameter::Bracket {
            threshold: 100.0,
            value: 1.0,
        }])
        .unwrap();
        let mut parameters = ParameterTree::new().with_scalar("facteur", date(2019), 2.0);
        parameters.insert("bareme", date(2019), ParameterValue::Scale(scale));
        let sim =
            Simulation::new(Registry::new(), population, InputTable::new(), parameters).unwrap();

        let year = Period::year(2020);
        assert_eq!(sim.scale("bareme", year).unwrap().calc_one(50.0), 1.0);
        assert!(matches!(
            sim.param("bareme", year),
            Err(EvaluationError::ParameterType { expected: "number", .. })
        ));
        assert!(matches!(
            sim.scale("facteur", year),
            Err(EvaluationError::ParameterType { expected: "scale", .. })
        ));
    }

    #[rstest]
    fn test_same_period_cycle(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(commune_variable("a", ValueType::Float).formula(|sim, period| {
                Ok(sim.get("b", period)?.to_vec())
            }))
            .unwrap();
        registry
            .register(commune_variable("b", ValueType::Float).formula(|sim, period| {
                Ok(sim.get("a", period)?.to_vec())
            }))
            .unwrap();

        let sim = simulation(registry, population, InputTable::new());
        let err = sim.evaluate("a", Period::year(2020)).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            EvaluationError::CyclicSamePeriodDependency { name, .. } if name.as_str() == "a"
        ));
        assert_eq!(err.path_string(), "a (2020) -> b (2020)");

        // Nothing is cached from a failed evaluation and the guard is released
        assert_eq!(sim.cached_len(), 0);
        assert!(matches!(
            sim.evaluate("b", Period::year(2020)).unwrap_err().root_cause(),
            EvaluationError::CyclicSamePeriodDependency { .. }
        ));
    }

    #[rstest]
    fn test_depth_exceeded(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(commune_variable("montant", ValueType::Float).formula(
                |sim: &dyn Accessor, period: Period| {
                    Ok(sim.get("montant", period.last_year())?.to_vec())
                },
            ))
            .unwrap();

        let settings = Settings {
            max_evaluation_depth: 10,
            ..Settings::default()
        };
        let sim = simulation(registry, population, InputTable::new()).with_settings(&settings);
        let err = sim.evaluate("montant", Period::year(2020)).unwrap_err();
        assert!(matches!(err.root_cause(), EvaluationError::DepthExceeded(10)));
        assert_eq!(err.path().len(), 10);
    }

    #[rstest]
    fn test_errors(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(commune_variable("pop", ValueType::Int).required())
            .unwrap();
        registry
            .register(
                commune_variable("later", ValueType::Float)
                    .required()
                    .formula_from(date(2030), |_, _| Ok(vec![1.0])),
            )
            .unwrap();
        registry
            .register(
                commune_variable("short", ValueType::Float).formula(|_, _| Ok(vec![1.0, 2.0])),
            )
            .unwrap();
        registry
            .register(commune_variable("bad_param", ValueType::Float).formula(|sim, period| {
                Ok(vec![sim.param("missing", period)?])
            }))
            .unwrap();

        let inputs = InputTable::new().with("extra", Period::year(2020), vec![4.0; 3]);
        let sim = simulation(registry, population, inputs);
        let year = Period::year(2020);

        assert!(matches!(
            sim.evaluate("unknown", year),
            Err(EvaluationError::UnknownVariable(_))
        ));
        assert!(matches!(
            sim.evaluate("pop", year),
            Err(EvaluationError::MissingInput { .. })
        ));
        assert!(matches!(
            sim.evaluate("later", year),
            Err(EvaluationError::NoApplicableFormula { .. })
        ));
        assert!(matches!(
            sim.evaluate("short", year),
            Err(EvaluationError::ShapeMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
        assert!(matches!(
            sim.evaluate("bad_param", year).unwrap_err().root_cause(),
            EvaluationError::UnknownParameter { .. }
        ));
        assert!(matches!(
            sim.evaluate("pop", Period::years(2020, 2)),
            Err(EvaluationError::PeriodMismatch { .. })
        ));

        // Unregistered inputs are served from the table
        assert_eq!(sim.evaluate("extra", year).unwrap().to_vec(), vec![4.0; 3]);
        assert!(matches!(
            sim.evaluate("extra", Period::year(2019)),
            Err(EvaluationError::MissingInput { .. })
        ));
    }

    #[rstest]
    fn test_etat_scalar_and_casting(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(
                VariableDefinition::new(
                    "total",
                    ValueType::Float,
                    EntityKind::Etat,
                    PeriodUnit::Year,
                )
                .formula(|sim: &dyn Accessor, period| {
                    let values = sim.get("part", period)?;
                    Ok(vec![sim.population().aggregate_sum_of_members(&values)])
                }),
            )
            .unwrap();
        registry
            .register(
                commune_variable("part", ValueType::Int).formula(|_, _| Ok(vec![1.0, 2.5, 3.9])),
            )
            .unwrap();
        registry
            .register(commune_variable("flag", ValueType::Bool).formula(|sim, period| {
                Ok(vec![sim.scalar("total", period)?])
            }))
            .unwrap();

        let sim = simulation(registry, population, InputTable::new());
        let year = Period::year(2020);
        assert_eq!(sim.scalar("total", year).unwrap(), 6.0);
        assert_eq!(sim.bools("flag", year).unwrap(), vec![true; 3]);
        assert!(matches!(
            sim.scalar("part", year),
            Err(EvaluationError::ShapeMismatch { expected: 1, actual: 3, .. })
        ));
        let values = sim.evaluate_all(&["part", "total"], year).unwrap();
        assert_eq!(values[0].to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(values[1].to_vec(), vec![6.0]);
    }

    #[rstest]
    fn test_dependency_trace(population: Population) {
        let mut registry = Registry::new();
        registry
            .register(commune_variable("base", ValueType::Float))
            .unwrap();
        registry
            .register(commune_variable("derived", ValueType::Float).formula(
                |sim: &dyn Accessor, period: Period| {
                    let a = sim.get("base", period)?;
                    let b = sim.get("base", period.last_year())?;
                    Ok(a.iter().zip(b.iter()).map(|(a, b)| a + b).collect())
                },
            ))
            .unwrap();

        let settings = Settings {
            trace_dependencies: true,
            ..Settings::default()
        };
        let sim = simulation(registry, population, InputTable::new()).with_settings(&settings);
        sim.evaluate("derived", Period::year(2020)).unwrap();

        let trace = sim.dependency_trace().unwrap();
        let deps: Vec<_> = trace
            .dependencies("derived", Period::year(2020))
            .into_iter()
            .map(|node| node.to_string())
            .collect();
        assert_eq!(deps, vec!["base (2019)", "base (2020)"]);
        assert_eq!(trace.evaluation_order().unwrap().len(), 3);
    }
}

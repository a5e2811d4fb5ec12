//! Population-derived variables: demographic stratum and capped DGF population
use super::{FormulaResult, commune};
use crate::period::Period;
use crate::simulation::Accessor;
use crate::value::ValueType;
use crate::variable::VariableDefinition;
use itertools::izip;

/// Upper bounds (inclusive) of the demographic strata, by DGF population
const STRATE_BOUNDS: [f64; 14] = [
    499.0, 999.0, 1999.0, 3499.0, 4999.0, 7499.0, 9999.0, 14999.0, 19999.0, 34999.0, 49999.0,
    74999.0, 99999.0, 199_999.0,
];

pub(super) fn variables() -> Vec<VariableDefinition> {
    vec![
        commune(
            "strate_demographique",
            ValueType::Int,
            "Strate démographique de la commune",
        )
        .formula(strate_demographique),
        commune(
            "population_dgf_plafonnee",
            ValueType::Int,
            "Population DGF plafonnée en fonction de la population INSEE",
        )
        .formula(population_dgf_plafonnee),
    ]
}

/// Strata are numbered from 1; a commune above every bound is in the last stratum
fn strate_demographique(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let population_dgf = sim.get("population_dgf", period)?;
    Ok(population_dgf
        .iter()
        .map(|&pop| {
            let above = STRATE_BOUNDS.iter().filter(|&&bound| bound < pop).count();
            (above + 1) as f64
        })
        .collect())
}

fn population_dgf_plafonnee(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let population_insee = sim.get("population_insee", period)?;
    let population_dgf = sim.get("population_dgf", period)?;
    let plafond = sim
        .scale("population.plafond_dgf", period)?
        .calc(&population_insee);

    Ok(izip!(plafond, population_dgf.iter())
        .map(|(plafond, &pop)| plafond.min(pop))
        .collect())
}

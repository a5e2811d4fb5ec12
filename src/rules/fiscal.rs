//! Per-inhabitant fiscal metrics and their averages over demographic strata
use super::{FormulaResult, commune, etat, first_of_january};
use crate::numeric::{group_mean_by_stratum, safe_divide};
use crate::period::Period;
use crate::simulation::Accessor;
use crate::value::ValueType;
use crate::variable::VariableDefinition;

/// Average fiscal potential per inhabitant across the country, as published each year
const POTENTIEL_FISCAL_MOYEN_NATIONAL: [(i32, f64); 3] =
    [(2018, 624.197), (2019, 631.5677), (2020, 641.164_387)];

pub(super) fn variables() -> Vec<VariableDefinition> {
    let mut potentiel_fiscal_moyen_national = etat(
        "potentiel_fiscal_moyen_national",
        ValueType::Float,
        "Potentiel fiscal moyen national par habitant",
    );
    for (year, value) in POTENTIEL_FISCAL_MOYEN_NATIONAL {
        potentiel_fiscal_moyen_national = potentiel_fiscal_moyen_national
            .formula_from(first_of_january(year), move |_, _| Ok(vec![value]));
    }

    vec![
        commune(
            "potentiel_financier_par_habitant",
            ValueType::Float,
            "Potentiel financier par habitant (population DGF)",
        )
        .formula(potentiel_financier_par_habitant),
        commune(
            "potentiel_financier_par_habitant_moyen",
            ValueType::Float,
            "Potentiel financier moyen par habitant de la strate démographique",
        )
        .formula(potentiel_financier_par_habitant_moyen),
        commune(
            "revenu_par_habitant",
            ValueType::Float,
            "Revenu par habitant (population INSEE)",
        )
        .formula(revenu_par_habitant),
        commune(
            "revenu_par_habitant_moyen",
            ValueType::Float,
            "Revenu moyen par habitant de la strate démographique",
        )
        .formula(revenu_par_habitant_moyen),
        commune(
            "part_population_agglomeration_departement",
            ValueType::Float,
            "Part de la population du département dans l'agglomération de la commune",
        )
        .formula(part_population_agglomeration_departement),
        potentiel_fiscal_moyen_national,
    ]
}

/// Communes without inhabitants get zero
fn potentiel_financier_par_habitant(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let potentiel_financier = sim.get("potentiel_financier", period)?;
    let population_dgf = sim.get("population_dgf", period)?;
    Ok(safe_divide(&potentiel_financier, &population_dgf, 0.0))
}

/// Overseas communes are left out of the stratum averages and get zero
fn potentiel_financier_par_habitant_moyen(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let strate = sim.get("strate_demographique", period)?;
    let potentiel_financier = sim.get("potentiel_financier", period)?;
    let population_dgf = sim.get("population_dgf", period)?;
    let outre_mer = sim.get("outre_mer", period)?;
    Ok(group_mean_by_stratum(
        &strate,
        &potentiel_financier,
        &population_dgf,
        &outre_mer,
    ))
}

fn revenu_par_habitant(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let revenu = sim.get("revenu_total", period)?;
    let population_insee = sim.get("population_insee", period)?;
    Ok(safe_divide(&revenu, &population_insee, 0.0))
}

fn revenu_par_habitant_moyen(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let strate = sim.get("strate_demographique", period)?;
    let revenu = sim.get("revenu_total", period)?;
    let population_insee = sim.get("population_insee", period)?;
    let outre_mer = sim.get("outre_mer", period)?;
    Ok(group_mean_by_stratum(
        &strate,
        &revenu,
        &population_insee,
        &outre_mer,
    ))
}

fn part_population_agglomeration_departement(
    sim: &dyn Accessor,
    period: Period,
) -> FormulaResult {
    let agglomeration = sim.get("population_dgf_agglomeration", period)?;
    let departement = sim.get("population_dgf_departement_agglomeration", period)?;
    Ok(safe_divide(&agglomeration, &departement, 0.0))
}

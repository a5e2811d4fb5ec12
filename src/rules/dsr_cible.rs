//! The cible fraction of the DSR: the poorest communes already eligible to another fraction,
//! ranked by a synthetic index
use super::{FormulaResult, commune, or};
use crate::error::EvaluationError;
use crate::numeric::{safe_divide_scalar, stable_descending_rank};
use crate::period::Period;
use crate::simulation::Accessor;
use crate::value::ValueType;
use crate::variable::VariableDefinition;
use itertools::izip;

pub(super) fn variables() -> Vec<VariableDefinition> {
    vec![
        commune(
            "indice_synthetique_dsr_cible",
            ValueType::Float,
            "Indice synthétique de ressources et de charges de la fraction cible de la DSR",
        )
        .formula(indice_synthetique),
        commune(
            "rang_indice_synthetique_dsr_cible",
            ValueType::Int,
            "Rang des communes par indice synthétique décroissant de la fraction cible de la DSR",
        )
        .formula(|sim: &dyn Accessor, period| {
            let indice = sim.get("indice_synthetique_dsr_cible", period)?;
            Ok(stable_descending_rank(&indice))
        }),
        commune(
            "dsr_eligible_fraction_cible",
            ValueType::Bool,
            "Éligibilité à la fraction cible de la DSR",
        )
        .formula(eligible),
    ]
}

/// Small communes eligible to the bourg-centre or péréquation fraction
fn candidates(sim: &dyn Accessor, period: Period) -> Result<Vec<bool>, EvaluationError> {
    let seuil = sim.param("dotation_solidarite_rurale.seuil_nombre_habitants", period)?;
    let population_dgf = sim.get("population_dgf", period)?;
    let bourg_centre = sim.bools("dsr_eligible_fraction_bourg_centre", period)?;
    let perequation = sim.bools("dsr_eligible_fraction_perequation", period)?;
    Ok(izip!(population_dgf.iter(), or(&bourg_centre, &perequation))
        .map(|(&pop, eligible)| pop < seuil && eligible)
        .collect())
}

/// Weighted sum of the stratum-to-commune ratios of financial potential and revenue.
///
/// Communes with no financial potential or no revenue get nothing for that term.
fn indice_synthetique(sim: &dyn Accessor, period: Period) -> FormulaResult {
    const INDICE: &str = "dotation_solidarite_rurale.cible.eligibilite.indice_synthetique";
    let poids_pot_fin = sim.param(&format!("{INDICE}.poids_potentiel_financier"), period)?;
    let poids_revenu = sim.param(&format!("{INDICE}.poids_revenu"), period)?;

    let candidates = candidates(sim, period)?;
    let pfi = sim.get("potentiel_financier_par_habitant", period)?;
    let pfi_strate = sim.get("potentiel_financier_par_habitant_moyen", period)?;
    let revenu = sim.get("revenu_par_habitant", period)?;
    let revenu_strate = sim.get("revenu_par_habitant_moyen", period)?;

    Ok(izip!(
        candidates,
        pfi.iter(),
        pfi_strate.iter(),
        revenu.iter(),
        revenu_strate.iter()
    )
    .map(|(candidate, &pfi, &pfi_strate, &revenu, &revenu_strate)| {
        if !candidate {
            return 0.0;
        }

        poids_pot_fin * safe_divide_scalar(pfi_strate, pfi, 0.0)
            + poids_revenu * safe_divide_scalar(revenu_strate, revenu, 0.0)
    })
    .collect())
}

/// The candidates are checked again so that zero-index communes can't fill the ranking
fn eligible(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let seuil_classement = sim.param(
        "dotation_solidarite_rurale.cible.eligibilite.seuil_classement",
        period,
    )?;
    let candidates = candidates(sim, period)?;
    let rang = sim.get("rang_indice_synthetique_dsr_cible", period)?;
    Ok(izip!(candidates, rang.iter())
        .map(|(candidate, &rang)| f64::from(candidate && rang <= seuil_classement))
        .collect())
}

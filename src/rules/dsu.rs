//! The synthetic index of the urban solidarity endowment (DSU)
use super::{FormulaResult, commune};
use crate::error::EvaluationError;
use crate::numeric::{masked_ratio, safe_divide};
use crate::period::Period;
use crate::simulation::Accessor;
use crate::value::ValueType;
use crate::variable::VariableDefinition;
use itertools::izip;

pub(super) fn variables() -> Vec<VariableDefinition> {
    vec![
        commune(
            "indice_synthetique_dsu",
            ValueType::Float,
            "Indice synthétique pour l'éligibilité à la DSU",
        )
        .formula(indice_synthetique),
    ]
}

/// Weights of the four terms of the index
struct Poids {
    potentiel_financier: f64,
    logements_sociaux: f64,
    aides_au_logement: f64,
    revenu: f64,
}

impl Poids {
    fn from_parameters(sim: &dyn Accessor, period: Period) -> Result<Self, EvaluationError> {
        const INDICE: &str = "dotation_solidarite_urbaine.eligibilite.indice_synthetique";
        let poids = |name: &str| sim.param(&format!("{INDICE}.{name}"), period);
        Ok(Self {
            potentiel_financier: poids("poids_potentiel_financier")?,
            logements_sociaux: poids("poids_logements_sociaux")?,
            aides_au_logement: poids("poids_aides_au_logement")?,
            revenu: poids("poids_revenu")?,
        })
    }
}

/// The commune-level figures the index compares with their group averages
struct Communes {
    potentiel_financier: Vec<f64>,
    population_dgf: Vec<f64>,
    pfi: Vec<f64>,
    logements: Vec<f64>,
    logements_sociaux: Vec<f64>,
    aides_au_logement: Vec<f64>,
    revenu: Vec<f64>,
    population_insee: Vec<f64>,
    revenu_par_habitant: Vec<f64>,
}

impl Communes {
    fn from_simulation(sim: &dyn Accessor, period: Period) -> Result<Self, EvaluationError> {
        let get = |name: &str| sim.get(name, period).map(|values| values.to_vec());
        Ok(Self {
            potentiel_financier: get("potentiel_financier")?,
            population_dgf: get("population_dgf")?,
            pfi: get("potentiel_financier_par_habitant")?,
            logements: get("nombre_logements")?,
            logements_sociaux: get("nombre_logements_sociaux")?,
            aides_au_logement: get("nombre_beneficiaires_aides_au_logement")?,
            revenu: get("revenu_total")?,
            population_insee: get("population_insee")?,
            revenu_par_habitant: get("revenu_par_habitant")?,
        })
    }

    /// The index of each member of a population group; non-members get zero
    fn indice(&self, groupe: &[f64], poids: &Poids, ratio_max_pot_fin: f64) -> Vec<f64> {
        let ratio = |num: &[f64], den: &[f64]| masked_ratio(groupe, num, den, 0.0);
        let pot_fin = ratio(&self.potentiel_financier, &self.population_dgf);
        let part_logements_sociaux = ratio(&self.logements_sociaux, &self.logements);
        let part_aides_au_logement = ratio(&self.aides_au_logement, &self.logements);
        let revenu_moyen = ratio(&self.revenu, &self.population_insee);

        let part_logements_sociaux_commune =
            safe_divide(&self.logements_sociaux, &self.logements, 0.0);
        let part_aides_au_logement_commune =
            safe_divide(&self.aides_au_logement, &self.logements, 0.0);

        // Each term is zero where its denominator is not positive
        let term = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
        izip!(
            groupe,
            &self.pfi,
            &part_logements_sociaux_commune,
            &part_aides_au_logement_commune,
            &self.revenu_par_habitant
        )
        .map(|(&membre, &pfi, &logements_sociaux, &aides, &revenu)| {
            // Communes too wealthy for their group get no index
            if membre == 0.0 || pfi >= ratio_max_pot_fin * pot_fin {
                return 0.0;
            }

            poids.potentiel_financier * term(pot_fin, pfi)
                + poids.logements_sociaux * term(logements_sociaux, part_logements_sociaux)
                + poids.aides_au_logement * term(aides, part_aides_au_logement)
                + poids.revenu * term(revenu_moyen, revenu)
        })
        .collect()
    }
}

/// The index is computed separately for mainland communes of 5 000 to 9 999 inhabitants and for
/// those of 10 000 or more, each against the averages of its own group
fn indice_synthetique(sim: &dyn Accessor, period: Period) -> FormulaResult {
    const ELIGIBILITE: &str = "dotation_solidarite_urbaine.eligibilite";
    let seuil_bas = sim.param(&format!("{ELIGIBILITE}.seuil_bas_nombre_habitants"), period)?;
    let seuil_haut = sim.param(&format!("{ELIGIBILITE}.seuil_haut_nombre_habitants"), period)?;
    let ratio_max_pot_fin = sim.param(
        &format!("{ELIGIBILITE}.seuil_rapport_potentiel_financier"),
        period,
    )?;
    let poids = Poids::from_parameters(sim, period)?;

    let outre_mer = sim.bools("outre_mer", period)?;
    let communes = Communes::from_simulation(sim, period)?;
    let (groupe_bas, groupe_haut): (Vec<f64>, Vec<f64>) =
        izip!(&communes.population_dgf, outre_mer)
            .map(|(&pop, om)| {
                let bas = !om && seuil_bas <= pop && pop < seuil_haut;
                let haut = !om && seuil_haut <= pop;
                (f64::from(bas), f64::from(haut))
            })
            .unzip();

    let bas = communes.indice(&groupe_bas, &poids, ratio_max_pot_fin);
    let haut = communes.indice(&groupe_haut, &poids, ratio_max_pot_fin);
    Ok(izip!(bas, haut).map(|(bas, haut)| bas + haut).collect())
}

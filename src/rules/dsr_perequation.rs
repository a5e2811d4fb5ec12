//! The péréquation fraction of the DSR: eligibility and the split of its envelope into parts
use super::{FormulaResult, commune};
use crate::period::Period;
use crate::simulation::Accessor;
use crate::value::ValueType;
use crate::variable::VariableDefinition;
use itertools::izip;

/// The 2019 envelope, less the guarantees paid to communes nouvelles
const MONTANT_TOTAL_ELIGIBLES: f64 = 645_050_872.0 - 7_403_123.0;

/// Each part of the envelope: (suffix of the variable, weight parameter, label)
const PARTS: [(&str, &str, &str); 4] = [
    (
        "potentiel_financier_par_habitant",
        "poids_potentiel_financier_par_habitant",
        "Part de la fraction péréquation de la DSR répartie selon le potentiel financier \
         par habitant",
    ),
    (
        "longueur_voirie",
        "poids_longueur_voirie",
        "Part de la fraction péréquation de la DSR répartie selon la longueur de voirie",
    ),
    (
        "enfants",
        "poids_enfants",
        "Part de la fraction péréquation de la DSR répartie selon le nombre d'enfants",
    ),
    (
        "potentiel_financier_par_hectare",
        "poids_potentiel_financier_par_hectare",
        "Part de la fraction péréquation de la DSR répartie selon le potentiel financier \
         par hectare",
    ),
];

pub(super) fn variables() -> Vec<VariableDefinition> {
    let mut variables = vec![
        commune(
            "dsr_eligible_fraction_perequation",
            ValueType::Bool,
            "Éligibilité à la fraction péréquation de la DSR",
        )
        .formula(eligible),
        commune(
            "dsr_montant_total_eligibles_fraction_perequation",
            ValueType::Float,
            "Montant de la fraction péréquation de la DSR à répartir entre les communes éligibles",
        )
        .formula(|_, _| Ok(vec![MONTANT_TOTAL_ELIGIBLES])),
    ];

    for (suffix, poids, label) in PARTS {
        let path = format!("dotation_solidarite_rurale.attribution.{poids}");
        variables.push(
            commune(
                &format!("dsr_montant_total_eligibles_fraction_perequation_part_{suffix}"),
                ValueType::Float,
                label,
            )
            .formula(move |sim: &dyn Accessor, period| {
                let poids = sim.param(&path, period)?;
                let montant = sim.get("dsr_montant_total_eligibles_fraction_perequation", period)?;
                Ok(montant.iter().map(|m| m * poids).collect())
            }),
        );
    }

    variables
}

/// Small mainland communes no wealthier than a multiple of their stratum's average
fn eligible(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let seuil = sim.param("dotation_solidarite_rurale.seuil_nombre_habitants", period)?;
    let ratio = sim.param(
        "dotation_solidarite_rurale.perequation.eligibilite.seuil_rapport_potentiel_financier",
        period,
    )?;

    let population_dgf = sim.get("population_dgf", period)?;
    let par_habitant = sim.get("potentiel_financier_par_habitant", period)?;
    let moyen = sim.get("potentiel_financier_par_habitant_moyen", period)?;
    let outre_mer = sim.bools("outre_mer", period)?;

    Ok(izip!(
        population_dgf.iter(),
        par_habitant.iter(),
        moyen.iter(),
        outre_mer
    )
    .map(|(&pop, &pfi, &moyen, om)| f64::from(!om && pop < seuil && pfi <= ratio * moyen))
    .collect())
}

#[cfg(test)]
mod tests {
    use crate::entity::Population;
    use crate::fixture::commune_input;
    use crate::input::InputTable;
    use crate::parameter::ParameterTree;
    use crate::period::Period;
    use crate::simulation::Simulation;
    use crate::value::ValueType;
    use float_cmp::assert_approx_eq;

    const YEAR: Period = Period::year(2019);

    fn simulation(inputs: InputTable) -> Simulation {
        Simulation::new(
            crate::rules::registry().unwrap(),
            Population::anonymous(4),
            inputs,
            ParameterTree::legislation().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_eligible() {
        // All in stratum 3 (1000 to 1999 inhabitants) whose mainland average is 8e6 / 3000 per
        // inhabitant; the third commune is above twice that and the last one is overseas
        let inputs = InputTable::new()
            .with("population_dgf", YEAR, vec![1000.0; 4])
            .with("population_insee", YEAR, vec![1000.0; 4])
            .with("potentiel_financier", YEAR, vec![5e5, 1.5e6, 6e6, 9e6])
            .with("outre_mer", Period::eternity(), vec![0.0, 0.0, 0.0, 1.0]);
        let sim = simulation(inputs);
        assert_eq!(
            sim.evaluate("dsr_eligible_fraction_perequation", YEAR)
                .unwrap()
                .to_bools(),
            vec![true, true, false, false]
        );
    }

    #[test]
    fn test_parts() {
        let inputs = InputTable::new()
            .with("population_dgf", YEAR, vec![1000.0; 4])
            .with("population_insee", YEAR, vec![1000.0; 4])
            .with("potentiel_financier", YEAR, vec![1e6; 4]);
        let sim = simulation(inputs);

        let total = sim
            .evaluate("dsr_montant_total_eligibles_fraction_perequation", YEAR)
            .unwrap();
        assert_eq!(total.to_vec(), vec![637_647_749.0; 4]);

        let parts: f64 = [
            "potentiel_financier_par_habitant",
            "longueur_voirie",
            "enfants",
            "potentiel_financier_par_hectare",
        ]
        .into_iter()
        .map(|suffix| {
            let name = format!("dsr_montant_total_eligibles_fraction_perequation_part_{suffix}");
            sim.evaluate(&name, YEAR).unwrap()[0]
        })
        .sum();
        assert_approx_eq!(f64, parts, 637_647_749.0, epsilon = 1e-3);
    }

    #[test]
    fn test_fraction_is_an_input() {
        let mut registry = crate::rules::registry().unwrap();
        assert!(
            !registry
                .definition("dsr_fraction_perequation")
                .unwrap()
                .has_formulas()
        );

        // Extra inputs can be declared next to the legislation
        registry
            .register(commune_input("nombre_enfants", ValueType::Int))
            .unwrap();
        let inputs = InputTable::new()
            .with("dsr_fraction_perequation", YEAR, vec![10.0, 0.0, 2.5, 0.0])
            .with("nombre_enfants", YEAR, vec![10.4, 0.0, 3.0, 1.0]);
        let sim = Simulation::new(
            registry,
            Population::anonymous(4),
            inputs,
            ParameterTree::legislation().unwrap(),
        )
        .unwrap();
        assert_eq!(
            sim.evaluate("dsr_fraction_perequation", YEAR)
                .unwrap()
                .to_vec(),
            vec![10.0, 0.0, 2.5, 0.0]
        );
        assert_eq!(
            sim.evaluate("nombre_enfants", YEAR).unwrap().to_vec(),
            vec![10.0, 0.0, 3.0, 1.0]
        );
    }
}

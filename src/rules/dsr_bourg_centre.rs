//! The bourg-centre fraction of the rural solidarity endowment (DSR).
//!
//! Small towns acting as local centres (chefs-lieux de canton, bureaux centralisateurs or communes
//! holding a large share of their canton) are eligible unless they sit in a large urban area, in a
//! canton whose chef-lieu is too big, or are too wealthy. The nationwide envelope is shared among
//! eligible communes in proportion to a score, with year-on-year stability guarantees.
use super::{FormulaResult, commune, etat, first_of_january, or};
use crate::error::EvaluationError;
use crate::numeric::{growth_clamp, masked_ratio, value_per_point};
use crate::period::{Period, PeriodUnit};
use crate::simulation::Accessor;
use crate::value::{Array, ValueType};
use crate::variable::VariableDefinition;
use itertools::izip;

/// The envelope published for 2019, anchoring the envelopes of other years
const MONTANT_TOTAL_2019: f64 = 545_248_126.0;

/// The envelope published for 2020
const MONTANT_TOTAL_2020: f64 = 581_804_312.0;

/// The increase of the whole DSR between 2019 and 2020
const AUGMENTATION_MONTANT_2020: f64 = 90_000_000.0;

pub(super) fn variables() -> Vec<VariableDefinition> {
    let mut variables = eligibility();
    variables.extend(attribution());
    variables
}

/// Exclusions and eligibility
fn eligibility() -> Vec<VariableDefinition> {
    vec![
        commune(
            "dsr_exclue_fraction_bourg_centre_agglomeration",
            ValueType::Bool,
            "Exclusion de la fraction bourg-centre de la DSR au titre de l'agglomération",
        )
        .formula(exclue_agglomeration),
        commune(
            "dsr_exclue_fraction_bourg_centre_canton",
            ValueType::Bool,
            "Exclusion de la fraction bourg-centre de la DSR au titre du canton",
        )
        .formula(exclue_canton),
        commune(
            "dsr_exclue_fraction_bourg_centre_pfi",
            ValueType::Bool,
            "Exclusion de la fraction bourg-centre de la DSR au titre du potentiel financier",
        )
        .formula(exclue_pfi),
        commune(
            "dsr_exclue_fraction_bourg_centre_type_1",
            ValueType::Bool,
            "Exclusion de la fraction bourg-centre de la DSR des communes de moins de \
             10 000 habitants",
        )
        .formula(|sim: &dyn Accessor, period| {
            let agglomeration =
                sim.bools("dsr_exclue_fraction_bourg_centre_agglomeration", period)?;
            let canton = sim.bools("dsr_exclue_fraction_bourg_centre_canton", period)?;
            let pfi = sim.bools("dsr_exclue_fraction_bourg_centre_pfi", period)?;
            Ok(izip!(agglomeration, canton, pfi)
                .map(|(a, c, p)| f64::from(a || c || p))
                .collect())
        }),
        commune(
            "dsr_exclue_fraction_bourg_centre_type_2",
            ValueType::Bool,
            "Exclusion de la fraction bourg-centre de la DSR des chefs-lieux d'arrondissement",
        )
        .formula(|sim: &dyn Accessor, period| {
            let agglomeration =
                sim.bools("dsr_exclue_fraction_bourg_centre_agglomeration", period)?;
            let pfi = sim.bools("dsr_exclue_fraction_bourg_centre_pfi", period)?;
            Ok(or(&agglomeration, &pfi).into_iter().map(f64::from).collect())
        }),
        commune(
            "dsr_eligible_fraction_bourg_centre_type_1",
            ValueType::Bool,
            "Éligibilité à la fraction bourg-centre de la DSR des communes de moins de \
             10 000 habitants",
        )
        .formula(eligible_type_1),
        commune(
            "dsr_eligible_fraction_bourg_centre_type_2",
            ValueType::Bool,
            "Éligibilité à la fraction bourg-centre de la DSR des chefs-lieux d'arrondissement \
             de 10 000 à 20 000 habitants",
        )
        .formula(eligible_type_2),
        commune(
            "dsr_eligible_fraction_bourg_centre",
            ValueType::Bool,
            "Éligibilité à la fraction bourg-centre de la DSR",
        )
        .formula(|sim: &dyn Accessor, period| {
            let type_1 = sim.bools("dsr_eligible_fraction_bourg_centre_type_1", period)?;
            let type_2 = sim.bools("dsr_eligible_fraction_bourg_centre_type_2", period)?;
            Ok(or(&type_1, &type_2).into_iter().map(f64::from).collect())
        }),
    ]
}

/// Scores, envelopes and amounts with their guarantees
fn attribution() -> Vec<VariableDefinition> {
    vec![
        commune(
            "dsr_score_attribution_fraction_bourg_centre",
            ValueType::Float,
            "Score de répartition de la fraction bourg-centre entre les communes éligibles",
        )
        .formula(score_attribution),
        etat(
            "dsr_pourcentage_accroissement_bourg_centre",
            ValueType::Float,
            "Part de l'augmentation de la DSR attribuée à la fraction bourg-centre",
        )
        .formula(|_, _| {
            Ok(vec![
                (MONTANT_TOTAL_2020 - MONTANT_TOTAL_2019) / AUGMENTATION_MONTANT_2020,
            ])
        }),
        etat(
            "dsr_montant_total_fraction_bourg_centre",
            ValueType::Float,
            "Montant total de la fraction bourg-centre de la DSR",
        )
        .formula_from(first_of_january(2013), montant_total_avant_2019)
        .formula_from(first_of_january(2019), |_, _| Ok(vec![MONTANT_TOTAL_2019]))
        .formula_from(first_of_january(2020), montant_total_depuis_2020),
        etat(
            "dsr_montant_total_eligibles_fraction_bourg_centre",
            ValueType::Float,
            "Montant de la fraction bourg-centre à répartir entre les communes éligibles",
        )
        .formula_from(first_of_january(2018), montant_total_eligibles),
        etat(
            "dsr_valeur_point_fraction_bourg_centre",
            ValueType::Float,
            "Valeur du point de la fraction bourg-centre de la DSR",
        )
        .formula(|sim: &dyn Accessor, period| {
            let envelope = sim.scalar("dsr_montant_total_eligibles_fraction_bourg_centre", period)?;
            let scores = sim.get("dsr_score_attribution_fraction_bourg_centre", period)?;
            let (point, _) = value_per_point(envelope, &scores);
            Ok(vec![point])
        }),
        commune(
            "dsr_montant_hors_garanties_fraction_bourg_centre",
            ValueType::Float,
            "Montant de la fraction bourg-centre avant garanties de stabilité",
        )
        .formula(|sim: &dyn Accessor, period| {
            let scores = sim.get("dsr_score_attribution_fraction_bourg_centre", period)?;
            let point = sim.scalar("dsr_valeur_point_fraction_bourg_centre", period)?;
            Ok(scores.iter().map(|score| score * point).collect())
        }),
        commune(
            "dsr_montant_eligible_fraction_bourg_centre",
            ValueType::Float,
            "Montant de la fraction bourg-centre après garanties de stabilité",
        )
        .formula_from(first_of_january(2012), montant_eligible),
        commune(
            "dsr_montant_garantie_non_eligible_fraction_bourg_centre",
            ValueType::Float,
            "Garantie de sortie de la fraction bourg-centre pour les communes devenues inéligibles",
        )
        .formula(garantie_non_eligible),
        commune(
            "dsr_fraction_bourg_centre",
            ValueType::Float,
            "Montant attribué au titre de la fraction bourg-centre de la DSR, garanties comprises",
        )
        .formula(|sim: &dyn Accessor, period| {
            let eligible = sim.get("dsr_montant_eligible_fraction_bourg_centre", period)?;
            let sortie =
                sim.get("dsr_montant_garantie_non_eligible_fraction_bourg_centre", period)?;
            let nouvelle = sim.get("dsr_garantie_commune_nouvelle_fraction_bourg_centre", period)?;
            Ok(izip!(eligible.iter(), sortie.iter(), nouvelle.iter())
                .map(|(e, s, n)| e.max(*s).max(*n))
                .collect())
        }),
    ]
}

/// Mask of the mainland communes below the DSR population threshold
fn communes_moins_10000(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let seuil = sim.param("dotation_solidarite_rurale.seuil_nombre_habitants", period)?;
    let population_dgf = sim.get("population_dgf", period)?;
    let outre_mer = sim.bools("outre_mer", period)?;
    Ok(izip!(population_dgf.iter(), outre_mer)
        .map(|(&pop, om)| f64::from(!om && pop < seuil))
        .collect())
}

fn exclue_agglomeration(sim: &dyn Accessor, period: Period) -> FormulaResult {
    const EXCLUSION: &str = "dotation_solidarite_rurale.bourg_centre.eligibilite.exclusion";
    let seuil_part = sim.param(
        &format!("{EXCLUSION}.seuil_part_population_dgf_agglomeration_departement"),
        period,
    )?;
    let seuil_agglomeration = sim.param(
        &format!("{EXCLUSION}.seuil_population_dgf_agglomeration"),
        period,
    )?;
    let seuil_commune = sim.param(
        &format!("{EXCLUSION}.seuil_population_dgf_maximum_commune_agglomeration"),
        period,
    )?;

    let part = sim.get("part_population_agglomeration_departement", period)?;
    let agglomeration = sim.get("population_dgf_agglomeration", period)?;
    let maximum = sim.get("population_dgf_maximum_commune_agglomeration", period)?;
    let chef_lieu = sim.bools("chef_lieu_departement_dans_agglomeration", period)?;

    Ok(
        izip!(part.iter(), agglomeration.iter(), maximum.iter(), chef_lieu)
            .map(|(&part, &agglomeration, &maximum, chef_lieu)| {
                f64::from(
                    part >= seuil_part
                        || agglomeration >= seuil_agglomeration
                        || maximum >= seuil_commune
                        || chef_lieu,
                )
            })
            .collect(),
    )
}

/// Bureaux centralisateurs are spared
fn exclue_canton(sim: &dyn Accessor, period: Period) -> FormulaResult {
    const EXCLUSION: &str = "dotation_solidarite_rurale.bourg_centre.eligibilite.exclusion";
    let seuil = sim.param(
        &format!("{EXCLUSION}.seuil_population_dgf_chef_lieu_de_canton"),
        period,
    )?;
    let chef_lieu = sim.get("population_dgf_chef_lieu_de_canton", period)?;
    let bureau_centralisateur = sim.bools("bureau_centralisateur", period)?;
    Ok(izip!(chef_lieu.iter(), bureau_centralisateur)
        .map(|(&pop, bureau)| f64::from(pop >= seuil && !bureau))
        .collect())
}

/// Communes richer than a multiple of the average of small mainland communes
fn exclue_pfi(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let ratio = sim.param(
        "dotation_solidarite_rurale.bourg_centre.eligibilite.exclusion.seuil_rapport_pfi_10000",
        period,
    )?;
    let mask = communes_moins_10000(sim, period)?;
    let potentiel_financier = sim.get("potentiel_financier", period)?;
    let population_dgf = sim.get("population_dgf", period)?;
    let pot_fin_10000 = masked_ratio(&mask, &potentiel_financier, &population_dgf, 0.0);

    let par_habitant = sim.get("potentiel_financier_par_habitant", period)?;
    Ok(par_habitant
        .iter()
        .map(|&pfi| f64::from(pfi >= ratio * pot_fin_10000))
        .collect())
}

fn eligible_type_1(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let seuil = sim.param("dotation_solidarite_rurale.seuil_nombre_habitants", period)?;
    let seuil_part = sim.param(
        "dotation_solidarite_rurale.bourg_centre.eligibilite.seuil_part_population_canton",
        period,
    )?;

    let population = sim.get("population_dgf_plafonnee", period)?;
    let part_canton = sim.get("part_population_canton", period)?;
    let bureau_centralisateur = sim.bools("bureau_centralisateur", period)?;
    let chef_lieu = sim.bools("chef_lieu_de_canton", period)?;
    let outre_mer = sim.bools("outre_mer", period)?;
    let exclue = sim.bools("dsr_exclue_fraction_bourg_centre_type_1", period)?;

    Ok(izip!(
        population.iter(),
        part_canton.iter(),
        bureau_centralisateur,
        chef_lieu,
        outre_mer,
        exclue
    )
    .map(|(&pop, &part, bureau, chef_lieu, om, exclue)| {
        let centre = part >= seuil_part || bureau || chef_lieu;
        f64::from(!om && pop < seuil && centre && !exclue)
    })
    .collect())
}

fn eligible_type_2(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let seuil = sim.param("dotation_solidarite_rurale.seuil_nombre_habitants", period)?;
    let seuil_chef_lieu = sim.param(
        "dotation_solidarite_rurale.bourg_centre.eligibilite.seuil_nombre_habitants_chef_lieu",
        period,
    )?;

    let population = sim.get("population_dgf_plafonnee", period)?;
    let chef_lieu = sim.bools("chef_lieu_arrondissement", period)?;
    let outre_mer = sim.bools("outre_mer", period)?;
    let exclue = sim.bools("dsr_exclue_fraction_bourg_centre_type_2", period)?;

    Ok(izip!(population.iter(), chef_lieu, outre_mer, exclue)
        .map(|(&pop, chef_lieu, om, exclue)| {
            let taille = pop >= seuil && pop <= seuil_chef_lieu;
            f64::from(!om && taille && chef_lieu && !exclue)
        })
        .collect())
}

/// Score = population x financial potential gap x fiscal effort x rural revitalisation bonus.
///
/// Without any small mainland commune to compare against, the financial potential factor is zero.
fn score_attribution(sim: &dyn Accessor, period: Period) -> FormulaResult {
    const ATTRIBUTION: &str = "dotation_solidarite_rurale.bourg_centre.attribution";
    let plafond_effort = sim.param(&format!("{ATTRIBUTION}.plafond_effort_fiscal"), period)?;
    let plafond_population = sim.param(&format!("{ATTRIBUTION}.plafond_population"), period)?;
    let coefficient_zrr = sim.param(&format!("{ATTRIBUTION}.coefficient_zrr"), period)?;

    let mask = communes_moins_10000(sim, period)?;
    let potentiel_financier = sim.get("potentiel_financier", period)?;
    let population_dgf = sim.get("population_dgf", period)?;
    let pot_fin_10000 = masked_ratio(&mask, &potentiel_financier, &population_dgf, 0.0);

    let eligible = sim.bools("dsr_eligible_fraction_bourg_centre", period)?;
    let population = sim.get("population_dgf_plafonnee", period)?;
    let par_habitant = sim.get("potentiel_financier_par_habitant", period)?;
    let effort_fiscal = sim.get("effort_fiscal", period)?;
    let zrr = sim.bools("zrr", period)?;

    Ok(izip!(
        eligible,
        population.iter(),
        par_habitant.iter(),
        effort_fiscal.iter(),
        zrr
    )
    .map(|(eligible, &pop, &pfi, &effort, zrr)| {
        if !eligible {
            return 0.0;
        }

        let facteur_pot_fin = if pot_fin_10000 > 0.0 {
            (2.0 - pfi / pot_fin_10000).max(0.0)
        } else {
            0.0
        };
        let facteur_zrr = if zrr { coefficient_zrr } else { 1.0 };
        pop.min(plafond_population) * facteur_pot_fin * effort.min(plafond_effort) * facteur_zrr
    })
    .collect())
}

/// Before 2019, work back from the following year's envelope
fn montant_total_avant_2019(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let next_year = period.offset(1, PeriodUnit::Year);
    let montant = sim.scalar("dsr_montant_total_fraction_bourg_centre", next_year)?;
    let augmentation = sim.param("dotation_solidarite_rurale.augmentation_montant", next_year)?;
    let pourcentage = sim.scalar("dsr_pourcentage_accroissement_bourg_centre", period)?;
    Ok(vec![montant - augmentation * pourcentage])
}

/// From 2020, grow the previous year's envelope
fn montant_total_depuis_2020(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let montant = sim.scalar("dsr_montant_total_fraction_bourg_centre", period.last_year())?;
    let augmentation = sim.param("dotation_solidarite_rurale.augmentation_montant", period)?;
    let pourcentage = sim.scalar("dsr_pourcentage_accroissement_bourg_centre", period)?;
    Ok(vec![montant + augmentation * pourcentage])
}

/// The envelope less what goes to guarantees
fn montant_total_eligibles(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let montant = sim.scalar("dsr_montant_total_fraction_bourg_centre", period)?;
    let eligible = sim.bools("dsr_eligible_fraction_bourg_centre", period)?;
    let nouvelle = sim.get("dsr_garantie_commune_nouvelle_fraction_bourg_centre", period)?;
    let sortie = sim.get("dsr_montant_garantie_non_eligible_fraction_bourg_centre", period)?;

    let garanties: Vec<f64> = izip!(eligible, nouvelle.iter(), sortie.iter())
        .map(|(eligible, &nouvelle, &sortie)| {
            let nouvelle = if eligible { 0.0 } else { nouvelle };
            nouvelle.max(sortie)
        })
        .collect();

    Ok(vec![
        montant - sim.population().aggregate_sum_of_members(&garanties),
    ])
}

/// Last year's amount after guarantees, as supplied; communes without one start from zero
fn montant_precedent(sim: &dyn Accessor, period: Period) -> Result<Array, EvaluationError> {
    sim.input_or_default(
        "dsr_montant_eligible_fraction_bourg_centre",
        period.last_year(),
    )
}

fn montant_eligible(sim: &dyn Accessor, period: Period) -> FormulaResult {
    const ATTRIBUTION: &str = "dotation_solidarite_rurale.bourg_centre.attribution";
    let plancher = sim.param(&format!("{ATTRIBUTION}.plancher_ratio_progression"), period)?;
    let plafond = sim.param(&format!("{ATTRIBUTION}.plafond_ratio_progression"), period)?;

    let precedent = montant_precedent(sim, period)?;
    let montant = sim.get("dsr_montant_hors_garanties_fraction_bourg_centre", period)?;
    Ok(growth_clamp(&precedent, &montant, plancher, plafond))
}

/// Communes which lose eligibility keep part of last year's amount, once
fn garantie_non_eligible(sim: &dyn Accessor, period: Period) -> FormulaResult {
    let part = sim.param(
        "dotation_solidarite_rurale.bourg_centre.attribution.part_garantie_sortie",
        period,
    )?;
    let eligible = sim.bools("dsr_eligible_fraction_bourg_centre", period)?;
    let precedent = montant_precedent(sim, period)?;
    Ok(izip!(eligible, precedent.iter())
        .map(|(eligible, &montant)| if eligible { 0.0 } else { montant * part })
        .collect())
}

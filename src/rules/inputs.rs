//! Raw facts about communes, supplied through the input table
use super::commune;
use crate::entity::EntityKind;
use crate::period::PeriodUnit;
use crate::value::ValueType;
use crate::variable::VariableDefinition;

/// Yearly commune inputs: (name, type, label)
const YEARLY: [(&str, ValueType, &str); 24] = [
    (
        "population_insee",
        ValueType::Int,
        "Population INSEE de la commune",
    ),
    (
        "population_dgf",
        ValueType::Int,
        "Population au sens DGF de la commune",
    ),
    (
        "potentiel_financier",
        ValueType::Float,
        "Potentiel financier de la commune",
    ),
    (
        "potentiel_fiscal",
        ValueType::Int,
        "Potentiel fiscal de la commune (4 taxes)",
    ),
    ("effort_fiscal", ValueType::Float, "Effort fiscal de la commune"),
    (
        "revenu_total",
        ValueType::Float,
        "Revenu imposable total des habitants de la commune",
    ),
    (
        "superficie",
        ValueType::Float,
        "Superficie de la commune en hectares",
    ),
    (
        "longueur_voirie",
        ValueType::Int,
        "Longueur de la voirie de la commune en mètres",
    ),
    (
        "nombre_logements",
        ValueType::Int,
        "Nombre total de logements de la commune",
    ),
    (
        "nombre_logements_sociaux",
        ValueType::Int,
        "Nombre de logements sociaux de la commune",
    ),
    (
        "nombre_beneficiaires_aides_au_logement",
        ValueType::Int,
        "Nombre de bénéficiaires d'aides au logement de la commune",
    ),
    (
        "zone_de_montagne",
        ValueType::Bool,
        "Commune située en zone de montagne",
    ),
    ("insulaire", ValueType::Bool, "Commune insulaire"),
    (
        "bureau_centralisateur",
        ValueType::Bool,
        "Commune bureau centralisateur",
    ),
    (
        "part_population_canton",
        ValueType::Float,
        "Part de la population DGF de la commune dans son canton (tel que défini en 2014)",
    ),
    (
        "population_dgf_chef_lieu_de_canton",
        ValueType::Int,
        "Population DGF du chef-lieu du canton de la commune au 1er janvier 2014",
    ),
    (
        "population_dgf_agglomeration",
        ValueType::Int,
        "Population DGF totale de l'agglomération de la commune",
    ),
    (
        "population_dgf_departement_agglomeration",
        ValueType::Int,
        "Population DGF totale du département de référence de l'agglomération",
    ),
    (
        "population_dgf_maximum_commune_agglomeration",
        ValueType::Int,
        "Population maximale d'une commune de l'agglomération de la commune",
    ),
    (
        "chef_lieu_departement_dans_agglomeration",
        ValueType::Bool,
        "Le chef-lieu de département se trouve dans l'agglomération de la commune",
    ),
    ("dotation_forfaitaire", ValueType::Float, "Dotation forfaitaire (DF)"),
    (
        "dotation_solidarite_rurale",
        ValueType::Float,
        "Dotation de solidarité rurale (DSR)",
    ),
    (
        "dsr_fraction_perequation",
        ValueType::Float,
        "Montant attribué au titre de la fraction péréquation de la DSR",
    ),
    (
        "dsr_garantie_commune_nouvelle_fraction_bourg_centre",
        ValueType::Float,
        "Montant garanti aux communes nouvelles au titre de la fraction bourg-centre de la DSR",
    ),
];

/// Inputs which don't change from year to year: (name, label)
const PERMANENT: [(&str, &str); 4] = [
    ("zrr", "Commune située en zone de revitalisation rurale (ZRR)"),
    ("outre_mer", "Caractère ultramarin de la commune"),
    (
        "chef_lieu_de_canton",
        "Commune chef-lieu de canton au 1er janvier 2014",
    ),
    (
        "chef_lieu_arrondissement",
        "Commune chef-lieu d'arrondissement au 31 décembre 2014",
    ),
];

/// Inputs without which no endowment can be computed
const REQUIRED: [&str; 3] = ["population_insee", "population_dgf", "potentiel_financier"];

pub(super) fn variables() -> Vec<VariableDefinition> {
    let yearly = YEARLY.into_iter().map(|(name, value_type, label)| {
        let definition = commune(name, value_type, label);
        if REQUIRED.contains(&name) {
            definition.required()
        } else {
            definition
        }
    });

    let permanent = PERMANENT.into_iter().map(|(name, label)| {
        VariableDefinition::new(
            name,
            ValueType::Bool,
            EntityKind::Commune,
            PeriodUnit::Eternity,
        )
        .label(label)
    });

    yearly.chain(permanent).collect()
}

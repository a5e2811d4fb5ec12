//! Entities which variables are defined for.
//!
//! There are two kinds of entity: the communes, of which there are many, and the state ("état"),
//! of which there is exactly one and whose members are all the communes. Every commune variable
//! holds one value per commune, in the order in which the communes were given when the population
//! was created. State variables hold a single value.
use crate::id::CommuneID;
use crate::value::Array;
use anyhow::{Result, ensure};
use indexmap::IndexSet;
use itertools::izip;

/// The kind of entity a variable is defined for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    /// A municipality
    Commune,
    /// The nationwide aggregate of all communes
    Etat,
}

/// The ordered set of communes taking part in a simulation.
///
/// The number and order of communes cannot change once the population has been created.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    communes: IndexSet<CommuneID>,
}

impl Population {
    /// Create a population from commune codes.
    ///
    /// # Arguments
    ///
    /// * `communes` - Commune codes (e.g. INSEE codes), which must be unique
    pub fn new<I, T>(communes: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<CommuneID>,
    {
        let mut set = IndexSet::new();
        for commune in communes {
            let commune = commune.into();
            ensure!(
                !set.contains(&commune),
                "Duplicate commune code: {commune}"
            );
            set.insert(commune);
        }

        Ok(Self { communes: set })
    }

    /// A population of `n` communes with generated codes (`0`, `1`, ...)
    pub fn anonymous(n: usize) -> Self {
        Self {
            communes: (0..n).map(|i| CommuneID::from(i.to_string())).collect(),
        }
    }

    /// The number of communes
    pub fn size(&self) -> usize {
        self.communes.len()
    }

    /// The number of members of the given entity kind
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Commune => self.size(),
            EntityKind::Etat => 1,
        }
    }

    /// Iterate over commune codes in order
    pub fn communes(&self) -> impl Iterator<Item = &CommuneID> {
        self.communes.iter()
    }

    /// The position of a commune in every commune array
    pub fn index_of(&self, commune: &str) -> Option<usize> {
        self.communes.get_index_of(commune)
    }

    /// Sum of the values of a commune array
    pub fn sum(&self, values: &[f64]) -> f64 {
        debug_assert_eq!(values.len(), self.size());
        values.iter().sum()
    }

    /// Sum of the values for which `mask` is non-zero
    pub fn masked_sum(&self, mask: &[f64], values: &[f64]) -> f64 {
        debug_assert_eq!(mask.len(), self.size());
        izip!(mask, values)
            .filter(|(mask, _)| **mask != 0.0)
            .map(|(_, value)| value)
            .sum()
    }

    /// Give every commune the value of a nationwide scalar
    pub fn broadcast_from_aggregate(&self, value: f64) -> Array {
        Array::filled(self.size(), value)
    }

    /// Aggregate a commune array into the value of the state
    pub fn aggregate_sum_of_members(&self, values: &[f64]) -> f64 {
        self.sum(values)
    }
}

//! Periods over which variables are defined and evaluated.
//!
//! A variable is either defined per year (e.g. a commune's DGF population) or for all eternity
//! (e.g. whether a commune was a canton's chief town on 1 January 2014). Formulas can refer to
//! other periods by offsetting the one they are evaluated for, most commonly to read last year's
//! value.
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// The granularity of a period
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum PeriodUnit {
    /// All time; used for attributes which don't vary from year to year
    Eternity,
    /// A calendar year, starting on 1 January
    Year,
}

/// A span of time made of `size` consecutive units, starting at `start_year`.
///
/// Periods order chronologically, with eternity sorting before any year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    unit: PeriodUnit,
    start_year: i32,
    size: u32,
}

impl Period {
    /// A single calendar year
    pub const fn year(year: i32) -> Self {
        Self::years(year, 1)
    }

    /// `size` consecutive calendar years starting at `start_year`
    pub const fn years(start_year: i32, size: u32) -> Self {
        Self {
            unit: PeriodUnit::Year,
            start_year,
            size: if size == 0 { 1 } else { size },
        }
    }

    /// The period covering all time
    pub const fn eternity() -> Self {
        Self {
            unit: PeriodUnit::Eternity,
            start_year: i32::MIN,
            size: 1,
        }
    }

    /// The granularity of this period
    pub fn unit(&self) -> PeriodUnit {
        self.unit
    }

    /// The number of units this period spans
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether this is the eternity period
    pub fn is_eternity(&self) -> bool {
        self.unit == PeriodUnit::Eternity
    }

    /// Whether this period is exactly one calendar year
    pub fn is_whole_year(&self) -> bool {
        self.unit == PeriodUnit::Year && self.size == 1
    }

    /// The first year of the period, or `None` for eternity
    pub fn start_year(&self) -> Option<i32> {
        (!self.is_eternity()).then_some(self.start_year)
    }

    /// The date at which the period starts.
    ///
    /// This is the date used to select formula versions and parameter values. Eternity starts at
    /// [`NaiveDate::MIN`].
    pub fn start_date(&self) -> NaiveDate {
        if self.is_eternity() {
            return NaiveDate::MIN;
        }

        NaiveDate::from_ymd_opt(self.start_year, 1, 1).unwrap_or(if self.start_year < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        })
    }

    /// Shift the period by `n` units.
    ///
    /// Eternity is unaffected by offsets and offsetting by eternity is a no-op.
    pub fn offset(&self, n: i32, unit: PeriodUnit) -> Self {
        match (self.unit, unit) {
            (PeriodUnit::Year, PeriodUnit::Year) => Self {
                start_year: self.start_year.saturating_add(n),
                ..*self
            },
            _ => *self,
        }
    }

    /// The calendar year before the one in which this period starts
    pub fn last_year(&self) -> Self {
        if self.is_eternity() {
            return *self;
        }

        Self::year(self.start_year.saturating_sub(1))
    }

    /// The calendar year in which this period starts
    pub fn this_year(&self) -> Self {
        if self.is_eternity() {
            return *self;
        }

        Self::year(self.start_year)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.unit, self.size) {
            (PeriodUnit::Eternity, _) => write!(f, "eternity"),
            (PeriodUnit::Year, 1) => write!(f, "{}", self.start_year),
            (PeriodUnit::Year, size) => write!(f, "year:{}:{size}", self.start_year),
        }
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    /// Parse a period from one of `eternity`, `2020` or `year:2020:3`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("eternity") {
            return Ok(Self::eternity());
        }

        let parse_year = |y: &str| {
            y.trim()
                .parse::<i32>()
                .with_context(|| format!("Invalid year: {y}"))
        };

        let parts: Vec<_> = s.split(':').collect();
        match parts.as_slice() {
            [year] => Ok(Self::year(parse_year(year)?)),
            [unit, year, size] => {
                let unit: PeriodUnit = unit
                    .parse()
                    .with_context(|| format!("Invalid period unit: {unit}"))?;
                ensure!(unit == PeriodUnit::Year, "Only year periods can have a size");
                let size: u32 = size
                    .parse()
                    .with_context(|| format!("Invalid period size: {size}"))?;
                ensure!(size > 0, "Period size must be greater than zero");
                Ok(Self::years(parse_year(year)?, size))
            }
            _ => bail!("Invalid period: {s}"),
        }
    }
}

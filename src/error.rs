//! Errors raised while evaluating variables.
//!
//! Any of these is fatal for the evaluation which triggered it. Errors coming out of a formula are
//! wrapped once per level of the evaluation chain, so that the message shows which variables were
//! being computed, and for which period, when things went wrong.
use crate::id::VariableID;
use crate::period::Period;
use chrono::NaiveDate;
use itertools::Itertools;
use thiserror::Error;

/// An error raised while evaluating a variable
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The variable is neither registered nor present in the input table
    #[error("Unknown variable: {0}")]
    UnknownVariable(VariableID),

    /// No parameter exists at this path, or none was in force on the date
    #[error("Unknown parameter: {path} (as of {date})")]
    UnknownParameter {
        /// Dotted path of the parameter
        path: String,
        /// The date for which it was requested
        date: NaiveDate,
    },

    /// A scalar was requested for a scale parameter or vice versa
    #[error("Parameter {path} is not a {expected}")]
    ParameterType {
        /// Dotted path of the parameter
        path: String,
        /// What the caller asked for
        expected: &'static str,
    },

    /// The variable has formulas but none of them is in force for the period
    #[error("No formula for {name} is in force for period {period}")]
    NoApplicableFormula {
        /// The variable
        name: VariableID,
        /// The period requested
        period: Period,
    },

    /// A raw input was needed but was not supplied
    #[error("Missing input: {name} for period {period}")]
    MissingInput {
        /// The variable
        name: VariableID,
        /// The period requested
        period: Period,
    },

    /// A strict division met a zero denominator
    #[error("Division by zero while computing {context}")]
    DivisionByZeroPolicyViolation {
        /// What was being divided
        context: String,
    },

    /// A variable was requested for a period while it was already being computed for that period
    #[error("Cyclic dependency: {name} for period {period} depends on itself")]
    CyclicSamePeriodDependency {
        /// The variable
        name: VariableID,
        /// The period
        period: Period,
    },

    /// A yearly variable was requested for a period which is not a single year
    #[error("{name} is defined per year and cannot be evaluated for period {period}")]
    PeriodMismatch {
        /// The variable
        name: VariableID,
        /// The period requested
        period: Period,
    },

    /// A formula or input produced a column of the wrong length
    #[error("{name} has {actual} values but {expected} were expected")]
    ShapeMismatch {
        /// The variable
        name: VariableID,
        /// The number of members of the owning entity
        expected: usize,
        /// The number of values produced
        actual: usize,
    },

    /// Evaluation nested more deeply than allowed
    #[error("Maximum evaluation depth ({0}) exceeded")]
    DepthExceeded(usize),

    /// A variable with this name is already registered
    #[error("Variable {0} is already registered")]
    DuplicateVariable(VariableID),

    /// An error raised while a formula was running
    #[error("{name} ({period}) -> {cause}")]
    Formula {
        /// The variable whose formula failed
        name: VariableID,
        /// The period it was being evaluated for
        period: Period,
        /// The underlying error
        #[source]
        cause: Box<EvaluationError>,
    },
}

impl EvaluationError {
    /// Wrap this error with the variable and period being computed when it occurred
    pub fn in_formula(self, name: &VariableID, period: Period) -> Self {
        EvaluationError::Formula {
            name: name.clone(),
            period,
            cause: Box::new(self),
        }
    }

    /// The innermost error, stripped of the evaluation chain
    pub fn root_cause(&self) -> &EvaluationError {
        let mut error = self;
        while let EvaluationError::Formula { cause, .. } = error {
            error = cause.as_ref();
        }

        error
    }

    /// The chain of (variable, period) being evaluated, outermost first
    pub fn path(&self) -> Vec<(VariableID, Period)> {
        let mut path = Vec::new();
        let mut error = self;
        while let EvaluationError::Formula {
            name,
            period,
            cause,
        } = error
        {
            path.push((name.clone(), *period));
            error = cause.as_ref();
        }

        path
    }

    /// The evaluation chain as a human-readable string, e.g. `a (2020) -> b (2019)`
    pub fn path_string(&self) -> String {
        self.path()
            .iter()
            .map(|(name, period)| format!("{name} ({period})"))
            .join(" -> ")
    }
}

//! Value types and the array type in which variable values are held.
//!
//! Every variable value is a column of `f64`s with one entry per member of the owning entity.
//! Booleans are stored as `0.0`/`1.0` and integers as whole numbers, so that formulas can freely
//! multiply eligibility masks with amounts.
use derive_more::Deref;
use std::rc::Rc;

/// The declared type of a variable's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    /// Whole numbers (e.g. populations, ranks)
    Int,
    /// Real numbers (e.g. amounts in euros)
    Float,
    /// True/false flags (e.g. eligibility)
    Bool,
}

impl ValueType {
    /// Convert a raw value to this type.
    ///
    /// Booleans become 1 for any non-zero value (NaN included), integers are truncated toward
    /// zero and floats are unchanged.
    pub fn cast(self, value: f64) -> f64 {
        match self {
            ValueType::Int => value.trunc(),
            ValueType::Float => value,
            ValueType::Bool => f64::from(value != 0.0),
        }
    }
}

/// An immutable column of values, cheap to clone.
///
/// Clones share the same allocation, which is how values served from the cache can be recognised
/// as the very same array (see [`Array::ptr_eq`]).
#[derive(Debug, Clone, PartialEq, Deref)]
#[deref(forward)]
pub struct Array(Rc<[f64]>);

impl Array {
    /// An array of `len` copies of `value`
    pub fn filled(len: usize, value: f64) -> Self {
        std::iter::repeat_n(value, len).collect()
    }

    /// Whether two arrays share the same storage
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Interpret the values as booleans (non-zero is true)
    pub fn to_bools(&self) -> Vec<bool> {
        self.iter().map(|&v| v != 0.0).collect()
    }

    /// The single value of a one-element array (e.g. a nationwide aggregate)
    pub fn scalar(&self) -> Option<f64> {
        match *self.0 {
            [value] => Some(value),
            _ => None,
        }
    }

    /// Apply a [`ValueType`] conversion to each element
    pub fn cast(&self, value_type: ValueType) -> Self {
        if value_type == ValueType::Float {
            return self.clone();
        }

        self.iter().map(|&v| value_type.cast(v)).collect()
    }
}

impl From<Vec<f64>> for Array {
    fn from(values: Vec<f64>) -> Self {
        Self(values.into())
    }
}

impl From<&[f64]> for Array {
    fn from(values: &[f64]) -> Self {
        Self(values.into())
    }
}

impl From<Vec<bool>> for Array {
    fn from(values: Vec<bool>) -> Self {
        values.into_iter().map(f64::from).collect()
    }
}

impl FromIterator<f64> for Array {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ValueType::Int, 2.7, 2.0)]
    #[case(ValueType::Int, -2.7, -2.0)]
    #[case(ValueType::Float, 2.7, 2.7)]
    #[case(ValueType::Bool, 2.7, 1.0)]
    #[case(ValueType::Bool, 0.0, 0.0)]
    #[case(ValueType::Bool, -0.0, 0.0)]
    fn test_cast(#[case] value_type: ValueType, #[case] value: f64, #[case] expected: f64) {
        assert_eq!(value_type.cast(value), expected);
    }

    #[test]
    fn test_array_sharing() {
        let a = Array::from(vec![1.0, 2.0]);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Array::from(vec![1.0, 2.0])));
        assert_eq!(a, Array::from(vec![1.0, 2.0]));
    }

    #[test]
    fn test_array_helpers() {
        assert_eq!(Array::filled(3, 0.5).to_vec(), vec![0.5; 3]);
        assert_eq!(Array::from(vec![true, false]).to_vec(), vec![1.0, 0.0]);
        assert_eq!(Array::from(vec![0.0, 3.0]).to_bools(), vec![false, true]);
        assert_eq!(Array::from(vec![4.0]).scalar(), Some(4.0));
        assert_eq!(Array::from(vec![4.0, 5.0]).scalar(), None);
        assert_eq!(
            Array::from(vec![1.9, 0.0]).cast(ValueType::Int).to_vec(),
            vec![1.0, 0.0]
        );
    }

    #[test]
    fn test_value_type_from_str() {
        assert_eq!("bool".parse::<ValueType>().unwrap(), ValueType::Bool);
        assert_eq!(ValueType::Float.to_string(), "float");
    }
}

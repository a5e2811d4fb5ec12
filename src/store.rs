//! Memoised variable values.
//!
//! Each (variable, period) cell is filled at most once per run. Values are shared arrays, so a
//! value read twice from the store is the very same array.
use crate::id::VariableID;
use crate::period::Period;
use crate::value::Array;
use indexmap::IndexMap;
use log::trace;
use std::cell::RefCell;

/// Computed values keyed by variable name and (normalised) period
#[derive(Debug, Default)]
pub struct ValueStore {
    cells: IndexMap<(VariableID, Period), Array>,
}

impl ValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored value for a cell, if it has been computed
    pub fn get(&self, name: &VariableID, period: Period) -> Option<Array> {
        self.cells.get(&(name.clone(), period)).cloned()
    }

    /// Store a value, returning the one held by the cell.
    ///
    /// A cell is only ever written once: if it is already filled, the existing value is kept and
    /// returned.
    pub fn insert(&mut self, name: &VariableID, period: Period, value: Array) -> Array {
        self.cells
            .entry((name.clone(), period))
            .or_insert(value)
            .clone()
    }

    /// Get the value of a cell, computing and storing it on a miss.
    ///
    /// The store is not borrowed while `compute` runs, so `compute` may itself read from and write
    /// to the store (for other cells).
    pub fn get_or_compute<F, E>(
        store: &RefCell<Self>,
        name: &VariableID,
        period: Period,
        compute: F,
    ) -> Result<Array, E>
    where
        F: FnOnce() -> Result<Array, E>,
    {
        if let Some(value) = store.borrow().get(name, period) {
            trace!("Using cached value of {name} for {period}");
            return Ok(value);
        }

        let value = compute()?;
        Ok(store.borrow_mut().insert(name, period, value))
    }

    /// The number of filled cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is filled
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Release all values
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_get_or_compute_once() {
        let store = RefCell::new(ValueStore::new());
        let name = VariableID::new("x");
        let calls = Cell::new(0);
        let compute = || -> Result<Array, ()> {
            calls.set(calls.get() + 1);
            Ok(Array::from(vec![1.0]))
        };

        let year = Period::year(2020);
        let first = ValueStore::get_or_compute(&store, &name, year, compute).unwrap();
        let second = ValueStore::get_or_compute(&store, &name, year, compute).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(first.ptr_eq(&second));

        ValueStore::get_or_compute(&store, &name, Period::year(2019), compute).unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(store.borrow().len(), 2);
    }

    #[test]
    fn test_get_or_compute_error_not_stored() {
        let store = RefCell::new(ValueStore::new());
        let name = VariableID::new("x");
        let result = ValueStore::get_or_compute(&store, &name, Period::year(2020), || Err("oops"));
        assert_eq!(result, Err("oops"));
        assert!(store.borrow().is_empty());
    }

    #[test]
    fn test_insert_keeps_first() {
        let mut store = ValueStore::new();
        let name = VariableID::new("x");
        let first = store.insert(&name, Period::eternity(), Array::from(vec![1.0]));
        let second = store.insert(&name, Period::eternity(), Array::from(vec![2.0]));
        assert!(first.ptr_eq(&second));

        store.clear();
        assert!(store.get(&name, Period::eternity()).is_none());
    }
}

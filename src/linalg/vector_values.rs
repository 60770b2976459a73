//! Per-variable tangent vectors.

use crate::core::Key;
use nalgebra::DVector;
use std::collections::BTreeMap;

/// Map from [`Key`] to a tangent-space vector.
///
/// Produced by the linear solvers and consumed by
/// [`Values::retract`](crate::core::Values::retract). A delta may carry keys
/// that the target `Values` does not hold; those are ignored on retract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorValues {
    values: BTreeMap<Key, DVector<f64>>,
}

impl VectorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero vectors for the given key dimensions.
    pub fn zero(dims: &BTreeMap<Key, usize>) -> Self {
        dims.iter()
            .map(|(&key, &dim)| (key, DVector::zeros(dim)))
            .collect()
    }

    /// Insert or replace, returning the previous vector.
    pub fn insert(&mut self, key: Key, value: DVector<f64>) -> Option<DVector<f64>> {
        self.values.insert(key, value)
    }

    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &DVector<f64>)> {
        self.values.iter().map(|(&k, v)| (k, v))
    }

    pub fn dims(&self) -> BTreeMap<Key, usize> {
        self.values.iter().map(|(&k, v)| (k, v.len())).collect()
    }

    /// Euclidean norm of the stacked vector.
    pub fn norm(&self) -> f64 {
        self.values
            .values()
            .map(|v| v.norm_squared())
            .sum::<f64>()
            .sqrt()
    }

    /// Same keys and every vector within `tol` (max-abs).
    pub fn equals(&self, other: &VectorValues, tol: f64) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().all(|(key, v)| {
                other.values.get(key).is_some_and(|w| {
                    v.len() == w.len() && (v - w).iter().all(|d| d.abs() <= tol)
                })
            })
    }
}

impl FromIterator<(Key, DVector<f64>)> for VectorValues {
    fn from_iter<I: IntoIterator<Item = (Key, DVector<f64>)>>(iter: I) -> Self {
        VectorValues {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for VectorValues {
    type Item = (Key, DVector<f64>);
    type IntoIter = std::collections::btree_map::IntoIter<Key, DVector<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

//! A full estimate: one manifold value per key.

use crate::core::{CoreError, CoreResult, Key};
use crate::linalg::VectorValues;
use crate::manifold::{Manifold, ManifoldError, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mapping from [`Key`] to a manifold value.
///
/// Iteration is in key order. Values are held behind `Arc`, so cloning a
/// `Values` and retracting it only allocates the variables that move.
#[derive(Debug, Clone, Default)]
pub struct Values {
    values: BTreeMap<Key, Arc<dyn Value>>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new variable. Fails if the key is already present.
    pub fn insert<T: Manifold>(&mut self, key: Key, value: T) -> CoreResult<()> {
        self.insert_shared(key, Arc::new(value))
    }

    pub fn insert_shared(&mut self, key: Key, value: Arc<dyn Value>) -> CoreResult<()> {
        if self.values.contains_key(&key) {
            return Err(CoreError::DuplicateKey(key));
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Replace an existing variable, keeping its concrete type.
    pub fn update<T: Manifold>(&mut self, key: Key, value: T) -> CoreResult<()> {
        let slot = self
            .values
            .get_mut(&key)
            .ok_or(CoreError::MissingVariable(key))?;
        if slot.as_any().downcast_ref::<T>().is_none() {
            return Err(CoreError::TypeMismatch {
                key,
                expected: slot.type_name(),
                actual: std::any::type_name::<T>(),
            });
        }
        *slot = Arc::new(value);
        Ok(())
    }

    /// Typed access.
    pub fn get<T: Manifold>(&self, key: Key) -> CoreResult<&T> {
        let value = self.value(key)?;
        value
            .as_any()
            .downcast_ref::<T>()
            .ok_or(CoreError::TypeMismatch {
                key,
                expected: std::any::type_name::<T>(),
                actual: value.type_name(),
            })
    }

    /// Untyped access.
    pub fn value(&self, key: Key) -> CoreResult<&dyn Value> {
        self.values
            .get(&key)
            .map(|v| v.as_ref())
            .ok_or(CoreError::MissingVariable(key))
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

    pub fn iter(&self) -> impl Iterator<Item = (Key, &dyn Value)> {
        self.values.iter().map(|(&k, v)| (k, v.as_ref()))
    }

    /// Tangent dimension of every variable.
    pub fn dims(&self) -> BTreeMap<Key, usize> {
        self.values
            .iter()
            .map(|(&k, v)| (k, v.tangent_dim()))
            .collect()
    }

    /// Total tangent dimension.
    pub fn dim(&self) -> usize {
        self.values.values().map(|v| v.tangent_dim()).sum()
    }

    /// New `Values` moved by `delta`.
    ///
    /// Keys of `delta` that are not present here are ignored, and variables
    /// without a delta entry are carried over unchanged. A delta of the wrong
    /// length for its variable is an error.
    pub fn retract(&self, delta: &VectorValues) -> CoreResult<Values> {
        let mut values = self.values.clone();
        for (key, value) in values.iter_mut() {
            if let Some(d) = delta.get(*key) {
                *value = value.retract_dyn(d).map_err(|e| match e {
                    ManifoldError::InvalidTangentDimension { expected, actual } => {
                        CoreError::DimensionMismatch {
                            key: *key,
                            expected,
                            actual,
                        }
                    }
                    other => CoreError::Manifold(other),
                })?;
            }
        }
        Ok(Values { values })
    }

    /// Local coordinates from `self` to `other`, for every key of `self`.
    pub fn local_coordinates(&self, other: &Values) -> CoreResult<VectorValues> {
        self.values
            .iter()
            .map(|(&key, value)| {
                let target = other.value(key)?;
                Ok((key, value.local_coordinates_dyn(target)?))
            })
            .collect()
    }

    /// Same keys, and every variable within `tol` in local coordinates.
    pub fn equals(&self, other: &Values, tol: f64) -> bool {
        if self.len() != other.len() {
            return false;
        }
        match self.local_coordinates(other) {
            Ok(delta) => delta.iter().all(|(_, d)| d.iter().all(|x| x.abs() <= tol)),
            Err(_) => false,
        }
    }
}

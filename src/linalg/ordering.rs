//! Elimination orderings.
//!
//! An [`Ordering`] is an injective map from keys to consecutive positions
//! `0..n`. The elimination solvers eliminate variables in position order, so
//! the ordering decides how much fill-in the intermediate factors get.

use crate::core::Key;
use crate::linalg::{LinAlgError, LinAlgResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Heuristic used to build an ordering from a graph structure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OrderingType {
    /// Key order.
    Natural,
    /// Greedy minimum degree on the variable adjacency graph.
    #[default]
    MinimumDegree,
}

impl fmt::Display for OrderingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingType::Natural => write!(f, "Natural"),
            OrderingType::MinimumDegree => write!(f, "Minimum degree"),
        }
    }
}

/// Bijection between keys and elimination positions.
#[derive(Debug, Clone, Default)]
pub struct Ordering {
    keys: Vec<Key>,
    positions: HashMap<Key, usize>,
}

impl PartialEq for Ordering {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

impl Eq for Ordering {}

impl Ordering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordering from an explicit key sequence. Fails on repeated keys.
    pub fn from_keys<I: IntoIterator<Item = Key>>(keys: I) -> LinAlgResult<Self> {
        let mut ordering = Ordering::new();
        for key in keys {
            ordering.push_back(key)?;
        }
        Ok(ordering)
    }

    /// Append a key at the next position.
    pub fn push_back(&mut self, key: Key) -> LinAlgResult<()> {
        if self.positions.contains_key(&key) {
            return Err(LinAlgError::InvalidOrdering(format!(
                "key {key} appears twice"
            )));
        }
        self.positions.insert(key, self.keys.len());
        self.keys.push(key);
        Ok(())
    }

    pub fn position(&self, key: Key) -> Option<usize> {
        self.positions.get(&key).copied()
    }

    pub fn contains(&self, key: Key) -> bool {
        self.positions.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        self.keys.iter().copied()
    }

    /// Reverse elimination order.
    pub fn reversed(&self) -> Self {
        let keys: Vec<Key> = self.keys.iter().rev().copied().collect();
        let positions = keys.iter().enumerate().map(|(i, &k)| (k, i)).collect();
        Ordering { keys, positions }
    }

    /// Build an ordering over every key appearing in `scopes`.
    pub fn from_scopes<'a, I>(ordering_type: OrderingType, scopes: I) -> Self
    where
        I: IntoIterator<Item = &'a [Key]>,
    {
        match ordering_type {
            OrderingType::Natural => Self::natural(scopes),
            OrderingType::MinimumDegree => Self::minimum_degree(scopes),
        }
    }

    /// Keys in ascending order.
    pub fn natural<'a, I>(scopes: I) -> Self
    where
        I: IntoIterator<Item = &'a [Key]>,
    {
        let keys: BTreeSet<Key> = scopes.into_iter().flatten().copied().collect();
        Self::from_unique(keys.into_iter().collect())
    }

    /// Greedy minimum-degree ordering.
    ///
    /// Repeatedly eliminates the variable with the fewest neighbours (ties
    /// broken by key), connecting its neighbours into a clique as elimination
    /// would. Deterministic for a given graph structure.
    pub fn minimum_degree<'a, I>(scopes: I) -> Self
    where
        I: IntoIterator<Item = &'a [Key]>,
    {
        let mut adjacency: BTreeMap<Key, BTreeSet<Key>> = BTreeMap::new();
        for scope in scopes {
            for &key in scope {
                let neighbours = adjacency.entry(key).or_default();
                neighbours.extend(scope.iter().copied().filter(|&k| k != key));
            }
        }

        let mut keys = Vec::with_capacity(adjacency.len());
        while let Some(next) = adjacency
            .iter()
            .min_by_key(|(key, neighbours)| (neighbours.len(), **key))
            .map(|(key, _)| *key)
        {
            let neighbours = adjacency.remove(&next).unwrap_or_default();
            for &a in &neighbours {
                if let Some(set) = adjacency.get_mut(&a) {
                    set.remove(&next);
                    set.extend(neighbours.iter().copied().filter(|&b| b != a));
                }
            }
            keys.push(next);
        }
        Self::from_unique(keys)
    }

    fn from_unique(keys: Vec<Key>) -> Self {
        let positions = keys.iter().enumerate().map(|(i, &k)| (k, i)).collect();
        Ordering { keys, positions }
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "]")
    }
}

//! Name to slot mappings for species and user-defined rate parameters
//!
//! A [`NameIndexOrdering`] is captured once from the first segment of a
//! [`State`](crate::state::State) and shared by every scatter/gather walk afterwards.

use crate::errors::{MusicaError, MusicaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which slot space an ordering addresses
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderingKind {
    /// Species concentrations
    Species,
    /// User-defined rate parameters
    RateParameter,
}

impl fmt::Display for OrderingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingKind::Species => write!(f, "species"),
            OrderingKind::RateParameter => write!(f, "user-defined rate parameter"),
        }
    }
}

/// Immutable, injective mapping from a name to its slot index
///
/// Slots are dense: a valid ordering over `n` names uses exactly the indices `0..n`.
/// Every ordering is built through [`NameIndexOrdering::new`]; the type is serialize-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameIndexOrdering {
    kind: OrderingKind,
    indices: HashMap<String, usize>,
    /// Names sorted by slot
    names: Vec<String>,
}

impl NameIndexOrdering {
    /// Build an ordering from a name to slot mapping
    ///
    /// Fails with [`MusicaError::InvalidConfiguration`] if two names share a slot
    /// or the slots do not cover `0..len` exactly.
    pub fn new(kind: OrderingKind, indices: HashMap<String, usize>) -> MusicaResult<Self> {
        let mut names: Vec<Option<String>> = vec![None; indices.len()];
        for (name, &index) in &indices {
            let slot = names.get_mut(index).ok_or_else(|| {
                MusicaError::InvalidConfiguration(format!(
                    "{} '{}' has slot {} outside of 0..{}",
                    kind,
                    name,
                    index,
                    indices.len()
                ))
            })?;
            if let Some(existing) = slot {
                return Err(MusicaError::InvalidConfiguration(format!(
                    "{} '{}' and '{}' share slot {}",
                    kind, existing, name, index
                )));
            }
            *slot = Some(name.clone());
        }

        Ok(Self {
            kind,
            indices,
            // Every slot is filled: len(indices) names landed in len(indices) distinct slots
            names: names.into_iter().flatten().collect(),
        })
    }

    /// Build an ordering that assigns slots in the order the names are given
    pub fn from_names<I, S>(kind: OrderingKind, names: I) -> MusicaResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut indices = HashMap::new();
        for (index, name) in names.into_iter().enumerate() {
            let name = name.into();
            if indices.insert(name.clone(), index).is_some() {
                return Err(MusicaError::InvalidConfiguration(format!(
                    "duplicate {} name '{}'",
                    kind, name
                )));
            }
        }
        Self::new(kind, indices)
    }

    pub fn kind(&self) -> OrderingKind {
        self.kind
    }

    /// Slot index of `name`
    ///
    /// Unknown names fail with [`MusicaError::UnknownSpecies`] or
    /// [`MusicaError::UnknownRateParameter`] depending on the ordering kind.
    pub fn index_of(&self, name: &str) -> MusicaResult<usize> {
        self.indices.get(name).copied().ok_or_else(|| match self.kind {
            OrderingKind::Species => MusicaError::UnknownSpecies(name.to_string()),
            OrderingKind::RateParameter => MusicaError::UnknownRateParameter(name.to_string()),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Known names in slot order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Compare against a raw mapping reported by another segment
    pub fn matches(&self, indices: &HashMap<String, usize>) -> bool {
        &self.indices == indices
    }

    /// Converts the ordering into an equivalent hashmap
    pub fn to_map(&self) -> HashMap<String, usize> {
        self.indices.clone()
    }
}

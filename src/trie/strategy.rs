// Copyright (c) 2025 Koa Trie Authors
//
// Licensed under MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)

//! Attribute-merge strategies for the Koa Radix Trie.
//!
//! A strategy decides how multiple values inserted under the same key are
//! combined in a node's attribute slot. The engine is strategy-agnostic: it
//! only ever talks to the [`AttributeMerge`] contract, and the counter
//! arithmetic (`add` deltas, `count` on removal) is what keeps the engine's
//! running value total consistent without re-scanning the tree.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::trie::error::{KoaTrieError, KoaTrieResult};

/// Default separator for the delimited-string strategy.
pub const DEFAULT_SEPARATOR: char = ',';

/// Contract for combining values attached to the same key.
///
/// * `Value` is what callers insert.
/// * `Storage` is the raw slot representation held by a node. It must be
///   serializable because paged-out subtrees carry their slots to disk.
/// * `Decoded` is what lookups return; collection strategies decode their
///   storage into a sequence rather than exposing the raw representation.
pub trait AttributeMerge {
    /// The value type callers insert.
    type Value;

    /// The raw slot representation stored in a node.
    type Storage: Clone + fmt::Debug + Serialize + DeserializeOwned;

    /// The decoded representation returned by lookups.
    type Decoded;

    /// Merge `value` into the slot.
    ///
    /// # Returns
    ///
    /// The number of newly-added distinct values (0 or 1). The engine adds
    /// this delta to its running total.
    fn add_attributes(&self, slot: &mut Option<Self::Storage>, value: Self::Value) -> usize;

    /// Remove `value` from the slot, emptying the slot (back to `None`) when
    /// the last value goes.
    ///
    /// # Returns
    ///
    /// `true` if something was actually removed.
    fn delete_attributes(&self, slot: &mut Option<Self::Storage>, value: &Self::Value) -> bool;

    /// The number of atomic attribute entries encoded in a raw slot value.
    ///
    /// Needed because clearing a whole slot must decrement the engine's
    /// running total by the right amount.
    fn count_attributes(&self, storage: &Self::Storage) -> usize;

    /// Decode a raw slot value into the representation lookups return.
    fn decode(&self, storage: &Self::Storage) -> Self::Decoded;

    /// Validate a value before it enters the trie. The default accepts
    /// everything; strategies with reserved characters reject collisions
    /// here, at the insertion boundary.
    fn validate(&self, _value: &Self::Value) -> KoaTrieResult<()> {
        Ok(())
    }
}

/// Replace-on-conflict strategy: the slot holds at most one value and a new
/// insertion overwrites it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Replace<V> {
    _marker: PhantomData<V>,
}

impl<V> Replace<V> {
    /// Create a new replace-on-conflict strategy.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> AttributeMerge for Replace<V>
where
    V: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned,
{
    type Value = V;
    type Storage = V;
    type Decoded = V;

    fn add_attributes(&self, slot: &mut Option<V>, value: V) -> usize {
        let newly_added = usize::from(slot.is_none());
        *slot = Some(value);
        newly_added
    }

    fn delete_attributes(&self, slot: &mut Option<V>, value: &V) -> bool {
        if slot.as_ref() == Some(value) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn count_attributes(&self, _storage: &V) -> usize {
        1
    }

    fn decode(&self, storage: &V) -> V {
        storage.clone()
    }
}

/// Accumulate-into-a-sequence strategy: the slot holds a list of distinct
/// values and insertion appends after a linear de-duplication scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accumulate<V> {
    _marker: PhantomData<V>,
}

impl<V> Accumulate<V> {
    /// Create a new accumulating strategy.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> AttributeMerge for Accumulate<V>
where
    V: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned,
{
    type Value = V;
    type Storage = Vec<V>;
    type Decoded = Vec<V>;

    fn add_attributes(&self, slot: &mut Option<Vec<V>>, value: V) -> usize {
        match slot {
            None => {
                *slot = Some(vec![value]);
                1
            }
            Some(values) => {
                if values.contains(&value) {
                    0
                } else {
                    values.push(value);
                    1
                }
            }
        }
    }

    fn delete_attributes(&self, slot: &mut Option<Vec<V>>, value: &V) -> bool {
        let Some(values) = slot else {
            return false;
        };
        let Some(position) = values.iter().position(|v| v == value) else {
            return false;
        };
        values.remove(position);
        if values.is_empty() {
            *slot = None;
        }
        true
    }

    fn count_attributes(&self, storage: &Vec<V>) -> usize {
        storage.len()
    }

    fn decode(&self, storage: &Vec<V>) -> Vec<V> {
        storage.clone()
    }
}

/// Accumulate-into-a-delimited-string strategy: the slot holds one string of
/// segments joined by a reserved separator.
///
/// A value containing the separator would silently merge with its neighbors
/// on the next split, so such values are rejected at the insertion boundary
/// with [`KoaTrieError::SeparatorCollision`].
#[derive(Debug, Clone)]
pub struct Joined {
    separator: char,
}

impl Joined {
    /// Create a new delimited-string strategy with the default separator.
    pub fn new() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
        }
    }

    /// Use a different reserved separator.
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// The reserved separator this strategy joins segments with.
    pub fn separator(&self) -> char {
        self.separator
    }
}

impl Default for Joined {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeMerge for Joined {
    type Value = String;
    type Storage = String;
    type Decoded = Vec<String>;

    fn add_attributes(&self, slot: &mut Option<String>, value: String) -> usize {
        match slot {
            None => {
                *slot = Some(value);
                1
            }
            Some(joined) => {
                if joined.split(self.separator).any(|segment| segment == value) {
                    0
                } else {
                    joined.push(self.separator);
                    joined.push_str(&value);
                    1
                }
            }
        }
    }

    fn delete_attributes(&self, slot: &mut Option<String>, value: &String) -> bool {
        let Some(joined) = slot else {
            return false;
        };
        let before = joined.split(self.separator).count();
        let remaining: Vec<&str> = joined
            .split(self.separator)
            .filter(|segment| segment != value)
            .collect();
        if remaining.len() == before {
            return false;
        }
        if remaining.is_empty() {
            *slot = None;
        } else {
            *slot = Some(remaining.join(&self.separator.to_string()));
        }
        true
    }

    fn count_attributes(&self, storage: &String) -> usize {
        storage.split(self.separator).count()
    }

    fn decode(&self, storage: &String) -> Vec<String> {
        storage.split(self.separator).map(String::from).collect()
    }

    fn validate(&self, value: &String) -> KoaTrieResult<()> {
        if value.contains(self.separator) {
            return Err(KoaTrieError::SeparatorCollision {
                separator: self.separator,
            });
        }
        Ok(())
    }
}

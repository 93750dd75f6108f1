// Copyright (c) 2025 Koa Trie Authors
//
// Licensed under MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)

//! Koa Radix Trie: a prefix-tree index from string keys to one or more
//! associated values.
//!
//! The engine supports exact lookup, prefix enumeration, longest-prefix
//! matching, and bounded fuzzy search, with pluggable strategies for how
//! multiple values attached to the same key are combined and an optional
//! out-of-core mode that offloads deep subtrees to secondary storage.
//!
//! Key properties:
//!
//! * Radix compression: chains of single-child nodes are merged into
//!   multi-character edges, and no two sibling edges share a non-empty
//!   common prefix.
//! * Strategy-agnostic engine: replace-on-conflict, accumulate-into-a-list,
//!   and delimited-string merging all run behind the same
//!   [`AttributeMerge`] contract.
//! * Transparent paging: traversals resolve paged-out subtrees on demand
//!   without changing any results.
//! * Synchronous and single-threaded by design; `&mut self` mutation makes
//!   the exclusivity rule a compile-time guarantee.
//!
//! # Examples
//!
//! ```
//! use koa_trie::{Accumulate, KoaTrie};
//!
//! let mut trie = KoaTrie::new(Accumulate::<u32>::new());
//! trie.insert("cat", 1).unwrap();
//! trie.insert("car", 2).unwrap();
//! trie.insert("cart", 3).unwrap();
//!
//! assert_eq!(trie.get("cat").unwrap(), Some(vec![1]));
//! assert_eq!(
//!     trie.longest_prefix("cartoon").unwrap(),
//!     Some(("cart".to_string(), vec![3]))
//! );
//! ```

mod config;
mod error;
mod node;
mod store;
mod strategy;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub use config::{KoaTrieConfig, NodeVariant};
pub use error::{KoaTrieError, KoaTrieResult};
pub use node::NodeSummary;
pub use strategy::{Accumulate, AttributeMerge, Joined, Replace, DEFAULT_SEPARATOR};

use node::{common_prefix_len, LiveNode, Node, PageRef};
use store::SubtreeStore;

/// What a deletion walk removes at the terminal node.
enum Removal<'a, V> {
    /// Clear the whole attribute slot.
    All,
    /// Remove one value through the merge strategy.
    Value(&'a V),
}

/// Aggregate figures computed by a full traversal of the trie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrieStats {
    /// Total atomic attribute entries, as maintained by the running counter.
    pub num_values: usize,

    /// Number of distinct keys (word nodes).
    pub num_words: usize,

    /// Number of nodes, excluding the root.
    pub num_nodes: usize,

    /// Depth in edges of the deepest node.
    pub max_depth: usize,

    /// Histogram of key lengths in characters.
    pub word_lengths: BTreeMap<usize, usize>,
}

/// Radix trie engine mapping string keys to merged attribute values.
///
/// The engine owns the root node exclusively; node identity is not stable
/// across mutating calls because insertion splits edges, deletion merges
/// them, and paging swaps live subtrees for stubs. Traversals therefore
/// yield owned `(path, value)` pairs rather than references into the graph.
#[derive(Debug)]
pub struct KoaTrie<S: AttributeMerge> {
    /// The root node. It has no incoming edge and is never pruned or merged.
    root: LiveNode<S::Storage>,

    /// The configured attribute-merge strategy.
    strategy: S,

    /// Configuration options fixed at construction.
    config: KoaTrieConfig,

    /// Page store, present iff a paging depth was configured.
    store: Option<SubtreeStore>,

    /// Running total of atomic attribute entries, updated transactionally
    /// alongside each mutation.
    num_values: usize,
}

impl<S: AttributeMerge> KoaTrie<S> {
    /// Create an empty trie with default configuration (plain attribute
    /// nodes, paging disabled).
    pub fn new(strategy: S) -> Self {
        Self {
            root: LiveNode::new(),
            strategy,
            config: KoaTrieConfig::default(),
            store: None,
            num_values: 0,
        }
    }

    /// Create an empty trie with the given configuration.
    ///
    /// # Errors
    ///
    /// Configuration problems are fatal to this call: a paging depth of
    /// zero, a paging depth without a storage directory, or a storage
    /// directory that cannot be created or written to.
    pub fn with_config(strategy: S, config: KoaTrieConfig) -> KoaTrieResult<Self> {
        let store = match (config.page_depth(), config.storage_dir()) {
            (Some(0), _) => return Err(KoaTrieError::ZeroPageDepth),
            (Some(depth), None) => return Err(KoaTrieError::MissingStorageDir { depth }),
            (Some(_), Some(dir)) => Some(SubtreeStore::open(dir)?),
            (None, _) => None,
        };
        Ok(Self {
            root: LiveNode::new(),
            strategy,
            config,
            store,
            num_values: 0,
        })
    }

    /// The configuration this trie was constructed with.
    pub fn config(&self) -> &KoaTrieConfig {
        &self.config
    }

    /// Total number of atomic attribute entries in the trie. O(1).
    pub fn len(&self) -> usize {
        self.num_values
    }

    /// True iff the trie holds no values.
    pub fn is_empty(&self) -> bool {
        self.num_values == 0
    }

    /// Drop every key and value. Paged subtree files already on disk are
    /// left behind; they are orphaned, not reloaded.
    pub fn clear(&mut self) {
        self.root = LiveNode::new();
        self.num_values = 0;
    }

    /// Insert `value` under `key`, merging with any values already there
    /// according to the configured strategy.
    ///
    /// The empty key is permitted and terminates at the root.
    ///
    /// # Returns
    ///
    /// The number of newly-added distinct values (0 or 1).
    pub fn insert<K: AsRef<str>>(&mut self, key: K, value: S::Value) -> KoaTrieResult<usize> {
        let key = key.as_ref();
        self.strategy.validate(&value)?;
        debug!(key, "inserting key");

        let track = self.tracks_max_length();
        let delta = if key.is_empty() {
            self.strategy.add_attributes(&mut self.root.attributes, value)
        } else {
            insert_rec(
                &self.strategy,
                self.store.as_ref(),
                track,
                char_len(key),
                &mut self.root,
                key,
                value,
            )?
        };
        self.num_values += delta;
        Ok(delta)
    }

    /// Bulk-load a batch of `(key, value)` entries that is already in
    /// lexicographic key order, grouping shared prefixes recursively instead
    /// of walking from the root for every key.
    ///
    /// When paging is configured, each subtree completed at the paging depth
    /// is written out immediately, so the full batch never has to be
    /// resident at once. If the trie already has content the batch falls
    /// back to one-at-a-time insertion.
    ///
    /// # Errors
    ///
    /// [`KoaTrieError::UnsortedBatch`] if the keys are out of order;
    /// duplicate keys are fine and merge through the strategy.
    pub fn extend_sorted<I>(&mut self, entries: I) -> KoaTrieResult<usize>
    where
        I: IntoIterator<Item = (String, S::Value)>,
    {
        let mut batch: Vec<(String, Option<S::Value>)> = Vec::new();
        for (key, value) in entries {
            self.strategy.validate(&value)?;
            if let Some((prev, _)) = batch.last() {
                if prev.as_str() > key.as_str() {
                    return Err(KoaTrieError::UnsortedBatch {
                        prev: prev.clone(),
                        next: key,
                    });
                }
            }
            batch.push((key, Some(value)));
        }
        if batch.is_empty() {
            return Ok(0);
        }
        debug!(batch_len = batch.len(), "bulk loading sorted batch");

        // Bulk construction assumes exclusive ownership of the key space.
        if self.root.children.is_some() || self.root.is_word() {
            let mut delta = 0;
            for (key, value) in batch {
                if let Some(value) = value {
                    delta += self.insert(key, value)?;
                }
            }
            return Ok(delta);
        }

        let track = self.tracks_max_length();
        let mut delta = 0;
        build_rec(
            &self.strategy,
            self.store.as_ref(),
            self.config.page_depth(),
            track,
            &mut self.root,
            &mut batch,
            0,
            0,
            &mut delta,
        )?;
        self.num_values += delta;
        Ok(delta)
    }

    /// Look up the decoded attributes stored under exactly `key`.
    ///
    /// A miss is a normal result (`Ok(None)`), never an error; only a failed
    /// page resolution is an error.
    pub fn get<K: AsRef<str>>(&self, key: K) -> KoaTrieResult<Option<S::Decoded>> {
        get_rec(
            &self.strategy,
            self.store.as_ref(),
            &self.root,
            key.as_ref(),
        )
    }

    /// True iff `key` was inserted and still holds at least one value.
    pub fn contains<K: AsRef<str>>(&self, key: K) -> KoaTrieResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove `key` entirely, clearing every value stored under it and
    /// restructuring the tree to stay minimal.
    ///
    /// # Returns
    ///
    /// `false` if the key was not present (a no-op, not an error).
    pub fn remove<K: AsRef<str>>(&mut self, key: K) -> KoaTrieResult<bool> {
        let key = key.as_ref();
        debug!(key, "removing key");
        self.remove_with(key, &Removal::All)
    }

    /// Explicitly clear the attribute slot at `key`, turning the node back
    /// into a non-word. Equivalent to [`remove`](Self::remove); the name
    /// records the intent of "unsetting" a key that stays syntactically
    /// valid, as opposed to retiring it.
    pub fn unset<K: AsRef<str>>(&mut self, key: K) -> KoaTrieResult<bool> {
        let key = key.as_ref();
        debug!(key, "unsetting key");
        self.remove_with(key, &Removal::All)
    }

    /// Remove a single `value` from `key` through the merge strategy,
    /// pruning the node if its last value goes.
    ///
    /// # Returns
    ///
    /// `false` if the key or the value was not present.
    pub fn remove_value<K: AsRef<str>>(&mut self, key: K, value: &S::Value) -> KoaTrieResult<bool> {
        let key = key.as_ref();
        debug!(key, "removing value from key");
        self.remove_with(key, &Removal::Value(value))
    }

    /// Every word that is a prefix of `query`, shallowest first, deepest
    /// last — even when `query` itself is not a key.
    pub fn longest_prefixes<K: AsRef<str>>(
        &self,
        query: K,
    ) -> KoaTrieResult<Vec<(String, S::Decoded)>> {
        let query = query.as_ref();
        let mut matches = Vec::new();
        if let Some(storage) = self.root.attributes.as_ref() {
            matches.push((String::new(), self.strategy.decode(storage)));
        }
        let mut path = String::new();
        prefixes_rec(
            &self.strategy,
            self.store.as_ref(),
            &self.root,
            query,
            &mut path,
            &mut matches,
        )?;
        Ok(matches)
    }

    /// The deepest word that is a prefix of `query`, or `None` when no
    /// inserted key prefixes it.
    pub fn longest_prefix<K: AsRef<str>>(
        &self,
        query: K,
    ) -> KoaTrieResult<Option<(String, S::Decoded)>> {
        Ok(self.longest_prefixes(query)?.pop())
    }

    /// Every `(key, decoded attributes)` pair in the trie, in lexicographic
    /// key order. The empty key, when present, comes first.
    pub fn items(&self) -> KoaTrieResult<Vec<(String, S::Decoded)>> {
        let mut out = Vec::new();
        let mut path = String::new();
        collect_words(
            &self.strategy,
            self.store.as_ref(),
            &self.root,
            &mut path,
            &mut out,
        )?;
        Ok(out)
    }

    /// Every `(key, decoded attributes)` pair whose key starts with
    /// `prefix`, in lexicographic key order. The prefix may end in the
    /// middle of an edge label.
    pub fn items_with_prefix<K: AsRef<str>>(
        &self,
        prefix: K,
    ) -> KoaTrieResult<Vec<(String, S::Decoded)>> {
        let prefix = prefix.as_ref();
        if prefix.is_empty() {
            return self.items();
        }
        let mut out = Vec::new();
        let mut path = String::new();
        prefix_items_rec(
            &self.strategy,
            self.store.as_ref(),
            &self.root,
            prefix,
            &mut path,
            &mut out,
        )?;
        Ok(out)
    }

    /// Every key in the trie, in lexicographic order.
    pub fn words(&self) -> KoaTrieResult<Vec<String>> {
        let mut out = Vec::new();
        if self.root.is_word() {
            out.push(String::new());
        }
        let mut path = String::new();
        visit_children(
            self.store.as_ref(),
            &self.root,
            &mut path,
            &mut |path, live: &LiveNode<S::Storage>| {
                if live.is_word() {
                    out.push(path.to_string());
                }
                Ok(())
            },
        )?;
        Ok(out)
    }

    /// Depth-first traversal over every node as `(path, summary)` pairs, in
    /// lexicographic path order. `include_root` additionally yields the root
    /// under the empty path, which is how an empty-key word is surfaced.
    ///
    /// Summaries are owned snapshots: paged subtrees are resolved
    /// transiently for the visit and dropped again, so repeated calls
    /// re-read paged regions from storage.
    pub fn nodes(&self, include_root: bool) -> KoaTrieResult<Vec<(String, NodeSummary)>> {
        let mut out = Vec::new();
        if include_root {
            out.push((String::new(), self.summarize(&self.root)));
        }
        let mut path = String::new();
        visit_children(
            self.store.as_ref(),
            &self.root,
            &mut path,
            &mut |path, live: &LiveNode<S::Storage>| {
                out.push((path.to_string(), self.summarize(live)));
                Ok(())
            },
        )?;
        Ok(out)
    }

    /// Aggregate statistics, computed by a full traversal. This is the one
    /// operation that recounts instead of using the running totals, which
    /// makes it a useful cross-check in tests.
    pub fn stats(&self) -> KoaTrieResult<TrieStats> {
        let mut stats = TrieStats {
            num_values: self.num_values,
            ..TrieStats::default()
        };
        if self.root.is_word() {
            stats.num_words += 1;
            *stats.word_lengths.entry(0).or_insert(0) += 1;
        }
        stats_rec(self.store.as_ref(), &self.root, 0, 0, &mut stats)?;
        Ok(stats)
    }

    /// Every word within Levenshtein distance `max_distance` of `word`, as
    /// `(distance, key, decoded attributes)` tuples in lexicographic key
    /// order.
    ///
    /// Subtrees are pruned by the length window around `word`; with the
    /// [`NodeVariant::MaxLength`] variant active, subtrees whose longest key
    /// is still too short are skipped without descending into them.
    pub fn within_edit_distance<K: AsRef<str>>(
        &self,
        word: K,
        max_distance: usize,
    ) -> KoaTrieResult<Vec<(usize, String, S::Decoded)>> {
        let word: Vec<char> = word.as_ref().chars().collect();
        let mut out = Vec::new();
        if let Some(storage) = self.root.attributes.as_ref() {
            if word.len() <= max_distance {
                out.push((word.len(), String::new(), self.strategy.decode(storage)));
            }
        }
        let mut path = String::new();
        fuzzy_rec(
            &self.strategy,
            self.store.as_ref(),
            self.tracks_max_length(),
            &self.root,
            &word,
            max_distance,
            &mut path,
            0,
            &mut out,
        )?;
        Ok(out)
    }

    /// Page out every live subtree rooted at the configured depth, replacing
    /// it in memory with a lightweight stub. A no-op when paging is
    /// disabled; already-paged subtrees are skipped, so the pass is
    /// idempotent.
    ///
    /// # Returns
    ///
    /// The number of subtree pages written.
    pub fn save(&mut self) -> KoaTrieResult<usize> {
        let (Some(depth), Some(store)) = (self.config.page_depth(), self.store.as_ref()) else {
            return Ok(0);
        };
        let mut pages = 0;
        let mut path = String::new();
        save_rec(store, &mut self.root, &mut path, depth, &mut pages)?;
        debug!(pages, "save pass complete");
        Ok(pages)
    }

    fn tracks_max_length(&self) -> bool {
        self.config.node_variant() == NodeVariant::MaxLength
    }

    fn summarize(&self, live: &LiveNode<S::Storage>) -> NodeSummary {
        NodeSummary {
            is_word: live.is_word(),
            attribute_count: live
                .attributes
                .as_ref()
                .map_or(0, |storage| self.strategy.count_attributes(storage)),
            child_count: live.child_count(),
            max_length: live.max_length,
        }
    }

    fn remove_with(&mut self, key: &str, removal: &Removal<'_, S::Value>) -> KoaTrieResult<bool> {
        if key.is_empty() {
            let removed = match removal {
                Removal::All => self
                    .root
                    .attributes
                    .take()
                    .map(|storage| self.strategy.count_attributes(&storage)),
                Removal::Value(value) => self
                    .strategy
                    .delete_attributes(&mut self.root.attributes, value)
                    .then_some(1),
            };
            if let Some(count) = removed {
                self.num_values -= count;
                return Ok(true);
            }
            return Ok(false);
        }

        let track = self.tracks_max_length();
        let removed = remove_rec(
            &self.strategy,
            self.store.as_ref(),
            track,
            &mut self.root,
            key,
            0,
            removal,
        )?;
        match removed {
            Some(count) => {
                self.num_values -= count;
                if track {
                    recompute_max_length(&mut self.root, 0);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Length of a string in characters, as stored in `max_length` counters.
fn char_len(s: &str) -> u32 {
    s.chars().count() as u32
}

/// Borrow a node as live, resolving a stub transiently. The loaded subtree
/// is owned by the returned value and dropped by the caller; the stub stays
/// in the tree and will be re-read on the next visit.
fn resolve_node<'a, A>(
    store: Option<&SubtreeStore>,
    node: &'a Node<A>,
) -> KoaTrieResult<std::borrow::Cow<'a, LiveNode<A>>>
where
    A: Clone + DeserializeOwned,
{
    match node {
        Node::Live(live) => Ok(std::borrow::Cow::Borrowed(live)),
        Node::Stub(page) => {
            let store = store.ok_or_else(|| KoaTrieError::PageUnavailable {
                file: page.file_name.clone(),
            })?;
            Ok(std::borrow::Cow::Owned(store.load_page(&page.file_name)?))
        }
    }
}

/// Resolve a node for mutation: a stub is replaced in the tree by its loaded
/// live subtree, which then stays live until the next save pass.
fn resolve_node_mut<'a, A>(
    store: Option<&SubtreeStore>,
    slot: &'a mut Node<A>,
) -> KoaTrieResult<&'a mut LiveNode<A>>
where
    A: DeserializeOwned,
{
    if let Node::Stub(page) = slot {
        let store = store.ok_or_else(|| KoaTrieError::PageUnavailable {
            file: page.file_name.clone(),
        })?;
        let live = store.load_page(&page.file_name)?;
        *slot = Node::Live(live);
    }
    match slot {
        Node::Live(live) => Ok(live),
        // the stub was rewritten to a live node above
        Node::Stub(page) => Err(KoaTrieError::PageUnavailable {
            file: page.file_name.clone(),
        }),
    }
}

fn insert_rec<S: AttributeMerge>(
    strategy: &S,
    store: Option<&SubtreeStore>,
    track: bool,
    full_len: u32,
    node: &mut LiveNode<S::Storage>,
    key: &str,
    value: S::Value,
) -> KoaTrieResult<usize> {
    let children = node.children.get_or_insert_with(BTreeMap::new);

    let delta = if children.contains_key(key) {
        // the key terminates exactly at an existing child
        match children.get_mut(key) {
            Some(child) => {
                let live = resolve_node_mut(store, child)?;
                let delta = strategy.add_attributes(&mut live.attributes, value);
                if track {
                    live.max_length = live.max_length.max(full_len);
                }
                delta
            }
            None => 0,
        }
    } else {
        // at most one sibling can share the key's first character
        let mut shared: Option<(String, usize)> = None;
        for label in children.keys() {
            let len = common_prefix_len(label, key);
            if len > 0 {
                shared = Some((label.clone(), len));
                break;
            }
        }

        match shared {
            None => {
                // no overlapping prefix anywhere: attach a fresh leaf
                let mut leaf = LiveNode::new();
                let delta = strategy.add_attributes(&mut leaf.attributes, value);
                if track {
                    leaf.max_length = full_len;
                }
                children.insert(key.to_string(), Node::Live(leaf));
                delta
            }
            Some((label, split)) if split == label.len() => {
                // the whole edge is a prefix of the key: descend
                match children.get_mut(&label) {
                    Some(child) => {
                        let live = resolve_node_mut(store, child)?;
                        insert_rec(strategy, store, track, full_len, live, &key[split..], value)?
                    }
                    None => 0,
                }
            }
            Some((label, split)) => {
                // the key diverges mid-edge: split the edge at the
                // divergence point and re-attach the old subtree under its
                // remainder label
                let label_rest = label[split..].to_string();
                let Some(old_child) = children.remove(&label) else {
                    return Ok(0);
                };
                let mut branch = LiveNode::new();
                if track {
                    branch.max_length = old_child.max_length().max(full_len);
                }
                let mut branch_children = BTreeMap::new();
                branch_children.insert(label_rest, old_child);

                let delta = if split == key.len() {
                    // the new key terminates exactly at the branch point
                    strategy.add_attributes(&mut branch.attributes, value)
                } else {
                    let mut leaf = LiveNode::new();
                    let delta = strategy.add_attributes(&mut leaf.attributes, value);
                    if track {
                        leaf.max_length = full_len;
                    }
                    branch_children.insert(key[split..].to_string(), Node::Live(leaf));
                    delta
                };
                branch.children = Some(branch_children);
                children.insert(key[..split].to_string(), Node::Live(branch));
                delta
            }
        }
    };

    if track {
        node.max_length = node.max_length.max(full_len);
    }
    Ok(delta)
}

fn remove_rec<S: AttributeMerge>(
    strategy: &S,
    store: Option<&SubtreeStore>,
    track: bool,
    node: &mut LiveNode<S::Storage>,
    rem: &str,
    consumed: u32,
    removal: &Removal<'_, S::Value>,
) -> KoaTrieResult<Option<usize>> {
    let Some(children) = node.children.as_mut() else {
        return Ok(None);
    };

    // at most one sibling can share the remainder's first character
    let mut target: Option<String> = None;
    for label in children.keys() {
        if common_prefix_len(label, rem) > 0 {
            target = Some(label.clone());
            break;
        }
    }
    let Some(label) = target else {
        return Ok(None);
    };
    let child_consumed = consumed + char_len(&label);

    let removed = if rem == label {
        let Some(child) = children.get_mut(&label) else {
            return Ok(None);
        };
        let live = resolve_node_mut(store, child)?;
        match removal {
            Removal::All => live
                .attributes
                .take()
                .map(|storage| strategy.count_attributes(&storage)),
            Removal::Value(value) => strategy
                .delete_attributes(&mut live.attributes, value)
                .then_some(1),
        }
    } else if rem.starts_with(label.as_str()) {
        let Some(child) = children.get_mut(&label) else {
            return Ok(None);
        };
        let live = resolve_node_mut(store, child)?;
        remove_rec(
            strategy,
            store,
            track,
            live,
            &rem[label.len()..],
            child_consumed,
            removal,
        )?
    } else {
        // the remainder diverges inside the edge: not present
        None
    };

    if removed.is_some() {
        restructure_child(children, &label, track, child_consumed);
    }
    Ok(removed)
}

/// After a removal at or below `label`, restore minimality: prune an empty
/// non-word child, or merge a single-child non-word child with its lone
/// grandchild by concatenating edge labels.
fn restructure_child<A>(
    children: &mut BTreeMap<String, Node<A>>,
    label: &str,
    track: bool,
    child_consumed: u32,
) {
    let Some(Node::Live(live)) = children.get_mut(label) else {
        return;
    };
    if track {
        recompute_max_length(live, child_consumed);
    }
    if live.is_word() {
        return;
    }
    match live.child_count() {
        0 => {
            children.remove(label);
        }
        1 => {
            let Some(grand_children) = live.children.as_mut() else {
                return;
            };
            let Some(grand_label) = grand_children.keys().next().cloned() else {
                return;
            };
            let Some(grandchild) = grand_children.remove(&grand_label) else {
                return;
            };
            let merged_label = format!("{label}{grand_label}");
            children.remove(label);
            children.insert(merged_label, grandchild);
        }
        _ => {}
    }
}

/// Recompute a node's `max_length` from its own word (if any) and its
/// children's counters. O(children): descendants keep valid counters, so no
/// subtree scan is needed.
fn recompute_max_length<A>(node: &mut LiveNode<A>, consumed: u32) {
    let own = if node.is_word() { consumed } else { 0 };
    let deepest = node.children.as_ref().map_or(0, |children| {
        children.values().map(Node::max_length).max().unwrap_or(0)
    });
    node.max_length = own.max(deepest);
}

fn get_rec<S: AttributeMerge>(
    strategy: &S,
    store: Option<&SubtreeStore>,
    node: &LiveNode<S::Storage>,
    rem: &str,
) -> KoaTrieResult<Option<S::Decoded>> {
    if rem.is_empty() {
        return Ok(node
            .attributes
            .as_ref()
            .map(|storage| strategy.decode(storage)));
    }
    let Some(children) = node.children.as_ref() else {
        return Ok(None);
    };
    for (label, child) in children {
        if rem.starts_with(label.as_str()) {
            let live = resolve_node(store, child)?;
            return get_rec(strategy, store, &live, &rem[label.len()..]);
        }
        if common_prefix_len(label, rem) > 0 {
            // shared first character but divergence inside the edge
            return Ok(None);
        }
    }
    Ok(None)
}

fn prefixes_rec<S: AttributeMerge>(
    strategy: &S,
    store: Option<&SubtreeStore>,
    node: &LiveNode<S::Storage>,
    rem: &str,
    path: &mut String,
    out: &mut Vec<(String, S::Decoded)>,
) -> KoaTrieResult<()> {
    let Some(children) = node.children.as_ref() else {
        return Ok(());
    };
    for (label, child) in children {
        if rem.starts_with(label.as_str()) {
            let live = resolve_node(store, child)?;
            path.push_str(label);
            if let Some(storage) = live.attributes.as_ref() {
                out.push((path.clone(), strategy.decode(storage)));
            }
            prefixes_rec(strategy, store, &live, &rem[label.len()..], path, out)?;
            path.truncate(path.len() - label.len());
            return Ok(());
        }
    }
    Ok(())
}

/// Depth-first, lexicographically ordered visit of every node strictly below
/// `node`, yielding the accumulated path label. Stubs are resolved
/// transiently and dropped after their subtree is visited.
fn visit_children<A, F>(
    store: Option<&SubtreeStore>,
    node: &LiveNode<A>,
    path: &mut String,
    f: &mut F,
) -> KoaTrieResult<()>
where
    A: Clone + DeserializeOwned,
    F: FnMut(&str, &LiveNode<A>) -> KoaTrieResult<()>,
{
    let Some(children) = node.children.as_ref() else {
        return Ok(());
    };
    for (label, child) in children {
        let live = resolve_node(store, child)?;
        path.push_str(label);
        f(path, &live)?;
        visit_children(store, &live, path, f)?;
        path.truncate(path.len() - label.len());
    }
    Ok(())
}

/// Collect `(path, decoded)` for `node` itself and every word below it.
fn collect_words<S: AttributeMerge>(
    strategy: &S,
    store: Option<&SubtreeStore>,
    node: &LiveNode<S::Storage>,
    path: &mut String,
    out: &mut Vec<(String, S::Decoded)>,
) -> KoaTrieResult<()> {
    if let Some(storage) = node.attributes.as_ref() {
        out.push((path.clone(), strategy.decode(storage)));
    }
    visit_children(store, node, path, &mut |path, live: &LiveNode<S::Storage>| {
        if let Some(storage) = live.attributes.as_ref() {
            out.push((path.to_string(), strategy.decode(storage)));
        }
        Ok(())
    })
}

fn prefix_items_rec<S: AttributeMerge>(
    strategy: &S,
    store: Option<&SubtreeStore>,
    node: &LiveNode<S::Storage>,
    rem: &str,
    path: &mut String,
    out: &mut Vec<(String, S::Decoded)>,
) -> KoaTrieResult<()> {
    let Some(children) = node.children.as_ref() else {
        return Ok(());
    };
    for (label, child) in children {
        if label.starts_with(rem) {
            // the prefix ends at or inside this edge: the whole child
            // subtree matches under the full edge label
            let live = resolve_node(store, child)?;
            path.push_str(label);
            collect_words(strategy, store, &live, path, out)?;
            path.truncate(path.len() - label.len());
            return Ok(());
        }
        if rem.starts_with(label.as_str()) {
            let live = resolve_node(store, child)?;
            path.push_str(label);
            prefix_items_rec(strategy, store, &live, &rem[label.len()..], path, out)?;
            path.truncate(path.len() - label.len());
            return Ok(());
        }
    }
    Ok(())
}

fn stats_rec<A>(
    store: Option<&SubtreeStore>,
    node: &LiveNode<A>,
    depth: usize,
    path_chars: usize,
    stats: &mut TrieStats,
) -> KoaTrieResult<()>
where
    A: Clone + DeserializeOwned,
{
    let Some(children) = node.children.as_ref() else {
        return Ok(());
    };
    for (label, child) in children {
        let live = resolve_node(store, child)?;
        let child_depth = depth + 1;
        let child_chars = path_chars + label.chars().count();
        stats.num_nodes += 1;
        stats.max_depth = stats.max_depth.max(child_depth);
        if live.is_word() {
            stats.num_words += 1;
            *stats.word_lengths.entry(child_chars).or_insert(0) += 1;
        }
        stats_rec(store, &live, child_depth, child_chars, stats)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn fuzzy_rec<S: AttributeMerge>(
    strategy: &S,
    store: Option<&SubtreeStore>,
    track: bool,
    node: &LiveNode<S::Storage>,
    word: &[char],
    max_distance: usize,
    path: &mut String,
    path_chars: usize,
    out: &mut Vec<(usize, String, S::Decoded)>,
) -> KoaTrieResult<()> {
    let Some(children) = node.children.as_ref() else {
        return Ok(());
    };
    for (label, child) in children {
        let child_chars = path_chars + label.chars().count();
        // prefixes longer than the word plus the allowed distance can never
        // match, and key lengths only grow below this point
        if child_chars > word.len() + max_distance {
            continue;
        }
        // with max-length tracking, a subtree whose longest key is still
        // too short can be skipped without descending into it
        if track && (child.max_length() as usize) + max_distance < word.len() {
            continue;
        }
        let live = resolve_node(store, child)?;
        path.push_str(label);
        if live.is_word() && child_chars + max_distance >= word.len() {
            if let Some(storage) = live.attributes.as_ref() {
                let candidate: Vec<char> = path.chars().collect();
                let distance = levenshtein(word, &candidate);
                if distance <= max_distance {
                    out.push((distance, path.clone(), strategy.decode(storage)));
                }
            }
        }
        fuzzy_rec(
            strategy,
            store,
            track,
            &live,
            word,
            max_distance,
            path,
            child_chars,
            out,
        )?;
        path.truncate(path.len() - label.len());
    }
    Ok(())
}

/// Two-row Levenshtein distance over characters.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let width = b.len() + 1;
    let mut previous: Vec<usize> = (0..width).collect();
    let mut current = vec![0usize; width];
    for (i, a_char) in a.iter().enumerate() {
        current[0] = i + 1;
        for j in 0..b.len() {
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            let substitution = if *a_char == b[j] {
                previous[j]
            } else {
                previous[j] + 1
            };
            current[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[width - 1]
}

fn save_rec<A: Serialize>(
    store: &SubtreeStore,
    node: &mut LiveNode<A>,
    path: &mut String,
    depth_left: usize,
    pages: &mut usize,
) -> KoaTrieResult<()> {
    let Some(children) = node.children.as_mut() else {
        return Ok(());
    };
    for (label, child) in children.iter_mut() {
        path.push_str(label);
        if let Node::Live(live) = child {
            if depth_left == 1 {
                let file = store.save_page(path, live)?;
                let stub = PageRef {
                    file_name: file,
                    max_length: live.max_length,
                };
                *child = Node::Stub(stub);
                *pages += 1;
            } else {
                save_rec(store, live, path, depth_left - 1, pages)?;
            }
        }
        path.truncate(path.len() - label.len());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_rec<S: AttributeMerge>(
    strategy: &S,
    store: Option<&SubtreeStore>,
    page_depth: Option<usize>,
    track: bool,
    node: &mut LiveNode<S::Storage>,
    entries: &mut [(String, Option<S::Value>)],
    offset: usize,
    depth: usize,
    delta: &mut usize,
) -> KoaTrieResult<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let node_chars = char_len(&entries[0].0[..offset]);
    let mut index = 0;

    // keys that end exactly here become this node's attributes
    while index < entries.len() && entries[index].0.len() == offset {
        if let Some(value) = entries[index].1.take() {
            *delta += strategy.add_attributes(&mut node.attributes, value);
        }
        index += 1;
    }

    while index < entries.len() {
        // group consecutive keys sharing the first character of their
        // remainder; sorted order makes the group contiguous
        let group_start = index;
        let Some(first_char) = entries[index].0[offset..].chars().next() else {
            index += 1;
            continue;
        };
        let mut end = index + 1;
        while end < entries.len() && entries[end].0[offset..].starts_with(first_char) {
            end += 1;
        }

        if end - group_start == 1 {
            // a single key: attach the whole remainder as one leaf
            let full_key = entries[group_start].0.clone();
            let label = full_key[offset..].to_string();
            let mut leaf = LiveNode::new();
            if let Some(value) = entries[group_start].1.take() {
                *delta += strategy.add_attributes(&mut leaf.attributes, value);
            }
            if track {
                leaf.max_length = char_len(&full_key);
            }
            let child = page_or_live(store, page_depth, depth + 1, &full_key, leaf)?;
            node.children
                .get_or_insert_with(BTreeMap::new)
                .insert(label, child);
        } else {
            // several keys: branch on their longest common prefix, which in
            // sorted order is the prefix shared by the first and last
            let first_key = entries[group_start].0.clone();
            let lcp = common_prefix_len(
                &first_key[offset..],
                &entries[end - 1].0[offset..],
            );
            let label = first_key[offset..offset + lcp].to_string();
            let child_offset = offset + lcp;

            let mut branch = LiveNode::new();
            build_rec(
                strategy,
                store,
                page_depth,
                track,
                &mut branch,
                &mut entries[group_start..end],
                child_offset,
                depth + 1,
                delta,
            )?;
            let child = page_or_live(
                store,
                page_depth,
                depth + 1,
                &first_key[..child_offset],
                branch,
            )?;
            node.children
                .get_or_insert_with(BTreeMap::new)
                .insert(label, child);
        }
        index = end;
    }

    if track {
        recompute_max_length(node, node_chars);
    }
    Ok(())
}

/// Post-add hook of the bulk loader: a subtree completed at exactly the
/// paging depth is written out immediately and enters the tree as a stub.
fn page_or_live<A: Serialize>(
    store: Option<&SubtreeStore>,
    page_depth: Option<usize>,
    depth: usize,
    label_path: &str,
    live: LiveNode<A>,
) -> KoaTrieResult<Node<A>> {
    if let (Some(target), Some(store)) = (page_depth, store) {
        if depth == target {
            let file = store.save_page(label_path, &live)?;
            return Ok(Node::Stub(PageRef {
                file_name: file,
                max_length: live.max_length,
            }));
        }
    }
    Ok(Node::Live(live))
}

// Copyright (c) 2025 Koa Trie Authors
//
// Licensed under MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)

//! Unit and property-based tests for the Koa Radix Trie engine.


use super::node::Node;
use super::{
    Accumulate, Joined, KoaTrie, KoaTrieConfig, KoaTrieError, NodeVariant, Replace,
};

fn accumulate_trie() -> KoaTrie<Accumulate<u32>> {
    KoaTrie::new(Accumulate::new())
}

#[test]
fn test_insert_and_get_basic() {
    let mut trie = KoaTrie::new(Replace::<u32>::new());

    assert!(trie.is_empty());
    assert_eq!(trie.insert("hello", 1).unwrap(), 1);
    assert_eq!(trie.len(), 1);
    assert!(!trie.is_empty());

    assert_eq!(trie.get("hello").unwrap(), Some(1));
    assert!(trie.contains("hello").unwrap());
    assert_eq!(trie.get("hell").unwrap(), None);
    assert_eq!(trie.get("helloo").unwrap(), None);
    assert!(!trie.contains("absent").unwrap());
}

#[test]
fn test_replace_strategy_overwrites() {
    let mut trie = KoaTrie::new(Replace::<String>::new());

    assert_eq!(trie.insert("key", "first".to_string()).unwrap(), 1);
    assert_eq!(trie.insert("key", "second".to_string()).unwrap(), 0);
    assert_eq!(trie.len(), 1);
    assert_eq!(trie.get("key").unwrap(), Some("second".to_string()));
}

#[test]
fn test_radix_split_creates_branch() {
    let mut trie = accumulate_trie();
    trie.insert("cat", 1).unwrap();
    trie.insert("car", 2).unwrap();
    trie.insert("cart", 3).unwrap();

    // expected shape: branch "ca" with children "t" and "r", and "r"
    // itself carrying a "t" child
    let nodes = trie.nodes(false).unwrap();
    let shape: Vec<(String, bool, usize)> = nodes
        .iter()
        .map(|(path, summary)| (path.clone(), summary.is_word, summary.child_count))
        .collect();
    assert_eq!(
        shape,
        vec![
            ("ca".to_string(), false, 2),
            ("car".to_string(), true, 1),
            ("cart".to_string(), true, 0),
            ("cat".to_string(), true, 0),
        ]
    );

    assert_eq!(trie.get("cat").unwrap(), Some(vec![1]));
    assert_eq!(trie.get("car").unwrap(), Some(vec![2]));
    assert_eq!(trie.get("cart").unwrap(), Some(vec![3]));
    assert_eq!(trie.get("ca").unwrap(), None);
    assert_eq!(trie.len(), 3);
}

#[test]
fn test_longest_prefix_walks_past_missing_key() {
    let mut trie = accumulate_trie();
    trie.insert("cat", 1).unwrap();
    trie.insert("car", 2).unwrap();
    trie.insert("cart", 3).unwrap();

    assert_eq!(
        trie.longest_prefix("cartoon").unwrap(),
        Some(("cart".to_string(), vec![3]))
    );
    assert_eq!(
        trie.longest_prefixes("cartoon").unwrap(),
        vec![("car".to_string(), vec![2]), ("cart".to_string(), vec![3])]
    );
    assert_eq!(trie.longest_prefix("dog").unwrap(), None);
    assert_eq!(
        trie.longest_prefix("cat").unwrap(),
        Some(("cat".to_string(), vec![1]))
    );
}

#[test]
fn test_remove_merges_single_child_edge() {
    let mut trie = accumulate_trie();
    trie.insert("cat", 1).unwrap();
    trie.insert("cart", 2).unwrap();

    assert!(trie.remove("cat").unwrap());

    // the "ca" branch lost its purpose: the surviving key collapses back
    // into a single edge
    let nodes = trie.nodes(false).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].0, "cart");
    assert!(nodes[0].1.is_word);
    assert_eq!(trie.words().unwrap(), vec!["cart".to_string()]);
}

#[test]
fn test_remove_prunes_leaf_and_cascades() {
    let mut trie = accumulate_trie();
    trie.insert("cat", 1).unwrap();
    trie.insert("car", 2).unwrap();
    trie.insert("cart", 3).unwrap();

    assert!(trie.remove("cart").unwrap());
    assert!(trie.remove("car").unwrap());
    assert!(trie.remove("cat").unwrap());
    assert!(!trie.remove("cat").unwrap());

    assert_eq!(trie.len(), 0);
    assert!(trie.items().unwrap().is_empty());
    assert!(trie.nodes(false).unwrap().is_empty());
}

#[test]
fn test_remove_keeps_branch_word() {
    let mut trie = accumulate_trie();
    trie.insert("car", 1).unwrap();
    trie.insert("cart", 2).unwrap();

    // removing the deeper key leaves the word at the former branch intact
    assert!(trie.remove("cart").unwrap());
    assert_eq!(trie.get("car").unwrap(), Some(vec![1]));
    assert_eq!(trie.words().unwrap(), vec!["car".to_string()]);
}

#[test]
fn test_empty_key_terminates_at_root() {
    let mut trie = accumulate_trie();
    assert_eq!(trie.insert("", 7).unwrap(), 1);
    trie.insert("a", 1).unwrap();

    assert_eq!(trie.get("").unwrap(), Some(vec![7]));
    assert_eq!(trie.len(), 2);

    let items = trie.items().unwrap();
    assert_eq!(items[0].0, "");

    // the root word is surfaced through include_root
    let nodes = trie.nodes(true).unwrap();
    assert_eq!(nodes[0].0, "");
    assert!(nodes[0].1.is_word);
    let nodes = trie.nodes(false).unwrap();
    assert!(nodes.iter().all(|(path, _)| !path.is_empty()));

    // the empty key prefixes every query
    let prefixes = trie.longest_prefixes("anything").unwrap();
    assert_eq!(prefixes[0].0, "");

    assert!(trie.remove("").unwrap());
    assert_eq!(trie.get("").unwrap(), None);
    assert_eq!(trie.len(), 1);
}

#[test]
fn test_unset_clears_but_absent_is_noop() {
    let mut trie = accumulate_trie();
    trie.insert("key", 1).unwrap();
    trie.insert("key", 2).unwrap();
    assert_eq!(trie.len(), 2);

    // clearing the slot drops every value at once
    assert!(trie.unset("key").unwrap());
    assert_eq!(trie.len(), 0);
    assert_eq!(trie.get("key").unwrap(), None);

    // unsetting a key that was never inserted is a no-op, not an error
    assert!(!trie.unset("key").unwrap());
    assert!(!trie.unset("other").unwrap());
}

#[test]
fn test_remove_value_prunes_on_last() {
    let mut trie = accumulate_trie();
    trie.insert("word", 1).unwrap();
    trie.insert("word", 2).unwrap();

    assert!(trie.remove_value("word", &1).unwrap());
    assert_eq!(trie.get("word").unwrap(), Some(vec![2]));
    assert_eq!(trie.len(), 1);

    assert!(!trie.remove_value("word", &1).unwrap());
    assert!(trie.remove_value("word", &2).unwrap());
    assert_eq!(trie.get("word").unwrap(), None);
    assert_eq!(trie.len(), 0);
    assert!(trie.nodes(false).unwrap().is_empty());
}

#[test]
fn test_duplicate_values_do_not_inflate_counter() {
    let mut trie = accumulate_trie();
    assert_eq!(trie.insert("k", 1).unwrap(), 1);
    assert_eq!(trie.insert("k", 1).unwrap(), 0);
    assert_eq!(trie.insert("k", 2).unwrap(), 1);
    assert_eq!(trie.len(), 2);
    assert_eq!(trie.get("k").unwrap(), Some(vec![1, 2]));
}

#[test]
fn test_items_with_prefix_handles_mid_edge() {
    let mut trie = accumulate_trie();
    trie.insert("cart", 1).unwrap();
    trie.insert("carton", 2).unwrap();
    trie.insert("cat", 3).unwrap();

    let keys = |items: Vec<(String, Vec<u32>)>| -> Vec<String> {
        items.into_iter().map(|(k, _)| k).collect()
    };

    assert_eq!(
        keys(trie.items_with_prefix("car").unwrap()),
        vec!["cart".to_string(), "carton".to_string()]
    );
    // a prefix ending inside the "on" edge
    assert_eq!(
        keys(trie.items_with_prefix("carto").unwrap()),
        vec!["carton".to_string()]
    );
    assert_eq!(
        keys(trie.items_with_prefix("ca").unwrap()),
        vec!["cart".to_string(), "carton".to_string(), "cat".to_string()]
    );
    assert_eq!(
        keys(trie.items_with_prefix("cart").unwrap()),
        vec!["cart".to_string(), "carton".to_string()]
    );
    assert!(trie.items_with_prefix("x").unwrap().is_empty());
    assert!(trie.items_with_prefix("cab").unwrap().is_empty());
}

#[test]
fn test_words_are_lexicographic() {
    let mut trie = accumulate_trie();
    for key in ["mango", "apple", "banana", "apricot", "app"] {
        trie.insert(key, 0).unwrap();
    }
    assert_eq!(
        trie.words().unwrap(),
        vec![
            "app".to_string(),
            "apple".to_string(),
            "apricot".to_string(),
            "banana".to_string(),
            "mango".to_string(),
        ]
    );
}

#[test]
fn test_multibyte_keys_split_on_char_boundaries() {
    let mut trie = accumulate_trie();
    trie.insert("日本語", 1).unwrap();
    trie.insert("日本酒", 2).unwrap();

    assert_eq!(trie.get("日本語").unwrap(), Some(vec![1]));
    assert_eq!(trie.get("日本酒").unwrap(), Some(vec![2]));

    let nodes = trie.nodes(false).unwrap();
    assert_eq!(nodes[0].0, "日本");
    assert!(!nodes[0].1.is_word);
    assert_eq!(nodes[0].1.child_count, 2);
}

#[test]
fn test_extend_sorted_matches_incremental_insertion() {
    let entries = vec![
        ("".to_string(), 0u32),
        ("romane".to_string(), 1),
        ("romanus".to_string(), 2),
        ("romulus".to_string(), 3),
        ("rubens".to_string(), 4),
        ("ruber".to_string(), 5),
        ("rubicon".to_string(), 6),
        ("rubicundus".to_string(), 7),
    ];

    let mut bulk = accumulate_trie();
    assert_eq!(bulk.extend_sorted(entries.clone()).unwrap(), 8);

    let mut incremental = accumulate_trie();
    for (key, value) in entries {
        incremental.insert(key, value).unwrap();
    }

    assert_eq!(bulk.items().unwrap(), incremental.items().unwrap());
    assert_eq!(bulk.len(), incremental.len());
    assert_eq!(bulk.stats().unwrap(), incremental.stats().unwrap());
}

#[test]
fn test_extend_sorted_rejects_unsorted_batch() {
    let mut trie = accumulate_trie();
    let err = trie
        .extend_sorted(vec![("beta".to_string(), 1), ("alpha".to_string(), 2)])
        .unwrap_err();
    assert!(matches!(err, KoaTrieError::UnsortedBatch { .. }));
    assert!(trie.is_empty());
}

#[test]
fn test_extend_sorted_merges_duplicate_keys() {
    let mut trie = accumulate_trie();
    let delta = trie
        .extend_sorted(vec![
            ("alpha".to_string(), 1),
            ("alpha".to_string(), 2),
            ("alpha".to_string(), 1),
        ])
        .unwrap();
    assert_eq!(delta, 2);
    assert_eq!(trie.get("alpha").unwrap(), Some(vec![1, 2]));
    assert_eq!(trie.len(), 2);
}

#[test]
fn test_extend_sorted_into_populated_trie() {
    let mut trie = accumulate_trie();
    trie.insert("cart", 1).unwrap();

    let delta = trie
        .extend_sorted(vec![("car".to_string(), 2), ("cat".to_string(), 3)])
        .unwrap();
    assert_eq!(delta, 2);
    assert_eq!(
        trie.words().unwrap(),
        vec!["car".to_string(), "cart".to_string(), "cat".to_string()]
    );
}

#[test]
fn test_stats_agree_with_running_counter() {
    let mut trie = accumulate_trie();
    trie.insert("cat", 1).unwrap();
    trie.insert("car", 2).unwrap();
    trie.insert("cart", 3).unwrap();
    trie.insert("cart", 4).unwrap();

    let stats = trie.stats().unwrap();
    assert_eq!(stats.num_values, trie.len());
    assert_eq!(stats.num_values, 4);
    assert_eq!(stats.num_words, 3);
    // "ca", "t", "r", "t" -> four nodes excluding the root
    assert_eq!(stats.num_nodes, 4);
    assert_eq!(stats.max_depth, 3);
    assert_eq!(stats.word_lengths.get(&3), Some(&2));
    assert_eq!(stats.word_lengths.get(&4), Some(&1));
}

#[test]
fn test_max_length_tracking_on_insert_and_remove() {
    let config = KoaTrieConfig::new().with_node_variant(NodeVariant::MaxLength);
    let mut trie = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap();
    trie.insert("cat", 1).unwrap();
    trie.insert("cartoon", 2).unwrap();

    let summaries: std::collections::BTreeMap<String, super::NodeSummary> =
        trie.nodes(true).unwrap().into_iter().collect();
    assert_eq!(summaries[""].max_length, 7);
    assert_eq!(summaries["ca"].max_length, 7);
    assert_eq!(summaries["cat"].max_length, 3);
    assert_eq!(summaries["cartoon"].max_length, 7);

    // the counter is maintained on deletion, not recomputed lazily
    trie.remove("cartoon").unwrap();
    let summaries: std::collections::BTreeMap<String, super::NodeSummary> =
        trie.nodes(true).unwrap().into_iter().collect();
    assert_eq!(summaries[""].max_length, 3);
    assert_eq!(summaries["cat"].max_length, 3);
}

#[test]
fn test_within_edit_distance_basic() {
    let mut trie = accumulate_trie();
    trie.insert("cat", 1).unwrap();
    trie.insert("cart", 2).unwrap();
    trie.insert("dog", 3).unwrap();
    trie.insert("category", 4).unwrap();

    let hits = trie.within_edit_distance("cat", 1).unwrap();
    let keys: Vec<(usize, String)> = hits.into_iter().map(|(d, k, _)| (d, k)).collect();
    assert_eq!(keys, vec![(1, "cart".to_string()), (0, "cat".to_string())]);

    let hits = trie.within_edit_distance("cat", 0).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].1, "cat");
}

#[test]
fn test_within_edit_distance_with_max_length_pruning() {
    let config = KoaTrieConfig::new().with_node_variant(NodeVariant::MaxLength);
    let mut trie = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap();
    trie.insert("ab", 1).unwrap();
    trie.insert("abcdefgh", 2).unwrap();
    trie.insert("abcdefgx", 3).unwrap();

    let hits = trie.within_edit_distance("abcdefgh", 1).unwrap();
    let keys: Vec<String> = hits.into_iter().map(|(_, k, _)| k).collect();
    assert_eq!(keys, vec!["abcdefgh".to_string(), "abcdefgx".to_string()]);
}

#[test]
fn test_joined_strategy_end_to_end() {
    let mut trie = KoaTrie::new(Joined::new());
    trie.insert("host", "alpha".to_string()).unwrap();
    trie.insert("host", "beta".to_string()).unwrap();
    trie.insert("host", "alpha".to_string()).unwrap();

    assert_eq!(trie.len(), 2);
    assert_eq!(
        trie.get("host").unwrap(),
        Some(vec!["alpha".to_string(), "beta".to_string()])
    );

    // the reserved separator is rejected at the insertion boundary
    let err = trie.insert("host", "a,b".to_string()).unwrap_err();
    assert!(matches!(err, KoaTrieError::SeparatorCollision { .. }));
    assert_eq!(trie.len(), 2);

    assert!(trie.remove_value("host", &"alpha".to_string()).unwrap());
    assert_eq!(trie.get("host").unwrap(), Some(vec!["beta".to_string()]));
    assert!(trie.remove_value("host", &"beta".to_string()).unwrap());
    assert!(!trie.contains("host").unwrap());
    assert_eq!(trie.len(), 0);
}

#[test]
fn test_construction_rejects_bad_paging_config() {
    let config = KoaTrieConfig::new().with_page_depth(0).with_storage_dir("/tmp");
    let err = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap_err();
    assert!(matches!(err, KoaTrieError::ZeroPageDepth));

    let config = KoaTrieConfig::new().with_page_depth(2);
    let err = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap_err();
    assert!(matches!(err, KoaTrieError::MissingStorageDir { depth: 2 }));
}

#[test]
fn test_save_pages_out_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let config = KoaTrieConfig::new()
        .with_page_depth(1)
        .with_storage_dir(dir.path());
    let mut trie = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap();

    trie.insert("cat", 1).unwrap();
    trie.insert("car", 2).unwrap();
    trie.insert("dog", 3).unwrap();

    let pages = trie.save().unwrap();
    assert_eq!(pages, 2); // the "ca" branch and the "dog" leaf

    // the in-memory slots are now stubs
    let children = trie.root.children.as_ref().unwrap();
    assert!(children.values().all(|child| matches!(child, Node::Stub(_))));

    // traversal stays transparent
    assert_eq!(trie.get("cat").unwrap(), Some(vec![1]));
    assert_eq!(trie.get("car").unwrap(), Some(vec![2]));
    assert_eq!(trie.get("dog").unwrap(), Some(vec![3]));
    assert_eq!(
        trie.words().unwrap(),
        vec!["car".to_string(), "cat".to_string(), "dog".to_string()]
    );
    assert_eq!(
        trie.longest_prefix("cartel").unwrap(),
        Some(("car".to_string(), vec![2]))
    );

    // a second pass has nothing live left to page
    assert_eq!(trie.save().unwrap(), 0);
}

#[test]
fn test_mutation_resolves_stub_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let config = KoaTrieConfig::new()
        .with_page_depth(1)
        .with_storage_dir(dir.path());
    let mut trie = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap();

    trie.insert("cat", 1).unwrap();
    trie.insert("car", 2).unwrap();
    trie.save().unwrap();

    // inserting under a paged region loads it back as a live subtree
    trie.insert("cart", 3).unwrap();
    let children = trie.root.children.as_ref().unwrap();
    assert!(matches!(children.get("ca"), Some(Node::Live(_))));

    assert_eq!(trie.get("cart").unwrap(), Some(vec![3]));
    assert_eq!(trie.get("cat").unwrap(), Some(vec![1]));
    assert_eq!(trie.len(), 3);

    // the next save pass pages the region out again
    assert_eq!(trie.save().unwrap(), 1);
    assert_eq!(trie.get("cart").unwrap(), Some(vec![3]));
}

#[test]
fn test_missing_page_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = KoaTrieConfig::new()
        .with_page_depth(1)
        .with_storage_dir(dir.path());
    let mut trie = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap();

    trie.insert("cat", 1).unwrap();
    trie.save().unwrap();

    for entry in std::fs::read_dir(dir.path()).unwrap() {
        std::fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let err = trie.get("cat").unwrap_err();
    assert!(matches!(err, KoaTrieError::PageRead { .. }));
}

#[test]
fn test_paged_regions_are_reread_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let config = KoaTrieConfig::new()
        .with_page_depth(1)
        .with_storage_dir(dir.path());
    let mut trie = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap();

    trie.insert("cat", 1).unwrap();
    trie.save().unwrap();
    assert_eq!(trie.get("cat").unwrap(), Some(vec![1]));

    // corrupt the page after a successful read; a cached subtree would keep
    // answering, a re-read must fail with a decode error
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        std::fs::write(entry.unwrap().path(), b"{ not json").unwrap();
    }
    let err = trie.get("cat").unwrap_err();
    assert!(matches!(err, KoaTrieError::PageDecode { .. }));
}

#[test]
fn test_extend_sorted_pages_at_depth() {
    let dir = tempfile::tempdir().unwrap();
    let config = KoaTrieConfig::new()
        .with_page_depth(2)
        .with_storage_dir(dir.path());
    let mut trie = KoaTrie::with_config(Accumulate::<u32>::new(), config).unwrap();

    let entries: Vec<(String, u32)> = vec![
        ("romane".to_string(), 1),
        ("romanus".to_string(), 2),
        ("romulus".to_string(), 3),
        ("rubens".to_string(), 4),
        ("ruber".to_string(), 5),
    ];
    trie.extend_sorted(entries).unwrap();

    // page files exist on disk already, without an explicit save pass
    let page_count = std::fs::read_dir(dir.path()).unwrap().count();
    assert!(page_count > 0, "bulk load should have paged subtrees out");

    assert_eq!(trie.get("romane").unwrap(), Some(vec![1]));
    assert_eq!(trie.get("ruber").unwrap(), Some(vec![5]));
    assert_eq!(trie.len(), 5);
    assert_eq!(
        trie.words().unwrap(),
        vec![
            "romane".to_string(),
            "romanus".to_string(),
            "romulus".to_string(),
            "rubens".to_string(),
            "ruber".to_string(),
        ]
    );
}

// Copyright (c) 2025 Koa Trie Authors
//
// Licensed under MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)

//! Out-of-core subtree store for the Koa Radix Trie.
//!
//! One file per paged subtree, named after the edge-path label that roots it.
//! The label is sanitized to `[A-Za-z0-9]` with `_` replacing everything
//! else; since that mapping is lossy, an FNV-1a hash of the raw label is
//! appended so distinct labels can never collide on disk.

use std::fs;
use std::hash::Hasher;
use std::io;
use std::path::{Path, PathBuf};

use fnv::FnvHasher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::trie::error::{KoaTrieError, KoaTrieResult};
use crate::trie::node::LiveNode;

/// Extension of paged subtree files.
const PAGE_EXT: &str = "json";

/// Sanitized labels longer than this are truncated; the hash suffix keeps
/// truncated names unique while staying under common file-name limits.
const MAX_LABEL_CHARS: usize = 48;

/// Handle on the directory paged subtrees are written to.
#[derive(Debug)]
pub(crate) struct SubtreeStore {
    dir: PathBuf,
}

impl SubtreeStore {
    /// Open a store over `dir`, creating the directory and probing it for
    /// writability. Failure here is a construction-time configuration error.
    pub(crate) fn open(dir: &Path) -> KoaTrieResult<Self> {
        fs::create_dir_all(dir).map_err(|source| KoaTrieError::StorageDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let probe = dir.join(".koa_write_probe");
        fs::write(&probe, b"")
            .and_then(|()| fs::remove_file(&probe))
            .map_err(|source| KoaTrieError::StorageDir {
                path: dir.to_path_buf(),
                source,
            })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Derive the page file name for an edge-path label.
    pub(crate) fn page_file_name(label: &str) -> String {
        let sanitized: String = label
            .chars()
            .take(MAX_LABEL_CHARS)
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let mut hasher = FnvHasher::default();
        hasher.write(label.as_bytes());
        format!("{}_{:016x}.{}", sanitized, hasher.finish(), PAGE_EXT)
    }

    /// Serialize a live subtree under the given edge-path label.
    ///
    /// # Returns
    ///
    /// The page file name the stub should carry.
    pub(crate) fn save_page<A: Serialize>(
        &self,
        label: &str,
        node: &LiveNode<A>,
    ) -> KoaTrieResult<String> {
        let file = Self::page_file_name(label);
        let encoded = serde_json::to_vec(node).map_err(|source| KoaTrieError::PageWrite {
            file: file.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, source),
        })?;
        fs::write(self.dir.join(&file), encoded).map_err(|source| KoaTrieError::PageWrite {
            file: file.clone(),
            source,
        })?;
        debug!(label, %file, "paged out subtree");
        Ok(file)
    }

    /// Deserialize a paged subtree back into a live node.
    ///
    /// A missing or unreadable file surfaces as [`KoaTrieError::PageRead`],
    /// a file that reads but does not decode as [`KoaTrieError::PageDecode`];
    /// both are distinct from an ordinary lookup miss.
    pub(crate) fn load_page<A: DeserializeOwned>(&self, file: &str) -> KoaTrieResult<LiveNode<A>> {
        let raw =
            fs::read_to_string(self.dir.join(file)).map_err(|source| KoaTrieError::PageRead {
                file: file.to_string(),
                source,
            })?;
        let node = serde_json::from_str(&raw).map_err(|source| KoaTrieError::PageDecode {
            file: file.to_string(),
            source,
        })?;
        debug!(file, "resolved paged subtree");
        Ok(node)
    }
}

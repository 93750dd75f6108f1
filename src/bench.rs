//! Benchmarking support for the Koa Trie engine.
//!
//! This module contains helpers shared by the Criterion benchmarks under
//! `benches/`. It is only compiled with the `benchmarking` feature.

/// Generate `count` deterministic pseudo-random keys for benchmark runs.
///
/// A fixed multiplicative sequence keeps runs comparable without pulling a
/// random number generator into the benchmark setup.
pub fn generate_keys(count: usize) -> Vec<String> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..count)
        .map(|_| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            format!("{:016x}", state)
        })
        .collect()
}

/// The same keys in sorted order, for bulk-load benchmarks.
pub fn generate_sorted_keys(count: usize) -> Vec<String> {
    let mut keys = generate_keys(count);
    keys.sort();
    keys
}

//! Deterministic derivation primitives
//!
//! ```text
//! key ──seed_hash──▶ u32 seed ──DeterministicStream──▶ [0,1) values ──select──▶ index / element
//! ```
//!
//! Everything here is synchronous and side-effect free. Given the same key,
//! every device (and every browser running the equivalent JavaScript) gets
//! the same result.

pub mod hash;
pub mod select;
pub mod stream;

pub use hash::seed_hash;
pub use select::{bounded_int, pick_one};
pub use stream::DeterministicStream;

use std::cmp::Ordering;

/// Compare two strings by UTF-16 code units (JavaScript `Array.prototype.sort` order)
pub fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Sorted copy of `names` in UTF-16 code unit order
pub fn sorted_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut sorted: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
    sorted.sort_by(|a, b| utf16_cmp(a, b));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_matches_code_units() {
        let names = ["bob", "Alice", "alice", "Émile", "Zoe"];
        assert_eq!(sorted_names(&names), vec!["Alice", "Zoe", "alice", "bob", "Émile"]);
    }

    #[test]
    fn test_astral_sorts_before_private_use() {
        // U+1F600 encodes as a surrogate pair (0xD83D..) which sorts below U+E000
        let names = ["\u{E000}", "\u{1F600}"];
        assert_eq!(sorted_names(&names), vec!["\u{1F600}", "\u{E000}"]);
    }
}

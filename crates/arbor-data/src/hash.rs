//! Token hashing for textual features.
//!
//! Free text is reduced to a per-sample set of 32-bit token hashes. The
//! hash is seeded and platform-stable, so the same text encodes to the
//! same token set on every build.

use std::hash::Hasher;

use twox_hash::XxHash32;

const TOKEN_SEED: u32 = 0;

/// Hash a single token to a 32-bit value.
pub(crate) fn hash_token(token: &str) -> u32 {
    let mut hasher = XxHash32::with_seed(TOKEN_SEED);
    hasher.write(token.as_bytes());
    hasher.finish() as u32
}

/// A sample's encoded bag of tokens.
///
/// Stored sorted and deduplicated: membership is a binary search, and
/// positional selection via [`TokenSet::select`] is reproducible across
/// platforms because the enumeration order is the numeric order of the
/// hashes, not an incidental hash-table order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenSet(Vec<u32>);

impl TokenSet {
    /// Encode a text field: lowercase, split on non-alphanumeric
    /// characters, hash each token, sort and deduplicate.
    pub fn from_text(text: &str) -> Self {
        let mut tokens: Vec<u32> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(hash_token)
            .collect();
        tokens.sort_unstable();
        tokens.dedup();
        Self(tokens)
    }

    /// Build a token set directly from pre-hashed tokens.
    pub fn from_hashes(mut hashes: Vec<u32>) -> Self {
        hashes.sort_unstable();
        hashes.dedup();
        Self(hashes)
    }

    /// Test membership of a token hash.
    #[must_use]
    pub fn contains(&self, token: u32) -> bool {
        self.0.binary_search(&token).is_ok()
    }

    /// Deterministically select one token by position `key % len`.
    ///
    /// Returns `None` when the set is empty.
    #[must_use]
    pub fn select(&self, key: usize) -> Option<u32> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0[key % self.0.len()])
        }
    }

    /// Return the number of distinct tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return `true` if the set holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the tokens in ascending numeric order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

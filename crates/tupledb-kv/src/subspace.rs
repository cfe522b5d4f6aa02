//! Subspace namespacing over packed tuples.
//!
//! A subspace is a cached key prefix. Packing a tuple inside a subspace
//! concatenates the prefix with the packed tuple, so all keys of a
//! subspace are contiguous in the store and can be read with one range
//! scan. This mirrors the FoundationDB subspace pattern the data model
//! is built on.

use crate::error::{KvError, KvResult};
use crate::tuple::{strinc, Tuple};

/// A namespace within the key/value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// Creates a subspace from a prefix tuple.
    pub fn new(prefix: Tuple) -> Self {
        Self {
            prefix: prefix.pack(),
        }
    }

    /// Creates a nested subspace by extending this prefix.
    pub fn subspace(&self, suffix: &Tuple) -> Self {
        let mut prefix = self.prefix.clone();
        suffix.pack_into(&mut prefix);
        Self { prefix }
    }

    /// Returns the raw prefix bytes.
    pub fn raw_prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Packs a key tuple under this subspace's prefix.
    pub fn pack(&self, key: &Tuple) -> Vec<u8> {
        let mut out = self.prefix.clone();
        key.pack_into(&mut out);
        out
    }

    /// Strips the prefix and decodes the remaining tuple.
    pub fn unpack(&self, key: &[u8]) -> KvResult<Tuple> {
        if !self.contains(key) {
            return Err(KvError::PrefixMismatch {
                expected: self.prefix.len(),
                actual: key.len(),
            });
        }
        Tuple::unpack(&key[self.prefix.len()..])
    }

    /// Returns true if `key` lies within this subspace.
    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// The half-open range `[prefix, strinc(prefix))` covering every key
    /// in this subspace.
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        range_for(self.prefix.clone())
    }

    /// The half-open range covering keys that extend `key_prefix` within
    /// this subspace.
    pub fn range_of(&self, key_prefix: &Tuple) -> (Vec<u8>, Vec<u8>) {
        range_for(self.pack(key_prefix))
    }
}

fn range_for(prefix: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
    let end = strinc(prefix.clone()).unwrap_or_else(|| vec![0xff; prefix.len() + 1]);
    (prefix, end)
}

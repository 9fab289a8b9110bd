//! Opaque element metadata.
//!
//! Per spec §3, metadata is "opaque to the core; a mapping from string keys
//! to primitive values — numbers, booleans, strings, and nested
//! mappings/sequences". That shape is exactly `serde_json::Value`'s object
//! variant, so we reuse it rather than invent a parallel dynamic-value enum
//! (the pack's `ftsim` crate makes the same choice for its scenario
//! configuration — see `examples/19h-ftsim`).

use serde_json::{Map, Value};

/// A metadata mapping, opaque to the core beyond merge semantics.
pub type Metadata = Map<String, Value>;

/// Merge `delta` into `base`, overwriting keys present in both.
///
/// Applying the same delta twice is equivalent to applying it once: a
/// shallow last-write-wins merge is idempotent by construction, since the
/// second application overwrites with values already present.
pub fn merge(base: &mut Metadata, delta: Metadata) {
    for (key, value) in delta {
        base.insert(key, value);
    }
}

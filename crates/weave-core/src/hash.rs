//! Dependency keys for hook slots.
//!
//! `use_effect` and `use_memo` store only a `u64` per slot, so the dependency
//! values themselves are never cloned or kept alive between renders. The
//! `std-hash` feature swaps `ahash` for the std SipHash hasher.

use std::hash::{Hash, Hasher};

#[cfg(feature = "std-hash")]
type DepsHasher = std::collections::hash_map::DefaultHasher;

#[cfg(not(feature = "std-hash"))]
type DepsHasher = ahash::AHasher;

/// Hash a dependency list into the key an effect or memo slot compares against.
///
/// Two renders passing equal dependencies produce the same key within one process.
#[inline]
pub fn hash_one<T: Hash + ?Sized>(deps: &T) -> u64 {
    let mut hasher = DepsHasher::default();
    deps.hash(&mut hasher);
    hasher.finish()
}

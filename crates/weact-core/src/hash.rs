//! Hashing used for dependency keys and structural value hashes.

use core::hash::Hash;
use std::hash::Hasher;

/// Hash of a single dependency entry.
pub type Key = u64;

#[cfg(feature = "std-hash")]
pub mod default {
    pub use std::collections::hash_map::DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::new()
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod default {
    pub use ahash::AHasher as DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::default()
    }
}

/// Hash a single value with whichever hasher the build selected.
///
/// The result is stable for the lifetime of the process, which is all the
/// dependency comparison needs.
#[inline]
pub fn hash_one<T: Hash + ?Sized>(v: &T) -> Key {
    let mut h = default::new();
    v.hash(&mut h);
    h.finish()
}

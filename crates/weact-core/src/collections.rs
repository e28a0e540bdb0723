//! Collection aliases shared across the runtime.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::HashMap;
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::HashMap;
}

/// Insertion-ordered map. Object fields, patches and definitions keep the
/// order in which the render function produced them.
pub use indexmap::IndexMap as OrderedMap;

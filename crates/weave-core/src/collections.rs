//! Map types behind the runtime's instance, registry and template tables.
//!
//! `hashbrown` by default; `std-hash` selects the std maps.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

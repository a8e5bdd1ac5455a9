//! Shared vocabulary for the tessera render core.
//!
//! # Invariants
//! - A [`SourceId`] names at most one live source for its whole lifetime.
//! - Every fallible operation in the workspace reports an [`Error`].

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{AssetKind, SourceId, SourceKind};

pub fn crate_info() -> &'static str {
    "tessera-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}

//! CPU-side render sources: meshes, images, shader programs, target
//! descriptions, and the store that owns them.
//!
//! Sources are identified by generation-counted [`SourceId`]s issued by the
//! [`SourceStore`]. The binding cache keys GPU objects by these ids, never
//! by memory address.
//!
//! # Invariants
//! - Every source tracks its own "changed since last upload" flag.
//! - A removed id never resolves again.
//!
//! [`SourceId`]: tessera_common::SourceId

mod image;
mod mesh;
mod program;
mod store;

pub use image::Image;
pub use mesh::{Channel, Mesh};
pub use program::{ShaderProgram, TargetDesc};
pub use store::{Source, SourceStore, SourceType};
pub use tessera_layout::PropertySet;

pub fn crate_info() -> &'static str {
    "tessera-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("assets"));
    }
}

//! Transfer dispatch: how each source type's data reaches GPU storage.
//!
//! A [`Transfer`] adapter describes a source as slots of fixed-size
//! elements and picks one of two [`Strategy`]s. The dispatcher functions
//! hold no state; they read the descriptor and either write the source's
//! bytes as they are or transcode them into a scoped write mapping.
//!
//! # Invariants
//! - Indirect transfers always close their mapping, also on failure.
//! - A destination receives exactly [`byte_len`] bytes per slot.
//! - Only kinds in the [`TransferRegistry`] are materialized.

mod adapters;
mod dispatch;
mod registry;

pub use adapters::index_format;
pub use dispatch::{Descriptor, Strategy, Transfer, byte_len, present_slots, upload_all, upload_slot};
pub use registry::{Registration, TransferRegistry};

pub fn crate_info() -> &'static str {
    "tessera-transfer v0.1.0"
}

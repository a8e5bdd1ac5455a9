//! Layout compiler: aligned byte offsets for ordered, heterogeneous property
//! blocks, plus the [`PropertySet`] CPU source built on top of it.
//!
//! # Invariants
//! - `offset(i) = align_up(offset(i-1) + size(i-1), align(i))`.
//! - Total size is the last field's end padded to the largest alignment.
//! - A layout always has at least one field.

mod layout;
mod properties;
mod value;

pub use layout::{Field, LayoutBuilder, PropertyLayout, align_up};
pub use properties::PropertySet;
pub use value::{Property, Scalar, ValueType};

pub fn crate_info() -> &'static str {
    "tessera-layout v0.1.0"
}

//! GPU asset contract: what the render core needs from a graphics driver.
//!
//! Drivers implement the backend traits in [`backend`]. The wrappers in this
//! crate ([`GpuBuffer`], [`GpuTexture`], [`GpuShader`], [`GpuTarget`]) hold
//! the contract on top of any backend:
//!
//! # Invariants
//! - Driver objects are created on first use, never earlier.
//! - A buffer or texture size, once set, never changes.
//! - Maps are scoped: one open mapping at a time, always closed.
//! - Dropping a wrapper destroys its driver object.
//!
//! A [`headless`] backend records calls instead of issuing them.

pub mod backend;
pub mod headless;
mod pipeline;
mod storage;

use std::cell::RefCell;
use std::rc::Rc;

pub use backend::{BufferUsage, Device, Extent, IndexFormat, MapAccess, RawHandle};
pub use headless::HeadlessDevice;
pub use pipeline::{AttributeBuffers, GpuShader, GpuTarget, VertexStream};
pub use storage::{Destination, GpuBuffer, GpuTexture, map_scoped};

/// Single-threaded shared ownership of a GPU asset.
pub type Shared<T> = Rc<RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

pub fn crate_info() -> &'static str {
    "tessera-gpu v0.1.0"
}

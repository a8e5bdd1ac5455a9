//! Render task graph and scheduler.
//!
//! Tasks live in a [`TaskGraph`] and declare what they rely on. A
//! [`TaskQueue`] picks a subset of the graph, orders it with Kahn's
//! algorithm and renders it, optionally keeping per-task timing averages.
//!
//! [`ShaderTask`] draws pre-bound GPU assets. [`ProvidedTask`] takes CPU
//! sources instead and binds them through the [`BindingCache`] on every
//! render.
//!
//! # Invariants
//! - After a successful sort every dependency precedes its dependents.
//! - A cyclic queue never sorts, and its order is left as it was.
//! - A task missing its shader, target or attributes is skipped, not failed.
//! - Profiling never changes what renders or in which order.
//!
//! [`BindingCache`]: tessera_binding::BindingCache

mod graph;
mod profile;
mod queue;
mod tasks;

pub use graph::{AsAny, Barrier, FnTask, RenderContext, RenderTask, TaskGraph, TaskId};
pub use profile::{Profiler, SchedulerConfig};
pub use queue::{TaskQueue, TaskState};
pub use tasks::{ProvidedTask, ShaderTask};

pub fn crate_info() -> &'static str {
    "tessera-schedule v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("schedule"));
    }
}

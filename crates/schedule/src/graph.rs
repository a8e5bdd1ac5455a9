use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use tessera_assets::SourceStore;
use tessera_binding::BindingCache;
use tessera_common::{Error, Result};
use tessera_gpu::Device;

/// Stable identity of a task in a [`TaskGraph`]. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Everything a task may touch while rendering.
pub struct RenderContext<'a> {
    pub device: &'a mut dyn Device,
    pub cache: &'a mut BindingCache,
    pub sources: &'a mut SourceStore,
}

impl<'a> RenderContext<'a> {
    pub fn new(device: &'a mut dyn Device, cache: &'a mut BindingCache, sources: &'a mut SourceStore) -> Self {
        Self {
            device,
            cache,
            sources,
        }
    }
}

/// Downcasting support for boxed tasks.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of work in the render graph.
pub trait RenderTask: AsAny {
    fn label(&self) -> &str;

    fn render(&mut self, ctx: &mut RenderContext<'_>) -> Result<()>;
}

struct Node {
    task: Box<dyn RenderTask>,
    /// Tasks that must render before this one, in the order they were added.
    dependencies: Vec<TaskId>,
}

/// Arena owning every task and its dependency edges.
///
/// Edges point from a dependency to its dependent. The graph itself never
/// orders anything; a [`TaskQueue`](crate::TaskQueue) sorts its members.
#[derive(Default)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskId, Node>,
    next_id: u64,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: RenderTask>(&mut self, task: T) -> TaskId {
        self.insert_boxed(Box::new(task))
    }

    pub fn insert_boxed(&mut self, task: Box<dyn RenderTask>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        tracing::trace!(%id, label = task.label(), "task inserted");
        self.nodes.insert(
            id,
            Node {
                task,
                dependencies: Vec::new(),
            },
        );
        id
    }

    /// Removes a task and every edge that touches it.
    pub fn remove(&mut self, id: TaskId) -> Option<Box<dyn RenderTask>> {
        let node = self.nodes.remove(&id)?;
        for other in self.nodes.values_mut() {
            other.dependencies.retain(|dep| *dep != id);
        }
        Some(node.task)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn task(&self, id: TaskId) -> Option<&dyn RenderTask> {
        self.nodes.get(&id).map(|node| node.task.as_ref())
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut dyn RenderTask> {
        match self.nodes.get_mut(&id) {
            Some(node) => Some(node.task.as_mut()),
            None => None,
        }
    }

    /// Typed access to a task.
    pub fn get<T: RenderTask>(&self, id: TaskId) -> Option<&T> {
        self.nodes
            .get(&id)
            .and_then(|node| (*node.task).as_any().downcast_ref())
    }

    pub fn get_mut<T: RenderTask>(&mut self, id: TaskId) -> Option<&mut T> {
        self.nodes
            .get_mut(&id)
            .and_then(|node| (*node.task).as_any_mut().downcast_mut())
    }

    pub fn label(&self, id: TaskId) -> Option<&str> {
        self.nodes.get(&id).map(|node| node.task.label())
    }

    pub fn dependencies(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(&id)
            .map(|node| node.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Makes `dependent` render after `dependency`. Adding an existing edge
    /// is a no-op.
    pub fn rely_on(&mut self, dependent: TaskId, dependency: TaskId) -> Result<()> {
        if dependent == dependency {
            return Err(Error::config(format!("{dependent} cannot rely on itself")));
        }
        if !self.contains(dependency) {
            return Err(Error::config(format!("unknown dependency {dependency}")));
        }
        let node = self
            .nodes
            .get_mut(&dependent)
            .ok_or_else(|| Error::config(format!("unknown task {dependent}")))?;
        if !node.dependencies.contains(&dependency) {
            node.dependencies.push(dependency);
        }
        Ok(())
    }

    /// Drops the edge from `dependency` to `dependent`. Returns whether it
    /// existed.
    pub fn reclaim_reliance(&mut self, dependent: TaskId, dependency: TaskId) -> bool {
        let Some(node) = self.nodes.get_mut(&dependent) else {
            return false;
        };
        let before = node.dependencies.len();
        node.dependencies.retain(|dep| *dep != dependency);
        node.dependencies.len() != before
    }
}

impl fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.nodes
                    .iter()
                    .map(|(id, node)| (id, (node.task.label(), &node.dependencies))),
            )
            .finish()
    }
}

/// A task backed by a closure, for custom passes.
pub struct FnTask<F> {
    label: String,
    run: F,
}

impl<F> FnTask<F>
where
    F: FnMut(&mut RenderContext<'_>) -> Result<()> + 'static,
{
    pub fn new(label: impl Into<String>, run: F) -> Self {
        Self {
            label: label.into(),
            run,
        }
    }
}

impl<F> RenderTask for FnTask<F>
where
    F: FnMut(&mut RenderContext<'_>) -> Result<()> + 'static,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn render(&mut self, ctx: &mut RenderContext<'_>) -> Result<()> {
        (self.run)(ctx)
    }
}

/// A task that does nothing. Useful as a grouping node.
#[derive(Debug, Clone)]
pub struct Barrier {
    label: String,
}

impl Barrier {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl RenderTask for Barrier {
    fn label(&self) -> &str {
        &self.label
    }

    fn render(&mut self, _ctx: &mut RenderContext<'_>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut graph = TaskGraph::new();
        let a = graph.insert(Barrier::new("a"));
        graph.remove(a);
        let b = graph.insert(Barrier::new("b"));
        assert_ne!(a, b);
        assert!(!graph.contains(a));
    }

    #[test]
    fn typed_access_downcasts() {
        let mut graph = TaskGraph::new();
        let id = graph.insert(Barrier::new("group"));
        assert_eq!(graph.get::<Barrier>(id).map(|b| b.label()), Some("group"));
        let other = graph.insert(FnTask::new("f", |_ctx: &mut RenderContext<'_>| Ok(())));
        assert!(graph.get::<Barrier>(other).is_none());
    }

    #[test]
    fn self_reliance_is_rejected() {
        let mut graph = TaskGraph::new();
        let a = graph.insert(Barrier::new("a"));
        assert!(matches!(graph.rely_on(a, a), Err(Error::Configuration(_))));
    }

    #[test]
    fn edges_can_be_reclaimed() {
        let mut graph = TaskGraph::new();
        let a = graph.insert(Barrier::new("a"));
        let b = graph.insert(Barrier::new("b"));
        graph.rely_on(b, a).unwrap();
        graph.rely_on(b, a).unwrap();
        assert_eq!(graph.dependencies(b), &[a]);
        assert!(graph.reclaim_reliance(b, a));
        assert!(!graph.reclaim_reliance(b, a));
        assert!(graph.dependencies(b).is_empty());
    }

    #[test]
    fn removing_a_task_drops_its_edges() {
        let mut graph = TaskGraph::new();
        let a = graph.insert(Barrier::new("a"));
        let b = graph.insert(Barrier::new("b"));
        graph.rely_on(b, a).unwrap();
        assert!(graph.remove(a).is_some());
        assert!(graph.dependencies(b).is_empty());
    }

    #[test]
    fn unknown_tasks_cannot_gain_edges() {
        let mut graph = TaskGraph::new();
        let a = graph.insert(Barrier::new("a"));
        let gone = graph.insert(Barrier::new("gone"));
        graph.remove(gone);
        assert!(graph.rely_on(a, gone).is_err());
        assert!(graph.rely_on(gone, a).is_err());
    }
}

use crate::graph::{RenderContext, TaskGraph, TaskId};
use crate::profile::{Profiler, SchedulerConfig};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tessera_common::{Error, Result};

/// Where a task stands with respect to one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Unregistered,
    Queued,
    Sorted,
}

/// An ordered set of tasks rendered together.
///
/// Membership changes never sort; call [`sort`](Self::sort) once the queue
/// is assembled. Appending or removing drops the queue back to unsorted.
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    members: Vec<TaskId>,
    sorted: bool,
    profiler: Option<Profiler>,
}

impl TaskQueue {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            members: Vec::new(),
            sorted: false,
            profiler: config
                .profiling
                .then(|| Profiler::new(config.smoothing_weight)),
        }
    }

    /// Adds a task at the end. Returns `false` if it was already queued.
    pub fn append(&mut self, id: TaskId) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.push(id);
        self.sorted = false;
        true
    }

    pub fn remove(&mut self, id: TaskId) -> bool {
        let Some(index) = self.members.iter().position(|member| *member == id) else {
            return false;
        };
        self.members.remove(index);
        self.sorted = false;
        if let Some(profiler) = &mut self.profiler {
            profiler.forget(id);
        }
        true
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.sorted = false;
        if let Some(profiler) = &mut self.profiler {
            profiler.reset();
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn state(&self, id: TaskId) -> TaskState {
        match (self.contains(id), self.sorted) {
            (false, _) => TaskState::Unregistered,
            (true, false) => TaskState::Queued,
            (true, true) => TaskState::Sorted,
        }
    }

    /// Current render order.
    pub fn order(&self) -> &[TaskId] {
        &self.members
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }

    /// Average render time of a member in milliseconds, when profiling.
    pub fn average(&self, id: TaskId) -> Option<f64> {
        self.profiler.as_ref().and_then(|p| p.average(id))
    }

    pub fn set_profiling(&mut self, config: &SchedulerConfig) {
        self.profiler = config
            .profiling
            .then(|| Profiler::new(config.smoothing_weight));
    }

    /// Orders members so every dependency renders before its dependents.
    ///
    /// Only edges between members count. Among independent tasks, the
    /// order follows the current queue order. On a cycle the queue keeps
    /// its previous order and the error names every member left unresolved.
    pub fn sort(&mut self, graph: &TaskGraph) -> Result<()> {
        let _span = tracing::debug_span!("sort", tasks = self.members.len()).entered();
        let position: HashMap<TaskId, usize> = self
            .members
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();
        if let Some(missing) = self.members.iter().find(|id| !graph.contains(**id)) {
            return Err(Error::config(format!("{missing} is queued but not in the graph")));
        }

        let n = self.members.len();
        let mut in_degree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (index, id) in self.members.iter().enumerate() {
            for dependency in graph.dependencies(*id) {
                if let Some(&from) = position.get(dependency) {
                    in_degree[index] += 1;
                    successors[from].push(index);
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(index) = ready.pop_front() {
            order.push(index);
            for &next in &successors[index] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() < n {
            self.sorted = false;
            let unresolved: Vec<String> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| describe(graph, self.members[i]))
                .collect();
            tracing::warn!(unresolved = ?unresolved, "dependency cycle in task queue");
            return Err(Error::Resolve { unresolved });
        }

        self.members = order.into_iter().map(|i| self.members[i]).collect();
        self.sorted = true;
        tracing::debug!(
            order = ?self.members.iter().map(|id| describe(graph, *id)).collect::<Vec<_>>(),
            "sorted task queue"
        );
        Ok(())
    }

    /// Renders every member in order. The first error stops the pass.
    pub fn render(&mut self, graph: &mut TaskGraph, ctx: &mut RenderContext<'_>) -> Result<()> {
        let _span = tracing::debug_span!("render", tasks = self.members.len()).entered();
        if !self.sorted && !self.members.is_empty() {
            tracing::warn!("rendering an unsorted queue in insertion order");
        }
        for &id in &self.members {
            let task = graph
                .task_mut(id)
                .ok_or_else(|| Error::config(format!("{id} is queued but not in the graph")))?;
            match &mut self.profiler {
                Some(profiler) => {
                    let start = Instant::now();
                    task.render(ctx)?;
                    profiler.record(id, start.elapsed());
                }
                None => task.render(ctx)?,
            }
        }
        Ok(())
    }
}

fn describe(graph: &TaskGraph, id: TaskId) -> String {
    match graph.label(id) {
        Some(label) => label.to_string(),
        None => id.to_string(),
    }
}

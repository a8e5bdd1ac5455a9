use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tessera_schedule::{Barrier, SchedulerConfig, TaskGraph, TaskId, TaskQueue};

/// A task graph described in JSON.
///
/// ```json
/// { "tasks": ["shadow", "main"], "edges": [["shadow", "main"]], "profiling": false }
/// ```
///
/// Each edge is `[from, to]`: `to` renders after `from`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub tasks: Vec<String>,
    pub edges: Vec<(String, String)>,
    pub profiling: bool,
}

impl GraphConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading graph config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing graph config {}", path.display()))
    }

    /// Tasks "0".."6" with the edges 1→0, 0→5, 2→3, 4→5, 2→4, 3→5, 5→6.
    pub fn demo() -> Self {
        let edge = |from: u32, to: u32| (from.to_string(), to.to_string());
        Self {
            tasks: (0..7).map(|i| i.to_string()).collect(),
            edges: vec![
                edge(1, 0),
                edge(0, 5),
                edge(2, 3),
                edge(4, 5),
                edge(2, 4),
                edge(3, 5),
                edge(5, 6),
            ],
            profiling: false,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            profiling: self.profiling,
            ..SchedulerConfig::default()
        }
    }

    /// Builds the graph with one placeholder task per name and queues every
    /// task in declaration order.
    pub fn build(&self) -> anyhow::Result<(TaskGraph, TaskQueue)> {
        let mut graph = TaskGraph::new();
        let mut queue = TaskQueue::new(&self.scheduler_config());
        let mut ids: HashMap<&str, TaskId> = HashMap::new();
        for name in &self.tasks {
            let id = graph.insert(Barrier::new(name.clone()));
            if ids.insert(name.as_str(), id).is_some() {
                bail!("task `{name}` is declared twice");
            }
            queue.append(id);
        }
        for (from, to) in &self.edges {
            let lookup = |name: &str| {
                ids.get(name)
                    .copied()
                    .with_context(|| format!("edge refers to unknown task `{name}`"))
            };
            graph.rely_on(lookup(to)?, lookup(from)?)?;
        }
        Ok((graph, queue))
    }
}

/// Sorts the configured graph and returns the task names in render order.
pub fn sorted_names(config: &GraphConfig) -> anyhow::Result<Vec<String>> {
    let (graph, mut queue) = config.build()?;
    queue.sort(&graph)?;
    Ok(queue
        .order()
        .iter()
        .filter_map(|id| graph.label(*id))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tessera_common::Error;

    #[test]
    fn demo_graph_sorts() {
        let names = sorted_names(&GraphConfig::demo()).unwrap();
        assert_eq!(names, vec!["1", "2", "0", "3", "4", "5", "6"]);
    }

    #[test]
    fn config_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tasks": ["post", "main", "shadow"], "edges": [["shadow", "main"], ["main", "post"]]}}"#
        )
        .unwrap();
        let config = GraphConfig::load(file.path()).unwrap();
        assert!(!config.profiling);
        assert_eq!(sorted_names(&config).unwrap(), vec!["shadow", "main", "post"]);
    }

    #[test]
    fn cycles_surface_as_resolve_errors() {
        let mut config = GraphConfig::demo();
        config.edges.push(("6".into(), "0".into()));
        let err = sorted_names(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Resolve { .. })
        ));
    }

    #[test]
    fn unknown_and_duplicate_names_are_rejected() {
        let config = GraphConfig {
            tasks: vec!["a".into()],
            edges: vec![("a".into(), "b".into())],
            profiling: false,
        };
        assert!(config.build().is_err());

        let config = GraphConfig {
            tasks: vec!["a".into(), "a".into()],
            ..GraphConfig::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GraphConfig::load(&dir.path().join("absent.json")).is_err());
    }
}

//! Column dependency graph.
//!
//! Nodes are column names; an edge `a -> b` means "a depends on b". Edges may
//! point at names that are not (yet) nodes. Those dangling edges are kept so
//! that adding the missing column later still recalculates its dependents.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use log::trace;
use thiserror::Error;

use super::cycle::detect_cycle;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Circular dependency: {}", path.join(" -> "))]
pub struct CycleError {
    pub path: Vec<String>,
}

#[derive(Clone, Debug)]
struct Node {
    order: u64,
    depends_on: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, Node>,
    next_order: u64,
}

impl DependencyGraph {
    pub fn new() -> DependencyGraph {
        DependencyGraph::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names `name` depends on, as registered.
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes that depend directly on `name`, in insertion order.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        let mut out: Vec<(&String, &Node)> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.depends_on.iter().any(|d| d == name))
            .collect();
        out.sort_by_key(|(_, node)| node.order);
        out.into_iter().map(|(n, _)| n.clone()).collect()
    }

    /// True when any node holds an edge to `name`.
    pub fn is_referenced(&self, name: &str) -> bool {
        self.nodes
            .values()
            .any(|node| node.depends_on.iter().any(|d| d == name))
    }

    /// Add `column` or replace its edges. Nothing changes if the new edges
    /// would close a cycle.
    pub fn register(&mut self, column: &str, references: &[String]) -> Result<(), CycleError> {
        let mut deps: Vec<String> = Vec::with_capacity(references.len());
        for r in references {
            if !deps.contains(r) {
                deps.push(r.clone());
            }
        }

        let edges: HashMap<String, Vec<String>> = self
            .nodes
            .iter()
            .filter(|(name, _)| name.as_str() != column)
            .map(|(name, node)| (name.clone(), node.depends_on.clone()))
            .collect();
        if let Some(path) = detect_cycle(column, &deps, &edges) {
            return Err(CycleError { path });
        }

        trace!("graph: {} -> {:?}", column, deps);
        match self.nodes.get_mut(column) {
            Some(node) => node.depends_on = deps,
            None => {
                let order = self.next_order;
                self.next_order += 1;
                self.nodes.insert(
                    column.to_string(),
                    Node {
                        order,
                        depends_on: deps,
                    },
                );
            }
        }
        Ok(())
    }

    /// Drop the node and its outgoing edges. Edges pointing at it remain.
    pub fn unregister(&mut self, column: &str) {
        self.nodes.remove(column);
    }

    /// Relabel a node and every edge that names it.
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(node) = self.nodes.remove(old) {
            self.nodes.insert(new.to_string(), node);
        }
        for node in self.nodes.values_mut() {
            for dep in node.depends_on.iter_mut() {
                if dep == old {
                    *dep = new.to_string();
                }
            }
        }
    }

    /// Changed nodes plus everything that transitively depends on them, each
    /// once, dependencies before dependents, ties in insertion order.
    pub fn recalculation_order<S: AsRef<str>>(&self, changed: &[S]) -> Vec<String> {
        let reverse = self.reverse_edges();
        let mut affected: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        for name in changed {
            let name = name.as_ref();
            if let Some((key, _)) = self.nodes.get_key_value(name) {
                if affected.insert(key.as_str()) {
                    queue.push_back(key.as_str());
                }
            } else {
                // Not a node: only its dependents are affected.
                queue.push_back(name);
            }
        }

        while let Some(current) = queue.pop_front() {
            if let Some(dependents) = reverse.get(current) {
                for &dep in dependents {
                    if affected.insert(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        self.topological(&affected)
    }

    /// Every node in dependency order.
    pub fn full_order(&self) -> Vec<String> {
        let all: HashSet<&str> = self.nodes.keys().map(String::as_str).collect();
        self.topological(&all)
    }

    fn reverse_edges(&self) -> HashMap<&str, Vec<&str>> {
        let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, node) in &self.nodes {
            for dep in &node.depends_on {
                reverse.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
        reverse
    }

    /// Kahn's algorithm over `subset`, smallest insertion order first.
    fn topological(&self, subset: &HashSet<&str>) -> Vec<String> {
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();

        for &name in subset {
            let Some(node) = self.nodes.get(name) else {
                continue;
            };
            let mut count = 0;
            for dep in &node.depends_on {
                if dep != name && subset.contains(dep.as_str()) {
                    count += 1;
                    reverse.entry(dep.as_str()).or_default().push(name);
                }
            }
            indegree.insert(name, count);
        }

        let mut ready: BinaryHeap<Reverse<(u64, &str)>> = indegree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| Reverse((self.nodes[*name].order, *name)))
            .collect();

        let mut order = Vec::with_capacity(indegree.len());
        while let Some(Reverse((_, name))) = ready.pop() {
            order.push(name.to_string());
            if let Some(dependents) = reverse.get(name) {
                for dependent in dependents {
                    if let Some(count) = indegree.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            ready.push(Reverse((self.nodes[*dependent].order, *dependent)));
                        }
                    }
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn refs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn chain() -> DependencyGraph {
        let mut g = DependencyGraph::new();
        g.register("t", &[]).unwrap();
        g.register("x", &[]).unwrap();
        g.register("v", &refs(&["x", "t"])).unwrap();
        g.register("a", &refs(&["v", "t"])).unwrap();
        g.register("y", &refs(&["x"])).unwrap();
        g
    }

    #[test]
    fn test_recalculation_order_respects_dependencies() {
        let g = chain();
        assert_eq!(g.recalculation_order(&["t"]), refs(&["t", "v", "a"]));
        assert_eq!(g.recalculation_order(&["x"]), refs(&["x", "v", "a", "y"]));
        assert_eq!(g.recalculation_order(&["a"]), refs(&["a"]));
    }

    #[test]
    fn test_full_order_is_topological() {
        let mut g = DependencyGraph::new();
        g.register("c", &refs(&["b"])).unwrap();
        g.register("b", &refs(&["a"])).unwrap();
        g.register("a", &[]).unwrap();
        assert_eq!(g.full_order(), refs(&["a", "b", "c"]));
    }

    #[test]
    fn test_cycle_is_rejected_without_changes() {
        let mut g = DependencyGraph::new();
        g.register("a", &refs(&["b"])).unwrap();
        let err = g.register("b", &refs(&["a"])).unwrap_err();
        assert_eq!(err.path, refs(&["b", "a", "b"]));
        assert!(!g.contains("b"));
        assert_eq!(err.to_string(), "Circular dependency: b -> a -> b");
    }

    #[test]
    fn test_dangling_edges_trigger_dependents() {
        let mut g = DependencyGraph::new();
        g.register("area", &refs(&["side"])).unwrap();
        assert!(g.is_referenced("side"));
        assert_eq!(g.recalculation_order(&["side"]), refs(&["area"]));
        g.register("side", &[]).unwrap();
        assert_eq!(g.recalculation_order(&["side"]), refs(&["side", "area"]));
    }

    #[test]
    fn test_rename_relabels_edges() {
        let mut g = chain();
        g.rename("v", "velocity");
        assert!(g.contains("velocity"));
        assert!(!g.contains("v"));
        assert_eq!(g.dependencies("a"), refs(&["velocity", "t"]).as_slice());
        assert_eq!(g.dependents("velocity"), refs(&["a"]));
    }

    #[test]
    fn test_unregister_keeps_incoming_edges() {
        let mut g = chain();
        g.unregister("v");
        assert!(!g.contains("v"));
        assert!(g.is_referenced("v"));
        assert_eq!(g.recalculation_order(&["v"]), refs(&["a"]));
    }
}

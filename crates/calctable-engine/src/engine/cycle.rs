//! Circular dependency detection between columns.
//!
//! Before a column's edges are committed we check that none of the names it
//! is about to depend on can reach it again; otherwise recalculation would
//! never settle.

use std::collections::{HashMap, HashSet};

/// Find a path `start -> ... -> start` if giving `start` the edges `new_deps`
/// would close a cycle. `edges` holds every other column's current edges.
pub(crate) fn detect_cycle(
    start: &str,
    new_deps: &[String],
    edges: &HashMap<String, Vec<String>>,
) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut path = vec![start.to_string()];

    for dep in new_deps {
        if detect_cycle_dfs(dep, start, edges, &mut visited, &mut path) {
            return Some(path);
        }
    }
    None
}

fn detect_cycle_dfs(
    current: &str,
    target: &str,
    edges: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> bool {
    path.push(current.to_string());
    if current == target {
        return true;
    }
    if !visited.insert(current.to_string()) {
        path.pop();
        return false;
    }

    if let Some(deps) = edges.get(current) {
        for dep in deps {
            if detect_cycle_dfs(dep, target, edges, visited, path) {
                return true;
            }
        }
    }

    path.pop();
    false
}
